// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Recovers the plaintext of a TDF artifact with a locally held copy of the custodian private key.
//! This serves development and verification only: in production the key never leaves the custodian.

use crate::error::Result;
use crate::util::parse_oaep_digest;

use tdf::keys::local::LocalMemoryKeyPair;
use tdf::protect::recover::recover_plaintext;

use log::info;
use structopt::StructOpt;

use std::fs;
use std::path::PathBuf;

/// Models the options required by the decrypt command.
#[derive(Debug, StructOpt)]
pub struct Decrypt {
    /// The artifact to decrypt.
    #[structopt(short = "p", long = "artifact", parse(from_os_str))]
    artifact: PathBuf,

    /// PKCS#8 PEM file holding the custodian private key.
    #[structopt(short = "K", long = "private-key", parse(from_os_str))]
    private_key: PathBuf,

    /// Where to write the recovered plaintext.
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: PathBuf,

    /// The OAEP digest the content key was wrapped with: sha1 or sha256.
    #[structopt(long = "oaep-digest", default_value = "sha1")]
    oaep_digest: String,
}

impl Decrypt {
    /// Unwraps the content key and writes the plaintext to the output file.
    pub fn run(&self) -> Result<()> {
        let digest = parse_oaep_digest(&self.oaep_digest)?;
        let pem = fs::read_to_string(&self.private_key)?;
        let key_pair = LocalMemoryKeyPair::from_pkcs8_pem(&pem, digest)?;

        let plaintext = recover_plaintext(&self.artifact, &key_pair)?;
        fs::write(&self.output, &plaintext)?;
        info!(
            "Recovered {} bytes into {}",
            plaintext.len(),
            self.output.display()
        );
        Ok(())
    }
}
