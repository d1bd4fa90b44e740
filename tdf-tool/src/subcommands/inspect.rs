// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Displays the manifest of a TDF artifact. Nothing is decrypted.

use crate::error::Result;
use crate::subcommands::fingerprint;

use tdf::package::archive::ArchiveCodec;
use tdf::package::manifest::v1::Manifest;

use structopt::StructOpt;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Models the options required by the inspect command.
#[derive(Debug, StructOpt)]
pub struct Inspect {
    /// The artifact to inspect.
    #[structopt(short = "p", long = "artifact", parse(from_os_str))]
    artifact: PathBuf,
}

impl Inspect {
    /// Validates the manifest and prints it as indented JSON, preceded by the SHA-256 fingerprint
    /// of the manifest entry as stored.
    pub fn run(&self) -> Result<()> {
        let reader = BufReader::new(File::open(&self.artifact)?);
        let bytes = ArchiveCodec.read_manifest(reader)?;
        let manifest = Manifest::from_bytes(&bytes)?;

        println!("manifest sha256: {}", fingerprint(&bytes));
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        Ok(())
    }
}
