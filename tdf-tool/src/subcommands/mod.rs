// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Individual commands supported by tdf-tool.

mod decrypt;
mod inspect;
mod status;

#[cfg(feature = "kas")]
mod protect;

#[cfg(feature = "kas")]
mod pubkey;

use crate::error::Result;
use crate::subcommands::decrypt::Decrypt;
use crate::subcommands::inspect::Inspect;
use crate::subcommands::status::Status;

#[cfg(feature = "kas")]
use crate::subcommands::protect::Protect;

#[cfg(feature = "kas")]
use crate::subcommands::pubkey::PubKey;

use ring::digest::{digest, SHA256};
use structopt::StructOpt;

/// Command-line interface to tdf-tool operations.
#[derive(Debug, StructOpt)]
pub enum Subcommand {
    /// Protects a media asset for a Key Access Service, writing a TDF artifact beside it.
    #[cfg(feature = "kas")]
    Protect(Protect),

    /// Reports whether a media asset has a complete TDF artifact.
    Status(Status),

    /// Validates and displays the manifest of a TDF artifact.
    Inspect(Inspect),

    /// Fetches the public wrapping key of a Key Access Service and writes it to the console in
    /// PEM form.
    #[cfg(feature = "kas")]
    PubKey(PubKey),

    /// Decrypts a TDF artifact with a local copy of the custodian private key.
    Decrypt(Decrypt),
}

impl Subcommand {
    /// Runs the command.
    pub fn run(&self) -> Result<()> {
        match &self {
            #[cfg(feature = "kas")]
            Subcommand::Protect(cmd) => cmd.run(),
            Subcommand::Status(cmd) => cmd.run(),
            Subcommand::Inspect(cmd) => cmd.run(),
            #[cfg(feature = "kas")]
            Subcommand::PubKey(cmd) => cmd.run(),
            Subcommand::Decrypt(cmd) => cmd.run(),
        }
    }
}

/// Base64 of the SHA-256 digest of the given bytes.
fn fingerprint(bytes: &[u8]) -> String {
    base64::encode(digest(&SHA256, bytes))
}
