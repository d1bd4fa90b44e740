// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Command-line surface of tdf-tool: the top-level options and the subcommand they select.

use crate::common::{PROJECT_AUTHOR, PROJECT_DESC, PROJECT_NAME, PROJECT_VERSION};
use crate::subcommands::Subcommand;
use structopt::StructOpt;

/// Parsed arguments of one tdf-tool invocation. Custodian settings are per subcommand, so only
/// the subcommand itself lives here.
#[derive(Debug, StructOpt)]
#[structopt(name=PROJECT_NAME, about=PROJECT_DESC, author=PROJECT_AUTHOR, version=PROJECT_VERSION)]
pub struct TdfToolApp {
    /// What to do with an asset or artifact: protect, status, inspect, pubkey or decrypt
    #[structopt(subcommand)]
    pub subcommand: Subcommand,
}
