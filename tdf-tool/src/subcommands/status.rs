// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Reports whether a media asset has been protected.

use crate::error::{Result, ToolErrorKind};

use tdf::protect::status::check_status;
use tdf::ProtectionStatus;

use chrono::SecondsFormat;
use structopt::StructOpt;

use std::path::PathBuf;

/// Models the options required by the status command.
#[derive(Debug, StructOpt)]
pub struct Status {
    /// The source asset, not the artifact.
    #[structopt(short = "i", long = "input", parse(from_os_str))]
    input: PathBuf,
}

impl Status {
    /// Prints `protected` with the artifact location and protection time, or `unprotected`. A
    /// status that cannot be determined fails the command, so that scripts never mistake it for
    /// either answer.
    pub fn run(&self) -> Result<()> {
        match check_status(&self.input) {
            ProtectionStatus::Protected {
                location,
                protected_at,
            } => {
                println!(
                    "protected {} {}",
                    protected_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    location.display()
                );
                Ok(())
            }
            ProtectionStatus::Unprotected => {
                println!("unprotected");
                Ok(())
            }
            ProtectionStatus::Unknown { reason } => Err(ToolErrorKind::StatusUnknown(reason).into()),
        }
    }
}
