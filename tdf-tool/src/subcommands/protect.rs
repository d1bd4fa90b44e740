// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Protects a media asset: encrypts it under a fresh content key, wraps the key for the Key Access
//! Service, and writes the TDF artifact beside the asset.

use crate::error::Result;
use crate::util::{load_protection_config, runtime};

use tdf::ProtectionOrchestrator;

use log::info;
use structopt::StructOpt;

use std::path::PathBuf;

/// Models the options required by the protect command.
#[derive(Debug, StructOpt)]
pub struct Protect {
    /// The asset to protect. The artifact is written beside it, with a `.tdf` suffix.
    #[structopt(short = "i", long = "input", parse(from_os_str))]
    input: PathBuf,

    /// Identifier recorded in the manifest. Defaults to the file name of the asset.
    #[structopt(short = "a", long = "asset-id")]
    asset_id: Option<String>,

    /// Base URL of the Key Access Service. Falls back to the TDF_KAS_URL environment variable.
    #[structopt(short = "k", long = "kas-url")]
    kas_url: Option<String>,

    /// JSON protection configuration file. Falls back to the TDF_CONFIG environment variable.
    #[structopt(short = "c", long = "config")]
    config: Option<String>,
}

impl Protect {
    /// Runs one protect operation to completion and prints the artifact location.
    pub fn run(&self) -> Result<()> {
        let config = load_protection_config(&self.kas_url, &self.config)?;
        let orchestrator = ProtectionOrchestrator::from_config(&config)?;
        let asset_id = match &self.asset_id {
            Some(id) => id.clone(),
            None => asset_id_from_path(&self.input),
        };

        info!(
            "Protecting {} as {} for {}",
            self.input.display(),
            asset_id,
            config.custodian_url
        );
        let receipt = runtime()?.block_on(orchestrator.protect_file(&self.input, &asset_id))?;
        info!(
            "Protected at {} after {} key request(s)",
            receipt.manifest.meta.protected_at, receipt.fetch_attempts
        );

        println!("{}", receipt.artifact.display());
        Ok(())
    }
}

fn asset_id_from_path(path: &std::path::Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}
