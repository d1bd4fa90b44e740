// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! General-purpose utilities used throughout the tdf-tool crate.

use crate::common::{CONFIG_FILE_ENV, KAS_URL_ENV};
use crate::error::{Error, Result, ToolErrorKind};
use tdf::keys::wrap::OaepDigest;
use tdf::protect::ProtectionConfig;

use log::debug;
use tokio::runtime::{Builder, Runtime};

/// Utility to get a string value either from a command-line option or a named environment variable.
pub fn get_config_from_command_or_env(
    config_option: &Option<String>,
    env_var_name: &str,
    purpose: &str,
) -> Result<String> {
    match config_option {
        Some(o) => Ok(o.clone()),
        // The option isn't on the command-line, so examine the environment variable instead
        None => match std::env::var(env_var_name) {
            Ok(value) => Ok(value),
            Err(_) => {
                // The option hasn't been specified on the command-line or in the environment variable.
                println!("No {} specified. Please specify on the command-line or by setting the `{}` environment variable.", purpose, env_var_name);
                Err(Error::ToolError(ToolErrorKind::MissingConfiguration))
            }
        },
    }
}

/// Resolves the protection configuration for a command.
///
/// A configuration file, given with `--config` or in `TDF_CONFIG`, is read first, and a KAS URL
/// given with `--kas-url` replaces the one it names. Without a file, the KAS URL alone is
/// required, from `--kas-url` or `TDF_KAS_URL`, and every other setting takes its default.
pub fn load_protection_config(
    kas_url: &Option<String>,
    config_file: &Option<String>,
) -> Result<ProtectionConfig> {
    let file = match config_file {
        Some(path) => Some(path.clone()),
        None => std::env::var(CONFIG_FILE_ENV).ok(),
    };

    let config = match file {
        Some(path) => {
            debug!("Reading protection configuration from {}", path);
            let mut config = ProtectionConfig::from_file_path(&path)?;
            if let Some(url) = kas_url {
                config.custodian_url = url.clone();
            }
            config
        }
        None => {
            let url = get_config_from_command_or_env(kas_url, KAS_URL_ENV, "KAS URL")?;
            ProtectionConfig::new(&url)
        }
    };

    config.validate()?;
    Ok(config)
}

/// Parses the name of an OAEP digest, as given on the command-line.
pub fn parse_oaep_digest(name: &str) -> Result<OaepDigest> {
    match name.to_ascii_lowercase().as_str() {
        "sha1" | "sha-1" => Ok(OaepDigest::Sha1),
        "sha256" | "sha-256" => Ok(OaepDigest::Sha256),
        _ => Err(Error::ToolError(ToolErrorKind::InvalidOaepDigest(
            String::from(name),
        ))),
    }
}

/// Builds the runtime that drives a command's asynchronous work to completion.
pub fn runtime() -> Result<Runtime> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    Ok(runtime)
}
