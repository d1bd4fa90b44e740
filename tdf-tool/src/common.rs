// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Common constants.

/// Name of the tool, taken from the crate.
pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

pub const PROJECT_DESC: &str = "Protects media assets as TDF artifacts bound to a Key Access Service";

pub const PROJECT_AUTHOR: &str = "Contributors to the Confidential Packaging project";

pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the Key Access Service base URL.
pub const KAS_URL_ENV: &str = "TDF_KAS_URL";

/// Environment variable naming a JSON protection configuration file.
pub const CONFIG_FILE_ENV: &str = "TDF_CONFIG";
