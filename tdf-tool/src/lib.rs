// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! tdf-tool: protects media assets for a Key Access Service, and inspects the results.

pub mod cli;
pub mod common;
pub mod error;
pub mod subcommands;
pub mod util;
