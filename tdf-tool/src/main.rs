// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Entry point of tdf-tool. Logging is set up before the command line is parsed, and a failed
//! command exits with status 1 after logging the error chain.

use log::error;
use structopt::StructOpt;
use tdf_tool::cli::TdfToolApp;

fn main() {
    let mut logger = env_logger::Builder::new();
    // Progress of a protect operation is logged at Info, key fetch retries at Warn.
    logger.filter_level(log::LevelFilter::Info);
    logger.format_timestamp(None);
    logger.format_module_path(false);

    // RUST_LOG=debug shows every protection state transition.
    logger.parse_default_env();
    logger.init();

    let app = TdfToolApp::from_args();

    if let Err(e) = app.subcommand.run() {
        error!("Command failed: {} ({:?})", e, e);
        std::process::exit(1);
    }
}
