// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! Fetches the public wrapping key of a Key Access Service and writes it to the console, so that
//! the custodian deployment can be checked before any asset is protected.

use crate::error::Result;
use crate::subcommands::fingerprint;
use crate::util::{load_protection_config, runtime};

use tdf::keys::http::KasKeyClient;
use tdf::keys::wrap::{parse_public_key_pem, MIN_MODULUS_BITS};

use log::{info, warn};
use rsa::pkcs8::EncodePublicKey;
use rsa::traits::PublicKeyParts;
use structopt::StructOpt;

/// Models the options required by the pubkey command.
#[derive(Debug, StructOpt)]
pub struct PubKey {
    /// Base URL of the Key Access Service. Falls back to the TDF_KAS_URL environment variable.
    #[structopt(short = "k", long = "kas-url")]
    kas_url: Option<String>,

    /// JSON protection configuration file. Falls back to the TDF_CONFIG environment variable.
    #[structopt(short = "c", long = "config")]
    config: Option<String>,
}

impl PubKey {
    /// Requests the custodian public key and writes the PEM text to standard output, exactly as
    /// the custodian served it. The key size and fingerprint go to the log.
    pub fn run(&self) -> Result<()> {
        let config = load_protection_config(&self.kas_url, &self.config)?;
        let client = KasKeyClient::new(config.kas.clone())?;
        let pem = runtime()?.block_on(client.fetch_public_key(&config.custodian_url))?;

        let public_key = parse_public_key_pem(&pem)?;
        let bits = public_key.size() * 8;
        match public_key.to_public_key_der() {
            Ok(der) => info!(
                "Custodian key is RSA-{} with SHA-256 fingerprint {}",
                bits,
                fingerprint(der.as_bytes())
            ),
            Err(_) => info!("Custodian key is RSA-{}", bits),
        }
        if bits < MIN_MODULUS_BITS {
            warn!(
                "The custodian key is shorter than {} bits, and will be refused for wrapping",
                MIN_MODULUS_BITS
            );
        }

        // Print just the key data with no additional verbosity.
        print!("{}", pem);
        if !pem.ends_with('\n') {
            println!();
        }

        Ok(())
    }
}
