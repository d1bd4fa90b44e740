// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! The tdf crate contains the content protection core: it turns a plaintext recording into a
//! self-describing protected artifact (`.tdf`), whose content key is wrapped for a remote Key
//! Access Service (KAS) so that a license server can later release it for playback.
//!
//! The pipeline is envelope encryption. A fresh AES-128 key encrypts the payload in CBC mode, the
//! key is wrapped with RSA-OAEP under the custodian's public key, and a canonical JSON manifest
//! describing how to recover it is packed next to the ciphertext in an uncompressed ZIP container.

pub mod cipher;
pub mod keys;
pub mod package;
pub mod protect;

pub use protect::{ProtectionOrchestrator, ProtectionStatus};
