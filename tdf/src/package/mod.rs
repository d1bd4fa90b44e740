// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements the protected artifact format.
//!
//! A protected artifact is an uncompressed ZIP archive with exactly two entries, in this order:
//!
//! - `manifest.json`: a JSON document describing how to recover the content encryption key from
//!   the custodian, and how to decrypt the payload.
//! - `0.payload`: the AES-128-CBC ciphertext of the source asset.
//!
//! For a source asset at path `P`, the artifact lives beside it at `P.tdf`. Writers, status checks
//! and readers all rely on this one layout; see [layout].

pub mod archive;
pub mod error;
pub mod layout;
pub mod manifest;

/// Convenient result alias for this module.
pub type Result<T> = std::result::Result<T, error::Error>;
