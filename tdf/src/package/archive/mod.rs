// Copyright 2021 Contributors to the Confidential Packaging project.
// SPDX-License-Identifier: MIT

//! This module implements the container of a protected artifact: an uncompressed ZIP archive
//! holding the manifest entry followed by the payload entry.
//!
//! The payload is high-entropy ciphertext, so both entries are stored without compression. The
//! manifest can be read on its own without reading or verifying any payload bytes.

use crate::package::error::{Error, PackageErrorKind};
use crate::package::Result;

use log::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use std::io::{Cursor, Read, Seek, Write};

/// Name of the manifest entry. Always the first entry.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Name of the payload entry. Always the second entry.
pub const PAYLOAD_ENTRY: &str = "0.payload";

/// Writes and reads protected artifact containers.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveCodec;

impl ArchiveCodec {
    /// Packs the manifest and payload into a new archive in memory.
    pub fn write(&self, manifest: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(manifest.len() + payload.len() + 512);
        self.write_to(Cursor::new(&mut buffer), manifest, payload)?;
        Ok(buffer)
    }

    /// Packs the manifest and payload into the given seekable writer, which is returned once the
    /// archive has been finished.
    pub fn write_to<W: Write + Seek>(&self, writer: W, manifest: &[u8], payload: &[u8]) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        add_entry(&mut zip, MANIFEST_ENTRY, manifest)?;
        add_entry(&mut zip, PAYLOAD_ENTRY, payload)?;
        let writer = zip.finish().map_err(creation_error)?;
        debug!(
            "Packed archive with {} manifest bytes and {} payload bytes",
            manifest.len(),
            payload.len()
        );
        Ok(writer)
    }

    /// Extracts the manifest entry only. Payload bytes are never read.
    pub fn read_manifest<R: Read + Seek>(&self, reader: R) -> Result<Vec<u8>> {
        let mut archive = open(reader)?;
        read_entry(&mut archive, MANIFEST_ENTRY)
    }

    /// Extracts the payload entry. The entry checksum is verified as it is read.
    pub fn read_payload<R: Read + Seek>(&self, reader: R) -> Result<Vec<u8>> {
        let mut archive = open(reader)?;
        read_entry(&mut archive, PAYLOAD_ENTRY)
    }

    /// Extracts both entries, manifest first.
    pub fn read<R: Read + Seek>(&self, reader: R) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut archive = open(reader)?;
        let manifest = read_entry(&mut archive, MANIFEST_ENTRY)?;
        let payload = read_entry(&mut archive, PAYLOAD_ENTRY)?;
        Ok((manifest, payload))
    }
}

fn creation_error<E: std::fmt::Display>(e: E) -> Error {
    Error::PackageError(PackageErrorKind::ArchiveCreation(e.to_string()))
}

fn add_entry<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str, data: &[u8]) -> Result<()> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(data.len() as u64 >= u64::from(u32::MAX));
    zip.start_file(name, options).map_err(creation_error)?;
    zip.write_all(data).map_err(creation_error)?;
    Ok(())
}

/// Opens the archive and checks that it has exactly the two expected entries, in order.
fn open<R: Read + Seek>(reader: R) -> Result<ZipArchive<R>> {
    let mut archive = ZipArchive::new(reader)?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index_raw(i)?.name().to_string());
    }

    if !names.iter().any(|n| n == MANIFEST_ENTRY) {
        return Err(Error::PackageError(PackageErrorKind::ManifestEntryMissing));
    }
    if !names.iter().any(|n| n == PAYLOAD_ENTRY) {
        return Err(Error::PackageError(PackageErrorKind::PayloadEntryMissing));
    }
    if let Some(extra) = names
        .iter()
        .find(|n| n.as_str() != MANIFEST_ENTRY && n.as_str() != PAYLOAD_ENTRY)
    {
        return Err(Error::PackageError(PackageErrorKind::UnexpectedEntry(
            extra.clone(),
        )));
    }
    if names.len() != 2 || names[0] != MANIFEST_ENTRY {
        return Err(Error::PackageError(PackageErrorKind::InvalidArchive(
            String::from("the entries are duplicated or out of order"),
        )));
    }
    Ok(archive)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name)?;
    if entry.compression() != CompressionMethod::Stored {
        return Err(Error::PackageError(PackageErrorKind::InvalidArchive(format!(
            "the `{}` entry is compressed",
            name
        ))));
    }
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data).map_err(|e| {
        Error::PackageError(PackageErrorKind::InvalidArchive(format!(
            "the `{}` entry cannot be read: {}",
            name, e
        )))
    })?;
    Ok(data)
}
