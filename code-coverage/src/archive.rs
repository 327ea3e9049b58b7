// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::DecodeError;

pub const DEFAULT_LEVEL: i32 = 3;

/// Streaming zstd + JSON codec.
///
/// Payloads are never materialized uncompressed in memory: JSON is written
/// straight into the encoder and parsed straight out of the decoder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArchiveCodec {
    level: i32,
    threads: u32,
}

impl Default for ArchiveCodec {
    fn default() -> Self {
        Self::new(num_cpus::get() as u32)
    }
}

impl ArchiveCodec {
    pub fn new(threads: u32) -> Self {
        Self {
            level: DEFAULT_LEVEL,
            threads,
        }
    }

    pub fn threads(&self) -> u32 {
        self.threads
    }

    pub fn decompress<T, R>(&self, reader: R) -> Result<T, DecodeError>
    where
        T: DeserializeOwned,
        R: Read,
    {
        let decoder = zstd::stream::read::Decoder::new(reader).map_err(DecodeError::Compression)?;
        let value = serde_json::from_reader(BufReader::new(decoder))?;

        Ok(value)
    }

    pub fn compress<T, W>(&self, value: &T, writer: W) -> Result<W>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        let mut encoder = self.encoder(writer)?;
        serde_json::to_writer(&mut encoder, value).context("serializing archive payload")?;
        let writer = encoder.finish().context("finishing zstd stream")?;

        Ok(writer)
    }

    pub fn compress_json<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        self.compress(value, Vec::new())
    }

    /// Compress an opaque payload, such as a covdir report produced upstream.
    pub fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = self.encoder(Vec::new())?;
        encoder.write_all(data).context("compressing payload")?;
        let archive = encoder.finish().context("finishing zstd stream")?;

        Ok(archive)
    }

    pub fn load<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("unable to open archive: {}", path.display()))?;
        let value = self
            .decompress(BufReader::new(file))
            .with_context(|| format!("unable to decode archive: {}", path.display()))?;

        Ok(value)
    }

    pub fn save<T>(&self, path: impl AsRef<Path>, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("unable to create archive: {}", path.display()))?;
        let mut writer = self.compress(value, BufWriter::new(file))?;
        writer
            .flush()
            .with_context(|| format!("unable to write archive: {}", path.display()))?;

        Ok(())
    }

    fn encoder<W: Write>(&self, writer: W) -> Result<zstd::stream::write::Encoder<'static, W>> {
        let mut encoder = zstd::stream::write::Encoder::new(writer, self.level)
            .context("creating zstd encoder")?;

        if self.threads > 1 {
            encoder
                .multithread(self.threads)
                .context("enabling zstd worker threads")?;
        }

        Ok(encoder)
    }
}
