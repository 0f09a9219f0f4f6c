//! Per-entry compressors and the running CRC/size counter
//!
//! A compressor accepts raw chunks and hands back whatever compressed bytes it
//! has produced so far, so the encoder can emit them before the next input
//! chunk is read. Nothing here buffers a whole entry.

use crate::error::{Result, ZipStreamError};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

/// Compression method to use for ZIP entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// DEFLATE compression (most common)
    Deflate,
    /// Zstd compression (requires zstd-support feature)
    #[cfg(feature = "zstd-support")]
    Zstd,
}

impl CompressionMethod {
    /// Method code written into the ZIP headers
    pub fn to_zip_method(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            #[cfg(feature = "zstd-support")]
            CompressionMethod::Zstd => 93,
        }
    }

    /// Look up a method by its ZIP code
    pub fn from_zip_method(code: u16) -> Result<Self> {
        match code {
            0 => Ok(CompressionMethod::Stored),
            8 => Ok(CompressionMethod::Deflate),
            #[cfg(feature = "zstd-support")]
            93 => Ok(CompressionMethod::Zstd),
            other => Err(ZipStreamError::UnsupportedCompression(other)),
        }
    }

    /// Minimum "version needed to extract" for this method
    pub(crate) fn version_needed(self) -> u16 {
        match self {
            CompressionMethod::Stored | CompressionMethod::Deflate => 20,
            #[cfg(feature = "zstd-support")]
            CompressionMethod::Zstd => 63,
        }
    }

    /// Build a fresh compressor for one entry
    pub(crate) fn compressor(self, level: u32) -> Result<Box<dyn Compressor>> {
        let compressor: Box<dyn Compressor> = match self {
            CompressionMethod::Stored => Box::new(StoredCompressor),
            CompressionMethod::Deflate => Box::new(DeflateCompressor {
                encoder: DeflateEncoder::new(CompressedBuffer::new(), Compression::new(level)),
            }),
            #[cfg(feature = "zstd-support")]
            CompressionMethod::Zstd => {
                let mut encoder = zstd::Encoder::new(CompressedBuffer::new(), level as i32)?;
                encoder.include_checksum(false)?; // ZIP uses CRC32, not zstd checksum
                Box::new(ZstdCompressor { encoder })
            }
        };
        Ok(compressor)
    }
}

/// Incremental compressor for a single entry
pub(crate) trait Compressor: Send {
    /// Feed raw bytes and return the compressed bytes produced so far (possibly none)
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>>;
    /// Flush the compressor and return everything it still holds
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

struct StoredCompressor;

impl Compressor for StoredCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

struct DeflateCompressor {
    encoder: DeflateEncoder<CompressedBuffer>,
}

impl Compressor for DeflateCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.encoder.write_all(data)?;
        Ok(self.encoder.get_mut().take())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        let mut buffer = self.encoder.finish()?;
        Ok(buffer.take())
    }
}

#[cfg(feature = "zstd-support")]
struct ZstdCompressor {
    encoder: zstd::Encoder<'static, CompressedBuffer>,
}

#[cfg(feature = "zstd-support")]
impl Compressor for ZstdCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.encoder.write_all(data)?;
        Ok(self.encoder.get_mut().take())
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>> {
        let mut buffer = self.encoder.finish()?;
        Ok(buffer.take())
    }
}

/// In-memory sink the encoders write into; drained after every input chunk
struct CompressedBuffer {
    buffer: Vec<u8>,
}

impl CompressedBuffer {
    fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(8 * 1024),
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

impl Write for CompressedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Metadata tracker for CRC and byte counts
pub(crate) struct CrcCounter {
    crc: Crc32,
    pub(crate) uncompressed_count: u64,
    pub(crate) compressed_count: u64,
}

impl CrcCounter {
    pub(crate) fn new() -> Self {
        Self {
            crc: Crc32::new(),
            uncompressed_count: 0,
            compressed_count: 0,
        }
    }

    pub(crate) fn update_uncompressed(&mut self, data: &[u8]) {
        self.crc.update(data);
        self.uncompressed_count += data.len() as u64;
    }

    pub(crate) fn add_compressed(&mut self, count: u64) {
        self.compressed_count += count;
    }

    pub(crate) fn finalize(&self) -> u32 {
        self.crc.clone().finalize()
    }
}
