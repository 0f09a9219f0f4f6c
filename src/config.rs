//! Encoder configuration
//!
//! `StreamOptions` carries everything the encoder needs besides the entry list:
//! the default compression method and level, the read chunk size, whether the
//! zip64 extension may be used, and the per-name method overrides.

use crate::compress::CompressionMethod;
use crate::error::{Result, ZipStreamError};

/// Default number of bytes read from an entry's source per step
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Suffix-based compression method overrides
///
/// Rules are checked in insertion order and the first matching suffix wins.
/// The default policy encodes nested `.zip` archives with DEFLATE whatever
/// the encoder's default method is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPolicy {
    rules: Vec<(String, CompressionMethod)>,
}

impl Default for MethodPolicy {
    fn default() -> Self {
        Self {
            rules: vec![(".zip".to_string(), CompressionMethod::Deflate)],
        }
    }
}

impl MethodPolicy {
    /// A policy with no overrides: every entry uses the default method
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add an override for names ending in `suffix` (case-sensitive)
    pub fn with_rule(mut self, suffix: impl Into<String>, method: CompressionMethod) -> Self {
        self.rules.push((suffix.into(), method));
        self
    }

    /// Pick the method for `name`, falling back to `default`
    pub fn select(&self, name: &str, default: CompressionMethod) -> CompressionMethod {
        self.rules
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix.as_str()))
            .map(|(_, method)| *method)
            .unwrap_or(default)
    }
}

/// Configuration for a [`ZipStream`](crate::ZipStream)
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Method used for entries no policy rule matches (default: Stored)
    pub compression_method: CompressionMethod,
    /// Compression level (0-9 for DEFLATE, 1-21 for Zstd; default: 6)
    pub compression_level: u32,
    /// Bytes read from a source per step (default: 8 KiB; a stream refuses to start with 0)
    pub chunk_size: usize,
    /// Allow the zip64 extension for large entries and archives (default: true)
    pub allow_zip64: bool,
    /// Name-based method overrides
    pub method_policy: MethodPolicy,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            compression_method: CompressionMethod::Stored,
            compression_level: 6,
            chunk_size: DEFAULT_CHUNK_SIZE,
            allow_zip64: true,
            method_policy: MethodPolicy::default(),
        }
    }
}

impl StreamOptions {
    /// Options using `method` as the default method
    pub fn new(method: CompressionMethod) -> Self {
        Self {
            compression_method: method,
            ..Self::default()
        }
    }

    /// DEFLATE everything at the default level
    pub fn deflated() -> Self {
        Self::new(CompressionMethod::Deflate)
    }

    /// Set compression level
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set read chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        self.chunk_size = chunk_size;
        self
    }

    /// Enable or disable the zip64 extension
    pub fn with_zip64(mut self, allow: bool) -> Self {
        self.allow_zip64 = allow;
        self
    }

    /// Replace the name-based method policy
    pub fn with_method_policy(mut self, policy: MethodPolicy) -> Self {
        self.method_policy = policy;
        self
    }

    /// Check the options before any byte is produced
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ZipStreamError::InvalidOptions(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Method an entry named `name` will be encoded with
    pub fn method_for(&self, name: &str) -> CompressionMethod {
        self.method_policy.select(name, self.compression_method)
    }
}
