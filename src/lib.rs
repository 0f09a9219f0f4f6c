//! # s-zipstream: Incremental ZIP Production
//!
//! `s-zipstream` produces a ZIP archive as a lazy sequence of byte chunks. The
//! first bytes are available as soon as the first entry's header is built,
//! memory stays bounded by the read chunk size, and the total archive size
//! never has to be known up front. That makes it a good fit for serving
//! dynamically assembled downloads straight into an HTTP response.
//!
//! ## Features
//!
//! - **Pull-based**: `ZipStream` is an `Iterator` of chunks; nothing is read until asked for
//! - **Deferred sizes**: CRC and sizes trail each entry in a data descriptor
//! - **Size bound**: `estimate_max_size()` predicts an upper bound without reading any entry
//! - **Skips, not failures**: entries without a name or a stream are left out
//! - **Zip64**: large entries and archives switch to the zip64 extension
//! - **Async**: optional channel-backed `futures` stream (feature `async`)
//!
//! ## Quick Start
//!
//! ```no_run
//! use s_zipstream::{CompressionMethod, EntrySource, ZipStream};
//! use std::io::Cursor;
//!
//! let entries = vec![
//!     EntrySource::path("report.csv", "/var/data/report.csv"),
//!     EntrySource::stream("notes.txt", Cursor::new(b"generated on the fly".to_vec())),
//! ];
//!
//! let mut stream = ZipStream::new(entries, CompressionMethod::Deflate);
//! println!("at most {} bytes", stream.estimate_max_size()?);
//!
//! for chunk in stream {
//!     let bytes = chunk?;
//!     // hand `bytes` to the consumer
//!     drop(bytes);
//! }
//! # Ok::<(), s_zipstream::ZipStreamError>(())
//! ```
//!
//! ### Custom options
//!
//! ```no_run
//! use s_zipstream::{CompressionMethod, EntrySource, MethodPolicy, StreamOptions, ZipStream};
//!
//! let options = StreamOptions::deflated()
//!     .with_compression_level(9)
//!     .with_chunk_size(64 * 1024)
//!     .with_method_policy(MethodPolicy::default().with_rule(".jpg", CompressionMethod::Stored));
//!
//! let stream = ZipStream::with_options(vec![EntrySource::path("a.jpg", "a.jpg")], options);
//! let file = std::fs::File::create("bundle.zip")?;
//! stream.write_to(file)?;
//! # Ok::<(), s_zipstream::ZipStreamError>(())
//! ```

pub mod compress;
pub mod config;
pub mod error;
pub mod estimate;
pub mod logging;
pub mod record;
pub mod source;
pub mod stream;

#[cfg(feature = "async")]
pub mod async_stream;

pub use compress::CompressionMethod;
pub use config::{MethodPolicy, StreamOptions, DEFAULT_CHUNK_SIZE};
pub use error::{Result, ZipStreamError};
pub use estimate::estimate_max_size;
pub use logging::StreamLogger;
pub use record::EntryRecord;
pub use source::{EntrySource, OpenedEntry, ReadSeek};
pub use stream::{StreamPhase, ZipStream};

#[cfg(feature = "async")]
pub use async_stream::AsyncZipStream;
