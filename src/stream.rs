//! Incremental ZIP encoder
//!
//! [`ZipStream`] is a pull-based iterator of byte chunks. Each call to `next()`
//! does just enough work to produce one chunk: a local header, a piece of
//! compressed payload, an entry tail (last compressed bytes + data
//! descriptor), one central directory record, or the end-of-archive records.
//! Nothing is read from a source until the consumer asks for the bytes that
//! depend on it, and no entry is ever held in memory as a whole.
//!
//! Sizes are unknown when a local header goes out, so every entry sets the
//! data-descriptor flag and its CRC and sizes trail the payload.

use crate::compress::{CompressionMethod, Compressor, CrcCounter};
use crate::config::StreamOptions;
use crate::error::{Result, ZipStreamError};
use crate::estimate;
use crate::logging::{stream_log, StreamLogger};
use crate::record::{end_of_archive, EntryRecord, MAX_NAME_LEN};
use crate::source::EntrySource;
use log::{Level, Log};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::iter::FusedIterator;
use std::sync::Arc;

/// Declared lengths above this (after the safety margin) commit an entry to zip64
pub const ZIP64_LIMIT: u64 = (1 << 31) - 1;

/// Whether an entry of `length` declared bytes should use the zip64 extension
///
/// A compressed size is unknown until the entry is drained, so compressing
/// methods decide on the declared length scaled by 1.05. Stored entries are
/// exactly as long as their input and only need zip64 past `u32::MAX`.
pub fn needs_zip64(length: u64, method: CompressionMethod) -> bool {
    match method {
        CompressionMethod::Stored => length > u32::MAX as u64,
        _ => length.saturating_mul(21) / 20 > ZIP64_LIMIT,
    }
}

/// Externally visible lifecycle of a [`ZipStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No chunk requested yet
    Idle,
    /// Emitting entries
    StreamingEntry,
    /// Emitting the central directory and end records
    Finalizing,
    /// Done, failed, or abandoned; yields nothing more
    Closed,
}

enum Phase {
    Idle,
    Streaming(Option<ActiveEntry>),
    Finalizing { next: usize, central_dir_offset: u64 },
    Closed,
}

/// Entry whose header has been emitted and whose source is being drained
struct ActiveEntry {
    record: EntryRecord,
    reader: Box<dyn Read + Send>,
    compressor: Box<dyn Compressor>,
    counter: CrcCounter,
    buffer: Vec<u8>,
}

/// Lazily produced ZIP archive
///
/// ```
/// use s_zipstream::{CompressionMethod, EntrySource, ZipStream};
/// use std::io::Cursor;
///
/// let entries = vec![EntrySource::stream("namea", Cursor::new(b"contents".to_vec()))];
/// let mut stream = ZipStream::new(entries, CompressionMethod::Stored);
/// let bound = stream.estimate_max_size()?;
///
/// let mut archive = Vec::new();
/// for chunk in stream {
///     archive.extend_from_slice(&chunk?);
/// }
/// assert!(archive.len() as u64 <= bound);
/// # Ok::<(), s_zipstream::ZipStreamError>(())
/// ```
pub struct ZipStream {
    pending: VecDeque<EntrySource>,
    options: StreamOptions,
    logger: StreamLogger,
    /// Bytes handed to the consumer so far
    offset: u64,
    directory: Vec<EntryRecord>,
    phase: Phase,
}

impl ZipStream {
    /// Stream `entries` with `method` as the default compression method
    pub fn new<I>(entries: I, method: CompressionMethod) -> Self
    where
        I: IntoIterator<Item = EntrySource>,
    {
        Self::with_options(entries, StreamOptions::new(method))
    }

    /// Stream `entries` with explicit options
    pub fn with_options<I>(entries: I, options: StreamOptions) -> Self
    where
        I: IntoIterator<Item = EntrySource>,
    {
        Self {
            pending: entries.into_iter().collect(),
            options,
            logger: StreamLogger::global(),
            offset: 0,
            directory: Vec::new(),
            phase: Phase::Idle,
        }
    }

    /// Send this encoder's log records to `logger` instead of the global logger
    pub fn with_logger(mut self, logger: Arc<dyn Log>) -> Self {
        self.logger = StreamLogger::new(logger);
        self
    }

    /// Options this stream was built with
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Append an entry after the ones already queued
    ///
    /// Fails with [`ZipStreamError::ArchiveClosed`] once the central directory
    /// has started.
    pub fn push(&mut self, source: EntrySource) -> Result<()> {
        match self.phase {
            Phase::Idle | Phase::Streaming(_) => {
                self.pending.push_back(source);
                Ok(())
            }
            Phase::Finalizing { .. } | Phase::Closed => Err(ZipStreamError::ArchiveClosed),
        }
    }

    /// Upper bound on the bytes produced for the entries not yet started
    ///
    /// Before iteration this bounds the whole archive. No stream is opened
    /// or consumed. See [`estimate`](crate::estimate) for the assumptions.
    pub fn estimate_max_size(&mut self) -> Result<u64> {
        estimate::estimate_max_size(self.pending.iter_mut())
    }

    /// Bytes emitted so far
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Entries fully written so far
    pub fn entries_written(&self) -> usize {
        self.directory.len()
    }

    /// Records of the completed entries, in directory order
    pub fn directory(&self) -> &[EntryRecord] {
        &self.directory
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> StreamPhase {
        match self.phase {
            Phase::Idle => StreamPhase::Idle,
            Phase::Streaming(_) => StreamPhase::StreamingEntry,
            Phase::Finalizing { .. } => StreamPhase::Finalizing,
            Phase::Closed => StreamPhase::Closed,
        }
    }

    /// Drain the whole archive into `writer`, returning the number of bytes written
    pub fn write_to<W: Write>(self, mut writer: W) -> Result<u64> {
        let mut total = 0u64;
        for chunk in self {
            let chunk = chunk?;
            writer.write_all(&chunk)?;
            total += chunk.len() as u64;
        }
        writer.flush()?;
        Ok(total)
    }

    /// Produce the next chunk, or `None` once the archive is complete
    fn step(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match &mut self.phase {
                Phase::Idle => {
                    self.options.validate()?;
                    self.phase = Phase::Streaming(None);
                }
                Phase::Streaming(None) => match self.pending.pop_front() {
                    Some(source) => {
                        if let Some(entry) = self.begin_entry(source)? {
                            let header = entry.record.local_header();
                            self.phase = Phase::Streaming(Some(entry));
                            return Ok(Some(header));
                        }
                    }
                    None => {
                        stream_log!(
                            self.logger,
                            Level::Trace,
                            "writing central directory for {} entries at offset {}",
                            self.directory.len(),
                            self.offset
                        );
                        self.phase = Phase::Finalizing {
                            next: 0,
                            central_dir_offset: self.offset,
                        };
                    }
                },
                Phase::Streaming(Some(entry)) => {
                    if let Some(chunk) = Self::pump(entry)? {
                        return Ok(Some(chunk));
                    }
                    if let Phase::Streaming(Some(entry)) =
                        std::mem::replace(&mut self.phase, Phase::Streaming(None))
                    {
                        return self.finish_entry(entry).map(Some);
                    }
                }
                Phase::Finalizing {
                    next,
                    central_dir_offset,
                } => {
                    if let Some(record) = self.directory.get(*next) {
                        *next += 1;
                        return Ok(Some(record.central_directory_record()));
                    }
                    let central_dir_offset = *central_dir_offset;
                    let central_dir_size = self.offset - central_dir_offset;
                    let trailer = end_of_archive(
                        self.directory.len() as u64,
                        central_dir_size,
                        central_dir_offset,
                        self.options.allow_zip64,
                    )?;
                    self.phase = Phase::Closed;
                    stream_log!(
                        self.logger,
                        Level::Debug,
                        "archive complete: {} entries, {} bytes",
                        self.directory.len(),
                        self.offset + trailer.len() as u64
                    );
                    return Ok(Some(trailer));
                }
                Phase::Closed => return Ok(None),
            }
        }
    }

    /// Open a source and build its record; `Ok(None)` skips the entry
    fn begin_entry(&mut self, mut source: EntrySource) -> Result<Option<ActiveEntry>> {
        let name = match source.name() {
            Some(name) => name.to_string(),
            None => {
                stream_log!(self.logger, Level::Warn, "skipping entry without a name");
                return Ok(None);
            }
        };
        if name.len() > MAX_NAME_LEN {
            let err = ZipStreamError::InvalidName(format!("{} bytes long", name.len()));
            stream_log!(self.logger, Level::Warn, "skipping entry: {}", err);
            return Ok(None);
        }

        // Measured before open(): stream-backed sources give up their stream there
        let length = match source.length() {
            Ok(length) => length,
            Err(e) => {
                stream_log!(
                    self.logger,
                    Level::Debug,
                    "no length for {}: {}, assuming small",
                    name,
                    e
                );
                0
            }
        };

        let opened = match source.open() {
            Ok(Some(opened)) => opened,
            Ok(None) => {
                stream_log!(self.logger, Level::Warn, "skipping {}: no stream", name);
                return Ok(None);
            }
            Err(e) => {
                stream_log!(self.logger, Level::Warn, "skipping {}: {}", name, e);
                return Ok(None);
            }
        };

        if !self.options.allow_zip64 && length > u32::MAX as u64 {
            return Err(ZipStreamError::SizeOverflow { name, size: length });
        }

        let method = self.options.method_for(&name);
        let zip64 = self.options.allow_zip64 && needs_zip64(length, method);
        let compressor = match method.compressor(self.options.compression_level) {
            Ok(compressor) => compressor,
            Err(e) => {
                stream_log!(self.logger, Level::Warn, "skipping {}: {}", name, e);
                return Ok(None);
            }
        };

        stream_log!(
            self.logger,
            Level::Debug,
            "streaming {} ({:?}, zip64: {}) at offset {}",
            name,
            method,
            zip64,
            self.offset
        );

        let record = EntryRecord::new(
            name,
            self.offset,
            method,
            opened.modified,
            opened.unix_mode,
            zip64,
        );
        Ok(Some(ActiveEntry {
            record,
            reader: opened.reader,
            compressor,
            counter: CrcCounter::new(),
            buffer: vec![0u8; self.options.chunk_size],
        }))
    }

    /// Read until the compressor yields bytes; `None` once the source is exhausted
    fn pump(entry: &mut ActiveEntry) -> Result<Option<Vec<u8>>> {
        loop {
            let n = match entry.reader.read(&mut entry.buffer) {
                Ok(0) => return Ok(None),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            let data = &entry.buffer[..n];
            entry.counter.update_uncompressed(data);
            let compressed = entry.compressor.compress(data)?;
            entry.counter.add_compressed(compressed.len() as u64);

            if !entry.record.zip64 {
                let largest = entry
                    .counter
                    .uncompressed_count
                    .max(entry.counter.compressed_count);
                if largest > u32::MAX as u64 {
                    return Err(ZipStreamError::SizeOverflow {
                        name: entry.record.name.clone(),
                        size: largest,
                    });
                }
            }

            if !compressed.is_empty() {
                return Ok(Some(compressed));
            }
        }
    }

    /// Flush the compressor, emit the data descriptor and record the entry
    fn finish_entry(&mut self, entry: ActiveEntry) -> Result<Vec<u8>> {
        let ActiveEntry {
            mut record,
            reader,
            compressor,
            mut counter,
            ..
        } = entry;
        drop(reader);

        let mut tail = compressor.finish()?;
        counter.add_compressed(tail.len() as u64);

        record.crc32 = counter.finalize();
        record.compressed_size = counter.compressed_count;
        record.uncompressed_size = counter.uncompressed_count;
        tail.extend_from_slice(&record.data_descriptor()?);

        stream_log!(
            self.logger,
            Level::Debug,
            "finished {}: {} -> {} bytes, crc {:08x}",
            record.name,
            record.uncompressed_size,
            record.compressed_size,
            record.crc32
        );
        self.directory.push(record);
        Ok(tail)
    }

    /// Stop producing and release every source still held
    fn close(&mut self) {
        self.phase = Phase::Closed;
        self.pending.clear();
    }
}

impl Iterator for ZipStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(Some(chunk)) => {
                self.offset += chunk.len() as u64;
                Some(Ok(chunk))
            }
            Ok(None) => None,
            Err(e) => {
                stream_log!(
                    self.logger,
                    Level::Error,
                    "aborting archive after {} bytes: {}",
                    self.offset,
                    e
                );
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for ZipStream {}

impl Drop for ZipStream {
    fn drop(&mut self) {
        if !matches!(self.phase, Phase::Closed) {
            stream_log!(
                self.logger,
                Level::Debug,
                "archive abandoned after {} bytes, releasing {} pending sources",
                self.offset,
                self.pending.len()
            );
        }
    }
}

impl std::fmt::Debug for ZipStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipStream")
            .field("phase", &self.phase())
            .field("offset", &self.offset)
            .field("pending", &self.pending.len())
            .field("entries_written", &self.directory.len())
            .finish()
    }
}
