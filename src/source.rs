//! Entry sources: the logical files that make up an archive
//!
//! An [`EntrySource`] names an entry inside the archive (its arcname), knows
//! how to open the bytes behind it, and can report a length for size
//! estimation without consuming anything. A source without an arcname, or one
//! whose stream cannot be opened, is skipped by the encoder.

use chrono::{Local, NaiveDateTime};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::SystemTime;

/// Unix mode recorded for entries that do not come from the filesystem
pub const DEFAULT_UNIX_MODE: u32 = 0o100644;

/// Seekable byte stream usable as an entry body
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// One logical file to include in the archive
pub enum EntrySource {
    /// A file on disk, opened lazily when the encoder reaches it
    Path {
        arcname: Option<String>,
        path: PathBuf,
    },
    /// A seekable stream; its length is probed by seeking to the end
    Stream {
        arcname: Option<String>,
        reader: Option<Box<dyn ReadSeek>>,
    },
    /// A forward-only stream with a caller-declared length
    Reader {
        arcname: Option<String>,
        reader: Option<Box<dyn Read + Send>>,
        length: u64,
    },
}

/// An opened source, ready to be drained
pub struct OpenedEntry {
    pub reader: Box<dyn Read + Send>,
    pub unix_mode: u32,
    pub modified: NaiveDateTime,
}

impl EntrySource {
    /// File on disk stored under `arcname`
    pub fn path(arcname: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        EntrySource::Path {
            arcname: Some(arcname.into()),
            path: path.into(),
        }
    }

    /// Seekable stream stored under `arcname`
    pub fn stream<R: Read + Seek + Send + 'static>(arcname: impl Into<String>, reader: R) -> Self {
        EntrySource::Stream {
            arcname: Some(arcname.into()),
            reader: Some(Box::new(reader)),
        }
    }

    /// Forward-only stream stored under `arcname`, declared to hold `length` bytes
    pub fn reader<R: Read + Send + 'static>(
        arcname: impl Into<String>,
        reader: R,
        length: u64,
    ) -> Self {
        EntrySource::Reader {
            arcname: Some(arcname.into()),
            reader: Some(Box::new(reader)),
            length,
        }
    }

    /// Arcname, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            EntrySource::Path { arcname, .. }
            | EntrySource::Stream { arcname, .. }
            | EntrySource::Reader { arcname, .. } => arcname.as_deref(),
        }
    }

    /// Whether a stream can still be obtained from this source
    ///
    /// Path sources always report true; the open itself may still fail.
    pub fn has_stream(&self) -> bool {
        match self {
            EntrySource::Path { .. } => true,
            EntrySource::Stream { reader, .. } => reader.is_some(),
            EntrySource::Reader { reader, .. } => reader.is_some(),
        }
    }

    /// Total byte count of the content, leaving any stream position untouched
    pub fn length(&mut self) -> io::Result<u64> {
        match self {
            EntrySource::Path { path, .. } => Ok(std::fs::metadata(path)?.len()),
            EntrySource::Stream { reader, .. } => match reader {
                Some(reader) => {
                    let position = reader.stream_position()?;
                    let end = reader.seek(SeekFrom::End(0))?;
                    reader.seek(SeekFrom::Start(position))?;
                    Ok(end)
                }
                None => Ok(0),
            },
            EntrySource::Reader { reader, length, .. } => {
                Ok(if reader.is_some() { *length } else { 0 })
            }
        }
    }

    /// Open the content for reading
    ///
    /// `Ok(None)` means there is nothing to read and the entry is skipped.
    /// Stream-backed sources hand out their stream once.
    pub fn open(&mut self) -> io::Result<Option<OpenedEntry>> {
        match self {
            EntrySource::Path { path, .. } => {
                let file = File::open(&*path)?;
                let metadata = file.metadata()?;
                if !metadata.is_file() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{} is not a regular file", path.display()),
                    ));
                }
                let modified = metadata
                    .modified()
                    .map(local_time)
                    .unwrap_or_else(|_| Local::now().naive_local());
                Ok(Some(OpenedEntry {
                    reader: Box::new(file),
                    unix_mode: file_mode(&metadata),
                    modified,
                }))
            }
            EntrySource::Stream { reader, .. } => Ok(reader.take().map(|reader| OpenedEntry {
                reader: Box::new(reader) as Box<dyn Read + Send>,
                unix_mode: DEFAULT_UNIX_MODE,
                modified: Local::now().naive_local(),
            })),
            EntrySource::Reader { reader, .. } => Ok(reader.take().map(|reader| OpenedEntry {
                reader,
                unix_mode: DEFAULT_UNIX_MODE,
                modified: Local::now().naive_local(),
            })),
        }
    }
}

impl std::fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntrySource::Path { arcname, path } => f
                .debug_struct("Path")
                .field("arcname", arcname)
                .field("path", path)
                .finish(),
            EntrySource::Stream { arcname, reader } => f
                .debug_struct("Stream")
                .field("arcname", arcname)
                .field("open", &reader.is_some())
                .finish(),
            EntrySource::Reader {
                arcname,
                reader,
                length,
            } => f
                .debug_struct("Reader")
                .field("arcname", arcname)
                .field("open", &reader.is_some())
                .field("length", length)
                .finish(),
        }
    }
}

fn local_time(time: SystemTime) -> NaiveDateTime {
    chrono::DateTime::<Local>::from(time).naive_local()
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o100444
    } else {
        DEFAULT_UNIX_MODE
    }
}
