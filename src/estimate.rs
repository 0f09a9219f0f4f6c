//! Upper bound on the produced archive size, computed before any entry is read
//!
//! Each written entry costs one local header (30), one central directory
//! record (46) and at most one data descriptor (12) of fixed overhead, plus
//! its arcname twice. The name term also counts one terminator byte per copy,
//! and the payload is counted at its declared length. The result only bounds
//! the output while every compressor stores or shrinks its input.

use crate::error::Result;
use crate::record::{END_OF_ARCHIVE_LEN, MAX_NAME_LEN};
use crate::source::EntrySource;

/// Fixed per-entry overhead: local header + central directory record + data descriptor
pub const ENTRY_OVERHEAD: u64 = 30 + 46 + 12;

/// Estimated cost of one entry, or `None` when the entry will be skipped
///
/// Entries the encoder is bound to skip cost nothing: no name or stream, a
/// name too long for the header, or a path that is not a readable regular
/// file. Seek failures on in-memory streams are reported.
pub fn entry_upper_bound(source: &mut EntrySource) -> Result<Option<u64>> {
    let name_len = match source.name() {
        Some(name) if source.has_stream() && name.len() <= MAX_NAME_LEN => name.len() as u64,
        _ => return Ok(None),
    };
    if let EntrySource::Path { path, .. } = source {
        match std::fs::metadata(&*path) {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Ok(None),
        }
    }
    let length = match source.length() {
        Ok(length) => length,
        Err(_) if matches!(source, EntrySource::Path { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(ENTRY_OVERHEAD + (name_len + 1) * 2 + length))
}

/// Upper bound on the bytes a stream over `entries` will produce
pub fn estimate_max_size<'a, I>(entries: I) -> Result<u64>
where
    I: IntoIterator<Item = &'a mut EntrySource>,
{
    let mut max_size = END_OF_ARCHIVE_LEN;
    for source in entries {
        if let Some(cost) = entry_upper_bound(source)? {
            max_size += cost;
        }
    }
    Ok(max_size)
}
