//! Per-entry bookkeeping and the binary layout of every ZIP record we emit
//!
//! The local header and data descriptor bracket each entry's payload. The
//! central directory records and the end-of-archive records are built from
//! the finished [`EntryRecord`]s once every entry has been streamed.

use crate::compress::CompressionMethod;
use crate::error::{Result, ZipStreamError};
use chrono::{Datelike, NaiveDateTime, Timelike};

const LOCAL_FILE_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x06, 0x06];
const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x06, 0x07];
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

/// Size of an end-of-central-directory record without a comment
pub const END_OF_ARCHIVE_LEN: u64 = 22;

/// General purpose flag: CRC and sizes follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag: name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// Longest arcname the 16-bit name length field can describe
pub(crate) const MAX_NAME_LEN: usize = u16::MAX as usize;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const ZIP64_VERSION: u16 = 45;
/// "Version made by" host byte for Unix, so external attributes carry the mode
const HOST_UNIX: u16 = 3 << 8;

/// Bookkeeping for one entry
///
/// CRC and sizes stay zero until the entry's stream has been drained.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub name: String,
    pub header_offset: u64,
    pub compression_method: CompressionMethod,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub modified: NaiveDateTime,
    pub unix_mode: u32,
    /// Whether the local header committed to the zip64 extension
    pub zip64: bool,
}

impl EntryRecord {
    pub(crate) fn new(
        name: String,
        header_offset: u64,
        compression_method: CompressionMethod,
        modified: NaiveDateTime,
        unix_mode: u32,
        zip64: bool,
    ) -> Self {
        let mut flags = FLAG_DATA_DESCRIPTOR;
        if !name.is_ascii() {
            flags |= FLAG_UTF8;
        }
        Self {
            name,
            header_offset,
            compression_method,
            flags,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            modified,
            unix_mode,
            zip64,
        }
    }

    fn version_needed(&self) -> u16 {
        let version = self.compression_method.version_needed();
        if self.zip64 {
            version.max(ZIP64_VERSION)
        } else {
            version
        }
    }

    /// Local file header with deferred CRC and sizes
    pub(crate) fn local_header(&self) -> Vec<u8> {
        let (time, date) = dos_datetime(&self.modified);
        let extra_len: u16 = if self.zip64 { 20 } else { 0 };
        let size_placeholder = if self.zip64 { u32::MAX } else { 0 };

        let mut buf = Vec::with_capacity(30 + self.name.len() + extra_len as usize);
        buf.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE);
        buf.extend_from_slice(&self.version_needed().to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.compression_method.to_zip_method().to_le_bytes());
        buf.extend_from_slice(&time.to_le_bytes());
        buf.extend_from_slice(&date.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // crc32 placeholder
        buf.extend_from_slice(&size_placeholder.to_le_bytes()); // compressed size
        buf.extend_from_slice(&size_placeholder.to_le_bytes()); // uncompressed size
        buf.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&extra_len.to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());

        if self.zip64 {
            // Sizes are zero here and live in the 64-bit data descriptor
            buf.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
            buf.extend_from_slice(&16u16.to_le_bytes());
            buf.extend_from_slice(&0u64.to_le_bytes());
            buf.extend_from_slice(&0u64.to_le_bytes());
        }
        buf
    }

    /// Data descriptor carrying the final CRC and sizes
    ///
    /// Written without the optional signature: 12 bytes, or 20 with zip64 sizes.
    pub(crate) fn data_descriptor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(20);
        buf.extend_from_slice(&self.crc32.to_le_bytes());
        if self.zip64 {
            buf.extend_from_slice(&self.compressed_size.to_le_bytes());
            buf.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        } else {
            // The header is already out; a size that does not fit cannot be patched
            for size in [self.compressed_size, self.uncompressed_size] {
                if size > u32::MAX as u64 {
                    return Err(ZipStreamError::SizeOverflow {
                        name: self.name.clone(),
                        size,
                    });
                }
            }
            buf.extend_from_slice(&(self.compressed_size as u32).to_le_bytes());
            buf.extend_from_slice(&(self.uncompressed_size as u32).to_le_bytes());
        }
        Ok(buf)
    }

    /// Central directory record pointing back at the local header
    pub(crate) fn central_directory_record(&self) -> Vec<u8> {
        let (time, date) = dos_datetime(&self.modified);
        let version_needed = self.version_needed();

        // Prepare ZIP64 extra field if needed
        let mut extra_field: Vec<u8> = Vec::new();
        let mut data: Vec<u8> = Vec::new();
        // 0xFFFFFFFF itself is the zip64 marker, so it moves to the extra too
        if self.uncompressed_size >= u32::MAX as u64 {
            data.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        }
        if self.compressed_size >= u32::MAX as u64 {
            data.extend_from_slice(&self.compressed_size.to_le_bytes());
        }
        if self.header_offset >= u32::MAX as u64 {
            data.extend_from_slice(&self.header_offset.to_le_bytes());
        }
        if !data.is_empty() {
            extra_field.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
            extra_field.extend_from_slice(&(data.len() as u16).to_le_bytes());
            extra_field.extend_from_slice(&data);
        }
        let version_needed = if extra_field.is_empty() {
            version_needed
        } else {
            version_needed.max(ZIP64_VERSION)
        };

        let mut buf = Vec::with_capacity(46 + self.name.len() + extra_field.len());
        buf.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE);
        buf.extend_from_slice(&(HOST_UNIX | version_needed).to_le_bytes()); // version made by
        buf.extend_from_slice(&version_needed.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.compression_method.to_zip_method().to_le_bytes());
        buf.extend_from_slice(&time.to_le_bytes());
        buf.extend_from_slice(&date.to_le_bytes());
        buf.extend_from_slice(&self.crc32.to_le_bytes());
        buf.extend_from_slice(&clamp_u32(self.compressed_size).to_le_bytes());
        buf.extend_from_slice(&clamp_u32(self.uncompressed_size).to_le_bytes());
        buf.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(extra_field.len() as u16).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // file comment len
        buf.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        buf.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        buf.extend_from_slice(&((self.unix_mode & 0xFFFF) << 16).to_le_bytes()); // external attrs
        buf.extend_from_slice(&clamp_u32(self.header_offset).to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&extra_field);
        buf
    }
}

/// End-of-archive records for a directory of `entries` records occupying
/// `central_dir_size` bytes from `central_dir_offset`
///
/// The zip64 record and locator are prepended only when a classic field
/// overflows; without zip64 permission that is a fatal overflow.
pub(crate) fn end_of_archive(
    entries: u64,
    central_dir_size: u64,
    central_dir_offset: u64,
    allow_zip64: bool,
) -> Result<Vec<u8>> {
    let need_zip64 = entries >= u16::MAX as u64
        || central_dir_size >= u32::MAX as u64
        || central_dir_offset >= u32::MAX as u64;

    let mut buf = Vec::with_capacity(END_OF_ARCHIVE_LEN as usize + 76);

    if need_zip64 {
        if !allow_zip64 {
            let (name, size) = if entries >= u16::MAX as u64 {
                ("central directory entry count", entries)
            } else if central_dir_size >= u32::MAX as u64 {
                ("central directory size", central_dir_size)
            } else {
                ("central directory offset", central_dir_offset)
            };
            return Err(ZipStreamError::SizeOverflow {
                name: name.to_string(),
                size,
            });
        }

        // ZIP64 end of central directory record, written right after the directory
        buf.extend_from_slice(&ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        buf.extend_from_slice(&44u64.to_le_bytes()); // size of remaining fields
        buf.extend_from_slice(&(HOST_UNIX | ZIP64_VERSION).to_le_bytes());
        buf.extend_from_slice(&ZIP64_VERSION.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // disk number
        buf.extend_from_slice(&0u32.to_le_bytes()); // disk with central dir
        buf.extend_from_slice(&entries.to_le_bytes()); // entries on this disk
        buf.extend_from_slice(&entries.to_le_bytes()); // total entries
        buf.extend_from_slice(&central_dir_size.to_le_bytes());
        buf.extend_from_slice(&central_dir_offset.to_le_bytes());

        // ZIP64 EOCD locator
        let zip64_eocd_pos = central_dir_offset + central_dir_size;
        buf.extend_from_slice(&ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE);
        buf.extend_from_slice(&0u32.to_le_bytes()); // disk with ZIP64 EOCD
        buf.extend_from_slice(&zip64_eocd_pos.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes()); // total number of disks
    }

    let entry_count = if entries >= u16::MAX as u64 {
        u16::MAX
    } else {
        entries as u16
    };

    buf.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE);
    buf.extend_from_slice(&0u16.to_le_bytes()); // disk number
    buf.extend_from_slice(&0u16.to_le_bytes()); // disk with central dir
    buf.extend_from_slice(&entry_count.to_le_bytes()); // entries on this disk
    buf.extend_from_slice(&entry_count.to_le_bytes()); // total entries
    buf.extend_from_slice(&clamp_u32(central_dir_size).to_le_bytes());
    buf.extend_from_slice(&clamp_u32(central_dir_offset).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // comment len
    Ok(buf)
}

/// 32-bit field value, or the 0xFFFFFFFF marker pointing at the zip64 extra
fn clamp_u32(value: u64) -> u32 {
    if value >= u32::MAX as u64 {
        u32::MAX
    } else {
        value as u32
    }
}

/// Pack a timestamp into MS-DOS (time, date) fields
///
/// The format covers 1980 through 2107 with two-second resolution.
pub(crate) fn dos_datetime(datetime: &NaiveDateTime) -> (u16, u16) {
    if datetime.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    if datetime.year() > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }

    let time = ((datetime.hour() as u16) << 11)
        | ((datetime.minute() as u16) << 5)
        | ((datetime.second() as u16) / 2);
    let date = (((datetime.year() - 1980) as u16) << 9)
        | ((datetime.month() as u16) << 5)
        | (datetime.day() as u16);
    (time, date)
}
