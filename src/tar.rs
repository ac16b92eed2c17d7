//! ustar header codec
//!
//! # Usage
//!
//! ## Encoding a header
//!
//! ```rust
//! use tar_backup::tar::{TarHeader, EntryKind, calc_checksum, parse_octal};
//!
//! let header = TarHeader::new("docs/readme.txt".to_string(), EntryKind::Regular, 0o644, 12);
//! let block = header.to_bytes().unwrap();
//!
//! assert_eq!(&block[257..263], b"ustar\0");
//! assert_eq!(block[156], b'0');
//! assert_eq!(parse_octal(&block[148..156]) as u32, calc_checksum(&block));
//! ```
//!
//! ## Decoding a header
//!
//! ```rust
//! use tar_backup::tar::{TarHeader, EntryKind};
//!
//! let path = format!("{}/{}", "d".repeat(60), "f".repeat(89)); // 150 bytes
//! let block = TarHeader::new(path.clone(), EntryKind::Regular, 0o600, 0).to_bytes().unwrap();
//!
//! // the first 50 bytes went to the prefix field
//! assert_eq!(&block[345..395], path[..50].as_bytes());
//!
//! let header = TarHeader::from_bytes(&block).unwrap();
//! assert_eq!(header.path, path);
//! assert_eq!(header.mode, 0o600);
//! ```

use std::ops::Range;

use crate::error::{Error, Result};
use crate::owner;
use crate::stat::{FileKind, FileStat};

/// Size of a header or data block.
pub const BLOCK_SIZE: usize = 512;

/// Two zero blocks mark the end of an archive.
pub const TRAILER_SIZE: usize = 2 * BLOCK_SIZE;

/// Longest relative path a header can hold (name + prefix).
pub const MAX_PATH_LEN: usize = NAME.end - NAME.start + PREFIX.end - PREFIX.start;

/// One 512-byte archive block.
pub type Block = [u8; BLOCK_SIZE];

const NAME: Range<usize> = 0..100;
const MODE: Range<usize> = 100..108;
const UID: Range<usize> = 108..116;
const GID: Range<usize> = 116..124;
const SIZE: Range<usize> = 124..136;
const MTIME: Range<usize> = 136..148;
const CHECKSUM: Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const MAGIC: Range<usize> = 257..263;
const VERSION: Range<usize> = 263..265;
const UNAME: Range<usize> = 265..297;
const GNAME: Range<usize> = 297..329;
const PREFIX: Range<usize> = 345..500;

/// Bytes covered by the checksum; the 12-byte tail after it is unused.
const HEADER_END: usize = 500;

const NAME_LEN: usize = NAME.end - NAME.start;

/// Type of an archived entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Directory,
}

impl EntryKind {
    pub fn typeflag(self) -> u8 {
        match self {
            EntryKind::Regular => b'0',
            EntryKind::Directory => b'5',
        }
    }

    /// Pre-POSIX archives use NUL for regular files.
    pub fn from_typeflag(flag: u8) -> Option<Self> {
        match flag {
            b'0' | 0 => Some(EntryKind::Regular),
            b'5' => Some(EntryKind::Directory),
            _ => None,
        }
    }
}

/// Decoded header of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    /// Full relative path (`prefix ++ name`).
    pub path: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub uname: String,
    pub gname: String,
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    checksum: u32,
}

impl TarHeader {
    /// Create a header with owner fields and mtime zeroed.
    pub fn new(path: String, kind: EntryKind, mode: u32, size: u64) -> Self {
        Self {
            path,
            kind,
            mode,
            uid: 0,
            gid: 0,
            uname: String::new(),
            gname: String::new(),
            size: if kind == EntryKind::Directory { 0 } else { size },
            mtime: 0,
            checksum: 0,
        }
    }

    /// Build the header for a walked filesystem entry.
    ///
    /// Anything other than a regular file or directory is rejected with
    /// [`Error::UnsupportedFileType`].
    pub fn from_stat(path: &str, stat: &FileStat) -> Result<Self> {
        let kind = match stat.kind {
            FileKind::Regular => EntryKind::Regular,
            FileKind::Directory => EntryKind::Directory,
            FileKind::Other => {
                return Err(Error::UnsupportedFileType { path: path.to_string() });
            }
        };
        let mut header = Self::new(path.to_string(), kind, stat.mode, stat.size);
        header.uid = stat.uid;
        header.gid = stat.gid;
        header.uname = owner::user_name(stat.uid).unwrap_or_default();
        header.gname = owner::group_name(stat.gid).unwrap_or_default();
        // octal fields cannot hold pre-epoch times
        header.mtime = u64::try_from(stat.mtime).unwrap_or(0);
        Ok(header)
    }

    /// Parse a header block. Offsets in errors are relative to this block.
    pub fn from_bytes(data: &Block) -> Result<Self> {
        parse_tar_header(data, 0)
    }

    /// Encode into a 512-byte block with a valid checksum.
    pub fn to_bytes(&self) -> Result<Block> {
        create_tar_header(self)
    }

    /// Checksum read from the block this header was parsed from (0 for new headers).
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Verify the checksum of the header
    /// Returns true if the checksum is valid
    pub fn verify_checksum(&self, data: &Block) -> bool {
        calc_checksum(data) == self.checksum
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// One header plus its file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub header: TarHeader,
    pub data: Vec<u8>,
}

/// Split a relative path into `(prefix, name)` field contents.
///
/// Paths of up to 100 bytes go entirely into the name field. Longer paths
/// keep their last 100 bytes in the name field and the rest in the prefix.
pub fn split_path(path: &str) -> Result<(&[u8], &[u8])> {
    let bytes = path.as_bytes();
    if bytes.len() > MAX_PATH_LEN {
        return Err(Error::PathTooLong {
            path: path.to_string(),
            len: bytes.len(),
        });
    }
    let prefix_len = bytes.len().saturating_sub(NAME_LEN);
    Ok(bytes.split_at(prefix_len))
}

/// Rejoin the prefix and name fields. No separator is inserted.
///
/// Returns `None` when the joined bytes are not UTF-8. The split may fall
/// inside a multibyte character, so only the whole path is checked.
pub fn join_path(prefix: &[u8], name: &[u8]) -> Option<String> {
    let mut full = Vec::with_capacity(prefix.len() + name.len());
    full.extend_from_slice(prefix);
    full.extend_from_slice(name);
    String::from_utf8(full).ok()
}

/// Read octal digits from the start of `field`, stopping at the first
/// non-octal byte (space, NUL, ...).
pub fn parse_octal(field: &[u8]) -> u64 {
    field
        .iter()
        .take_while(|&&b| (b'0'..=b'7').contains(&b))
        .fold(0u64, |value, &b| value.saturating_mul(8).saturating_add(u64::from(b - b'0')))
}

/// Zero bytes needed after `size` bytes of data to reach a block boundary.
pub fn padding_for(size: u64) -> u64 {
    let rem = size % BLOCK_SIZE as u64;
    if rem == 0 { 0 } else { BLOCK_SIZE as u64 - rem }
}

/// Check if a block is empty (all zeros)
pub fn is_empty_block(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}

/// Calc checksum of the header bytes.
///
/// Sums the 500 bytes before the unused tail, reading the checksum field as
/// eight spaces.
pub fn calc_checksum(data: &[u8]) -> u32 {
    data.iter()
        .take(HEADER_END)
        .enumerate()
        .map(|(i, &b)| if CHECKSUM.contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum()
}

/// Bytes of a NUL-padded field up to the first NUL.
fn read_tar_bytes(data: &[u8], range: Range<usize>) -> &[u8] {
    let field = &data[range];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

fn read_tar_str(data: &[u8], range: Range<usize>) -> String {
    String::from_utf8_lossy(read_tar_bytes(data, range)).into_owned()
}

fn read_tar_u32(data: &[u8], range: Range<usize>, field: &'static str) -> Result<u32> {
    let value = parse_octal(&data[range]);
    u32::try_from(value).map_err(|_| Error::FieldOverflow { field, value })
}

fn parse_tar_header(data: &Block, offset: u64) -> Result<TarHeader> {
    let stored = parse_octal(&data[CHECKSUM]) as u32;
    let computed = calc_checksum(data);
    if stored != computed {
        return Err(Error::ChecksumMismatch { offset, stored, computed });
    }

    let (prefix, name) = (read_tar_bytes(data, PREFIX), read_tar_bytes(data, NAME));
    let path = join_path(prefix, name).ok_or_else(|| Error::CorruptArchive {
        offset,
        reason: format!(
            "path {:?} is not valid UTF-8",
            String::from_utf8_lossy(&[prefix, name].concat())
        ),
    })?;
    let kind = EntryKind::from_typeflag(data[TYPEFLAG])
        .ok_or_else(|| Error::UnsupportedFileType { path: path.clone() })?;
    let size = match kind {
        EntryKind::Regular => parse_octal(&data[SIZE]),
        EntryKind::Directory => 0,
    };

    Ok(TarHeader {
        path,
        kind,
        mode: read_tar_u32(data, MODE, "mode")?,
        uid: read_tar_u32(data, UID, "uid")?,
        gid: read_tar_u32(data, GID, "gid")?,
        uname: read_tar_str(data, UNAME),
        gname: read_tar_str(data, GNAME),
        size,
        mtime: parse_octal(&data[MTIME]),
        checksum: stored,
    })
}

/// Zero-padded octal digits filling all but the last byte, then a space.
fn write_tar_octal(data: &mut Block, range: Range<usize>, value: u64, field: &'static str) -> Result<()> {
    let digits = range.len() - 1;
    let text = format!("{:0width$o} ", value, width = digits);
    if text.len() != range.len() {
        return Err(Error::FieldOverflow { field, value });
    }
    data[range].copy_from_slice(text.as_bytes());
    Ok(())
}

/// Copy into a NUL-padded field, truncating to its width.
fn write_tar_bytes(data: &mut Block, range: Range<usize>, bytes: &[u8]) {
    let len = bytes.len().min(range.len());
    data[range.start..range.start + len].copy_from_slice(&bytes[..len]);
}

fn create_tar_header(header: &TarHeader) -> Result<Block> {
    let mut data = [0u8; BLOCK_SIZE];

    let (prefix, name) = split_path(&header.path)?;
    write_tar_bytes(&mut data, NAME, name);
    write_tar_bytes(&mut data, PREFIX, prefix);

    write_tar_octal(&mut data, MODE, u64::from(header.mode & 0o7777), "mode")?;
    write_tar_octal(&mut data, UID, u64::from(header.uid), "uid")?;
    write_tar_octal(&mut data, GID, u64::from(header.gid), "gid")?;
    let size = if header.is_dir() { 0 } else { header.size };
    write_tar_octal(&mut data, SIZE, size, "size")?;
    write_tar_octal(&mut data, MTIME, header.mtime, "mtime")?;

    data[TYPEFLAG] = header.kind.typeflag();
    data[MAGIC].copy_from_slice(b"ustar\0");
    data[VERSION].copy_from_slice(b"00");
    write_tar_bytes(&mut data, UNAME, header.uname.as_bytes());
    write_tar_bytes(&mut data, GNAME, header.gname.as_bytes());

    // checksum goes in last, over a block whose checksum field is blank
    data[CHECKSUM].fill(b' ');
    let checksum = calc_checksum(&data);
    let text = format!("{:06o}\0 ", checksum);
    data[CHECKSUM].copy_from_slice(text.as_bytes());
    Ok(data)
}
