//! Error types for backup and restore operations.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Only the
//! caller at the top of the process decides whether an error terminates it;
//! [`Error::exit_code`] gives the conventional status for each variant.
//!
//! ```rust
//! use tar_backup::{Error, TarHeader, EntryKind};
//!
//! let long = "x".repeat(300);
//! let header = TarHeader::new(long, EntryKind::Regular, 0o644, 0);
//! match header.to_bytes() {
//!     Err(Error::PathTooLong { len, .. }) => assert_eq!(len, 300),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// The error type for archive construction, parsing and restoration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error without a known filesystem path (e.g. writing to a sink).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An I/O error on a specific filesystem path.
    #[error("I/O error on '{}': {source}", path.display())]
    PathIo {
        /// The path the operation was applied to.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A relative path does not fit in the name and prefix fields.
    #[error("path is too long for a ustar header ({len} bytes, max 255): {path}")]
    PathTooLong {
        /// The offending path.
        path: String,
        /// Its length in bytes.
        len: usize,
    },

    /// A file name is not UTF-8 and cannot be stored unchanged in a header.
    #[error("path is not valid UTF-8: '{}'", path.display())]
    NonUtf8Path {
        /// The offending path on disk.
        path: PathBuf,
    },

    /// The entry is neither a regular file nor a directory.
    #[error("unsupported file type for '{path}'")]
    UnsupportedFileType {
        /// The offending path.
        path: String,
    },

    /// A numeric value is too wide for its fixed octal field.
    #[error("value {value:#o} does not fit in the {field} field")]
    FieldOverflow {
        /// Name of the header field.
        field: &'static str,
        /// The value that overflowed.
        value: u64,
    },

    /// The archive is structurally invalid.
    #[error("corrupt archive at offset {offset}: {reason}")]
    CorruptArchive {
        /// Byte offset where the problem was detected.
        offset: u64,
        /// A description of the problem.
        reason: String,
    },

    /// A header block's stored checksum does not match its contents.
    #[error("checksum mismatch in header at offset {offset}: stored {stored:#o}, computed {computed:#o}")]
    ChecksumMismatch {
        /// Byte offset of the header block.
        offset: u64,
        /// The checksum stored in the header.
        stored: u32,
        /// The checksum computed over the header bytes.
        computed: u32,
    },

    /// An archived path would escape the destination directory.
    #[error("refusing to restore unsafe path '{path}'")]
    UnsafePath {
        /// The archived path.
        path: String,
    },

    /// The selection threshold could not be parsed.
    #[error("invalid selection threshold: {0}")]
    InvalidSelection(String),
}

impl Error {
    /// Returns true if the error indicates a damaged or non-conforming archive.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptArchive { .. } | Error::ChecksumMismatch { .. } | Error::UnsafePath { .. }
        )
    }

    /// Process exit status for this error.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 2 | fatal error while building an archive |
    /// | 3 | bad archive |
    /// | 5 | I/O error |
    /// | 255 | invalid arguments |
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io(_) | Error::PathIo { .. } => 5,
            Error::CorruptArchive { .. } | Error::ChecksumMismatch { .. } | Error::UnsafePath { .. } => 3,
            Error::InvalidSelection(_) => 255,
            Error::PathTooLong { .. }
            | Error::NonUtf8Path { .. }
            | Error::UnsupportedFileType { .. }
            | Error::FieldOverflow { .. } => 2,
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Attaches a filesystem path to an `io::Result`.
pub trait IoContext<T> {
    /// Converts the error into [`Error::PathIo`] for `path`.
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::PathIo {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}
