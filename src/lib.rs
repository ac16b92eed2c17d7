//! Incremental directory backup into ustar archives, and restore
//!
//! # Usage
//!
//! ## Backing up files changed since a point in time
//!
//! ```rust,no_run
//! use tar_backup::{backup, BackupOptions, Selection};
//!
//! let options = BackupOptions::new("/home/alex/projects", "projects.tar")
//!     .selection(Selection::parse("2018-12-19 00:00:00")?);
//! let summary = backup(&options, |line| println!("{}", line))?;
//! println!("{} entries archived", summary.archived.len());
//! # Ok::<(), tar_backup::Error>(())
//! ```
//!
//! ## Restoring an archive
//!
//! ```rust,no_run
//! use tar_backup::{restore, RestoreOptions};
//!
//! let options = RestoreOptions::new("projects.tar", "projects-restored");
//! restore(&options, |header| println!("restored {}", header.path))?;
//! # Ok::<(), tar_backup::Error>(())
//! ```
//!
//! ## Listing an archive
//!
//! ```rust,no_run
//! use tar_backup::{list, Listing};
//!
//! for header in list("projects.tar")? {
//!     println!("{}", Listing::from_header(&header));
//! }
//! # Ok::<(), tar_backup::Error>(())
//! ```
//!
//! ## In-memory archives
//!
//! ```rust
//! use tar_backup::{read_tar, write_tar, EntryKind, TarEntry, TarHeader};
//!
//! let header = TarHeader::new("hello.txt".to_string(), EntryKind::Regular, 0o644, 12);
//! let entries = vec![TarEntry { header, data: b"Hello, World".to_vec() }];
//!
//! let bytes = write_tar(&entries)?;
//! assert_eq!(bytes.len(), 512 + 512 + 1024);
//!
//! let read_back = read_tar(&bytes)?;
//! assert_eq!(read_back[0].header.path, "hello.txt");
//! assert_eq!(read_back[0].data, b"Hello, World");
//! # Ok::<(), tar_backup::Error>(())
//! ```

pub mod backup;
pub mod error;
pub mod listing;
pub mod owner;
pub mod restore;
pub mod stat;
pub mod tar;
pub mod walk;

use std::io::Cursor;

pub use backup::{backup, write_archive, ArchiveWriter, BackupOptions, BackupSummary};
pub use error::{Error, IoContext, Result};
pub use listing::{mode_string, Listing};
pub use restore::{default_destination, list, restore, restore_archive, ArchiveReader, RestoreOptions, RestoreSummary};
pub use stat::{FileKind, FileStat};
pub use tar::{EntryKind, TarEntry, TarHeader};
pub use walk::{Selection, TreeWalker, WalkEntry};

/// Parses an in-memory archive.
///
/// Applies the same length, alignment and checksum checks as [`restore`].
pub fn read_tar(data: &[u8]) -> Result<Vec<TarEntry>> {
    ArchiveReader::new(Cursor::new(data), data.len() as u64)?.collect()
}

/// Serializes entries into an in-memory archive, trailer included.
pub fn write_tar(entries: &[TarEntry]) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for entry in entries {
        writer.append(&entry.header, &entry.data)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_write_read() {
        let entries = vec![
            TarEntry {
                header: TarHeader::new("foo.txt".to_string(), EntryKind::Regular, 0o664, 3),
                data: b"foo".to_vec(),
            },
            TarEntry {
                header: TarHeader::new("bar".to_string(), EntryKind::Directory, 0o755, 0),
                data: Vec::new(),
            },
        ];
        let bytes = write_tar(&entries).unwrap();
        assert_eq!(bytes.len() % 512, 0);
        assert!(bytes[bytes.len() - 1024..].iter().all(|&b| b == 0));

        let read_back = read_tar(&bytes).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].header.path, "foo.txt");
        assert_eq!(read_back[0].data, b"foo");
        assert!(read_back[1].header.is_dir());
    }

    #[test]
    fn test_read_unaligned() {
        let bytes = write_tar(&[]).unwrap();
        assert!(read_tar(&bytes).unwrap().is_empty());
        assert!(matches!(read_tar(&bytes[..1000]), Err(Error::CorruptArchive { .. })));
    }

    #[test]
    fn test_backup_restore() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("test_file1.txt"), "Hello, World!").unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();
        fs::write(source.path().join("nested/test_file2.txt"), "Test content 2").unwrap();

        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("test_pack.tar");
        let summary = backup(&BackupOptions::new(source.path(), &archive), |_| {}).unwrap();
        assert_eq!(summary.archived.len(), 3);

        let headers = list(&archive).unwrap();
        let names: Vec<_> = headers.iter().map(|h| h.path.as_str()).collect();
        assert_eq!(names, ["nested", "nested/test_file2.txt", "test_file1.txt"]);

        let output = work.path().join("out");
        let restored = restore(&RestoreOptions::new(&archive, &output), |_| {}).unwrap();
        assert_eq!(restored.files, 2);
        assert_eq!(restored.directories, 1);
        assert_eq!(fs::read_to_string(output.join("test_file1.txt")).unwrap(), "Hello, World!");
        assert_eq!(
            fs::read_to_string(output.join("nested/test_file2.txt")).unwrap(),
            "Test content 2"
        );
    }
}
