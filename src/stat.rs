//! The subset of `lstat` data the walker, codec and listing need.

use std::fs::{FileType, Metadata};

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    /// Symlinks, devices, fifos, sockets.
    Other,
}

impl From<FileType> for FileKind {
    fn from(ft: FileType) -> Self {
        if ft.is_file() {
            FileKind::Regular
        } else if ft.is_dir() {
            FileKind::Directory
        } else {
            FileKind::Other
        }
    }
}

/// File status captured once per entry during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    /// Permission bits (no file-type bits).
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
    /// Metadata-change time, seconds since the epoch.
    pub ctime: i64,
    pub nlink: u64,
}

impl FileStat {
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            kind: meta.file_type().into(),
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
            nlink: meta.nlink(),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::time::UNIX_EPOCH;

        let secs = |t: std::io::Result<std::time::SystemTime>| {
            t.ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0)
        };
        let kind: FileKind = meta.file_type().into();
        let mode = match (kind, meta.permissions().readonly()) {
            (FileKind::Directory, _) => 0o755,
            (_, true) => 0o444,
            (_, false) => 0o644,
        };
        let mtime = secs(meta.modified());
        Self {
            kind,
            mode,
            uid: 0,
            gid: 0,
            size: meta.len(),
            mtime,
            // no ctime outside unix; creation time is the closest stand-in
            ctime: secs(meta.created()).max(mtime),
            nlink: 1,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn stat_of_file_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, b"hello").unwrap();

        let fstat = FileStat::from_metadata(&fs::symlink_metadata(&file).unwrap());
        assert_eq!(fstat.kind, FileKind::Regular);
        assert_eq!(fstat.size, 5);
        assert!(fstat.nlink >= 1);
        assert!(fstat.mode <= 0o7777);

        let dstat = FileStat::from_metadata(&fs::symlink_metadata(dir.path()).unwrap());
        assert!(dstat.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_other() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("t");
        fs::write(&target, b"x").unwrap();
        let link = dir.path().join("l");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let stat = FileStat::from_metadata(&fs::symlink_metadata(&link).unwrap());
        assert_eq!(stat.kind, FileKind::Other);
    }
}
