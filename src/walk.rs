//! Directory traversal and change-time selection.
//!
//! [`TreeWalker`] is a lazy, depth-first iterator over the regular files and
//! directories under a root. It never yields the root itself, never yields
//! the archive being written, and drops entries the [`Selection`] rejects.
//!
//! ```rust,no_run
//! use tar_backup::{Selection, TreeWalker};
//!
//! let selection = Selection::parse("2018-12-19 00:00:00")?;
//! for entry in TreeWalker::new("/home/alex/docs", "/tmp/docs.tar", selection) {
//!     let entry = entry?;
//!     println!("{} ({} bytes)", entry.relative, entry.stat.size);
//! }
//! # Ok::<(), tar_backup::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::owner;
use crate::stat::{FileKind, FileStat};

/// Format accepted by [`Selection::parse`].
pub const THRESHOLD_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Descriptors kept free for the archive and the file being read.
const RESERVED_DESCRIPTORS: usize = 8;

/// Selects entries modified or changed at or after a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    threshold: i64,
}

impl Selection {
    /// Everything since the epoch.
    pub fn all() -> Self {
        Self::default()
    }

    /// Entries with mtime or ctime at or after `threshold` (seconds since the epoch).
    pub fn since(threshold: i64) -> Self {
        Self { threshold }
    }

    /// Parse a threshold given as `YYYY-MM-DD hh:mm:ss` (UTC), or as the path
    /// of a reference file whose modification time is used.
    pub fn parse(input: &str) -> Result<Self> {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(input, THRESHOLD_FORMAT) {
            return Ok(Self::since(datetime.and_utc().timestamp()));
        }
        match fs::metadata(input) {
            Ok(meta) => Ok(Self::since(FileStat::from_metadata(&meta).mtime)),
            Err(e) => Err(Error::InvalidSelection(format!(
                "'{}' is neither a \"YYYY-MM-DD hh:mm:ss\" datetime nor a readable file ({})",
                input, e
            ))),
        }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// An entry is excluded only when both its mtime and ctime are before the threshold.
    pub fn selects(&self, stat: &FileStat) -> bool {
        stat.mtime >= self.threshold || stat.ctime >= self.threshold
    }
}

/// One selected filesystem entry.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Absolute or root-joined path on disk.
    pub path: PathBuf,
    /// Path relative to the walk root, `/`-separated.
    pub relative: String,
    pub stat: FileStat,
}

/// Lazy depth-first walk over a directory tree.
///
/// Entries within a directory come in file-name order, and a directory is
/// yielded before its contents. Symlinks are not followed and, like devices
/// and fifos, are skipped. A traversal error ends the walk.
pub struct TreeWalker {
    root: PathBuf,
    inner: walkdir::IntoIter,
    exclude: Exclusion,
    selection: Selection,
    failed: bool,
}

impl TreeWalker {
    /// Walk `root`, skipping `archive` wherever it appears in the tree.
    pub fn new(root: impl AsRef<Path>, archive: impl AsRef<Path>, selection: Selection) -> Self {
        let budget = owner::open_file_limit(256).saturating_sub(RESERVED_DESCRIPTORS);
        Self::with_max_open(root, archive, selection, budget)
    }

    /// Like [`TreeWalker::new`] with an explicit open-directory budget.
    pub fn with_max_open(
        root: impl AsRef<Path>,
        archive: impl AsRef<Path>,
        selection: Selection,
        max_open: usize,
    ) -> Self {
        let root = root.as_ref().to_path_buf();
        let inner = WalkDir::new(&root)
            .follow_links(false)
            .min_depth(1)
            .max_open(max_open.max(1))
            .sort_by_file_name()
            .into_iter();
        Self {
            exclude: Exclusion::new(&root, archive.as_ref()),
            root,
            inner,
            selection,
            failed: false,
        }
    }

    fn accept(&self, entry: walkdir::DirEntry) -> Result<Option<WalkEntry>> {
        let kind: FileKind = entry.file_type().into();
        if kind == FileKind::Other {
            log::debug!("skipping special file {}", entry.path().display());
            return Ok(None);
        }

        let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
        if relative.as_os_str().is_empty() || self.exclude.matches(entry.path(), relative) {
            log::debug!("excluding archive {}", entry.path().display());
            return Ok(None);
        }

        let meta = entry.metadata().map_err(|e| walk_error(&self.root, e))?;
        let stat = FileStat::from_metadata(&meta);
        if !self.selection.selects(&stat) {
            log::debug!("not changed since threshold: {}", relative.display());
            return Ok(None);
        }

        let relative = relative_path(relative).ok_or_else(|| Error::NonUtf8Path {
            path: entry.path().to_path_buf(),
        })?;
        Ok(Some(WalkEntry {
            path: entry.into_path(),
            relative,
            stat,
        }))
    }
}

impl Iterator for TreeWalker {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(walk_error(&self.root, e)));
                }
            };
            match self.accept(entry) {
                Ok(Some(found)) => return Some(Ok(found)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Locations under which the archive may show up during the walk.
struct Exclusion {
    archive: PathBuf,
    canonical_archive: Option<PathBuf>,
    canonical_root: Option<PathBuf>,
}

impl Exclusion {
    fn new(root: &Path, archive: &Path) -> Self {
        Self {
            archive: archive.to_path_buf(),
            canonical_archive: fs::canonicalize(archive).ok(),
            canonical_root: fs::canonicalize(root).ok(),
        }
    }

    fn matches(&self, path: &Path, relative: &Path) -> bool {
        if path == self.archive || relative == self.archive {
            return true;
        }
        match (&self.canonical_root, &self.canonical_archive) {
            (Some(root), Some(archive)) => root.join(relative) == *archive,
            _ => false,
        }
    }
}

/// `/`-joined form of a root-relative path, or `None` if any component is
/// not UTF-8.
fn relative_path(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    Error::PathIo {
        path,
        source: std::io::Error::from(err),
    }
}
