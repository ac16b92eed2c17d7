//! Writing archives from a directory tree.
//!
//! [`ArchiveWriter`] frames headers and data into 512-byte blocks.
//! [`write_archive`] drives it from a [`TreeWalker`]; [`backup`] does the same
//! into a newly created archive file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::{IoContext, Result};
use crate::listing::Listing;
use crate::tar::{padding_for, TarHeader, BLOCK_SIZE, TRAILER_SIZE};
use crate::walk::{Selection, TreeWalker};

/// Sequential ustar writer over any byte sink.
pub struct ArchiveWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Write one header followed by `data` padded to a block boundary.
    ///
    /// The header's size field is taken from `data`, not from `header.size`.
    pub fn append(&mut self, header: &TarHeader, data: &[u8]) -> Result<()> {
        let block = if header.is_dir() || header.size == data.len() as u64 {
            header.to_bytes()?
        } else {
            let mut sized = header.clone();
            sized.size = data.len() as u64;
            sized.to_bytes()?
        };
        self.inner.write_all(&block)?;
        self.written += BLOCK_SIZE as u64;

        for chunk in data.chunks(BLOCK_SIZE) {
            self.inner.write_all(chunk)?;
            if chunk.len() < BLOCK_SIZE {
                self.inner.write_all(&[0u8; BLOCK_SIZE][chunk.len()..])?;
            }
        }
        self.written += data.len() as u64 + padding_for(data.len() as u64);
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write the two-block trailer, flush, and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.inner.write_all(&[0u8; TRAILER_SIZE])?;
        self.written += TRAILER_SIZE as u64;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// What to back up and where.
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub root: PathBuf,
    pub archive: PathBuf,
    pub selection: Selection,
    /// Open-directory budget for the walk; `None` derives it from the
    /// process descriptor limit.
    pub max_open: Option<usize>,
}

impl BackupOptions {
    pub fn new(root: impl Into<PathBuf>, archive: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            archive: archive.into(),
            selection: Selection::all(),
            max_open: None,
        }
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn max_open(mut self, max_open: usize) -> Self {
        self.max_open = Some(max_open);
        self
    }

    fn walker(&self) -> TreeWalker {
        match self.max_open {
            Some(n) => TreeWalker::with_max_open(&self.root, &self.archive, self.selection, n),
            None => TreeWalker::new(&self.root, &self.archive, self.selection),
        }
    }
}

/// Outcome of a completed backup.
#[derive(Debug, Default)]
pub struct BackupSummary {
    /// Relative paths written to the archive, in order.
    pub archived: Vec<String>,
    /// Files that could not be read and were left out.
    pub skipped: Vec<(PathBuf, std::io::Error)>,
    /// Total archive length in bytes.
    pub bytes: u64,
}

/// Archive every selected entry under `options.root` into `sink`.
///
/// `on_entry` sees a listing line for each entry as it is written. Unreadable
/// files are logged and skipped; any other failure aborts the backup and
/// leaves `sink` holding a partial, unusable archive.
pub fn write_archive<W, F>(options: &BackupOptions, sink: W, mut on_entry: F) -> Result<(W, BackupSummary)>
where
    W: Write,
    F: FnMut(&Listing),
{
    let mut writer = ArchiveWriter::new(sink);
    let mut summary = BackupSummary::default();

    for entry in options.walker() {
        let entry = entry?;
        let data = if entry.stat.is_dir() {
            Vec::new()
        } else {
            match fs::read(&entry.path) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("skipping unreadable file {}: {}", entry.path.display(), e);
                    summary.skipped.push((entry.path, e));
                    continue;
                }
            }
        };

        let mut header = TarHeader::from_stat(&entry.relative, &entry.stat)?;
        header.size = data.len() as u64;

        // directories list their on-disk size; files list what was archived
        let mut listing = Listing::from_stat(&entry.relative, &entry.stat);
        if !entry.stat.is_dir() {
            listing.size = header.size;
        }
        on_entry(&listing);

        writer.append(&header, &data)?;
        log::debug!("archived {} ({} bytes)", entry.relative, data.len());
        summary.archived.push(entry.relative);
    }

    summary.bytes = writer.written() + TRAILER_SIZE as u64;
    let sink = writer.finish()?;
    log::info!(
        "archived {} entries ({} skipped), {} bytes",
        summary.archived.len(),
        summary.skipped.len(),
        summary.bytes
    );
    Ok((sink, summary))
}

/// Create (or truncate) `options.archive` and write the backup into it.
pub fn backup<F>(options: &BackupOptions, on_entry: F) -> Result<BackupSummary>
where
    F: FnMut(&Listing),
{
    let file = File::create(&options.archive).at(&options.archive)?;
    let (sink, summary) = write_archive(options, BufWriter::new(file), on_entry)?;
    sink.into_inner()
        .map_err(|e| e.into_error())
        .and_then(|file| file.sync_all())
        .at(&options.archive)?;
    Ok(summary)
}

impl BackupSummary {
    pub fn is_empty(&self) -> bool {
        self.archived.is_empty()
    }
}
