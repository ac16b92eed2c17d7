//! Reading archives back and rebuilding the tree they describe.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use filetime::FileTime;

use crate::error::{Error, IoContext, Result};
use crate::tar::{padding_for, Block, TarEntry, TarHeader, BLOCK_SIZE, TRAILER_SIZE, is_empty_block};

/// Sequential parser over an archive of known total length.
///
/// Yields one [`TarEntry`] per header until the trailer, the first all-zero
/// block, or the first error.
pub struct ArchiveReader<R: Read> {
    inner: R,
    len: u64,
    cursor: u64,
    done: bool,
}

impl<R: Read> ArchiveReader<R> {
    /// Fails with [`Error::CorruptArchive`] unless `len` is a multiple of 512.
    pub fn new(inner: R, len: u64) -> Result<Self> {
        if len % BLOCK_SIZE as u64 != 0 {
            return Err(Error::CorruptArchive {
                offset: len,
                reason: format!("length {} is not a multiple of {}", len, BLOCK_SIZE),
            });
        }
        Ok(Self {
            inner,
            len,
            cursor: 0,
            done: false,
        })
    }

    /// Offset of the next header.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    fn read_entry(&mut self) -> Result<Option<TarEntry>> {
        // the last two blocks are the trailer
        if self.cursor >= self.len.saturating_sub(TRAILER_SIZE as u64) {
            return Ok(None);
        }

        let offset = self.cursor;
        let mut block: Block = [0u8; BLOCK_SIZE];
        self.inner.read_exact(&mut block)?;
        if is_empty_block(&block) {
            return Ok(None);
        }
        let header = TarHeader::from_bytes(&block).map_err(|e| match e {
            Error::ChecksumMismatch { stored, computed, .. } => Error::ChecksumMismatch { offset, stored, computed },
            Error::CorruptArchive { reason, .. } => Error::CorruptArchive { offset, reason },
            other => other,
        })?;

        // entry data may not reach into the trailer
        let data_limit = self.len - TRAILER_SIZE as u64;
        let data_start = offset + BLOCK_SIZE as u64;
        let padding = padding_for(header.size);
        let end = data_start
            .checked_add(header.size)
            .and_then(|n| n.checked_add(padding))
            .filter(|&end| end <= data_limit)
            .ok_or_else(|| Error::CorruptArchive {
                offset,
                reason: format!(
                    "entry '{}' claims {} bytes, running past the data area ending at {}",
                    header.path, header.size, data_limit
                ),
            })?;

        let mut data = Vec::with_capacity(header.size as usize);
        (&mut self.inner).take(header.size).read_to_end(&mut data)?;
        if data.len() as u64 != header.size {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        io::copy(&mut (&mut self.inner).take(padding), &mut io::sink())?;

        self.cursor = end;
        Ok(Some(TarEntry { header, data }))
    }
}

impl<R: Read> Iterator for ArchiveReader<R> {
    type Item = Result<TarEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_entry().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Where to restore from and to.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub archive: PathBuf,
    pub destination: PathBuf,
}

impl RestoreOptions {
    pub fn new(archive: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            destination: destination.into(),
        }
    }
}

/// Destination used when none is given: the archive path without its
/// extension (`backups/home.tar` → `backups/home`).
pub fn default_destination(archive: &Path) -> PathBuf {
    match archive.file_stem() {
        Some(stem) if archive.extension().is_some() => archive.with_file_name(stem),
        _ => {
            let mut name = archive.as_os_str().to_owned();
            name.push(".restored");
            PathBuf::from(name)
        }
    }
}

/// Outcome of a completed restore.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Rebuild the archived tree under `destination`.
///
/// `len` is the total archive length; it is validated before anything is
/// written. Permissions and mtimes are applied to each file right after it
/// is written and to directories once every entry is in place.
pub fn restore_archive<R, F>(source: R, len: u64, destination: &Path, mut on_entry: F) -> Result<RestoreSummary>
where
    R: Read,
    F: FnMut(&TarHeader),
{
    let reader = ArchiveReader::new(source, len)?;
    let mut summary = RestoreSummary::default();
    let mut directories = Vec::new();

    for entry in reader {
        let TarEntry { header, data } = entry?;
        let target = destination_path(destination, &header.path)?;

        log::debug!("restoring {}", target.display());
        if header.is_dir() {
            fs::create_dir_all(&target).at(&target)?;
            // keep it writable until its own entries are in place
            set_mode(&target, header.mode | 0o700).at(&target)?;
            summary.directories += 1;
            directories.push((target, header.mode, header.mtime));
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).at(parent)?;
            }
            remove_existing_file(&target)?;
            fs::write(&target, &data).at(&target)?;
            apply_metadata(&target, header.mode, header.mtime)?;
            summary.files += 1;
            summary.bytes += data.len() as u64;
        }
        on_entry(&header);
    }

    for (dir, mode, mtime) in directories.iter().rev() {
        apply_metadata(dir, *mode, *mtime)?;
    }

    log::info!(
        "restored {} files and {} directories ({} bytes) into {}",
        summary.files,
        summary.directories,
        summary.bytes,
        destination.display()
    );
    Ok(summary)
}

/// Open `options.archive` and restore it into `options.destination`.
pub fn restore<F>(options: &RestoreOptions, on_entry: F) -> Result<RestoreSummary>
where
    F: FnMut(&TarHeader),
{
    let file = File::open(&options.archive).at(&options.archive)?;
    let len = file.metadata().at(&options.archive)?.len();
    restore_archive(BufReader::new(file), len, &options.destination, on_entry)
}

/// Headers of every entry in an archive file, without extracting.
pub fn list(archive: impl AsRef<Path>) -> Result<Vec<TarHeader>> {
    let archive = archive.as_ref();
    let file = File::open(archive).at(archive)?;
    let len = file.metadata().at(archive)?.len();
    ArchiveReader::new(BufReader::new(file), len)?
        .map(|entry| entry.map(|e| e.header))
        .collect()
}

/// Join an archived path onto the destination, refusing anything that
/// could land outside it.
fn destination_path(destination: &Path, archived: &str) -> Result<PathBuf> {
    let relative = Path::new(archived);
    let safe = !archived.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(Error::UnsafePath {
            path: archived.to_string(),
        });
    }
    Ok(destination.join(relative))
}

/// Drop a file or symlink left at `path` by an earlier restore; a read-only
/// file cannot be truncated in place.
fn remove_existing_file(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(path).at(path),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).at(path),
    }
}

fn apply_metadata(path: &Path, mode: u32, mtime: u64) -> Result<()> {
    set_mode(path, mode).at(path)?;
    let secs = i64::try_from(mtime).unwrap_or(i64::MAX);
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).at(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms)
}
