//! `ls -l` style listing lines for archived and restored entries.

use std::fmt;

use chrono::DateTime;

use crate::owner;
use crate::stat::FileStat;
use crate::tar::TarHeader;

/// Date column format (`19 Dec 14:05`), always in UTC.
const DATE_FORMAT: &str = "%d %b %H:%M";

/// One line of listing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub mode: String,
    pub nlink: u64,
    pub owner: String,
    pub group: String,
    pub size: u64,
    pub date: String,
    pub path: String,
}

impl Listing {
    /// Listing for a file on disk, with owner and group resolved by id.
    pub fn from_stat(path: &str, stat: &FileStat) -> Self {
        Self {
            mode: mode_string(stat.is_dir(), stat.mode),
            nlink: stat.nlink,
            owner: owner::user_name(stat.uid).unwrap_or_else(|| stat.uid.to_string()),
            group: owner::group_name(stat.gid).unwrap_or_else(|| stat.gid.to_string()),
            size: stat.size,
            date: format_date(stat.mtime),
            path: path.to_string(),
        }
    }

    /// Listing for an archived entry. Names stored in the header win over ids.
    pub fn from_header(header: &TarHeader) -> Self {
        let or_id = |name: &str, id: u32| {
            if name.is_empty() { id.to_string() } else { name.to_string() }
        };
        Self {
            mode: mode_string(header.is_dir(), header.mode),
            nlink: 1,
            owner: or_id(&header.uname, header.uid),
            group: or_id(&header.gname, header.gid),
            size: header.size,
            date: format_date(i64::try_from(header.mtime).unwrap_or(i64::MAX)),
            path: header.path.clone(),
        }
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:>6} {:>7} {} {}",
            self.mode, self.nlink, self.owner, self.group, self.size, self.date, self.path
        )
    }
}

/// Ten-character permission string, e.g. `drwxr-x---`.
pub fn mode_string(is_dir: bool, mode: u32) -> String {
    const BITS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    let mut s = String::with_capacity(10);
    s.push(if is_dir { 'd' } else { '-' });
    for (bit, c) in BITS {
        s.push(if mode & bit != 0 { c } else { '-' });
    }
    s
}

fn format_date(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::FileKind;
    use crate::tar::EntryKind;

    #[test]
    fn mode_strings() {
        assert_eq!(mode_string(false, 0o644), "-rw-r--r--");
        assert_eq!(mode_string(true, 0o755), "drwxr-xr-x");
        assert_eq!(mode_string(false, 0o100600), "-rw-------");
        assert_eq!(mode_string(false, 0), "----------");
    }

    #[test]
    fn header_listing_line() {
        let mut header = TarHeader::new("docs/a.txt".to_string(), EntryKind::Regular, 0o640, 2);
        header.mtime = 1_545_228_300; // 2018-12-19 14:05 UTC
        header.uname = "alex".to_string();
        header.gid = 20;

        let line = Listing::from_header(&header).to_string();
        assert_eq!(line, "-rw-r----- 1 alex     20       2 19 Dec 14:05 docs/a.txt");
    }

    #[test]
    fn stat_listing_uses_nlink_and_size() {
        let stat = FileStat {
            kind: FileKind::Directory,
            mode: 0o755,
            uid: 0,
            gid: 0,
            size: 4096,
            mtime: 0,
            ctime: 0,
            nlink: 3,
        };
        let listing = Listing::from_stat("sub", &stat);
        assert_eq!(listing.mode, "drwxr-xr-x");
        assert_eq!(listing.nlink, 3);
        assert_eq!(listing.size, 4096);
        assert_eq!(listing.date, "01 Jan 00:00");
        assert!(listing.to_string().ends_with(" sub"));
    }
}
