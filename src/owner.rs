//! User and group name lookup.
//!
//! Uses the reentrant `getpwuid_r`/`getgrgid_r` calls. Lookups that fail, or
//! ids with no database entry, yield `None`.

#[cfg(unix)]
use std::ffi::CStr;

#[cfg(unix)]
const MAX_BUFFER: usize = 1 << 20;

/// Returns the login name for `uid`.
#[cfg(unix)]
pub fn user_name(uid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; 1024];
    loop {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(
                uid as libc::uid_t,
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            return None;
        }
        // pw_name points into `buf`, which is still alive here
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

/// Returns the group name for `gid`.
#[cfg(unix)]
pub fn group_name(gid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; 1024];
    loop {
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = std::ptr::null_mut();
        let rc = unsafe {
            libc::getgrgid_r(
                gid as libc::gid_t,
                &mut grp,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() || grp.gr_name.is_null() {
            return None;
        }
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

#[cfg(not(unix))]
pub fn user_name(_uid: u32) -> Option<String> {
    None
}

#[cfg(not(unix))]
pub fn group_name(_gid: u32) -> Option<String> {
    None
}

/// Soft limit on open file descriptors for this process.
///
/// Falls back to `fallback` when the limit is unknown.
#[cfg(unix)]
pub fn open_file_limit(fallback: usize) -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if n > 0 { n as usize } else { fallback }
}

#[cfg(not(unix))]
pub fn open_file_limit(fallback: usize) -> usize {
    fallback
}
