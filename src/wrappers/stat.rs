//! `stat`-family, `access`-family, and extended-attribute wrappers.
//!
//! Resolution discipline per spec §6: `stat`/`statfs`/`access` follow all
//! links (the caller wants the named file's own attributes); `lstat`
//! stops at the parent, since it is specifically asking about the link
//! itself; the `*at` forms are flag-directed through [`super::Discipline::AtFlag`].

use super::{as_cptr, enter, rewrite_one, simple_wrapper, Discipline};
use crate::ffi;
use crate::reals::*;
use libc::{c_char, c_int, c_void, size_t, ssize_t, DIR};

simple_wrapper!(stat, real_stat, Discipline::FollowAll, (buf: *mut libc::stat) -> c_int);
simple_wrapper!(lstat, real_lstat, Discipline::ParentOnly, (buf: *mut libc::stat) -> c_int);
simple_wrapper!(access, real_access, Discipline::FollowAll, (mode: c_int) -> c_int);
simple_wrapper!(opendir, real_opendir, Discipline::FollowAll, () -> *mut DIR);
simple_wrapper!(statfs, real_statfs, Discipline::FollowAll, (buf: *mut libc::statfs) -> c_int);
simple_wrapper!(pathconf, real_pathconf, Discipline::ParentOnly, (name: c_int) -> libc::c_long);
simple_wrapper!(listxattr, real_listxattr, Discipline::ParentOnly, (namebuf: *mut c_char, size: size_t, options: c_int) -> ssize_t);
simple_wrapper!(setxattr, real_setxattr, Discipline::ParentOnly, (name: *const c_char, value: *const c_void, size: size_t, position: u32, options: c_int) -> c_int);
simple_wrapper!(removexattr, real_removexattr, Discipline::ParentOnly, (name: *const c_char, options: c_int) -> c_int);

/// `statfs64` is the deprecated synonym for `statfs` on modern Darwin,
/// sharing its struct layout; routed through the same real entry point.
#[no_mangle]
pub unsafe extern "C" fn statfs64(path: *const c_char, buf: *mut libc::statfs) -> c_int {
    statfs(path, buf)
}

/// `stat64`/`lstat64` only exist as distinct symbols on x86_64 Darwin
/// (`original_source/fakedir.c`'s `#ifdef __x86_64__` branch interposes
/// them against the same `my_stat`/`my_lstat` wrappers used for the plain
/// names); on arm64 they are never emitted, so these are gated the same way.
#[cfg(target_arch = "x86_64")]
#[no_mangle]
pub unsafe extern "C" fn stat64(path: *const c_char, buf: *mut libc::stat) -> c_int {
    stat(path, buf)
}

#[cfg(target_arch = "x86_64")]
#[no_mangle]
pub unsafe extern "C" fn lstat64(path: *const c_char, buf: *mut libc::stat) -> c_int {
    lstat(path, buf)
}

#[no_mangle]
pub unsafe extern "C" fn fstatat(dirfd: c_int, path: *const c_char, buf: *mut libc::stat, flags: c_int) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_fstatat(dirfd, path, buf, flags),
    };
    let discipline = Discipline::AtFlag { dirfd, flags };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_fstatat(dirfd, as_cptr(&p), buf, flags),
        None => real_fstatat(dirfd, path, buf, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn faccessat(dirfd: c_int, path: *const c_char, mode: c_int, flags: c_int) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_faccessat(dirfd, path, mode, flags),
    };
    let discipline = Discipline::AtFlag { dirfd, flags };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_faccessat(dirfd, as_cptr(&p), mode, flags),
        None => real_faccessat(dirfd, path, mode, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn setattrlistat(
    dirfd: c_int,
    path: *const c_char,
    attrlist: *mut ffi::attrlist,
    attr_buf: *mut c_void,
    attr_buf_size: usize,
    options: u32,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_setattrlistat(dirfd, path, attrlist, attr_buf, attr_buf_size, options),
    };
    let r = match rewrite_one(Discipline::ParentOnly, path) {
        Some(p) => real_setattrlistat(dirfd, as_cptr(&p), attrlist, attr_buf, attr_buf_size, options),
        None => real_setattrlistat(dirfd, path, attrlist, attr_buf, attr_buf_size, options),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn getattrlistat(
    dirfd: c_int,
    path: *const c_char,
    attrlist: *mut ffi::attrlist,
    attr_buf: *mut c_void,
    attr_buf_size: usize,
    options: u32,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_getattrlistat(dirfd, path, attrlist, attr_buf, attr_buf_size, options),
    };
    let r = match rewrite_one(Discipline::ParentOnly, path) {
        Some(p) => real_getattrlistat(dirfd, as_cptr(&p), attrlist, attr_buf, attr_buf_size, options),
        None => real_getattrlistat(dirfd, path, attrlist, attr_buf, attr_buf_size, options),
    };
    drop(guard);
    r
}
