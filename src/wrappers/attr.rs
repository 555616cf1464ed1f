//! Ownership, permission, and metadata wrappers: `chflags`, `mkfifo`,
//! `chmod`/`fchmodat`, `chown`/`lchown`/`fchownat`, `truncate`, `utimes`,
//! `undelete`, and the plain (non-`at`) `setattrlist`/`getattrlist`.
//!
//! Per DESIGN.md's open-question decision, `chflags` resolves parent-only:
//! flags attach to the directory entry's inode, and a caller asking to flag
//! a symlink itself (rather than its target) expects the link, not whatever
//! it points at, to be touched.

use super::{as_cptr, enter, rewrite_one, simple_wrapper, Discipline};
use crate::ffi;
use crate::reals::*;
use libc::{c_int, c_void};

simple_wrapper!(chflags, real_chflags, Discipline::ParentOnly, (flags: libc::c_ulong) -> c_int);
simple_wrapper!(mkfifo, real_mkfifo, Discipline::ParentOnly, (mode: libc::mode_t) -> c_int);
simple_wrapper!(chmod, real_chmod, Discipline::FollowAll, (mode: libc::mode_t) -> c_int);
simple_wrapper!(chown, real_chown, Discipline::FollowAll, (uid: libc::uid_t, gid: libc::gid_t) -> c_int);
simple_wrapper!(lchown, real_lchown, Discipline::ParentOnly, (uid: libc::uid_t, gid: libc::gid_t) -> c_int);
simple_wrapper!(truncate, real_truncate, Discipline::FollowAll, (length: libc::off_t) -> c_int);
simple_wrapper!(utimes, real_utimes, Discipline::FollowAll, (times: *const libc::timeval) -> c_int);
simple_wrapper!(undelete, real_undelete, Discipline::FollowAll, () -> c_int);
simple_wrapper!(setattrlist, real_setattrlist, Discipline::ParentOnly, (attrlist: *mut ffi::attrlist, attr_buf: *mut c_void, attr_buf_size: usize, options: u32) -> c_int);
simple_wrapper!(getattrlist, real_getattrlist, Discipline::ParentOnly, (attrlist: *mut ffi::attrlist, attr_buf: *mut c_void, attr_buf_size: usize, options: u32) -> c_int);

#[no_mangle]
pub unsafe extern "C" fn fchmodat(
    dirfd: c_int,
    path: *const libc::c_char,
    mode: libc::mode_t,
    flags: c_int,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_fchmodat(dirfd, path, mode, flags),
    };
    let discipline = Discipline::AtFlag { dirfd, flags };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_fchmodat(dirfd, as_cptr(&p), mode, flags),
        None => real_fchmodat(dirfd, path, mode, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn fchownat(
    dirfd: c_int,
    path: *const libc::c_char,
    uid: libc::uid_t,
    gid: libc::gid_t,
    flags: c_int,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_fchownat(dirfd, path, uid, gid, flags),
    };
    let discipline = Discipline::AtFlag { dirfd, flags };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_fchownat(dirfd, as_cptr(&p), uid, gid, flags),
        None => real_fchownat(dirfd, path, uid, gid, flags),
    };
    drop(guard);
    r
}
