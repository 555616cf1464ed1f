//! `clonefile`/`clonefileat`/`fclonefileat`/`exchangedata`: the two-path
//! copy-on-write and atomic-swap primitives. Both path arguments go through
//! [`super::rewrite_two`], which copies the first resolved buffer out before
//! the second resolve begins (spec §4.D's aliasing note).

use super::{as_cptr, enter, rewrite_one, rewrite_two, Discipline};
use crate::ffi;
use crate::reals::*;
use libc::{c_char, c_int, c_uint};

#[no_mangle]
pub unsafe extern "C" fn clonefile(src: *const c_char, dst: *const c_char, flags: c_int) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_clonefile(src, dst, flags),
    };
    let src_discipline = if flags & ffi::CLONE_NOFOLLOW != 0 { Discipline::ParentOnly } else { Discipline::FollowAll };
    let r = match rewrite_two(src_discipline, src, Discipline::ParentOnly, dst) {
        Some((s, d)) => real_clonefile(as_cptr(&s), as_cptr(&d), flags),
        None => real_clonefile(src, dst, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn clonefileat(
    src_dirfd: c_int,
    src: *const c_char,
    dst_dirfd: c_int,
    dst: *const c_char,
    flags: c_int,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_clonefileat(src_dirfd, src, dst_dirfd, dst, flags),
    };
    let src_nofollow = if flags & ffi::CLONE_NOFOLLOW != 0 { libc::AT_SYMLINK_NOFOLLOW } else { 0 };
    let src_discipline = Discipline::AtFlag { dirfd: src_dirfd, flags: src_nofollow };
    let dst_discipline = Discipline::AtFlag { dirfd: dst_dirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_two(src_discipline, src, dst_discipline, dst) {
        Some((s, d)) => real_clonefileat(src_dirfd, as_cptr(&s), dst_dirfd, as_cptr(&d), flags),
        None => real_clonefileat(src_dirfd, src, dst_dirfd, dst, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn fclonefileat(srcfd: c_int, dst_dirfd: c_int, dst: *const c_char, flags: c_int) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_fclonefileat(srcfd, dst_dirfd, dst, flags),
    };
    let discipline = Discipline::AtFlag { dirfd: dst_dirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_one(discipline, dst) {
        Some(d) => real_fclonefileat(srcfd, dst_dirfd, as_cptr(&d), flags),
        None => real_fclonefileat(srcfd, dst_dirfd, dst, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn exchangedata(path1: *const c_char, path2: *const c_char, options: c_uint) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_exchangedata(path1, path2, options),
    };
    let first_discipline =
        if options & ffi::FSOPT_NOFOLLOW != 0 { Discipline::ParentOnly } else { Discipline::FollowAll };
    let r = match rewrite_two(first_discipline, path1, Discipline::ParentOnly, path2) {
        Some((a, b)) => real_exchangedata(as_cptr(&a), as_cptr(&b), options),
        None => real_exchangedata(path1, path2, options),
    };
    drop(guard);
    r
}
