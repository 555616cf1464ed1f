//! Hard/symbolic link and rename wrappers: `link`/`linkat`, `unlink`/`unlinkat`,
//! `symlink`/`symlinkat`, `readlink`/`readlinkat`, and the `rename` family.
//!
//! All resolve parent-only (spec §6): every one of these operations names a
//! directory entry, not the file or link it might point through, so the
//! final path component is never followed. `symlink`/`symlinkat` additionally
//! leave their first argument (the link's target text) entirely unrewritten
//! — it is stored verbatim and may not even be a valid path on this machine.

use super::{as_cptr, enter, rewrite_one, rewrite_two, simple_wrapper, Discipline};
use crate::reals::*;
use libc::{c_char, c_int};

simple_wrapper!(unlink, real_unlink, Discipline::ParentOnly, () -> c_int);
simple_wrapper!(readlink, real_readlink, Discipline::ParentOnly, (buf: *mut c_char, bufsiz: usize) -> isize);

#[no_mangle]
pub unsafe extern "C" fn link(old: *const c_char, new: *const c_char) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_link(old, new),
    };
    let r = match rewrite_two(Discipline::ParentOnly, old, Discipline::ParentOnly, new) {
        Some((o, n)) => real_link(as_cptr(&o), as_cptr(&n)),
        None => real_link(old, new),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn linkat(
    olddirfd: c_int,
    old: *const c_char,
    newdirfd: c_int,
    new: *const c_char,
    flags: c_int,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_linkat(olddirfd, old, newdirfd, new, flags),
    };
    let old_discipline = Discipline::AtFlag { dirfd: olddirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let new_discipline = Discipline::AtFlag { dirfd: newdirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_two(old_discipline, old, new_discipline, new) {
        Some((o, n)) => real_linkat(olddirfd, as_cptr(&o), newdirfd, as_cptr(&n), flags),
        None => real_linkat(olddirfd, old, newdirfd, new, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn unlinkat(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_unlinkat(dirfd, path, flags),
    };
    let discipline = Discipline::AtFlag { dirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_unlinkat(dirfd, as_cptr(&p), flags),
        None => real_unlinkat(dirfd, path, flags),
    };
    drop(guard);
    r
}

/// `target` (the text the new symlink will contain) is passed through
/// untouched; only `linkpath` (where the link itself is created) is rewritten.
#[no_mangle]
pub unsafe extern "C" fn symlink(target: *const c_char, linkpath: *const c_char) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_symlink(target, linkpath),
    };
    let r = match rewrite_one(Discipline::ParentOnly, linkpath) {
        Some(p) => real_symlink(target, as_cptr(&p)),
        None => real_symlink(target, linkpath),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn symlinkat(target: *const c_char, newdirfd: c_int, linkpath: *const c_char) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_symlinkat(target, newdirfd, linkpath),
    };
    let discipline = Discipline::AtFlag { dirfd: newdirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_one(discipline, linkpath) {
        Some(p) => real_symlinkat(target, newdirfd, as_cptr(&p)),
        None => real_symlinkat(target, newdirfd, linkpath),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn readlinkat(dirfd: c_int, path: *const c_char, buf: *mut c_char, bufsiz: usize) -> isize {
    let guard = match enter() {
        Some(g) => g,
        None => return real_readlinkat(dirfd, path, buf, bufsiz),
    };
    let discipline = Discipline::AtFlag { dirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_readlinkat(dirfd, as_cptr(&p), buf, bufsiz),
        None => real_readlinkat(dirfd, path, buf, bufsiz),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn rename(old: *const c_char, new: *const c_char) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_rename(old, new),
    };
    let r = match rewrite_two(Discipline::ParentOnly, old, Discipline::ParentOnly, new) {
        Some((o, n)) => real_rename(as_cptr(&o), as_cptr(&n)),
        None => real_rename(old, new),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn renamex_np(old: *const c_char, new: *const c_char, flags: u32) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_renamex_np(old, new, flags),
    };
    let r = match rewrite_two(Discipline::ParentOnly, old, Discipline::ParentOnly, new) {
        Some((o, n)) => real_renamex_np(as_cptr(&o), as_cptr(&n), flags),
        None => real_renamex_np(old, new, flags),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn renameat(
    olddirfd: c_int,
    old: *const c_char,
    newdirfd: c_int,
    new: *const c_char,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_renameat(olddirfd, old, newdirfd, new),
    };
    let old_discipline = Discipline::AtFlag { dirfd: olddirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let new_discipline = Discipline::AtFlag { dirfd: newdirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_two(old_discipline, old, new_discipline, new) {
        Some((o, n)) => real_renameat(olddirfd, as_cptr(&o), newdirfd, as_cptr(&n)),
        None => real_renameat(olddirfd, old, newdirfd, new),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn renameatx_np(
    olddirfd: c_int,
    old: *const c_char,
    newdirfd: c_int,
    new: *const c_char,
    flags: u32,
) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_renameatx_np(olddirfd, old, newdirfd, new, flags),
    };
    let old_discipline = Discipline::AtFlag { dirfd: olddirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let new_discipline = Discipline::AtFlag { dirfd: newdirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_two(old_discipline, old, new_discipline, new) {
        Some((o, n)) => real_renameatx_np(olddirfd, as_cptr(&o), newdirfd, as_cptr(&n), flags),
        None => real_renameatx_np(olddirfd, old, newdirfd, new, flags),
    };
    drop(guard);
    r
}
