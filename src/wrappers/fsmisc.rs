//! `open`/`openat`, directory lifecycle (`mkdir`/`mkdirat`/`rmdir`/`chdir`),
//! `getcwd`, and stdio-path entry points (`fopen`/`freopen`).
//!
//! `getcwd` is the one entry point that rewrites in the opposite direction:
//! the kernel returns a TARGET-resident path and callers expect to see
//! PATTERN, so its result is passed back through [`crate::path::rewrite::rewrite_reverse`]
//! rather than through the resolver (spec §6).

use super::{as_cptr, enter, rewrite_one, simple_wrapper, Discipline};
use crate::path::rewrite::rewrite_reverse;
use crate::state::{cstr_buf, FixedString, MAX_PATH};
use crate::reals::*;
use libc::{c_char, c_int, mode_t};

simple_wrapper!(mkdir, real_mkdir, Discipline::ParentOnly, (mode: mode_t) -> c_int);
simple_wrapper!(rmdir, real_rmdir, Discipline::ParentOnly, () -> c_int);
simple_wrapper!(chdir, real_chdir, Discipline::FollowAll, () -> c_int);
simple_wrapper!(fopen, real_fopen, Discipline::FollowAll, (mode: *const c_char) -> *mut libc::FILE);

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_open(path, flags, mode),
    };
    let discipline =
        if flags & (libc::O_NOFOLLOW | libc::O_SYMLINK) != 0 { Discipline::ParentOnly } else { Discipline::FollowAll };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_open(as_cptr(&p), flags, mode),
        None => real_open(path, flags, mode),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn openat(dirfd: c_int, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_openat(dirfd, path, flags, mode),
    };
    let at_flags = if flags & libc::O_NOFOLLOW != 0 { libc::AT_SYMLINK_NOFOLLOW } else { 0 };
    let discipline = Discipline::AtFlag { dirfd, flags: at_flags };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_openat(dirfd, as_cptr(&p), flags, mode),
        None => real_openat(dirfd, path, flags, mode),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn mkdirat(dirfd: c_int, path: *const c_char, mode: mode_t) -> c_int {
    let guard = match enter() {
        Some(g) => g,
        None => return real_mkdirat(dirfd, path, mode),
    };
    let discipline = Discipline::AtFlag { dirfd, flags: libc::AT_SYMLINK_NOFOLLOW };
    let r = match rewrite_one(discipline, path) {
        Some(p) => real_mkdirat(dirfd, as_cptr(&p), mode),
        None => real_mkdirat(dirfd, path, mode),
    };
    drop(guard);
    r
}

#[no_mangle]
pub unsafe extern "C" fn freopen(path: *const c_char, mode: *const c_char, stream: *mut libc::FILE) -> *mut libc::FILE {
    if path.is_null() {
        return real_freopen(path, mode, stream);
    }
    let guard = match enter() {
        Some(g) => g,
        None => return real_freopen(path, mode, stream),
    };
    let r = match rewrite_one(Discipline::FollowAll, path) {
        Some(p) => real_freopen(as_cptr(&p), mode, stream),
        None => real_freopen(path, mode, stream),
    };
    drop(guard);
    r
}

/// Resolves the real `getcwd`'s result back into PATTERN-space: the kernel
/// only ever knows about TARGET-resident directories, but a caller running
/// under this library expects its working directory to still look like it
/// lives under PATTERN.
#[no_mangle]
pub unsafe extern "C" fn getcwd(buf: *mut c_char, size: usize) -> *mut c_char {
    let guard = match enter() {
        Some(g) => g,
        None => return real_getcwd(buf, size),
    };

    if buf.is_null() {
        // BSD extension: the caller wants us to `malloc` the result buffer
        // ourselves. This is the one branch where an allocation is
        // unavoidable (and expected — the caller owns and frees it), so it's
        // the only place `real_getcwd` is allowed to malloc on our behalf.
        let raw = real_getcwd(std::ptr::null_mut(), 0);
        if raw.is_null() {
            drop(guard);
            return std::ptr::null_mut();
        }
        let result = (|| -> Option<*mut c_char> {
            let state = crate::global::get()?;
            let s = std::ffi::CStr::from_ptr(raw).to_str().ok()?;
            let mut p: FixedString<MAX_PATH> = FixedString::new();
            p.set(s);

            let mut buffers = state.buffers.lock();
            let pattern = state.config.pattern.as_str();
            let target = state.config.target.as_str();
            let mut rewritten: FixedString<MAX_PATH> = FixedString::new();
            rewritten.set(rewrite_reverse(&mut buffers, pattern, target, &p));
            drop(buffers);

            let cbuf = cstr_buf(rewritten.as_str());
            Some(libc::strdup(cbuf.as_ptr() as *const c_char))
        })();
        libc::free(raw as *mut libc::c_void);
        drop(guard);
        return result.unwrap_or(std::ptr::null_mut());
    }

    // Caller supplied a buffer: the real cwd fits on the stack, no
    // allocation needed.
    let mut stack = [0u8; MAX_PATH];
    if real_getcwd(stack.as_mut_ptr() as *mut c_char, MAX_PATH).is_null() {
        drop(guard);
        return std::ptr::null_mut();
    }

    let result = (|| -> Option<*mut c_char> {
        let state = crate::global::get()?;
        let s = std::ffi::CStr::from_ptr(stack.as_ptr() as *const c_char).to_str().ok()?;
        let mut p: FixedString<MAX_PATH> = FixedString::new();
        p.set(s);

        let mut buffers = state.buffers.lock();
        let pattern = state.config.pattern.as_str();
        let target = state.config.target.as_str();
        let mut rewritten: FixedString<MAX_PATH> = FixedString::new();
        rewritten.set(rewrite_reverse(&mut buffers, pattern, target, &p));
        drop(buffers);

        if rewritten.len() >= size {
            *libc::__error() = libc::ERANGE;
            return None;
        }
        std::ptr::copy_nonoverlapping(rewritten.as_bytes().as_ptr(), buf as *mut u8, rewritten.len());
        *buf.add(rewritten.len()) = 0;
        Some(buf)
    })();

    drop(guard);
    result.unwrap_or(std::ptr::null_mut())
}
