//! Component D: one thin wrapper per intercepted filesystem entry point.
//!
//! Ground truth is `vrift-inception-layer/src/syscalls/*.rs`: acquire the
//! per-thread reentrancy guard first (falling straight through to the real
//! entry point if we're already inside another wrapper on this thread, or
//! before init has reached `EarlyInit`), then the process-wide mutex, rewrite
//! the path argument(s) per the call's resolution discipline (spec §4.D/§6),
//! and delegate to the real entry point recorded in `reals.rs`.
//!
//! Unlike the teacher, every `new_func` in the interpose table below points
//! directly at one of these `extern "C"` functions — no intermediate C
//! bridge trampoline — since this library carries no C toolchain dependency.

pub mod attr;
pub mod clone;
pub mod dl;
pub mod exec;
pub mod fsmisc;
pub mod link;
pub mod stat;

use crate::path::resolve::{resolve_all, resolve_parent, ResolveError};
use crate::router::resolve_at;
use crate::state::{cstr_buf, FixedString, ReentrancyGuard, ReentrancyGuardToken, MAX_PATH};
use libc::c_char;
use std::ffi::CStr;

/// A stack-resident NUL-terminated path buffer, handed to a real libc entry
/// point in place of the caller's original pointer. No heap allocation:
/// built by [`cstr_buf`] over a resolved [`crate::state::FixedString`].
pub type CPathBuf = [u8; MAX_PATH + 1];

#[inline(always)]
pub fn as_cptr(buf: &CPathBuf) -> *const c_char {
    buf.as_ptr() as *const c_char
}

/// Which resolver a wrapper's path argument goes through, per spec §4.D/§6.
#[derive(Clone, Copy)]
pub enum Discipline {
    FollowAll,
    ParentOnly,
    AtFlag { dirfd: i32, flags: i32 },
}

/// Enters the reentrancy guard for this call. `None` means the caller must
/// fall straight through to the real entry point with the untouched path.
pub unsafe fn enter() -> Option<ReentrancyGuardToken> {
    ReentrancyGuard::enter()
}

/// Rewrites a single `*const c_char` path argument per `discipline`, holding
/// the process-wide mutex only for the duration of the resolve. Returns
/// `None` on a null pointer, invalid UTF-8, or a resolver depth-guard
/// failure — any of which means the caller should fall through to the real
/// syscall with the original path (spec §7's truncate/fall-through posture).
pub unsafe fn rewrite_one(discipline: Discipline, path: *const c_char) -> Option<CPathBuf> {
    if path.is_null() {
        return None;
    }
    let state = crate::global::get()?;
    let s = CStr::from_ptr(path).to_str().ok()?;
    let mut p: FixedString<MAX_PATH> = FixedString::new();
    p.set(s);

    let mut buffers = state.buffers.lock();
    let pattern = state.config.pattern.as_str();
    let target = state.config.target.as_str();

    let resolved = match discipline {
        Discipline::FollowAll => resolve_all(&mut buffers, pattern, target, -1, &p),
        Discipline::ParentOnly => resolve_parent(&mut buffers, pattern, target, -1, &p),
        Discipline::AtFlag { dirfd, flags } => resolve_at(&mut buffers, pattern, target, dirfd, flags, &p),
    };
    drop(buffers);

    match resolved {
        Ok(r) => Some(cstr_buf(r.as_str())),
        Err(ResolveError::TooManyLinks) => None,
    }
}

/// Rewrites two path arguments for operations like `link`/`rename` that take
/// a source and a destination. The first result is copied into its own
/// stack buffer before the second resolve begins, since both would
/// otherwise share the same mutex-guarded scratch buffers (spec §4.D).
pub unsafe fn rewrite_two(
    first_discipline: Discipline,
    first: *const c_char,
    second_discipline: Discipline,
    second: *const c_char,
) -> Option<(CPathBuf, CPathBuf)> {
    let a = rewrite_one(first_discipline, first)?;
    let b = rewrite_one(second_discipline, second)?;
    Some((a, b))
}

/// Generates a wrapper for the common shape "one leading path argument,
/// fixed resolution discipline, any number of trailing pass-through args".
/// Covers the large majority of spec §6's entry points; `*at` variants and
/// multi-path operations are written out by hand in their own modules.
macro_rules! simple_wrapper {
    ($name:ident, $real:path, $discipline:expr, ($($arg:ident : $ty:ty),* $(,)?) -> $ret:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(path: *const libc::c_char, $($arg: $ty),*) -> $ret {
            let guard = match $crate::wrappers::enter() {
                Some(g) => g,
                None => return $real(path, $($arg),*),
            };
            let r = match $crate::wrappers::rewrite_one($discipline, path) {
                Some(buf) => $real($crate::wrappers::as_cptr(&buf), $($arg),*),
                None => $real(path, $($arg),*),
            };
            drop(guard);
            r
        }
    };
}
pub(crate) use simple_wrapper;
