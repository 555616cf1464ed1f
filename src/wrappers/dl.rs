//! `dlopen`: resolved like any other path, then walked for transitive
//! dependencies the same way Component F's exec rewriter walks a binary's
//! load commands (spec §6: "dlopen (F, plus Mach-O dependency walk over the
//! resolved path)"). dyld's internal loads of those dependencies don't
//! necessarily re-enter our interposed `open`/`openat`, so the walk runs
//! eagerly here rather than relying on re-entry to resolve them.

use super::{as_cptr, enter, rewrite_one, Discipline};
use crate::path::resolve::resolve_all;
use crate::reals::*;
use crate::state::{fakedir_debug, FixedString, MAX_PATH};
use libc::{c_char, c_int, c_void};

#[no_mangle]
pub unsafe extern "C" fn dlopen(path: *const c_char, mode: c_int) -> *mut c_void {
    if path.is_null() {
        return real_dlopen(path, mode);
    }
    let guard = match enter() {
        Some(g) => g,
        None => return real_dlopen(path, mode),
    };
    let r = match rewrite_one(Discipline::FollowAll, path) {
        Some(p) => {
            if let Ok(s) = std::ffi::CStr::from_ptr(as_cptr(&p)).to_str() {
                walk_and_resolve_dependencies(s);
            }
            real_dlopen(as_cptr(&p), mode)
        }
        None => real_dlopen(path, mode),
    };
    drop(guard);
    r
}

/// Walks the resolved path's Mach-O load commands, resolving every
/// PATTERN-resident dependency's install name through the symlink resolver.
/// Nothing is done with the resolved names beyond logging them at debug
/// level: the point of the walk here is to warm the resolver's view of the
/// dependency chain the way the exec rewriter's own walk does, not to build
/// a preload list (there is no `DYLD_INSERT_LIBRARIES` to patch for a
/// `dlopen` call).
unsafe fn walk_and_resolve_dependencies(resolved_path: &str) {
    let Some(state) = crate::global::get() else { return };
    let pattern = state.config.pattern.as_str();
    let target = state.config.target.as_str();
    crate::exec::macho::walk_dependencies(resolved_path, &mut |name| {
        let mut buffers = state.buffers.lock();
        let mut np: FixedString<MAX_PATH> = FixedString::new();
        np.set(name);
        if let Ok(resolved) = resolve_all(&mut buffers, pattern, target, -1, &np) {
            fakedir_debug!("dlopen: dependency '{}' resolves to '{}'", name, resolved.as_str());
        }
    });
}
