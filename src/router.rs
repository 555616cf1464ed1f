//! Component C: the at-flag router.
//!
//! Maps a `*at`-style entry point's `(dirfd, flags)` pair onto the resolver
//! decision table from spec §4.C. Centralized here rather than inlined in
//! every wrapper, unlike `original_source/trivial_replacements.c`, which
//! repeats the flag check per function — matching the teacher's own
//! preference (`syscalls/path.rs`) for a single guard-then-dispatch shape
//! reused by every wrapper that needs it.

use crate::global::ScratchBuffers;
use crate::path::resolve::{resolve_all, resolve_parent, ResolveError};
use crate::state::{FixedString, MAX_PATH};

/// Resolves a path for an `*at`-family entry point per the decision table:
///
/// | flags                              | resolver                |
/// |-------------------------------------|--------------------------|
/// | `AT_FDCWD` & `AT_SYMLINK_NOFOLLOW`   | `resolve_parent(-1, p)`  |
/// | `AT_FDCWD` only                      | `resolve_all(-1, p)`     |
/// | `AT_SYMLINK_NOFOLLOW`                | `resolve_parent(fd, p)`  |
/// | neither                              | `resolve_all(fd, p)`     |
pub fn resolve_at(
    buffers: &mut ScratchBuffers,
    pattern: &str,
    target: &str,
    dirfd: i32,
    flags: i32,
    p: &FixedString<MAX_PATH>,
) -> Result<FixedString<MAX_PATH>, ResolveError> {
    let is_cwd = dirfd == libc::AT_FDCWD;
    let nofollow = flags & libc::AT_SYMLINK_NOFOLLOW != 0;
    let effective_fd = if is_cwd { -1 } else { dirfd };

    if nofollow {
        resolve_parent(buffers, pattern, target, effective_fd, p)
    } else {
        resolve_all(buffers, pattern, target, effective_fd, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn fresh_buffers(pattern: &str, target: &str) -> ScratchBuffers {
        let mut cfg = Config {
            pattern: FixedString::new(),
            target: FixedString::new(),
            own_path: FixedString::new(),
            debug: false,
        };
        cfg.pattern.set(pattern);
        cfg.target.set(target);
        let mut forward_buf = FixedString::new();
        forward_buf.set(target);
        let mut reverse_buf = FixedString::new();
        reverse_buf.set(pattern);
        ScratchBuffers { forward_buf, reverse_buf, link_buf: FixedString::new(), dedup_buf: FixedString::new() }
    }

    #[test]
    fn at_fdcwd_nofollow_resolves_parent_only() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let mut p: FixedString<MAX_PATH> = FixedString::new();
        p.set("/nix/store/x/y");
        let out = resolve_at(
            &mut b,
            "/nix/store",
            "/opt/store",
            libc::AT_FDCWD,
            libc::AT_SYMLINK_NOFOLLOW,
            &p,
        )
        .unwrap();
        assert_eq!(out.as_str(), "/opt/store/x/y");
    }

    #[test]
    fn plain_dirfd_no_flags_follows_all() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let mut p: FixedString<MAX_PATH> = FixedString::new();
        p.set("justname");
        let out = resolve_at(&mut b, "/nix/store", "/opt/store", 3, 0, &p).unwrap();
        assert_eq!(out.as_str(), "justname");
    }
}
