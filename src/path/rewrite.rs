//! Component A: the prefix rewriter.
//!
//! Ground truth is `original_source/fakedir.c`'s `rewrite_path` /
//! `rewrite_path_rev`: both scratch buffers are pre-seeded with the whole
//! replacement prefix at construction time (see `global::ScratchBuffers`),
//! so a rewrite only ever needs to write the *suffix* after the head that's
//! already sitting in the buffer.

use crate::global::ScratchBuffers;

/// `rewrite_forward(p)`: PATTERN-headed paths become TARGET-headed; anything
/// else passes through `dedup_buf` unchanged, giving every caller a stable
/// pointer regardless of whether a rewrite happened.
pub fn rewrite_forward<'a>(buffers: &'a mut ScratchBuffers, pattern: &str, target: &str, p: &str) -> &'a str {
    // Defensive normalization some callers perform before calling us.
    let p = p.strip_prefix("/.").unwrap_or(p);

    if !pattern.is_empty() && p.as_bytes().starts_with(pattern.as_bytes()) {
        let suffix = &p[pattern.len()..];
        write_suffix(buffers.forward_buf.raw_mut(), target, suffix);
        buffers.forward_buf.set_len(target.len() + suffix.len());
        buffers.forward_buf.as_str()
    } else {
        copy_into_dedup(buffers, p)
    }
}

/// `rewrite_reverse(p)`: symmetric, used solely by the `getcwd` wrapper to
/// present a TARGET-resident cwd back to the caller as if it were under
/// PATTERN.
pub fn rewrite_reverse<'a>(buffers: &'a mut ScratchBuffers, pattern: &str, target: &str, p: &str) -> &'a str {
    if !target.is_empty() && p.as_bytes().starts_with(target.as_bytes()) {
        let suffix = &p[target.len()..];
        write_suffix(buffers.reverse_buf.raw_mut(), pattern, suffix);
        buffers.reverse_buf.set_len(pattern.len() + suffix.len());
        buffers.reverse_buf.as_str()
    } else {
        copy_into_dedup(buffers, p)
    }
}

fn write_suffix<const N: usize>(buf: &mut [u8; N], head: &str, suffix: &str) {
    let head_len = head.len().min(N);
    buf[..head_len].copy_from_slice(&head.as_bytes()[..head_len]);
    let room = N.saturating_sub(head_len);
    let n = suffix.len().min(room);
    buf[head_len..head_len + n].copy_from_slice(&suffix.as_bytes()[..n]);
}

fn copy_into_dedup<'a>(buffers: &'a mut ScratchBuffers, p: &str) -> &'a str {
    // Guard against the case where `p` already aliases `dedup_buf` (the
    // caller passed us our own previous return value): copying a slice
    // onto itself is a no-op, but computing that via a borrow-checker-
    // friendly pointer comparison first avoids an unnecessary copy.
    if p.as_ptr() != buffers.dedup_buf.as_bytes().as_ptr() || p.len() != buffers.dedup_buf.len() {
        buffers.dedup_buf.set(p);
    }
    buffers.dedup_buf.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn fresh_buffers(pattern: &str, target: &str) -> ScratchBuffers {
        let mut cfg = Config {
            pattern: crate::state::FixedString::new(),
            target: crate::state::FixedString::new(),
            own_path: crate::state::FixedString::new(),
            debug: false,
        };
        cfg.pattern.set(pattern);
        cfg.target.set(target);
        // ScratchBuffers::new is private to global; replicate its seeding
        // here for isolated unit testing of the pure rewrite functions.
        let mut forward_buf = crate::state::FixedString::new();
        forward_buf.set(target);
        let mut reverse_buf = crate::state::FixedString::new();
        reverse_buf.set(pattern);
        ScratchBuffers {
            forward_buf,
            reverse_buf,
            link_buf: crate::state::FixedString::new(),
            dedup_buf: crate::state::FixedString::new(),
        }
    }

    #[test]
    fn forward_identity_outside_pattern() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let out = rewrite_forward(&mut b, "/nix/store", "/opt/store", "/usr/bin/env");
        assert_eq!(out, "/usr/bin/env");
    }

    #[test]
    fn forward_rewrite_substitutes_prefix() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let out = rewrite_forward(&mut b, "/nix/store", "/opt/store", "/nix/store/abc/lib.dylib");
        assert_eq!(out, "/opt/store/abc/lib.dylib");
    }

    #[test]
    fn forward_rewrite_exact_match() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let out = rewrite_forward(&mut b, "/nix/store", "/opt/store", "/nix/store");
        assert_eq!(out, "/opt/store");
    }

    #[test]
    fn reverse_rewrite_is_symmetric() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let out = rewrite_reverse(&mut b, "/nix/store", "/opt/store", "/opt/store/abc-bin");
        assert_eq!(out, "/nix/store/abc-bin");
    }

    #[test]
    fn reverse_is_inverse_of_forward() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        // Compute forward into a stack copy first: both rewrites share no
        // buffer here since forward writes forward_buf and reverse reads a
        // plain &str, so no aliasing hazard arises in this pure-function test.
        let forward_owned = {
            let out = rewrite_forward(&mut b, "/nix/store", "/opt/store", "/nix/store/x");
            out.to_string()
        };
        let back = rewrite_reverse(&mut b, "/nix/store", "/opt/store", &forward_owned);
        assert_eq!(back, "/nix/store/x");
    }

    #[test]
    fn empty_path_is_stable() {
        let mut b = fresh_buffers("/nix/store", "/opt/store");
        let out = rewrite_forward(&mut b, "/nix/store", "/opt/store", "");
        assert_eq!(out, "");
    }
}
