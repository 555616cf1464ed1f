//! The envelope patcher, part of Component F.
//!
//! Ground truth is `original_source/execve.c`'s `pspawn_patch_envp`: scan
//! the caller's `envp` for existing `DYLD_INSERT_LIBRARIES`/
//! `FAKEDIR_PATTERN`/`FAKEDIR_TARGET` entries, always *restore* (not merely
//! pass through) the pattern/target pair from the current process's own
//! configuration — defeating a sandboxed caller's attempt to strip them —
//! and prepend `OWN_PATH` plus each `PATTERN`-resident transitive Mach-O
//! dependency to the preload list.
//!
//! Per spec §4.F/§9's redesign note, `execve` vs. `posix_spawn` is
//! represented as a tagged [`ExecIntent`] rather than the historical
//! sentinel-pid convention.

use crate::state::MAX_PATH;
use libc::c_char;

/// `len("DYLD_INSERT_LIBRARIES=") + 10 * MAX_PATH`, matching spec §4.F's
/// stated bound on the rebuilt preload value (room for `OWN_PATH` plus up
/// to nine `:`-separated dependency paths).
pub const PRELOAD_VALUE_CAP: usize = 22 + 10 * MAX_PATH;
const ENTRY_CAP: usize = MAX_PATH + 32;
/// Upper bound on the number of entries in a process's environment that
/// this library will carry across an exec/spawn rewrite. Processes with
/// more variables than this see their overflow entries dropped rather than
/// the rewrite failing outright — the same truncate-rather-than-abort
/// posture spec §7 takes for over-long paths.
pub const MAX_ENV_VARS: usize = 512;

pub enum ExecIntent {
    Exec,
    Spawn { pid_out: *mut libc::pid_t, file_actions: *const libc::c_void, attrp: *const libc::c_void },
}

/// Owns the backing storage for a rebuilt environment array: the three
/// synthesized `FAKEDIR_*`/`DYLD_INSERT_LIBRARIES` entries, plus a pointer
/// table referencing those and the caller's untouched entries.
pub struct PatchedEnv {
    dyld_buf: [u8; PRELOAD_VALUE_CAP + 24],
    pattern_buf: [u8; ENTRY_CAP],
    target_buf: [u8; ENTRY_CAP],
    ptrs: [*const c_char; MAX_ENV_VARS + 4],
    count: usize,
}

impl PatchedEnv {
    /// A zeroed, not-yet-populated instance. The caller must keep this value
    /// pinned in place (behind a plain stack binding, never moved again)
    /// before passing `&mut` it to [`build_patched_env`]: the pointers that
    /// function writes into `ptrs` reference `dyld_buf`/`pattern_buf`/
    /// `target_buf` *within this same struct*, so a move afterward (which in
    /// Rust is a bare memcpy with no pointer fixup) would leave them dangling.
    pub fn empty() -> Self {
        Self {
            dyld_buf: [0u8; PRELOAD_VALUE_CAP + 24],
            pattern_buf: [0u8; ENTRY_CAP],
            target_buf: [0u8; ENTRY_CAP],
            ptrs: [std::ptr::null(); MAX_ENV_VARS + 4],
            count: 0,
        }
    }

    pub fn as_envp(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }
}

fn write_nul_terminated(dst: &mut [u8], s: &str) -> *const c_char {
    let n = s.len().min(dst.len().saturating_sub(1));
    dst[..n].copy_from_slice(&s.as_bytes()[..n]);
    dst[n] = 0;
    dst.as_ptr() as *const c_char
}

fn entry_name<'a>(entry: &'a str) -> &'a str {
    entry.split('=').next().unwrap_or(entry)
}

/// Fills a caller-owned, already-pinned-in-place [`PatchedEnv`]. Takes `out`
/// by mutable reference rather than returning one by value: every pointer
/// this function writes into `out.ptrs` is computed from `out`'s own fields,
/// so `out` must already be at its final resting place (a plain local in
/// the caller, never subsequently moved) before this runs — see
/// [`PatchedEnv::empty`].
///
/// # Safety
/// `envp` must be a valid, NUL-terminated array of NUL-terminated C strings,
/// as supplied to `execve`/`posix_spawn`. `out` must outlive the
/// `execve`/`posix_spawn` call its `as_envp()` is passed to.
pub unsafe fn build_patched_env(
    out: &mut PatchedEnv,
    envp: *const *const c_char,
    own_path: &str,
    dependencies: &[crate::state::FixedString<MAX_PATH>],
    pattern: &str,
    target: &str,
) {
    out.count = 0;
    {
        let buf = &mut out.dyld_buf;
        let mut pos = 0usize;
        let prefix = b"DYLD_INSERT_LIBRARIES=";
        buf[..prefix.len()].copy_from_slice(prefix);
        pos += prefix.len();
        pos += write_into(&mut buf[pos..], own_path);
        for dep in dependencies {
            pos += write_into(&mut buf[pos..], ":");
            pos += write_into(&mut buf[pos..], dep.as_str());
        }
        let _ = pos;
    }

    write_nul_terminated(&mut out.pattern_buf, &format_env_entry("FAKEDIR_PATTERN", pattern));
    write_nul_terminated(&mut out.target_buf, &format_env_entry("FAKEDIR_TARGET", target));

    // Copy through every caller entry that isn't one of the three we're
    // restoring/overwriting.
    if !envp.is_null() {
        let mut i = 0isize;
        loop {
            let entry_ptr = *envp.offset(i);
            if entry_ptr.is_null() {
                break;
            }
            if out.count >= MAX_ENV_VARS {
                break;
            }
            let cstr = std::ffi::CStr::from_ptr(entry_ptr);
            if let Ok(s) = cstr.to_str() {
                let name = entry_name(s);
                if name == "DYLD_INSERT_LIBRARIES" || name == "FAKEDIR_PATTERN" || name == "FAKEDIR_TARGET" {
                    i += 1;
                    continue;
                }
            }
            out.ptrs[out.count] = entry_ptr;
            out.count += 1;
            i += 1;
        }
    }

    out.ptrs[out.count] = out.dyld_buf.as_ptr() as *const c_char;
    out.count += 1;
    out.ptrs[out.count] = out.pattern_buf.as_ptr() as *const c_char;
    out.count += 1;
    out.ptrs[out.count] = out.target_buf.as_ptr() as *const c_char;
    out.count += 1;
    out.ptrs[out.count] = std::ptr::null();
}

fn write_into(dst: &mut [u8], s: &str) -> usize {
    let n = s.len().min(dst.len());
    dst[..n].copy_from_slice(&s.as_bytes()[..n]);
    n
}

/// Builds `"NAME=value"` without heap allocation beyond the small fixed
/// stack buffer `write_nul_terminated` writes into; this helper exists only
/// to keep call sites readable and is itself allocation-free (it returns a
/// value that is immediately copied into a fixed buffer by the caller).
fn format_env_entry(name: &str, value: &str) -> FormattedEntry {
    let mut buf = [0u8; ENTRY_CAP];
    let mut pos = 0usize;
    pos += write_into(&mut buf[pos..], name);
    pos += write_into(&mut buf[pos..], "=");
    pos += write_into(&mut buf[pos..], value);
    FormattedEntry { buf, len: pos }
}

struct FormattedEntry {
    buf: [u8; ENTRY_CAP],
    len: usize,
}

impl std::ops::Deref for FormattedEntry {
    type Target = str;
    fn deref(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FixedString;
    use std::ffi::CString;

    fn envp_from(entries: &[&str]) -> (Vec<CString>, Vec<*const c_char>) {
        let cstrings: Vec<CString> = entries.iter().map(|s| CString::new(*s).unwrap()).collect();
        let mut ptrs: Vec<*const c_char> = cstrings.iter().map(|c| c.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        (cstrings, ptrs)
    }

    #[test]
    fn restores_pattern_and_target_even_when_caller_omits_them() {
        let (_owned, ptrs) = envp_from(&["PATH=/usr/bin", "HOME=/root"]);
        let deps: Vec<FixedString<MAX_PATH>> = Vec::new();
        let mut patched = PatchedEnv::empty();
        unsafe {
            build_patched_env(&mut patched, ptrs.as_ptr(), "/nix/store/fakedir/libfakedir.dylib", &deps, "/nix/store", "/opt/store");
        };
        let found = unsafe { collect_env(patched.as_envp()) };
        assert!(found.iter().any(|e| e == "FAKEDIR_PATTERN=/nix/store"));
        assert!(found.iter().any(|e| e == "FAKEDIR_TARGET=/opt/store"));
        assert!(found.iter().any(|e| e.starts_with("DYLD_INSERT_LIBRARIES=/nix/store/fakedir/libfakedir.dylib")));
    }

    #[test]
    fn overwrites_rather_than_duplicates_existing_entries() {
        let (_owned, ptrs) = envp_from(&[
            "FAKEDIR_PATTERN=/tampered",
            "FAKEDIR_TARGET=/tampered",
            "DYLD_INSERT_LIBRARIES=/evil.dylib",
        ]);
        let deps: Vec<FixedString<MAX_PATH>> = Vec::new();
        let mut patched = PatchedEnv::empty();
        unsafe { build_patched_env(&mut patched, ptrs.as_ptr(), "/own/libfakedir.dylib", &deps, "/nix/store", "/opt/store") };
        let found = unsafe { collect_env(patched.as_envp()) };
        assert_eq!(found.iter().filter(|e| e.starts_with("FAKEDIR_PATTERN=")).count(), 1);
        assert_eq!(found.iter().filter(|e| e.starts_with("FAKEDIR_TARGET=")).count(), 1);
        assert!(found.iter().any(|e| e == "FAKEDIR_PATTERN=/nix/store"));
    }

    unsafe fn collect_env(envp: *const *const c_char) -> Vec<String> {
        let mut out = Vec::new();
        let mut i = 0isize;
        loop {
            let p = *envp.offset(i);
            if p.is_null() {
                break;
            }
            out.push(std::ffi::CStr::from_ptr(p).to_string_lossy().into_owned());
            i += 1;
        }
        out
    }
}
