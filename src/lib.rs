//! `fakedir`: a `DYLD_INSERT_LIBRARIES` interposer that substitutes one
//! absolute directory prefix (`FAKEDIR_PATTERN`) for another
//! (`FAKEDIR_TARGET`) in every filesystem path a process observes or
//! manipulates.
//!
//! This crate is a `cdylib` with no public Rust API of its own — every
//! externally meaningful symbol is one of the `#[no_mangle] extern "C"`
//! wrappers in [`wrappers`], bound to its real counterpart by the static
//! table in [`interpose`]. The module tree below mirrors the component
//! breakdown: [`path`] and [`router`] are the rewrite/resolve core,
//! [`wrappers`] and [`interpose`] are the interposition surface, [`exec`]
//! is the process-launch rewriter, and [`config`]/[`global`]/[`state`] are
//! the ambient init/logging/configuration layer every wrapper depends on.

pub mod config;
pub mod exec;
pub mod ffi;
pub mod global;
pub mod interpose;
pub mod path;
pub mod reals;
pub mod router;
pub mod state;
pub mod sync;
pub mod wrappers;

use state::{fakedir_debug, fakedir_warn, set_init_state, InitState, LogLevel};
use std::sync::atomic::{AtomicBool, Ordering};

/// `_dyld_image_count`/`_dyld_get_image_name`, from `<mach-o/dyld.h>`. Not
/// exposed by the `libc` crate; declared here exactly as `original_source/
/// fakedir.c`'s own constructor uses them to discover `OWN_PATH` by
/// matching the loaded-image list for a `libfakedir.dylib` suffix.
extern "C" {
    fn _dyld_image_count() -> u32;
    fn _dyld_get_image_name(image_index: u32) -> *const libc::c_char;
}

const SELF_IMAGE_SUFFIX: &str = "libfakedir.dylib";

/// Guards against the library being mapped twice into the same process
/// (spec §4.E's "idempotence guard prevents double-initialization if the
/// library is loaded twice").
static INIT_STARTED: AtomicBool = AtomicBool::new(false);

/// Walks the dyld image list looking for this library's own path, matching
/// by suffix since the full path (under whichever of PATTERN/TARGET the
/// loader itself resolved it through) isn't known in advance.
fn discover_own_path() -> Option<String> {
    unsafe {
        let n = _dyld_image_count();
        for i in 0..n {
            let ptr = _dyld_get_image_name(i);
            if ptr.is_null() {
                continue;
            }
            let name = std::ffi::CStr::from_ptr(ptr).to_string_lossy();
            if name.ends_with(SELF_IMAGE_SUFFIX) {
                return Some(name.into_owned());
            }
        }
    }
    None
}

/// Installs a raw `write(2)`-based panic hook and aborts instead of
/// unwinding. Unwinding out of a `#[no_mangle] extern "C"` wrapper back
/// into an arbitrary host process's call stack is undefined behavior;
/// `panic = "abort"` in `Cargo.toml` already makes this the only reachable
/// outcome, but installing the hook first means the diagnostic reaches fd 2
/// through the same allocation-free path as every other log line rather
/// than through the default handler's buffered stderr writer (grounded in
/// `vrift-inception-layer/src/state/init.rs`'s `install_panic_handler`).
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let mut buf = [0u8; 512];
        use std::fmt::Write as _;
        let mut w = state::StackWriter::new(&mut buf);
        let _ = write!(w, "fakedir: panic: {}\n", info);
        let n = w.as_bytes().len();
        state::raw_log_line(&buf[..n]);
    }));
}

/// One-shot initializer, run from the `__DATA,__mod_init_func` constructor
/// below. Validates configuration, discovers `OWN_PATH`, installs the
/// process-wide state, and advances [`state::INITIALIZING`] through its
/// tiers so wrappers stop falling through to the real syscalls once this
/// returns (spec §4.E).
///
/// # Safety
/// Must run at most once, before any other thread in the process can have
/// observed [`InitState::EarlyInit`] or later — true of a dylib
/// constructor, which dyld runs single-threaded before `main`.
unsafe fn fakedir_init() {
    if INIT_STARTED.swap(true, Ordering::AcqRel) {
        return;
    }
    set_init_state(InitState::RustInit);
    install_panic_hook();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            let line = format!("fakedir: {}\n", e);
            libc::write(2, line.as_ptr() as *const libc::c_void, line.len());
            libc::exit(1);
        }
    };

    if let Some(level) = config::Config::log_level_from_env() {
        state::set_log_level(level);
    } else if config.debug {
        state::set_log_level(LogLevel::Debug);
    }

    if let Some(path) = config::Config::log_file_from_env() {
        let pid = libc::getpid();
        let full = format!("{}.{}", path, pid);
        if let Ok(cpath) = std::ffi::CString::new(full) {
            let fd = libc::open(cpath.as_ptr(), libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND, 0o644);
            if fd >= 0 {
                state::LOG_FD.store(fd, Ordering::Relaxed);
            }
        }
    }

    let mut config = config;
    match discover_own_path() {
        Some(p) => config.own_path.set(&p),
        None => fakedir_warn!("fakedir: could not locate own image in dyld image list"),
    }

    set_init_state(InitState::EarlyInit);
    global::install(config);
    set_init_state(InitState::Busy);

    if let Some(state) = global::get() {
        fakedir_debug!(
            "fakedir initialized: '{}' => '{}' (own_path='{}')",
            state.config.pattern.as_str(),
            state.config.target.as_str(),
            state.config.own_path.as_str(),
        );
    }
}

/// Releases the process-wide mutex on image unload. dyld runs this when
/// the library is explicitly unloaded (rare for a `DYLD_INSERT_LIBRARIES`
/// injection, which normally lives for the process's whole life, but the
/// contract in spec §3/§4.E is unconditional).
unsafe fn fakedir_fini() {
    if let Some(state) = global::get() {
        state.buffers.destroy();
    }
}

#[used]
#[link_section = "__DATA,__mod_init_func"]
static FAKEDIR_INIT: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        fakedir_init();
    }
    init
};

#[used]
#[link_section = "__DATA,__mod_term_func"]
static FAKEDIR_FINI: unsafe extern "C" fn() = {
    unsafe extern "C" fn fini() {
        fakedir_fini();
    }
    fini
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_path_suffix_match_is_exact() {
        assert!("libfakedir.dylib".ends_with(SELF_IMAGE_SUFFIX));
        assert!("/nix/store/abc/lib/libfakedir.dylib".ends_with(SELF_IMAGE_SUFFIX));
        assert!(!"/nix/store/abc/lib/libfakedir.dylib.bak".ends_with(SELF_IMAGE_SUFFIX));
    }

    #[test]
    fn init_state_roundtrips_through_u8() {
        assert_eq!(InitState::from_u8(InitState::Busy as u8), InitState::Busy);
        assert_eq!(InitState::from_u8(InitState::EarlyInit as u8), InitState::EarlyInit);
        assert_eq!(InitState::from_u8(InitState::Ready as u8), InitState::Ready);
    }
}
