//! The single process-wide instance of everything the interposer touches:
//! immutable configuration plus the mutex-guarded scratch buffers (spec §3).
//!
//! Allocated once, during init, via a raw `mmap` rather than `Box::new` —
//! the same choice the teacher codebase makes (see `state/init.rs`'s
//! `raw_mmap`/`ptr::write` construction) to sidestep the possibility of the
//! global allocator itself calling back into an interposed entry point
//! (`fstat`, `mmap`) while we are still bootstrapping.

use crate::config::Config;
use crate::state::{FixedString, MAX_PATH};
use crate::sync::RecursiveMutex;
use std::sync::atomic::{AtomicPtr, Ordering};

/// The five scratch buffers from spec §3, all guarded by one recursive
/// mutex so that "at most one wrapper mutates these buffers at a time" is
/// structurally guaranteed rather than merely documented.
pub struct ScratchBuffers {
    pub forward_buf: FixedString<MAX_PATH>,
    pub reverse_buf: FixedString<MAX_PATH>,
    pub link_buf: FixedString<MAX_PATH>,
    pub dedup_buf: FixedString<MAX_PATH>,
}

impl ScratchBuffers {
    fn new(config: &Config) -> Self {
        let mut forward_buf = FixedString::new();
        forward_buf.set(config.target.as_str());
        let mut reverse_buf = FixedString::new();
        reverse_buf.set(config.pattern.as_str());
        Self {
            forward_buf,
            reverse_buf,
            link_buf: FixedString::new(),
            dedup_buf: FixedString::new(),
        }
    }
}

pub struct FakedirState {
    pub config: Config,
    pub buffers: RecursiveMutex<ScratchBuffers>,
}

static STATE: AtomicPtr<FakedirState> = AtomicPtr::new(std::ptr::null_mut());

/// Allocates and installs the process-wide state. Must be called exactly
/// once, from the constructor, before `INITIALIZING` advances past
/// `RustInit`. Uses a raw anonymous `mmap` instead of the heap allocator.
///
/// # Safety
/// Must only be called once; the returned pointer is leaked for the
/// process's lifetime (there is no reasonable way to free memory backing a
/// `static` that every thread may be concurrently reading).
pub unsafe fn install(config: Config) {
    let buffers = ScratchBuffers::new(&config);
    let layout_size = std::mem::size_of::<FakedirState>();
    let mem = libc::mmap(
        std::ptr::null_mut(),
        layout_size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
    );
    assert_ne!(mem, libc::MAP_FAILED, "fakedir: mmap for process state failed");
    let ptr = mem as *mut FakedirState;
    std::ptr::write(ptr, FakedirState { config, buffers: RecursiveMutex::new(buffers) });
    STATE.store(ptr, Ordering::Release);
}

/// Returns the installed state, or `None` before init has run (or after a
/// validation failure has already called `exit`).
#[inline(always)]
pub fn get() -> Option<&'static FakedirState> {
    let ptr = STATE.load(Ordering::Acquire);
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { &*ptr })
    }
}

#[cfg(test)]
pub(crate) unsafe fn install_for_test(pattern: &str, target: &str) {
    let mut config = Config {
        pattern: FixedString::new(),
        target: FixedString::new(),
        own_path: FixedString::new(),
        debug: false,
    };
    config.pattern.set(pattern);
    config.target.set(target);
    install(config);
}
