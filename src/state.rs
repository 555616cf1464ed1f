//! Process-wide state shared by every wrapper: the tiered readiness flag,
//! the zero-allocation string/formatting primitives, the diagnostic ring
//! buffer, and the per-thread reentrancy guard.
//!
//! Nothing in this module may allocate on the heap once `INITIALIZING` has
//! left `Ready` — the library is injected into processes whose allocator
//! state is unknown at attach time.

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

/// Maximum path length this library will ever rewrite or resolve. Chosen to
/// match `libc::PATH_MAX` on Darwin (1024, including the trailing NUL).
pub const MAX_PATH: usize = libc::PATH_MAX as usize;

/// Tiered readiness state, checked by every wrapper before it does any work.
///
/// `Ready` wrappers fall straight through to the real syscall: this covers
/// the brief window between the dylib being mapped and its constructor
/// running, during which touching our own statics would be unsound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InitState {
    Ready = 0,
    RustInit = 1,
    EarlyInit = 2,
    Busy = 3,
}

impl InitState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => InitState::Ready,
            1 => InitState::RustInit,
            2 => InitState::EarlyInit,
            _ => InitState::Busy,
        }
    }
}

/// 0 = not yet initialized, 1 = Rust statics constructed, 2 = config
/// validated and buffers seeded, 3 = fully operational. Wrappers only take
/// the rewritten path once this reaches `EarlyInit` or later.
pub static INITIALIZING: AtomicU8 = AtomicU8::new(InitState::Ready as u8);

#[inline(always)]
pub fn init_state() -> InitState {
    InitState::from_u8(INITIALIZING.load(Ordering::Acquire))
}

#[inline(always)]
pub fn set_init_state(state: InitState) {
    INITIALIZING.store(state as u8, Ordering::Release);
}

/// A fixed-capacity, stack- or static-friendly UTF-8 string. Used everywhere
/// a `String` would ordinarily appear on the core rewrite path.
#[derive(Clone, Copy)]
pub struct FixedString<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FixedString<N> {
    pub const fn new() -> Self {
        Self { buf: [0u8; N], len: 0 }
    }

    /// Overwrites the contents with `s`, truncating at `N - 1` bytes.
    pub fn set(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(N.saturating_sub(1));
        self.buf[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Raw mutable access for code that needs to write past `set`'s
    /// whole-string-replace semantics (the prefix rewriter writes only a
    /// suffix after a pre-seeded head).
    pub fn raw_mut(&mut self) -> &mut [u8; N] {
        &mut self.buf
    }

    /// Marks the logical length after a raw write via `raw_mut`.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(N);
    }
}

/// Builds a NUL-terminated byte buffer one larger than `MAX_PATH`, suitable
/// for passing to a raw libc entry point expecting `*const c_char`.
pub fn cstr_buf(s: &str) -> [u8; MAX_PATH + 1] {
    let mut b = [0u8; MAX_PATH + 1];
    let n = s.len().min(MAX_PATH);
    b[..n].copy_from_slice(&s.as_bytes()[..n]);
    b
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> std::ops::Deref for FixedString<N> {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

/// A zero-allocation `fmt::Write` adapter over a caller-owned buffer, used
/// for every diagnostic message formatted on the core path.
pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl<'a> fmt::Write for StackWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = self.buf.len().saturating_sub(self.pos);
        let n = s.len().min(remaining);
        self.buf[self.pos..self.pos + n].copy_from_slice(&s.as_bytes()[..n]);
        self.pos += n;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "off" => Some(LogLevel::Off),
            _ => None,
        }
    }
}

pub static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Off as u8);

#[inline(always)]
pub fn log_level() -> LogLevel {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Trace,
        1 => LogLevel::Debug,
        2 => LogLevel::Info,
        3 => LogLevel::Warn,
        4 => LogLevel::Error,
        _ => LogLevel::Off,
    }
}

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Writes a pre-formatted diagnostic line to fd 2 (or the configured log
/// file descriptor) via the raw `write(2)` syscall. Never goes through
/// libc's buffered stdio, which allocates and may itself be interposed.
pub fn raw_log_line(bytes: &[u8]) {
    let fd = LOG_FD.load(Ordering::Relaxed);
    unsafe {
        libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len());
    }
}

pub static LOG_FD: AtomicI32 = AtomicI32::new(2);

/// Emits one diagnostic line at the given level, built in a stack buffer.
/// No-op (and does no formatting work) when `level` is below the configured
/// threshold, so disabled diagnostics cost only an atomic load.
macro_rules! fakedir_log {
    ($level:expr, $($arg:tt)*) => {{
        if $level >= $crate::state::log_level() {
            use std::fmt::Write as _;
            let mut buf = [0u8; 512];
            let mut w = $crate::state::StackWriter::new(&mut buf);
            let _ = write!(w, $($arg)*);
            let _ = write!(w, "\n");
            let n = w.as_bytes().len();
            $crate::state::raw_log_line(&buf[..n]);
        }
    }};
}
pub(crate) use fakedir_log;

macro_rules! fakedir_trace { ($($arg:tt)*) => { $crate::state::fakedir_log!($crate::state::LogLevel::Trace, $($arg)*) }; }
macro_rules! fakedir_debug { ($($arg:tt)*) => { $crate::state::fakedir_log!($crate::state::LogLevel::Debug, $($arg)*) }; }
macro_rules! fakedir_warn { ($($arg:tt)*) => { $crate::state::fakedir_log!($crate::state::LogLevel::Warn, $($arg)*) }; }
pub(crate) use fakedir_debug;
pub(crate) use fakedir_trace;
pub(crate) use fakedir_warn;

/// Per-thread reentrancy guard. Prevents a wrapper from deadlocking against
/// the process-wide mutex when a libc call it makes (e.g. `readlink` inside
/// the resolver) turns out to itself be interposed on some future entry
/// point we haven't audited.
///
/// Built on a raw `pthread_key_t` rather than `std::thread_local!`, whose
/// registration path is not guaranteed allocation-free on every libc.
pub struct ReentrancyGuard {
    key: libc::pthread_key_t,
}

impl ReentrancyGuard {
    /// Enters the guarded region for the current thread. Returns `None` if
    /// the thread is already inside a wrapper (the caller should fall
    /// through to the raw, uninterposed syscall) or if state isn't ready
    /// yet for the key machinery to be touched.
    pub fn enter() -> Option<ReentrancyGuardToken> {
        if init_state() == InitState::Ready {
            return None;
        }
        let key = get_reentrancy_key();
        let already = unsafe { !libc::pthread_getspecific(key).is_null() };
        if already {
            return None;
        }
        unsafe {
            libc::pthread_setspecific(key, 1usize as *const libc::c_void as *mut libc::c_void);
        }
        Some(ReentrancyGuardToken { key })
    }
}

pub struct ReentrancyGuardToken {
    key: libc::pthread_key_t,
}

impl Drop for ReentrancyGuardToken {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_setspecific(self.key, std::ptr::null());
        }
    }
}

static REENTRANCY_KEY: AtomicU32Key = AtomicU32Key::new();

struct AtomicU32Key {
    initialized: std::sync::atomic::AtomicBool,
    key: std::cell::UnsafeCell<libc::pthread_key_t>,
}

unsafe impl Sync for AtomicU32Key {}

impl AtomicU32Key {
    const fn new() -> Self {
        Self {
            initialized: std::sync::atomic::AtomicBool::new(false),
            key: std::cell::UnsafeCell::new(0),
        }
    }
}

fn get_reentrancy_key() -> libc::pthread_key_t {
    if !REENTRANCY_KEY.initialized.load(Ordering::Acquire) {
        let mut key: libc::pthread_key_t = 0;
        unsafe {
            libc::pthread_key_create(&mut key, None);
            *REENTRANCY_KEY.key.get() = key;
        }
        REENTRANCY_KEY.initialized.store(true, Ordering::Release);
    }
    unsafe { *REENTRANCY_KEY.key.get() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_string_truncates() {
        let mut s: FixedString<4> = FixedString::new();
        s.set("hello");
        assert_eq!(s.as_str(), "hel");
    }

    #[test]
    fn fixed_string_roundtrip() {
        let mut s: FixedString<16> = FixedString::new();
        s.set("/opt/store");
        assert_eq!(s.as_str(), "/opt/store");
    }

    #[test]
    fn stack_writer_truncates_at_capacity() {
        use std::fmt::Write as _;
        let mut buf = [0u8; 4];
        let mut w = StackWriter::new(&mut buf);
        let _ = write!(w, "abcdef");
        assert_eq!(w.as_bytes(), b"abcd");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("bogus"), None);
    }
}
