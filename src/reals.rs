//! Access to the real (un-interposed) libc entry points.
//!
//! Two complementary mechanisms, both grounded in the teacher codebase:
//!
//! - [`RealSymbol`] lazily resolves a symbol via `dlsym(RTLD_NEXT, ...)`,
//!   for the handful of functions the resolver needs that are *not*
//!   themselves in our interpose table (`readlink`/`readlinkat`, used
//!   internally by the symlink resolver so that it never reenters the
//!   interposer — see spec §4.B).
//! - The interpose table (`interpose.rs`) additionally records each
//!   wrapper's `old_func` pointer at static-initialization time; wrappers
//!   that need to call through to "the real version of the function they
//!   themselves replace" use that recorded pointer directly rather than
//!   `dlsym`, since `dlsym` itself is not safe to call from inside another
//!   interposed entry point during early dyld bootstrap (Pattern the
//!   teacher calls "2682": get_real_shim! bypasses it for exactly this
//!   reason).

use libc::{c_char, c_void};
use std::sync::atomic::{AtomicPtr, Ordering};

pub struct RealSymbol {
    ptr: AtomicPtr<c_void>,
    name: &'static str,
}

impl RealSymbol {
    pub const fn new(name: &'static str) -> Self {
        Self { ptr: AtomicPtr::new(std::ptr::null_mut()), name }
    }

    /// # Safety
    /// The returned pointer must be transmuted to the correct function
    /// signature by the caller before being invoked.
    pub unsafe fn get(&self) -> *mut c_void {
        let p = self.ptr.load(Ordering::Acquire);
        if !p.is_null() {
            return p;
        }
        let f = libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr() as *const c_char);
        self.ptr.store(f, Ordering::Release);
        f
    }
}

pub static REAL_READLINK: RealSymbol = RealSymbol::new("readlink\0");
pub static REAL_READLINKAT: RealSymbol = RealSymbol::new("readlinkat\0");

/// Declares a `RealSymbol` static plus a typed `dlsym(RTLD_NEXT, ...)`
/// call-through accessor for one real libc entry point. Every wrapper in
/// `wrappers/` reaches the genuine syscall through one of these rather than
/// calling the `libc::` item directly, since the latter would resolve back
/// into our own interposed symbol (see module docs above).
macro_rules! real_fn {
    ($static_name:ident, $sym:literal, $name:ident ( $($arg:ident : $ty:ty),* $(,)? ) -> $ret:ty, $fail:expr) => {
        pub static $static_name: RealSymbol = RealSymbol::new(concat!($sym, "\0"));

        #[allow(clippy::missing_safety_doc)]
        pub unsafe fn $name($($arg: $ty),*) -> $ret {
            let f = $static_name.get();
            if f.is_null() {
                return $fail;
            }
            let f: unsafe extern "C" fn($($ty),*) -> $ret = std::mem::transmute(f);
            f($($arg),*)
        }
    };
}

real_fn!(REAL_OPEN, "open", real_open(path: *const c_char, flags: i32, mode: libc::mode_t) -> i32, -1);
real_fn!(REAL_OPENAT, "openat", real_openat(dirfd: i32, path: *const c_char, flags: i32, mode: libc::mode_t) -> i32, -1);
real_fn!(REAL_ACCESS, "access", real_access(path: *const c_char, mode: i32) -> i32, -1);
real_fn!(REAL_GETCWD, "getcwd", real_getcwd(buf: *mut c_char, size: usize) -> *mut c_char, std::ptr::null_mut());
real_fn!(REAL_STAT, "stat", real_stat(path: *const c_char, buf: *mut libc::stat) -> i32, -1);
real_fn!(REAL_LSTAT, "lstat", real_lstat(path: *const c_char, buf: *mut libc::stat) -> i32, -1);
real_fn!(REAL_FSTATAT, "fstatat", real_fstatat(dirfd: i32, path: *const c_char, buf: *mut libc::stat, flags: i32) -> i32, -1);
real_fn!(REAL_FACCESSAT, "faccessat", real_faccessat(dirfd: i32, path: *const c_char, mode: i32, flags: i32) -> i32, -1);
real_fn!(REAL_OPENDIR, "opendir", real_opendir(path: *const c_char) -> *mut libc::DIR, std::ptr::null_mut());
real_fn!(REAL_CHFLAGS, "chflags", real_chflags(path: *const c_char, flags: libc::c_ulong) -> i32, -1);
real_fn!(REAL_MKFIFO, "mkfifo", real_mkfifo(path: *const c_char, mode: libc::mode_t) -> i32, -1);
real_fn!(REAL_CHMOD, "chmod", real_chmod(path: *const c_char, mode: libc::mode_t) -> i32, -1);
real_fn!(REAL_FCHMODAT, "fchmodat", real_fchmodat(dirfd: i32, path: *const c_char, mode: libc::mode_t, flags: i32) -> i32, -1);
real_fn!(REAL_CHOWN, "chown", real_chown(path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> i32, -1);
real_fn!(REAL_LCHOWN, "lchown", real_lchown(path: *const c_char, uid: libc::uid_t, gid: libc::gid_t) -> i32, -1);
real_fn!(REAL_FCHOWNAT, "fchownat", real_fchownat(dirfd: i32, path: *const c_char, uid: libc::uid_t, gid: libc::gid_t, flags: i32) -> i32, -1);
real_fn!(REAL_LINK, "link", real_link(old: *const c_char, new: *const c_char) -> i32, -1);
real_fn!(REAL_LINKAT, "linkat", real_linkat(olddirfd: i32, old: *const c_char, newdirfd: i32, new: *const c_char, flags: i32) -> i32, -1);
real_fn!(REAL_UNLINK, "unlink", real_unlink(path: *const c_char) -> i32, -1);
real_fn!(REAL_UNLINKAT, "unlinkat", real_unlinkat(dirfd: i32, path: *const c_char, flags: i32) -> i32, -1);
real_fn!(REAL_SYMLINK, "symlink", real_symlink(target: *const c_char, linkpath: *const c_char) -> i32, -1);
real_fn!(REAL_SYMLINKAT, "symlinkat", real_symlinkat(target: *const c_char, newdirfd: i32, linkpath: *const c_char) -> i32, -1);
real_fn!(REAL_CLONEFILE, "clonefile", real_clonefile(src: *const c_char, dst: *const c_char, flags: i32) -> i32, -1);
real_fn!(REAL_CLONEFILEAT, "clonefileat", real_clonefileat(src_dirfd: i32, src: *const c_char, dst_dirfd: i32, dst: *const c_char, flags: i32) -> i32, -1);
real_fn!(REAL_FCLONEFILEAT, "fclonefileat", real_fclonefileat(srcfd: i32, dst_dirfd: i32, dst: *const c_char, flags: i32) -> i32, -1);
real_fn!(REAL_EXCHANGEDATA, "exchangedata", real_exchangedata(path1: *const c_char, path2: *const c_char, options: u32) -> i32, -1);
real_fn!(REAL_TRUNCATE, "truncate", real_truncate(path: *const c_char, length: libc::off_t) -> i32, -1);
real_fn!(REAL_UTIMES, "utimes", real_utimes(path: *const c_char, times: *const libc::timeval) -> i32, -1);
real_fn!(REAL_RENAME, "rename", real_rename(old: *const c_char, new: *const c_char) -> i32, -1);
real_fn!(REAL_RENAMEX_NP, "renamex_np", real_renamex_np(old: *const c_char, new: *const c_char, flags: u32) -> i32, -1);
real_fn!(REAL_RENAMEAT, "renameat", real_renameat(olddirfd: i32, old: *const c_char, newdirfd: i32, new: *const c_char) -> i32, -1);
real_fn!(REAL_RENAMEATX_NP, "renameatx_np", real_renameatx_np(olddirfd: i32, old: *const c_char, newdirfd: i32, new: *const c_char, flags: u32) -> i32, -1);
real_fn!(REAL_UNDELETE, "undelete", real_undelete(path: *const c_char) -> i32, -1);
real_fn!(REAL_MKDIR, "mkdir", real_mkdir(path: *const c_char, mode: libc::mode_t) -> i32, -1);
real_fn!(REAL_MKDIRAT, "mkdirat", real_mkdirat(dirfd: i32, path: *const c_char, mode: libc::mode_t) -> i32, -1);
real_fn!(REAL_RMDIR, "rmdir", real_rmdir(path: *const c_char) -> i32, -1);
real_fn!(REAL_CHDIR, "chdir", real_chdir(path: *const c_char) -> i32, -1);
real_fn!(REAL_STATFS, "statfs", real_statfs(path: *const c_char, buf: *mut libc::statfs) -> i32, -1);
real_fn!(REAL_LISTXATTR, "listxattr", real_listxattr(path: *const c_char, namebuf: *mut c_char, size: usize, options: i32) -> isize, -1);
real_fn!(REAL_SETXATTR, "setxattr", real_setxattr(path: *const c_char, name: *const c_char, value: *const c_void, size: usize, position: u32, options: i32) -> i32, -1);
real_fn!(REAL_REMOVEXATTR, "removexattr", real_removexattr(path: *const c_char, name: *const c_char, options: i32) -> i32, -1);
real_fn!(REAL_PATHCONF, "pathconf", real_pathconf(path: *const c_char, name: i32) -> libc::c_long, -1);
real_fn!(REAL_SETATTRLIST, "setattrlist", real_setattrlist(path: *const c_char, attrlist: *mut crate::ffi::attrlist, attr_buf: *mut c_void, attr_buf_size: usize, options: u32) -> i32, -1);
real_fn!(REAL_GETATTRLIST, "getattrlist", real_getattrlist(path: *const c_char, attrlist: *mut crate::ffi::attrlist, attr_buf: *mut c_void, attr_buf_size: usize, options: u32) -> i32, -1);
real_fn!(REAL_SETATTRLISTAT, "setattrlistat", real_setattrlistat(dirfd: i32, path: *const c_char, attrlist: *mut crate::ffi::attrlist, attr_buf: *mut c_void, attr_buf_size: usize, options: u32) -> i32, -1);
real_fn!(REAL_GETATTRLISTAT, "getattrlistat", real_getattrlistat(dirfd: i32, path: *const c_char, attrlist: *mut crate::ffi::attrlist, attr_buf: *mut c_void, attr_buf_size: usize, options: u32) -> i32, -1);
real_fn!(REAL_DLOPEN, "dlopen", real_dlopen(path: *const c_char, mode: i32) -> *mut c_void, std::ptr::null_mut());
real_fn!(REAL_FOPEN, "fopen", real_fopen(path: *const c_char, mode: *const c_char) -> *mut libc::FILE, std::ptr::null_mut());
real_fn!(REAL_FREOPEN, "freopen", real_freopen(path: *const c_char, mode: *const c_char, stream: *mut libc::FILE) -> *mut libc::FILE, std::ptr::null_mut());

// `execve`/`posix_spawn`/`posix_spawnp` are themselves interposed (see
// `interpose.rs`'s `IT_EXECVE`/`IT_POSIX_SPAWN`/`IT_POSIX_SPAWNP`): once this
// image is loaded, any reference to the plain `libc::` symbol — including
// one made from inside this dylib's own code — binds to our wrapper, not the
// kernel entry point. Calling `libc::execve` from within the exec rewriter
// itself would therefore call straight back into `wrappers::exec::execve`,
// which re-enters `exec_rewrite`... an infinite loop rather than ever
// actually exec'ing. Every genuine invocation of these three calls must go
// through these `dlsym(RTLD_NEXT, ...)`-resolved accessors instead, exactly
// as the resolver already does for `readlink`/`readlinkat` (see the module
// doc comment above).
real_fn!(REAL_EXECVE, "execve", real_execve(path: *const c_char, argv: *const *const c_char, envp: *const *const c_char) -> i32, -1);
real_fn!(REAL_POSIX_SPAWN, "posix_spawn", real_posix_spawn(pid: *mut libc::pid_t, path: *const c_char, file_actions: *const libc::posix_spawn_file_actions_t, attrp: *const libc::posix_spawnattr_t, argv: *const *const c_char, envp: *const *const c_char) -> i32, -1);
real_fn!(REAL_POSIX_SPAWNP, "posix_spawnp", real_posix_spawnp(pid: *mut libc::pid_t, file: *const c_char, file_actions: *const libc::posix_spawn_file_actions_t, attrp: *const libc::posix_spawnattr_t, argv: *const *const c_char, envp: *const *const c_char) -> i32, -1);

/// `readlink`, called through the real (non-interposed) symbol. Returns the
/// link length, or a negative value on failure (mirroring the raw syscall).
pub unsafe fn real_readlink(path: *const c_char, buf: *mut c_char, bufsiz: usize) -> isize {
    let f = REAL_READLINK.get();
    if f.is_null() {
        return -1;
    }
    let f: unsafe extern "C" fn(*const c_char, *mut c_char, usize) -> isize = std::mem::transmute(f);
    f(path, buf, bufsiz)
}

/// `readlinkat`, called through the real (non-interposed) symbol.
pub unsafe fn real_readlinkat(dirfd: i32, path: *const c_char, buf: *mut c_char, bufsiz: usize) -> isize {
    let f = REAL_READLINKAT.get();
    if f.is_null() {
        return -1;
    }
    let f: unsafe extern "C" fn(i32, *const c_char, *mut c_char, usize) -> isize =
        std::mem::transmute(f);
    f(dirfd, path, buf, bufsiz)
}
