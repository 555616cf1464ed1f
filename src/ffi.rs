//! Raw declarations for the handful of Darwin-only libc entry points the
//! `libc` crate does not expose: `clonefile` and kin, `exchangedata`,
//! `setattrlist`/`getattrlist` and their `*at` forms, `renamex_np`,
//! `renameatx_np`, the long-deprecated `undelete`, and the x86_64-only
//! `stat64`/`lstat64` pair. Declared here once so every other module can
//! treat them like any other `libc::` item.

use libc::{c_char, c_int, c_uint, c_void};

/// `clonefile`'s "don't follow a source symlink" bit (`<sys/clonefile.h>`).
pub const CLONE_NOFOLLOW: c_int = 0x0001;
/// `exchangedata`'s "don't follow a symlink" bit (`<sys/attr.h>`).
pub const FSOPT_NOFOLLOW: c_uint = 0x00000001;

#[repr(C)]
pub struct attrlist {
    pub bitmapcount: u16,
    pub reserved: u16,
    pub commonattr: u32,
    pub volattr: u32,
    pub dirattr: u32,
    pub fileattr: u32,
    pub forkattr: u32,
}

extern "C" {
    /// x86_64-only legacy symbols; the `libc` crate does not carry them on
    /// modern Darwin. See `wrappers/stat.rs`'s `#[cfg(target_arch =
    /// "x86_64")]`-gated `stat64`/`lstat64` wrappers.
    #[cfg(target_arch = "x86_64")]
    pub fn stat64(path: *const c_char, buf: *mut libc::stat) -> c_int;
    #[cfg(target_arch = "x86_64")]
    pub fn lstat64(path: *const c_char, buf: *mut libc::stat) -> c_int;

    pub fn clonefile(src: *const c_char, dst: *const c_char, flags: c_int) -> c_int;
    pub fn clonefileat(src_dirfd: c_int, src: *const c_char, dst_dirfd: c_int, dst: *const c_char, flags: c_int) -> c_int;
    pub fn fclonefileat(srcfd: c_int, dst_dirfd: c_int, dst: *const c_char, flags: c_int) -> c_int;
    pub fn exchangedata(path1: *const c_char, path2: *const c_char, options: c_uint) -> c_int;
    pub fn renamex_np(old: *const c_char, new: *const c_char, flags: c_uint) -> c_int;
    pub fn renameatx_np(olddirfd: c_int, old: *const c_char, newdirfd: c_int, new: *const c_char, flags: c_uint) -> c_int;
    pub fn undelete(path: *const c_char) -> c_int;
    pub fn setattrlist(
        path: *const c_char,
        attrlist: *mut attrlist,
        attr_buf: *mut c_void,
        attr_buf_size: usize,
        options: c_uint,
    ) -> c_int;
    pub fn getattrlist(
        path: *const c_char,
        attrlist: *mut attrlist,
        attr_buf: *mut c_void,
        attr_buf_size: usize,
        options: c_uint,
    ) -> c_int;
    pub fn setattrlistat(
        dirfd: c_int,
        path: *const c_char,
        attrlist: *mut attrlist,
        attr_buf: *mut c_void,
        attr_buf_size: usize,
        options: c_uint,
    ) -> c_int;
    pub fn getattrlistat(
        dirfd: c_int,
        path: *const c_char,
        attrlist: *mut attrlist,
        attr_buf: *mut c_void,
        attr_buf_size: usize,
        options: c_uint,
    ) -> c_int;
}
