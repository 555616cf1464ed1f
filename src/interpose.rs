//! Component H: the `__DATA,__interpose` table.
//!
//! Ground truth is `vrift-inception-layer/src/interpose.rs`'s
//! `Interpose{new_func, old_func}` + `#[used] #[link_section = "__DATA,__interpose"]`
//! static-array pattern, simplified to this crate's own shape: every
//! `new_func` here points directly at one of `wrappers::*`'s `extern "C"`
//! functions (no intermediate C trampoline, since this library carries no C
//! toolchain dependency of its own), and `old_func` is the genuine libc
//! entry point dyld should stop routing callers to once this image is
//! loaded via `DYLD_INSERT_LIBRARIES`.
//!
//! Darwin's dynamic linker reads this section at load time and rewrites
//! every caller's reference to `old_func` into a jump to `new_func`; it has
//! no Linux equivalent; this crate targets macOS exclusively (spec is
//! Mach-O/Darwin throughout — `clonefile`, `exchangedata`, `setattrlist`,
//! the `*_np` renames) and so, unlike the teacher, carries no
//! `cfg(target_os = "linux")` half of this table.

use crate::wrappers::{attr, clone, dl, exec, fsmisc, link, stat};

#[repr(C)]
struct Interpose {
    new_func: *const (),
    old_func: *const (),
}

unsafe impl Sync for Interpose {}

macro_rules! interpose {
    ($static_name:ident, $new:path, $old:path) => {
        #[used]
        #[link_section = "__DATA,__interpose"]
        static $static_name: Interpose = Interpose {
            new_func: $new as *const (),
            old_func: $old as *const (),
        };
    };
}

interpose!(IT_OPEN, fsmisc::open, libc::open);
interpose!(IT_OPENAT, fsmisc::openat, libc::openat);
interpose!(IT_MKDIR, fsmisc::mkdir, libc::mkdir);
interpose!(IT_MKDIRAT, fsmisc::mkdirat, libc::mkdirat);
interpose!(IT_RMDIR, fsmisc::rmdir, libc::rmdir);
interpose!(IT_CHDIR, fsmisc::chdir, libc::chdir);
interpose!(IT_FOPEN, fsmisc::fopen, libc::fopen);
interpose!(IT_FREOPEN, fsmisc::freopen, libc::freopen);
interpose!(IT_GETCWD, fsmisc::getcwd, libc::getcwd);

interpose!(IT_STAT, stat::stat, libc::stat);
interpose!(IT_LSTAT, stat::lstat, libc::lstat);
// `stat64`/`lstat64` only exist as distinct link symbols on x86_64 Darwin;
// see the `#[cfg(target_arch = "x86_64")]` wrappers in wrappers/stat.rs.
#[cfg(target_arch = "x86_64")]
interpose!(IT_STAT64, stat::stat64, crate::ffi::stat64);
#[cfg(target_arch = "x86_64")]
interpose!(IT_LSTAT64, stat::lstat64, crate::ffi::lstat64);
interpose!(IT_ACCESS, stat::access, libc::access);
interpose!(IT_OPENDIR, stat::opendir, libc::opendir);
interpose!(IT_STATFS, stat::statfs, libc::statfs);
// `statfs64` has no distinct symbol in the `libc` crate on modern Darwin
// (it collapses to `statfs`'s own struct layout); both interpose entries
// target the same real entry point, matching `original_source/fakedir.c`'s
// own `interpose[]` array, which lists `my_statfs` against both names.
interpose!(IT_STATFS64, stat::statfs64, libc::statfs);
interpose!(IT_PATHCONF, stat::pathconf, libc::pathconf);
interpose!(IT_LISTXATTR, stat::listxattr, libc::listxattr);
interpose!(IT_SETXATTR, stat::setxattr, libc::setxattr);
interpose!(IT_REMOVEXATTR, stat::removexattr, libc::removexattr);
interpose!(IT_FSTATAT, stat::fstatat, libc::fstatat);
interpose!(IT_FACCESSAT, stat::faccessat, libc::faccessat);
interpose!(IT_SETATTRLISTAT, stat::setattrlistat, crate::ffi::setattrlistat);
interpose!(IT_GETATTRLISTAT, stat::getattrlistat, crate::ffi::getattrlistat);

interpose!(IT_CHFLAGS, attr::chflags, libc::chflags);
interpose!(IT_MKFIFO, attr::mkfifo, libc::mkfifo);
interpose!(IT_CHMOD, attr::chmod, libc::chmod);
interpose!(IT_CHOWN, attr::chown, libc::chown);
interpose!(IT_LCHOWN, attr::lchown, libc::lchown);
interpose!(IT_TRUNCATE, attr::truncate, libc::truncate);
interpose!(IT_UTIMES, attr::utimes, libc::utimes);
interpose!(IT_UNDELETE, attr::undelete, crate::ffi::undelete);
interpose!(IT_SETATTRLIST, attr::setattrlist, crate::ffi::setattrlist);
interpose!(IT_GETATTRLIST, attr::getattrlist, crate::ffi::getattrlist);
interpose!(IT_FCHMODAT, attr::fchmodat, libc::fchmodat);
interpose!(IT_FCHOWNAT, attr::fchownat, libc::fchownat);

interpose!(IT_CLONEFILE, clone::clonefile, crate::ffi::clonefile);
interpose!(IT_CLONEFILEAT, clone::clonefileat, crate::ffi::clonefileat);
interpose!(IT_FCLONEFILEAT, clone::fclonefileat, crate::ffi::fclonefileat);
interpose!(IT_EXCHANGEDATA, clone::exchangedata, crate::ffi::exchangedata);

interpose!(IT_DLOPEN, dl::dlopen, libc::dlopen);

interpose!(IT_EXECVE, exec::execve, libc::execve);
interpose!(IT_POSIX_SPAWN, exec::posix_spawn, libc::posix_spawn);
interpose!(IT_POSIX_SPAWNP, exec::posix_spawnp, libc::posix_spawnp);

interpose!(IT_LINK, link::link, libc::link);
interpose!(IT_LINKAT, link::linkat, libc::linkat);
interpose!(IT_UNLINK, link::unlink, libc::unlink);
interpose!(IT_UNLINKAT, link::unlinkat, libc::unlinkat);
interpose!(IT_SYMLINK, link::symlink, libc::symlink);
interpose!(IT_SYMLINKAT, link::symlinkat, libc::symlinkat);
interpose!(IT_READLINK, link::readlink, libc::readlink);
interpose!(IT_READLINKAT, link::readlinkat, libc::readlinkat);
interpose!(IT_RENAME, link::rename, libc::rename);
interpose!(IT_RENAMEAT, link::renameat, libc::renameat);
interpose!(IT_RENAMEX_NP, link::renamex_np, crate::ffi::renamex_np);
interpose!(IT_RENAMEATX_NP, link::renameatx_np, crate::ffi::renameatx_np);
