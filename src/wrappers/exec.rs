//! `execve`/`posix_spawn`: the entry points that hand off into Component F's
//! unified `exec_rewrite`. Both funnel into the same implementation via a
//! tagged [`crate::exec::spawn::ExecIntent`] rather than the historical
//! sentinel-pid convention (spec §9).

use crate::exec::exec_rewrite;
use crate::exec::spawn::ExecIntent;
use crate::reals::{real_execve, real_posix_spawn, real_posix_spawnp};
use crate::state::{fakedir_debug, ReentrancyGuard};
use libc::{c_char, c_int, pid_t};

#[no_mangle]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real_execve(path, argv, envp);
    };
    let Ok(s) = std::ffi::CStr::from_ptr(path).to_str() else {
        return real_execve(path, argv, envp);
    };
    fakedir_debug!("execve('{}')", s);
    exec_rewrite(ExecIntent::Exec, s, argv, envp)
}

#[no_mangle]
pub unsafe extern "C" fn posix_spawn(
    pid: *mut pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real_posix_spawn(pid, path, file_actions, attrp, argv, envp);
    };
    let Ok(s) = std::ffi::CStr::from_ptr(path).to_str() else {
        return real_posix_spawn(pid, path, file_actions, attrp, argv, envp);
    };
    fakedir_debug!("posix_spawn('{}')", s);
    let intent = ExecIntent::Spawn {
        pid_out: pid,
        file_actions: file_actions as *const libc::c_void,
        attrp: attrp as *const libc::c_void,
    };
    exec_rewrite(intent, s, argv, envp)
}

/// `posix_spawnp` differs from `posix_spawn` only in performing a `PATH`
/// search when `file` has no slash; since our resolver and the exec
/// rewriter both operate on an already-resolved absolute path, the search
/// is left to the real entry point by falling through whenever the given
/// name isn't itself rewritable (spec §6 lists this alongside `posix_spawn`
/// as sharing the unified `ExecIntent::Spawn` path).
#[no_mangle]
pub unsafe extern "C" fn posix_spawnp(
    pid: *mut pid_t,
    file: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(_guard) = ReentrancyGuard::enter() else {
        return real_posix_spawnp(pid, file, file_actions, attrp, argv, envp);
    };
    let Ok(s) = std::ffi::CStr::from_ptr(file).to_str() else {
        return real_posix_spawnp(pid, file, file_actions, attrp, argv, envp);
    };
    if !s.contains('/') {
        // No slash: this is a PATH-relative lookup, which our resolver
        // cannot meaningfully rewrite. Let the real posix_spawnp perform
        // its own search.
        return real_posix_spawnp(pid, file, file_actions, attrp, argv, envp);
    }
    fakedir_debug!("posix_spawnp('{}')", s);
    let intent = ExecIntent::Spawn {
        pid_out: pid,
        file_actions: file_actions as *const libc::c_void,
        attrp: attrp as *const libc::c_void,
    };
    exec_rewrite(intent, s, argv, envp)
}
