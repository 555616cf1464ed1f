//! Component F: the unified exec/spawn rewriter.
//!
//! Ground truth is `original_source/fakedir.c`'s `my_execve` dispatch (open
//! target read-only, probe `X_OK`, peek the first bytes, branch on `#!`)
//! combined with `execve.c`'s `pspawn_patch_envp`/`pspawn_parse_shebang`.

pub mod macho;
pub mod shebang;
pub mod spawn;

use crate::path::resolve::resolve_all;
use crate::reals::{real_execve, real_posix_spawn};
use crate::state::{cstr_buf, fakedir_debug, FixedString, MAX_PATH};
use spawn::{build_patched_env, ExecIntent};

/// Upper bound on the rebuilt `argv` a shebang re-dispatch assembles on the
/// stack: interpreter, optional argument, the caller's own argv, plus the
/// trailing NULL. Generous for any real script invocation.
const MAX_SHEBANG_ARGV: usize = 256;

/// Entry point shared by the `execve`/`posix_spawn`/`posix_spawnp` wrappers.
/// `path` is the caller's original (un-rewritten) target; `argv`/`envp` are
/// the caller's raw C arrays. Returns the value the wrapper should hand
/// back to its caller (a raw `execve`/`posix_spawn` return, since on
/// success `execve` never returns).
///
/// # Safety
/// `argv`/`envp` must be valid NUL-terminated arrays of NUL-terminated C
/// strings, as passed in by the original `execve`/`posix_spawn` caller.
pub unsafe fn exec_rewrite(
    intent: ExecIntent,
    path: &str,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
) -> i32 {
    let Some(state) = crate::global::get() else {
        return fallback_real_exec(&intent, path, argv, envp);
    };

    let mut buffers = state.buffers.lock();
    let pattern = state.config.pattern.as_str();
    let target = state.config.target.as_str();

    let mut p: FixedString<MAX_PATH> = FixedString::new();
    p.set(path);
    let resolved = match resolve_all(&mut buffers, pattern, target, -1, &p) {
        Ok(r) => r,
        Err(_) => p,
    };
    drop(buffers);

    let resolved_c = cstr_buf(resolved.as_str());
    let resolved_cptr = resolved_c.as_ptr() as *const libc::c_char;

    let can_exec = libc::access(resolved_cptr, libc::X_OK) == 0;

    let mut head = [0u8; MAX_PATH];
    let mut head_len = 0usize;
    let fd = libc::open(resolved_cptr, libc::O_RDONLY);
    if fd >= 0 {
        let n = libc::read(fd, head.as_mut_ptr() as *mut libc::c_void, head.len());
        if n > 0 {
            head_len = n as usize;
        }
        libc::close(fd);
    }

    if can_exec && head_len >= 2 && &head[..2] == b"#!" {
        let line = std::str::from_utf8(&head[2..head_len]).unwrap_or("");
        if let Some(parsed) = shebang::parse_shebang_line(line) {
            fakedir_debug!("exec: '{}' has a shebang, re-dispatching through '{}'", path, parsed.interpreter);
            return exec_shebang(intent, &parsed, argv, envp);
        }
    }

    exec_patch_envp(intent, resolved.as_str(), argv, envp)
}

unsafe fn exec_shebang(
    intent: ExecIntent,
    parsed: &shebang::ParsedShebang<'_>,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
) -> i32 {
    // New argv: interpreter, optional argument, then the caller's original
    // argv verbatim (including its own argv[0], which is already the script
    // path the caller invoked). Assembled entirely on the stack, matching
    // the C source's VLA-based rebuild.
    let mut interp: FixedString<MAX_PATH> = FixedString::new();
    interp.set(parsed.interpreter);
    let interp_cbuf = cstr_buf(interp.as_str());

    let mut arg_cbuf = [0u8; MAX_PATH + 1];
    if let Some(arg) = parsed.argument {
        arg_cbuf = cstr_buf(arg);
    }

    let mut argv_ptrs: [*const libc::c_char; MAX_SHEBANG_ARGV] = [std::ptr::null(); MAX_SHEBANG_ARGV];
    let mut n = 0usize;
    argv_ptrs[n] = interp_cbuf.as_ptr() as *const libc::c_char;
    n += 1;
    if parsed.argument.is_some() {
        argv_ptrs[n] = arg_cbuf.as_ptr() as *const libc::c_char;
        n += 1;
    }
    let mut i = 0isize;
    while n < MAX_SHEBANG_ARGV - 1 {
        let entry = *argv.offset(i);
        if entry.is_null() {
            break;
        }
        argv_ptrs[n] = entry;
        n += 1;
        i += 1;
    }
    argv_ptrs[n] = std::ptr::null();

    exec_rewrite(intent, interp.as_str(), argv_ptrs.as_ptr(), envp)
}

unsafe fn exec_patch_envp(
    intent: ExecIntent,
    resolved_path: &str,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
) -> i32 {
    let Some(state) = crate::global::get() else {
        return fallback_real_exec(&intent, resolved_path, argv, envp);
    };

    let own_path = state.config.own_path.as_str();
    let pattern = state.config.pattern.as_str();
    let target = state.config.target.as_str();

    let mut dependencies: [FixedString<MAX_PATH>; macho::MAX_DEPENDENCIES] =
        [FixedString::new(); macho::MAX_DEPENDENCIES];
    let mut dep_count = 0usize;
    macho::walk_dependencies(resolved_path, &mut |name| {
        if dep_count < macho::MAX_DEPENDENCIES {
            // Resolve the install name's symlinks through the fake
            // namespace before it goes into the preload list.
            let mut buffers = state.buffers.lock();
            let mut np: FixedString<MAX_PATH> = FixedString::new();
            np.set(name);
            let resolved = resolve_all(&mut buffers, pattern, target, -1, &np).unwrap_or(np);
            dependencies[dep_count] = resolved;
            dep_count += 1;
        }
    });

    // `patched` is a plain local, never moved again before `as_envp()` is
    // read below: `build_patched_env` writes pointers into it that alias its
    // own fields, so it must stay pinned at this address (see
    // `spawn::PatchedEnv::empty`'s doc comment).
    let mut patched = spawn::PatchedEnv::empty();
    build_patched_env(&mut patched, envp, own_path, &dependencies[..dep_count], pattern, target);

    let resolved_cbuf = cstr_buf(resolved_path);
    let resolved_cptr = resolved_cbuf.as_ptr() as *const libc::c_char;

    match intent {
        ExecIntent::Exec => real_execve(resolved_cptr, argv, patched.as_envp()),
        ExecIntent::Spawn { pid_out, file_actions, attrp } => real_posix_spawn(
            pid_out,
            resolved_cptr,
            file_actions as *const libc::posix_spawn_file_actions_t,
            attrp as *const libc::posix_spawnattr_t,
            argv,
            patched.as_envp(),
        ),
    }
}

unsafe fn fallback_real_exec(
    intent: &ExecIntent,
    path: &str,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
) -> i32 {
    let cbuf = cstr_buf(path);
    let cptr = cbuf.as_ptr() as *const libc::c_char;
    match *intent {
        ExecIntent::Exec => real_execve(cptr, argv, envp),
        ExecIntent::Spawn { pid_out, file_actions, attrp } => real_posix_spawn(
            pid_out,
            cptr,
            file_actions as *const libc::posix_spawn_file_actions_t,
            attrp as *const libc::posix_spawnattr_t,
            argv,
            envp,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::shebang::parse_shebang_line;

    #[test]
    fn shebang_recursion_scenario_shape() {
        // Scenario 5: `/nix/store/s/run` begins `#!/nix/store/py/bin/python3 -B`.
        let parsed = parse_shebang_line("/nix/store/py/bin/python3 -B\n").unwrap();
        assert_eq!(parsed.interpreter, "/nix/store/py/bin/python3");
        assert_eq!(parsed.argument, Some("-B"));
    }
}
