//! Component G: the Mach-O dependency walk.
//!
//! Ground truth is `original_source/execve.c`'s `macho_add_dependencies`:
//! open the binary read-only, read a 64-bit Mach-O header, verify
//! `MH_MAGIC_64`, iterate `ncmds` load commands, and for each
//! `LC_LOAD_DYLIB`/`LC_LOAD_WEAK_DYLIB`/`LC_REEXPORT_DYLIB` extract the
//! install-name string and recurse if it lies under PATTERN.
//!
//! 32-bit (`MH_MAGIC`) and fat/universal binaries are detected by magic
//! number and treated as "no additional dependencies" rather than an error
//! (spec §4.F/§9 — this is explicitly called out as a best-effort contract).

use crate::state::{fakedir_debug, fakedir_trace, FixedString, MAX_PATH};
use std::io::{Read, Seek, SeekFrom};

const MH_MAGIC_64: u32 = 0xfeedfacf;
const LC_LOAD_DYLIB: u32 = 0x0000000c;
const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | 0x80000000;
const LC_REEXPORT_DYLIB: u32 = 0x1f | 0x80000000;

#[repr(C)]
#[derive(Clone, Copy)]
struct MachHeader64 {
    magic: u32,
    cputype: i32,
    cpusubtype: i32,
    filetype: u32,
    ncmds: u32,
    sizeofcmds: u32,
    flags: u32,
    reserved: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct LoadCommand {
    cmd: u32,
    cmdsize: u32,
}

/// Maximum number of transitively-discovered dependency entries emitted,
/// matching the `10·MAX_PATH` capacity budget spec §4.F assigns to the
/// rebuilt `DYLD_INSERT_LIBRARIES` value (roughly one path per slot).
pub const MAX_DEPENDENCIES: usize = 10;

/// Largest `dylib_command` trailing body (the install-name string plus
/// padding) this walker reads onto the stack. An install name is itself
/// bounded by `MAX_PATH`, so this leaves generous headroom.
const MAX_CMD_BODY: usize = MAX_PATH + 16;

/// Walks `path`'s Mach-O load commands, invoking `emit` for each
/// PATTERN-resident dependency's raw install name (not yet resolved through
/// the symlink resolver — the caller does that, since resolution needs the
/// mutex-guarded scratch buffers this module doesn't touch). Recurses into
/// each matching dependency up to `MAX_DEPENDENCIES` total emissions, and
/// guards against a dependency cycle with a small visited-path set.
pub fn walk_dependencies<F: FnMut(&str)>(path: &str, emit: &mut F) {
    let mut visited: [FixedString<MAX_PATH>; MAX_DEPENDENCIES] = [FixedString::new(); MAX_DEPENDENCIES];
    let mut visited_count = 0usize;
    walk_inner(path, emit, &mut visited, &mut visited_count);
}

/// Forward-rewrites `path` (a no-op if it isn't PATTERN-resident) before
/// opening it. The top-level caller already passes an already-resolved,
/// TARGET-resident path, but every recursive call passes the raw
/// PATTERN-resident install name straight out of a load command — that
/// name only physically exists under TARGET, so without this rewrite the
/// recursive `File::open` below always fails and the walk can never
/// recurse past the first level (spec §4.F's "Transitive means the
/// dependency walker is invoked recursively for each matching library").
fn forward_rewrite_for_open(path: &str) -> FixedString<MAX_PATH> {
    let mut out: FixedString<MAX_PATH> = FixedString::new();
    out.set(path);
    if let Some(state) = crate::global::get() {
        let mut buffers = state.buffers.lock();
        let pattern = state.config.pattern.as_str();
        let target = state.config.target.as_str();
        let rewritten = crate::path::rewrite::rewrite_forward(&mut buffers, pattern, target, path);
        out.set(rewritten);
    }
    out
}

fn walk_inner<F: FnMut(&str)>(
    path: &str,
    emit: &mut F,
    visited: &mut [FixedString<MAX_PATH>; MAX_DEPENDENCIES],
    visited_count: &mut usize,
) {
    if *visited_count >= MAX_DEPENDENCIES || visited[..*visited_count].iter().any(|v| v.as_str() == path) {
        return;
    }
    visited[*visited_count].set(path);
    *visited_count += 1;

    let opened = forward_rewrite_for_open(path);

    let mut file = match std::fs::File::open(opened.as_str()) {
        Ok(f) => f,
        Err(_) => {
            fakedir_debug!("macho: could not open '{}' for dependency walk", opened.as_str());
            return;
        }
    };

    let mut header_bytes = [0u8; std::mem::size_of::<MachHeader64>()];
    if file.read_exact(&mut header_bytes).is_err() {
        return;
    }
    let header: MachHeader64 = unsafe { std::mem::transmute(header_bytes) };

    if header.magic != MH_MAGIC_64 {
        // 32-bit or fat binary: best-effort skip, not an error (spec §4.F/§9).
        fakedir_debug!("macho: '{}' is not a 64-bit Mach-O image, skipping", opened.as_str());
        return;
    }

    for _ in 0..header.ncmds {
        let mut cmd_bytes = [0u8; std::mem::size_of::<LoadCommand>()];
        if file.read_exact(&mut cmd_bytes).is_err() {
            break;
        }
        let cmd: LoadCommand = unsafe { std::mem::transmute(cmd_bytes) };

        let is_dylib_cmd =
            cmd.cmd == LC_LOAD_DYLIB || cmd.cmd == LC_LOAD_WEAK_DYLIB || cmd.cmd == LC_REEXPORT_DYLIB;

        if is_dylib_cmd && cmd.cmdsize as usize > std::mem::size_of::<LoadCommand>() {
            let body_len = cmd.cmdsize as usize - std::mem::size_of::<LoadCommand>();
            if body_len > MAX_CMD_BODY {
                fakedir_trace!("macho: skipping oversized load command body ({} bytes)", body_len);
                let _ = file.seek(SeekFrom::Current(body_len as i64));
                continue;
            }
            let mut body = [0u8; MAX_CMD_BODY];
            if file.read_exact(&mut body[..body_len]).is_err() {
                break;
            }
            // The dylib_command's `lc_str name` field is a 4-byte offset
            // (counted from the start of the load command, so 4 bytes into
            // this trailing body) followed immediately by the NUL-terminated
            // install-name string at that offset.
            if body_len >= 4 {
                let name_offset = u32::from_ne_bytes([body[0], body[1], body[2], body[3]]) as usize;
                let rel_offset = name_offset.saturating_sub(std::mem::size_of::<LoadCommand>());
                if rel_offset < body_len {
                    let name_bytes = &body[rel_offset..body_len];
                    let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
                    if let Ok(name) = std::str::from_utf8(&name_bytes[..nul.min(MAX_PATH)]) {
                        if let Some(state) = crate::global::get() {
                            if name.as_bytes().starts_with(state.config.pattern.as_str().as_bytes()) {
                                emit(name);
                                walk_inner(name, emit, visited, visited_count);
                                continue;
                            }
                        }
                    }
                }
            }
        } else if !is_dylib_cmd {
            let skip = cmd.cmdsize as i64 - std::mem::size_of::<LoadCommand>() as i64;
            fakedir_trace!("macho: skipping load command 0x{:x} ({} bytes)", cmd.cmd, cmd.cmdsize);
            if skip > 0 {
                let _ = file.seek(SeekFrom::Current(skip));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_macho_file_yields_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-binary");
        std::fs::write(&path, b"#!/bin/sh\necho hi\n").unwrap();
        let mut found = Vec::new();
        walk_dependencies(path.to_str().unwrap(), &mut |n| found.push(n.to_string()));
        assert!(found.is_empty());
    }

    #[test]
    fn missing_file_yields_no_dependencies() {
        let mut found = Vec::new();
        walk_dependencies("/no/such/path/at/all", &mut |n| found.push(n.to_string()));
        assert!(found.is_empty());
    }
}
