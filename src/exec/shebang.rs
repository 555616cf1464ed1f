//! Shebang re-parser, part of Component F.
//!
//! Ground truth is `original_source/execve.c`'s `pspawn_parse_shebang`: scan
//! the first line as `#!` + optional spaces + interpreter path + optional
//! spaces + optional single argument, trimming trailing spaces off the
//! argument. The parsed pieces are returned as borrowed slices of the
//! caller's own line buffer — no allocation.
pub struct ParsedShebang<'a> {
    pub interpreter: &'a str,
    pub argument: Option<&'a str>,
}

/// Parses a shebang line (without the leading `#!`, i.e. `line` starts
/// right after those two bytes) per spec §4.F: "optional spaces, an
/// interpreter path (terminated by space or newline), optional spaces,
/// optional single argument (trailing spaces trimmed)".
pub fn parse_shebang_line(line: &str) -> Option<ParsedShebang<'_>> {
    let line = line.split(['\n', '\r']).next().unwrap_or("");
    let after_leading_spaces = line.trim_start_matches(' ');

    let interp_end = after_leading_spaces.find(' ').unwrap_or(after_leading_spaces.len());
    let interpreter = &after_leading_spaces[..interp_end];
    if interpreter.is_empty() {
        return None;
    }

    let rest = &after_leading_spaces[interp_end..];
    let rest = rest.trim_start_matches(' ');
    let argument = if rest.is_empty() { None } else { Some(rest.trim_end_matches(' ')) };

    Some(ParsedShebang { interpreter, argument: argument.filter(|a| !a.is_empty()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interpreter_only() {
        let p = parse_shebang_line("/bin/sh\n").unwrap();
        assert_eq!(p.interpreter, "/bin/sh");
        assert_eq!(p.argument, None);
    }

    #[test]
    fn parses_interpreter_with_single_argument() {
        let p = parse_shebang_line("/nix/store/py/bin/python3 -B\n").unwrap();
        assert_eq!(p.interpreter, "/nix/store/py/bin/python3");
        assert_eq!(p.argument, Some("-B"));
    }

    #[test]
    fn trims_leading_and_trailing_spaces() {
        let p = parse_shebang_line("  /bin/sh   -e   \n").unwrap();
        assert_eq!(p.interpreter, "/bin/sh");
        assert_eq!(p.argument, Some("-e"));
    }

    #[test]
    fn empty_line_has_no_interpreter() {
        assert!(parse_shebang_line("\n").is_none());
    }
}
