//! Environment-variable configuration: the one place every `FAKEDIR_*`
//! variable name is read and validated. Built around raw `libc::getenv`
//! rather than `std::env::var`, which allocates a `String` per call and is
//! not something we want to reach for before the library has finished its
//! own bootstrap.

use crate::state::{FixedString, MAX_PATH};
use std::ffi::{CStr, CString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FAKEDIR_PATTERN and FAKEDIR_TARGET must both be set")]
    Missing,
    #[error("FAKEDIR_PATTERN and FAKEDIR_TARGET must be absolute paths")]
    NotAbsolute,
    #[error("FAKEDIR_PATTERN and FAKEDIR_TARGET must not be prefixes of one another")]
    NotDisjoint,
}

/// Immutable, process-wide substitution configuration. Constructed once at
/// init and never mutated afterward.
pub struct Config {
    pub pattern: FixedString<MAX_PATH>,
    pub target: FixedString<MAX_PATH>,
    pub own_path: FixedString<MAX_PATH>,
    pub debug: bool,
}

/// Reads a `FAKEDIR_*` variable via the raw libc accessor. Returns `None`
/// if unset; avoids `std::env`'s allocating `OsString` path entirely.
fn raw_getenv(name: &str) -> Option<String> {
    let cname = CString::new(name).ok()?;
    unsafe {
        let ptr = libc::getenv(cname.as_ptr());
        if ptr.is_null() {
            None
        } else {
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }
}

fn starts_with(prefix: &str, s: &str) -> bool {
    s.as_bytes().starts_with(prefix.as_bytes())
}

impl Config {
    /// Reads and validates `FAKEDIR_PATTERN`/`FAKEDIR_TARGET`/`FAKEDIR_DEBUG`.
    /// On any validation failure the caller (init) is expected to print the
    /// error to fd 2 and exit(1) — this function itself never aborts the
    /// process, so it stays testable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let pattern = raw_getenv("FAKEDIR_PATTERN").ok_or(ConfigError::Missing)?;
        let target = raw_getenv("FAKEDIR_TARGET").ok_or(ConfigError::Missing)?;
        Self::validate(&pattern, &target)?;

        let mut cfg = Config {
            pattern: FixedString::new(),
            target: FixedString::new(),
            own_path: FixedString::new(),
            debug: raw_getenv("FAKEDIR_DEBUG").is_some(),
        };
        cfg.pattern.set(&pattern);
        cfg.target.set(&target);
        Ok(cfg)
    }

    /// Pure validation, split out so both `from_env` and unit tests can
    /// exercise the exact disjointness/absoluteness rules without touching
    /// the process environment.
    pub fn validate(pattern: &str, target: &str) -> Result<(), ConfigError> {
        if !pattern.starts_with('/') || !target.starts_with('/') {
            return Err(ConfigError::NotAbsolute);
        }
        // Two-way disjointness: the original source only rejected PATTERN
        // being a prefix of TARGET, leaving the reverse case open (SPEC_FULL
        // §3/§9). Both directions are rejected here.
        if starts_with(pattern, target) || starts_with(target, pattern) {
            return Err(ConfigError::NotDisjoint);
        }
        Ok(())
    }

    pub fn log_level_from_env() -> Option<crate::state::LogLevel> {
        raw_getenv("FAKEDIR_LOG_LEVEL").and_then(|s| crate::state::LogLevel::parse(&s))
    }

    pub fn log_file_from_env() -> Option<String> {
        raw_getenv("FAKEDIR_LOG_FILE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(matches!(
            Config::validate("nix/store", "/opt/store"),
            Err(ConfigError::NotAbsolute)
        ));
    }

    #[test]
    fn rejects_pattern_prefix_of_target() {
        assert!(matches!(
            Config::validate("/nix", "/nix/store"),
            Err(ConfigError::NotDisjoint)
        ));
    }

    #[test]
    fn rejects_target_prefix_of_pattern() {
        // The original C source's `startswith(pattern, target)` check alone
        // would let this configuration through; the two-way check here
        // must reject it.
        assert!(matches!(
            Config::validate("/nix/store", "/nix"),
            Err(ConfigError::NotDisjoint)
        ));
    }

    #[test]
    fn accepts_disjoint_absolute_paths() {
        assert!(Config::validate("/nix/store", "/opt/store").is_ok());
    }
}
