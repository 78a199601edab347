//! Resolving an engine binary to execute.
//!
//! Downloading a binary over the network is explicitly out of scope; this
//! module only locates one that is already present, either at an explicit
//! path, a well-known system location, or on `PATH`.

use crate::error::{EngineError, Result};
use std::path::{Path, PathBuf};

/// One entry in the platform/arch download table. Documents where a
/// release for this platform would come from; this crate never fetches
/// one.
#[derive(Debug, Clone, Copy)]
pub struct PlatformEntry {
    /// `cfg!(target_os)` value, e.g. `"linux"`, `"macos"`, `"windows"`.
    pub os: &'static str,
    /// `cfg!(target_arch)` value, e.g. `"x86_64"`, `"aarch64"`.
    pub arch: &'static str,
    /// Where a release archive for this platform/arch pair would be fetched.
    pub download_url: &'static str,
}

/// The platform/arch table from the engine's release matrix.
pub const PLATFORM_TABLE: &[PlatformEntry] = &[
    PlatformEntry {
        os: "linux",
        arch: "x86_64",
        download_url: "https://example.invalid/releases/engine-linux-x64.tar.gz",
    },
    PlatformEntry {
        os: "linux",
        arch: "aarch64",
        download_url: "https://example.invalid/releases/engine-linux-arm64.tar.gz",
    },
    PlatformEntry {
        os: "macos",
        arch: "x86_64",
        download_url: "https://example.invalid/releases/engine-darwin-x64.tar.gz",
    },
    PlatformEntry {
        os: "macos",
        arch: "aarch64",
        download_url: "https://example.invalid/releases/engine-darwin-arm64.tar.gz",
    },
    PlatformEntry {
        os: "windows",
        arch: "x86_64",
        download_url: "https://example.invalid/releases/engine-win32-x64.tar.gz",
    },
];

/// Well-known system paths probed if the binary isn't on `PATH`.
const FALLBACK_PATHS: &[&str] = &[
    "/usr/games/stockfish",
    "/usr/bin/stockfish",
    "/usr/local/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
];

/// The current platform's entry in [`PLATFORM_TABLE`], if listed.
#[must_use]
pub fn current_platform_entry() -> Option<&'static PlatformEntry> {
    PLATFORM_TABLE
        .iter()
        .find(|e| e.os == std::env::consts::OS && e.arch == std::env::consts::ARCH)
}

/// Resolves an engine binary to run.
///
/// Order: `explicit_path` if given and present; the executable name on
/// `PATH`; each of [`FALLBACK_PATHS`]. Returns [`EngineError::BinaryNotFound`]
/// if none exist.
pub fn resolve(explicit_path: Option<&Path>, executable_name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(EngineError::BinaryNotFound);
    }

    if let Some(path) = find_on_path(executable_name) {
        return Ok(path);
    }

    for candidate in FALLBACK_PATHS {
        let path = Path::new(candidate);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
    }

    Err(EngineError::BinaryNotFound)
}

fn find_on_path(executable_name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(executable_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_binary_not_found() {
        let result = resolve(Some(Path::new("/does/not/exist/engine")), "engine");
        assert!(matches!(result, Err(EngineError::BinaryNotFound)));
    }

    #[test]
    fn explicit_existing_path_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let resolved = resolve(Some(file.path()), "engine").unwrap();
        assert_eq!(resolved, file.path());
    }

    #[test]
    fn platform_table_has_five_entries() {
        assert_eq!(PLATFORM_TABLE.len(), 5);
    }
}
