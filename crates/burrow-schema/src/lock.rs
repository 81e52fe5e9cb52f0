use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Provenance comment at the top of every explicit lock manifest.
pub const CONDA_LOCK_HEADER: &str = "# Generated by burrow.";

/// Provenance comment at the top of the language-subsystem lock file.
pub const PIP_LOCK_HEADER: &str = "# Generated by burrow (pip).";

/// Marker understood by the explicit-lock consumer: every following line is a
/// concrete fetch URL, no resolution happens at install time.
pub const EXPLICIT_MARKER: &str = "@EXPLICIT";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no env_hash header in lock file {0}")]
    MissingEnvHash(String),
}

/// Per-platform manifest file name for the system-package subsystem.
pub fn conda_lock_file_name(platform: &str) -> String {
    format!("conda-{platform}.lock")
}

/// Lock file name for the language-package subsystem (one file, the
/// requirement set is platform-independent by policy).
pub fn pip_lock_file_name() -> &'static str {
    "requirements.txt"
}

fn env_hash_pattern() -> &'static Regex {
    static PAT: OnceLock<Regex> = OnceLock::new();
    PAT.get_or_init(|| Regex::new(r"^# env_hash: (.*)$").expect("env_hash pattern is valid"))
}

fn platform_pattern() -> &'static Regex {
    static PAT: OnceLock<Regex> = OnceLock::new();
    PAT.get_or_init(|| Regex::new(r"^# platform: (.*)$").expect("platform pattern is valid"))
}

fn scan_header(content: &str, pattern: &Regex) -> Option<String> {
    content
        .lines()
        .find_map(|line| pattern.captures(line).map(|c| c[1].to_owned()))
}

/// Extract the embedded environment hash from manifest content.
pub fn manifest_env_hash(content: &str) -> Option<String> {
    scan_header(content, env_hash_pattern())
}

/// Extract the embedded platform id from manifest content.
pub fn manifest_platform(content: &str) -> Option<String> {
    scan_header(content, platform_pattern())
}

/// Read the embedded hash out of the language-subsystem lock file, if the
/// file exists. A present file without a hash header is an error: it means
/// the file was not written by us.
pub fn pip_lock_env_hash(path: impl AsRef<Path>) -> Result<Option<String>, LockError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    manifest_env_hash(&content)
        .map(Some)
        .ok_or_else(|| LockError::MissingEnvHash(path.display().to_string()))
}

/// Write a lock file in a single durable step: content is built fully in
/// memory, written to a temp file, synced, then renamed into place. No lock
/// file is ever observed partially written.
pub fn write_lock_file(path: impl AsRef<Path>, content: &str) -> Result<(), LockError> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
    // Fsync parent directory to ensure rename durability on power loss.
    if let Ok(f) = fs::File::open(dir) {
        let _ = f.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
# Generated by burrow.
# platform: linux-64
# env_hash: abc123
@EXPLICIT
https://conda.anaconda.org/conda-forge/linux-64/foo-1.0-0.tar.bz2#d41d8cd9
";

    #[test]
    fn env_hash_extracted() {
        assert_eq!(manifest_env_hash(MANIFEST).as_deref(), Some("abc123"));
    }

    #[test]
    fn platform_extracted() {
        assert_eq!(manifest_platform(MANIFEST).as_deref(), Some("linux-64"));
    }

    #[test]
    fn absent_headers_yield_none() {
        assert!(manifest_env_hash("just some text\n").is_none());
        assert!(manifest_platform("# env_hash: x\n").is_none());
    }

    #[test]
    fn lock_file_names_are_deterministic() {
        assert_eq!(conda_lock_file_name("linux-64"), "conda-linux-64.lock");
        assert_eq!(conda_lock_file_name("osx-arm64"), "conda-osx-arm64.lock");
        assert_eq!(pip_lock_file_name(), "requirements.txt");
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conda-linux-64.lock");
        write_lock_file(&path, MANIFEST).unwrap();
        let back = fs::read_to_string(&path).unwrap();
        assert_eq!(back, MANIFEST);
    }

    #[test]
    fn pip_hash_none_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let hash = pip_lock_env_hash(dir.path().join("requirements.txt")).unwrap();
        assert!(hash.is_none());
    }

    #[test]
    fn pip_hash_read_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        fs::write(&path, "# Generated by burrow (pip).\n# env_hash: feed\n\nfoo==1.0\n").unwrap();
        assert_eq!(pip_lock_env_hash(&path).unwrap().as_deref(), Some("feed"));
    }

    #[test]
    fn pip_lock_without_hash_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        fs::write(&path, "foo==1.0\n").unwrap();
        assert!(matches!(
            pip_lock_env_hash(&path),
            Err(LockError::MissingEnvHash(_))
        ));
    }
}
