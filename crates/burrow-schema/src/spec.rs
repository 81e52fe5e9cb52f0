use crate::selector::filter_platform_selectors;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the human-edited environment specification.
pub const SPEC_FILE_NAME: &str = "environment.yml";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read spec file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse spec file: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("unknown platform in selector table: '{0}'")]
    UnknownPlatform(String),
    #[error("spec file `{0}` not found; create it first")]
    SpecFileMissing(String),
}

#[derive(Debug, Clone, Deserialize)]
struct RawEnvFile {
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
}

/// A dependency entry is either a constraint string or a nested subsection
/// such as `pip:` carrying language-level requirements.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Constraint(String),
    Subsection(BTreeMap<String, Vec<String>>),
}

/// Read model of the environment spec, sufficient for locking. The file is
/// human-edited YAML; comment-preserving editing is out of scope here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFile {
    pub channels: Vec<String>,
    pub platforms: Vec<String>,
    pub dependencies: Vec<String>,
    pub pip_requirements: Vec<String>,
}

impl EnvFile {
    /// Parse spec text without applying platform selectors.
    ///
    /// Selectors live in trailing comments, so a plain YAML parse sees every
    /// dependency of every platform. Use this to enumerate declared platforms
    /// and the language-level requirement set.
    pub fn parse(content: &str, default_platform: &str) -> Result<Self, SpecError> {
        let raw: RawEnvFile = serde_yaml::from_str(content)?;

        let channels = if raw.channels.is_empty() {
            vec!["conda-forge".to_owned()]
        } else {
            raw.channels
        };
        let platforms = if raw.platforms.is_empty() {
            vec![default_platform.to_owned()]
        } else {
            raw.platforms
        };

        let mut dependencies = Vec::new();
        let mut pip_requirements = Vec::new();
        for dep in raw.dependencies {
            match dep {
                RawDependency::Constraint(spec) => dependencies.push(spec),
                RawDependency::Subsection(map) => {
                    if let Some(pip) = map.get("pip") {
                        for entry in pip {
                            pip_requirements.push(pip_requirement_line(entry));
                        }
                    }
                }
            }
        }

        Ok(Self {
            channels,
            platforms,
            dependencies,
            pip_requirements,
        })
    }

    pub fn load(path: impl AsRef<Path>, default_platform: &str) -> Result<Self, SpecError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SpecError::SpecFileMissing(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content, default_platform)
    }

    /// Whether the spec declares a language-package subsystem at all.
    pub fn uses_pip(&self) -> bool {
        !self.pip_requirements.is_empty()
    }
}

/// A `name <constraint>` pip entry whose constraint is a direct URL is pinned
/// by the URL alone; anything else passes through verbatim.
fn pip_requirement_line(entry: &str) -> String {
    match entry.split_once(' ') {
        Some((_, ver)) if ver.trim().starts_with("http") => ver.trim().to_owned(),
        _ => entry.to_owned(),
    }
}

/// Per-platform input to one lock compilation: flat constraint list, channel
/// list in priority order, and the target platform. Immutable once built;
/// created per platform per lock run and discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpecification {
    specs: Vec<String>,
    channels: Vec<String>,
    platform: String,
}

/// Canonical hash input. Field order is fixed by this struct; specs are
/// sorted by the caller, channels stay in declared order because channel
/// priority affects resolution.
#[derive(Serialize)]
struct CanonicalSpec<'a> {
    channels: &'a [String],
    platform: &'a str,
    specs: Vec<&'a str>,
}

impl LockSpecification {
    pub fn new(specs: Vec<String>, channels: Vec<String>, platform: String) -> Self {
        Self {
            specs,
            channels,
            platform,
        }
    }

    /// Build the lock specification for one platform: evaluate selectors
    /// against `platform`, then parse the filtered text.
    pub fn from_spec_text(content: &str, platform: &str) -> Result<Self, SpecError> {
        let filtered = filter_platform_selectors(content, platform)?.join("\n");
        let env = EnvFile::parse(&filtered, platform)?;
        Ok(Self {
            specs: env.dependencies,
            channels: env.channels,
            platform: platform.to_owned(),
        })
    }

    pub fn specs(&self) -> &[String] {
        &self.specs
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// SHA-256 over the canonical JSON serialization. Spec order does not
    /// matter; channel order does.
    pub fn env_hash(&self) -> String {
        let mut specs: Vec<&str> = self.specs.iter().map(String::as_str).collect();
        specs.sort_unstable();
        let canonical = serde_json::to_string(&CanonicalSpec {
            channels: &self.channels,
            platform: &self.platform,
            specs,
        })
        .expect("canonical lock spec serializes to JSON");
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
channels:
- conda-forge

platforms:
- linux-64
- osx-64

dependencies:
- python >=3.9
- make >=4  # [unix]
- pip:
  - requests >=2.28
  - mypkg https://example.org/mypkg-1.0.tar.gz
";

    #[test]
    fn parses_channels_platforms_dependencies() {
        let env = EnvFile::parse(SAMPLE, "linux-64").unwrap();
        assert_eq!(env.channels, vec!["conda-forge"]);
        assert_eq!(env.platforms, vec!["linux-64", "osx-64"]);
        assert_eq!(env.dependencies, vec!["python >=3.9", "make >=4"]);
    }

    #[test]
    fn pip_requirements_extracted_with_url_pinning() {
        let env = EnvFile::parse(SAMPLE, "linux-64").unwrap();
        assert_eq!(
            env.pip_requirements,
            vec!["requests >=2.28", "https://example.org/mypkg-1.0.tar.gz"]
        );
        assert!(env.uses_pip());
    }

    #[test]
    fn defaults_applied_when_sections_missing() {
        let env = EnvFile::parse("dependencies:\n- python\n", "osx-arm64").unwrap();
        assert_eq!(env.channels, vec!["conda-forge"]);
        assert_eq!(env.platforms, vec!["osx-arm64"]);
        assert!(!env.uses_pip());
    }

    #[test]
    fn lock_spec_filters_selectors_per_platform() {
        let linux = LockSpecification::from_spec_text(SAMPLE, "linux-64").unwrap();
        assert_eq!(linux.specs(), ["python >=3.9", "make >=4"]);

        let win_sample = SAMPLE.replace("[unix]", "[win]");
        let linux2 = LockSpecification::from_spec_text(&win_sample, "linux-64").unwrap();
        assert_eq!(linux2.specs(), ["python >=3.9"]);
    }

    #[test]
    fn env_hash_independent_of_spec_order() {
        let a = LockSpecification::new(
            vec!["python >=3.9".into(), "numpy".into()],
            vec!["conda-forge".into()],
            "linux-64".into(),
        );
        let b = LockSpecification::new(
            vec!["numpy".into(), "python >=3.9".into()],
            vec!["conda-forge".into()],
            "linux-64".into(),
        );
        assert_eq!(a.env_hash(), b.env_hash());
    }

    #[test]
    fn env_hash_sensitive_to_channel_order() {
        let a = LockSpecification::new(
            vec!["python".into()],
            vec!["conda-forge".into(), "bioconda".into()],
            "linux-64".into(),
        );
        let b = LockSpecification::new(
            vec!["python".into()],
            vec!["bioconda".into(), "conda-forge".into()],
            "linux-64".into(),
        );
        assert_ne!(a.env_hash(), b.env_hash());
    }

    #[test]
    fn env_hash_sensitive_to_platform() {
        let a = LockSpecification::new(vec![], vec![], "linux-64".into());
        let b = LockSpecification::new(vec![], vec![], "osx-64".into());
        assert_ne!(a.env_hash(), b.env_hash());
    }

    #[test]
    fn env_hash_stable_across_invocations() {
        let spec = LockSpecification::new(
            vec!["python >=3.9".into()],
            vec!["conda-forge".into()],
            "linux-64".into(),
        );
        let first = spec.env_hash();
        for _ in 0..50 {
            assert_eq!(spec.env_hash(), first);
        }
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn missing_spec_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = EnvFile::load(dir.path().join(SPEC_FILE_NAME), "linux-64").unwrap_err();
        assert!(matches!(err, SpecError::SpecFileMissing(_)));
    }
}
