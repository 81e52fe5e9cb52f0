use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use burrow_schema::SPEC_FILE_NAME;

/// Immutable per-invocation context: every path and identifier the engine
/// needs, resolved once at startup and passed by parameter. There is no
/// lazily initialized process-wide state behind this.
#[derive(Debug, Clone)]
pub struct EnvContext {
    /// Directory holding the environment spec and lock files.
    pub project_dir: PathBuf,
    pub spec_path: PathBuf,
    /// Environment name derived from the project directory: the directory
    /// base name plus a short digest of its absolute path, so distinct
    /// projects with the same base name get distinct environments.
    pub env_name: String,
    pub envs_dir: PathBuf,
    pub pkgs_dir: PathBuf,
    /// Install prefix of this project's environment.
    pub prefix: PathBuf,
    /// Target platform for reconciliation (normally the host platform).
    pub platform: String,
}

impl EnvContext {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        root: impl AsRef<Path>,
        platform: impl Into<String>,
    ) -> Self {
        let project_dir: PathBuf = project_dir.into();
        let root = root.as_ref();

        let envs_dir = root.join("envs");
        let pkgs_dir = root.join("pkgs");

        let env_name = derive_env_name(&project_dir);
        let prefix = envs_dir.join(&env_name);

        Self {
            spec_path: project_dir.join(SPEC_FILE_NAME),
            project_dir,
            env_name,
            envs_dir,
            pkgs_dir,
            prefix,
            platform: platform.into(),
        }
    }

    /// Override the environments directory (e.g. from `CONDA_ENVS_PATH`).
    /// The prefix moves with it.
    pub fn with_envs_dir(mut self, envs_dir: impl Into<PathBuf>) -> Self {
        self.envs_dir = envs_dir.into();
        self.prefix = self.envs_dir.join(&self.env_name);
        self
    }

    /// Override the package cache directory (e.g. from `CONDA_PKGS_DIRS`).
    pub fn with_pkgs_dir(mut self, pkgs_dir: impl Into<PathBuf>) -> Self {
        self.pkgs_dir = pkgs_dir.into();
        self
    }

    /// Path of the system-subsystem lock manifest for a platform.
    pub fn conda_lock_path(&self, platform: &str) -> PathBuf {
        self.project_dir
            .join(burrow_schema::conda_lock_file_name(platform))
    }

    /// Path of the language-subsystem lock file.
    pub fn pip_lock_path(&self) -> PathBuf {
        self.project_dir.join(burrow_schema::pip_lock_file_name())
    }
}

fn derive_env_name(project_dir: &Path) -> String {
    let base = project_dir
        .file_name()
        .map_or_else(|| "env".to_owned(), |n| n.to_string_lossy().into_owned());
    let digest = hex::encode(&Sha256::digest(project_dir.as_os_str().as_encoded_bytes())[..4]);
    format!("{base}-{digest}")
}
