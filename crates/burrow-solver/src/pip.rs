use crate::{PipRunner, SolverError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

/// Language-subsystem runner backed by an external pin tool
/// (`python -m piptools compile`) and the environment's own interpreter for
/// installs.
pub struct PipCli {
    /// Host interpreter used to run the pin tool.
    python: PathBuf,
}

impl PipCli {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

impl Default for PipCli {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl PipRunner for PipCli {
    fn compile(&self, requirements: &str) -> Result<String, SolverError> {
        info!("pinning language-level requirements");
        let mut child = Command::new(&self.python)
            .args([
                "-m",
                "piptools",
                "compile",
                "-",
                "-o",
                "-",
                "--no-allow-unsafe",
                "--generate-hashes",
                "--no-header",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(requirements.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SolverError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn install(&self, prefix: &Path, lock_path: &Path) -> Result<(), SolverError> {
        let env_python = prefix.join("bin").join("python");
        info!("installing pinned packages into {}", prefix.display());
        let status = Command::new(env_python)
            .arg("-m")
            .arg("pip")
            .arg("install")
            .arg("-r")
            .arg(lock_path)
            .arg("--no-deps")
            .arg("--disable-pip-version-check")
            .arg("--no-input")
            .status()?;
        if !status.success() {
            return Err(SolverError::InstallFailed(format!(
                "pip install of {} into {} failed",
                lock_path.display(),
                prefix.display()
            )));
        }
        Ok(())
    }
}
