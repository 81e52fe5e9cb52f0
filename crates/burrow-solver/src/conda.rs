use crate::actions::DryRunResult;
use crate::diagnose::parse_unsatisfiable_message;
use crate::{PackageRecord, Solver, SolverError};
use burrow_schema::LockSpecification;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Production solver backed by a conda-compatible executable (conda, mamba,
/// or micromamba — backend field-layout differences are absorbed by the
/// action normalization, not here).
///
/// Discovery of the executable is the caller's concern; this type only
/// receives a resolved path.
pub struct CondaCli {
    exe: PathBuf,
    /// Isolated package cache; also hosts the scratch prefix for dry runs.
    pkgs_dir: PathBuf,
}

impl CondaCli {
    pub fn new(exe: impl Into<PathBuf>, pkgs_dir: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            pkgs_dir: pkgs_dir.into(),
        }
    }

    /// Environment overrides applied to every solver invocation: force the
    /// target subdir, isolate the package cache, keep unsatisfiability-hint
    /// search depth bounded, and stop the solver from injecting pip as an
    /// implicit python dependency.
    fn env_overrides(&self, platform: &str) -> Vec<(&'static str, String)> {
        vec![
            ("CONDA_SUBDIR", platform.to_owned()),
            ("CONDA_PKGS_DIRS", self.pkgs_dir.display().to_string()),
            ("CONDA_UNSATISFIABLE_HINTS_CHECK_DEPTH", "0".to_owned()),
            ("CONDA_ADD_PIP_AS_PYTHON_DEPENDENCY", "False".to_owned()),
        ]
    }

    fn command(&self, platform: &str) -> Command {
        let mut cmd = Command::new(&self.exe);
        for (key, value) in self.env_overrides(platform) {
            cmd.env(key, value);
        }
        cmd
    }
}

impl Solver for CondaCli {
    fn name(&self) -> &str {
        "conda"
    }

    fn solve(&self, spec: &LockSpecification) -> Result<DryRunResult, SolverError> {
        let mut cmd = self.command(spec.platform());
        cmd.arg("create")
            .arg("--prefix")
            .arg(self.pkgs_dir.join("prefix"))
            .arg("--dry-run")
            .arg("--json");

        // Escape hatch for extra solver arguments, split on whitespace.
        if let Ok(flags) = std::env::var("CONDA_FLAGS") {
            cmd.args(flags.split_whitespace());
        }

        if !spec.channels().is_empty() {
            cmd.arg("--override-channels");
        }
        for channel in spec.channels() {
            cmd.arg("--channel").arg(channel);
        }
        cmd.args(spec.specs());

        info!(
            "solving {} specs for {} via {}",
            spec.specs().len(),
            spec.platform(),
            self.exe.display()
        );
        let output = cmd.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("solver exited with {}", output.status);

        let Ok(value) = serde_json::from_str::<serde_json::Value>(&stdout) else {
            return Err(SolverError::MalformedOutput {
                raw: stdout.trim().to_owned(),
            });
        };

        if !output.status.success() {
            return Err(classify_failure(&value));
        }
        DryRunResult::from_value(value)
    }

    fn install(&self, lock_path: &Path, prefix: &Path, create: bool) -> Result<(), SolverError> {
        let verb = if create || !prefix.exists() {
            "create"
        } else {
            "install"
        };
        info!("{verb} {} from {}", prefix.display(), lock_path.display());

        let status = Command::new(&self.exe)
            .env("CONDA_PKGS_DIRS", &self.pkgs_dir)
            .arg(verb)
            .arg("--file")
            .arg(lock_path)
            .arg("--prefix")
            .arg(prefix)
            .arg("--yes")
            .status()?;
        if !status.success() {
            return Err(SolverError::InstallFailed(format!(
                "could not install {} into {}",
                lock_path.display(),
                prefix.display()
            )));
        }
        Ok(())
    }

    fn remove_env(&self, prefix: &Path) -> Result<(), SolverError> {
        let status = Command::new(&self.exe)
            .arg("env")
            .arg("remove")
            .arg("--prefix")
            .arg(prefix)
            .arg("--yes")
            .status()?;
        if !status.success() {
            return Err(SolverError::Failed(format!(
                "could not remove environment {}",
                prefix.display()
            )));
        }
        Ok(())
    }

    fn list_packages(&self, prefix: &Path) -> Result<Vec<PackageRecord>, SolverError> {
        let output = Command::new(&self.exe)
            .arg("list")
            .arg("--prefix")
            .arg(prefix)
            .arg("--json")
            .stderr(Stdio::piped())
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || stdout.trim().is_empty() {
            return Err(SolverError::Failed(format!(
                "could not list packages in {}",
                prefix.display()
            )));
        }
        serde_json::from_str(&stdout).map_err(|_| SolverError::MalformedOutput {
            raw: stdout.trim().to_owned(),
        })
    }
}

/// Classify a non-zero solver exit by the `exception_name` field of its JSON
/// output. Every failure kind is fatal and never retried: the solver is a
/// deterministic function of spec and indices, so retrying identical input
/// cannot succeed.
pub fn classify_failure(value: &serde_json::Value) -> SolverError {
    match value.get("exception_name").and_then(|v| v.as_str()) {
        Some("PackagesNotFoundError") => {
            let packages = value
                .get("packages")
                .and_then(|v| v.as_array())
                .map(|pkgs| {
                    pkgs.iter()
                        .filter_map(|p| p.as_str().map(ToOwned::to_owned))
                        .collect()
                })
                .unwrap_or_default();
            SolverError::PackagesNotFound { packages }
        }
        Some("UnsatisfiableError") => {
            let message = value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
            let conflicts = parse_unsatisfiable_message(&message);
            SolverError::Unsatisfiable { message, conflicts }
        }
        _ => match value.get("message").and_then(|v| v.as_str()) {
            Some(message) => SolverError::Failed(message.to_owned()),
            None => SolverError::Failed(
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_not_found_surfaces_names_verbatim() {
        let value = serde_json::json!({
            "exception_name": "PackagesNotFoundError",
            "packages": ["nosuchpkg", "alsomissing"],
            "message": "irrelevant"
        });
        let err = classify_failure(&value);
        match err {
            SolverError::PackagesNotFound { packages } => {
                assert_eq!(packages, vec!["nosuchpkg", "alsomissing"]);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn unsatisfiable_delegates_to_diagnostics_parser() {
        let value = serde_json::json!({
            "exception_name": "UnsatisfiableError",
            "message": "zlib[version='>=1.3']\n- pillow==10.2.0 -> zlib[version='<1.3']"
        });
        match classify_failure(&value) {
            SolverError::Unsatisfiable { message, conflicts } => {
                assert!(message.contains("zlib"));
                assert!(conflicts.conflicts.contains_key("zlib"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn unknown_exception_surfaces_raw_message() {
        let value = serde_json::json!({
            "exception_name": "CondaHTTPError",
            "message": "HTTP 000 CONNECTION FAILED"
        });
        match classify_failure(&value) {
            SolverError::Failed(msg) => assert_eq!(msg, "HTTP 000 CONNECTION FAILED"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn missing_message_surfaces_raw_json() {
        let value = serde_json::json!({"error": "something odd"});
        match classify_failure(&value) {
            SolverError::Failed(msg) => assert!(msg.contains("something odd")),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
