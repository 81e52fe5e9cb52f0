use crate::actions::{DryRunResult, FetchAction, LinkAction};
use crate::diagnose::parse_unsatisfiable_message;
use crate::{PackageRecord, PipRunner, Solver, SolverError};
use burrow_schema::LockSpecification;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Deterministic in-process solver for tests: resolution derives entirely
/// from the requested specs, installs only touch the prefix directory, and
/// every interaction is recorded for assertions.
#[derive(Default)]
pub struct MockSolver {
    missing: Option<Vec<String>>,
    unsat_message: Option<String>,
    fail_install: bool,
    /// Spec names whose FETCH record is suppressed, to exercise the
    /// already-cached fallback path in the lock compiler.
    skip_fetch: Vec<String>,
    pub installs: Mutex<Vec<(PathBuf, PathBuf, bool)>>,
    snapshots: Mutex<VecDeque<Vec<PackageRecord>>>,
}

impl MockSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_packages(packages: Vec<String>) -> Self {
        Self {
            missing: Some(packages),
            ..Self::default()
        }
    }

    pub fn with_unsatisfiable(message: impl Into<String>) -> Self {
        Self {
            unsat_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_install_failure() -> Self {
        Self {
            fail_install: true,
            ..Self::default()
        }
    }

    pub fn skip_fetch_for(mut self, name: impl Into<String>) -> Self {
        self.skip_fetch.push(name.into());
        self
    }

    /// Queue a snapshot to return from the next `list_packages` call.
    pub fn push_snapshot(&self, snapshot: Vec<PackageRecord>) {
        self.snapshots
            .lock()
            .expect("snapshot queue not poisoned")
            .push_back(snapshot);
    }

    fn mock_md5(dist_name: &str) -> String {
        hex::encode(&Sha256::digest(dist_name.as_bytes())[..16])
    }
}

impl Solver for MockSolver {
    fn name(&self) -> &str {
        "mock"
    }

    fn solve(&self, spec: &LockSpecification) -> Result<DryRunResult, SolverError> {
        if let Some(packages) = &self.missing {
            return Err(SolverError::PackagesNotFound {
                packages: packages.clone(),
            });
        }
        if let Some(message) = &self.unsat_message {
            return Err(SolverError::Unsatisfiable {
                message: message.clone(),
                conflicts: parse_unsatisfiable_message(message),
            });
        }

        let mut fetch = Vec::new();
        let mut link = Vec::new();
        for constraint in spec.specs() {
            let name = constraint.split_whitespace().next().unwrap_or(constraint);
            let dist_name = format!("{name}-1.0-0");
            let url_base = format!(
                "https://mock.channel/conda-forge/{}/{dist_name}",
                spec.platform()
            );
            link.push(LinkAction {
                dist_name: dist_name.clone(),
                channel: "conda-forge".to_owned(),
                subdir: spec.platform().to_owned(),
                url: format!("{url_base}.tar.bz2"),
                url_conda: format!("{url_base}.conda"),
                url_base: url_base.clone(),
            });
            if !self.skip_fetch.iter().any(|s| s == name) {
                fetch.push(FetchAction {
                    file_name: format!("{dist_name}.conda"),
                    url: format!("{url_base}.conda"),
                    md5: Self::mock_md5(&dist_name),
                });
            }
        }
        Ok(DryRunResult { fetch, link })
    }

    fn install(&self, lock_path: &Path, prefix: &Path, create: bool) -> Result<(), SolverError> {
        self.installs
            .lock()
            .expect("install log not poisoned")
            .push((lock_path.to_path_buf(), prefix.to_path_buf(), create));
        if self.fail_install {
            return Err(SolverError::InstallFailed("mock install failure".to_owned()));
        }
        std::fs::create_dir_all(prefix)?;
        Ok(())
    }

    fn remove_env(&self, prefix: &Path) -> Result<(), SolverError> {
        if prefix.exists() {
            std::fs::remove_dir_all(prefix)?;
        }
        Ok(())
    }

    fn list_packages(&self, _prefix: &Path) -> Result<Vec<PackageRecord>, SolverError> {
        Ok(self
            .snapshots
            .lock()
            .expect("snapshot queue not poisoned")
            .pop_front()
            .unwrap_or_default())
    }
}

/// Deterministic pin tool for tests: each requirement line is pinned to
/// version 1.0.
#[derive(Default)]
pub struct MockPip {
    fail_compile: bool,
    fail_install: bool,
    pub installs: Mutex<Vec<PathBuf>>,
}

impl MockPip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compile_failure() -> Self {
        Self {
            fail_compile: true,
            ..Self::default()
        }
    }

    pub fn with_install_failure() -> Self {
        Self {
            fail_install: true,
            ..Self::default()
        }
    }
}

impl PipRunner for MockPip {
    fn compile(&self, requirements: &str) -> Result<String, SolverError> {
        if self.fail_compile {
            return Err(SolverError::Failed("mock pin failure".to_owned()));
        }
        let mut pinned = String::new();
        for line in requirements.lines().filter(|l| !l.trim().is_empty()) {
            let name = line.split_whitespace().next().unwrap_or(line);
            pinned.push_str(&format!("{name}==1.0\n"));
        }
        Ok(pinned)
    }

    fn install(&self, _prefix: &Path, lock_path: &Path) -> Result<(), SolverError> {
        self.installs
            .lock()
            .expect("install log not poisoned")
            .push(lock_path.to_path_buf());
        if self.fail_install {
            return Err(SolverError::InstallFailed(
                "mock pip install failure".to_owned(),
            ));
        }
        Ok(())
    }
}
