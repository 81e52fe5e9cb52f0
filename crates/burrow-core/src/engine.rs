use crate::compiler::compile_lock;
use crate::context::EnvContext;
use crate::reconcile::{
    clear_marker, plan_install, read_marker, subsystem_state, write_marker, CondaStep, InstallPlan,
    PackageDiff, SubsystemState, CONDA_MARKER_FILE, PIP_MARKER_FILE,
};
use crate::CoreError;
use burrow_schema::{
    manifest_env_hash, pip_lock_env_hash, write_lock_file, EnvFile, LockSpecification,
    PIP_LOCK_HEADER,
};
use burrow_solver::{PackageRecord, PipRunner, Solver};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Orchestrates lock compilation, drift reconciliation, and install
/// execution for one project environment. All decisions flow from the
/// immutable [`EnvContext`]; the solver and pin tool are trait objects so
/// tests run against in-process fakes.
pub struct Engine {
    ctx: EnvContext,
    solver: Box<dyn Solver>,
    pip: Box<dyn PipRunner>,
}

/// What a lock run produced.
#[derive(Debug, Default, Serialize)]
pub struct LockOutcome {
    /// Platforms a conda lock manifest was written for.
    pub conda_platforms: Vec<String>,
    /// Whether the language-subsystem lock file was written.
    pub pip_written: bool,
    /// Lock files deleted because their platform left the spec, or because
    /// the spec no longer declares language packages.
    pub removed: Vec<PathBuf>,
}

/// Reconciliation report for `status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub env_name: String,
    pub platform: String,
    pub prefix: PathBuf,
    pub system: SubsystemState,
    /// `None` when the spec declares no language-level packages.
    pub language: Option<SubsystemState>,
    pub plan: InstallPlan,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Reinstall both subsystems even when markers are current.
    pub force: bool,
    /// Recreate the environment prefix instead of updating in place.
    pub prune: bool,
    /// Snapshot packages before and after to produce a diff.
    pub with_diff: bool,
}

/// What an install run did.
#[derive(Debug, Serialize)]
pub struct InstallReport {
    pub plan: InstallPlan,
    /// Lock outcome when locks had to be compiled first.
    pub locked: Option<LockOutcome>,
    pub diff: Option<PackageDiff>,
}

impl Engine {
    pub fn new(ctx: EnvContext, solver: Box<dyn Solver>, pip: Box<dyn PipRunner>) -> Self {
        Self { ctx, solver, pip }
    }

    pub fn context(&self) -> &EnvContext {
        &self.ctx
    }

    /// Compile lock files from the spec. `conda` and `pip` select the
    /// subsystems to lock; platforms are processed sequentially and each
    /// manifest is written whole, so a failure on one platform leaves
    /// already-written manifests valid.
    pub fn lock(&self, conda: bool, pip: bool) -> Result<LockOutcome, CoreError> {
        let env = EnvFile::load(&self.ctx.spec_path, &self.ctx.platform)?;
        let spec_text = fs::read_to_string(&self.ctx.spec_path)?;
        let mut outcome = LockOutcome::default();

        if conda {
            outcome.removed = self.remove_stale_conda_locks(&env)?;
            for platform in &env.platforms {
                let spec = LockSpecification::from_spec_text(&spec_text, platform)?;
                info!(
                    "locking {} for {platform} ({} specs)",
                    self.ctx.env_name,
                    spec.specs().len()
                );
                let lines = compile_lock(self.solver.as_ref(), &spec)?;
                let path = self.ctx.conda_lock_path(platform);
                write_lock_file(&path, &format!("{}\n", lines.join("\n")))?;
                debug!("wrote {}", path.display());
                outcome.conda_platforms.push(platform.clone());
            }
        }

        if pip {
            let path = self.ctx.pip_lock_path();
            if env.uses_pip() {
                let requirements = format!("{}\n", env.pip_requirements.join("\n"));
                let pinned = self.pip.compile(&requirements)?;
                let hash = hex::encode(Sha256::digest(pinned.as_bytes()));
                let content = format!("{PIP_LOCK_HEADER}\n# env_hash: {hash}\n\n{pinned}");
                write_lock_file(&path, &content)?;
                debug!("wrote {}", path.display());
                outcome.pip_written = true;
            } else if path.exists() {
                // The spec no longer declares language packages; a leftover
                // lock would keep reporting the subsystem as present.
                fs::remove_file(&path)?;
                outcome.removed.push(path);
            }
        }

        Ok(outcome)
    }

    /// Delete conda lock manifests whose platform is no longer declared.
    fn remove_stale_conda_locks(&self, env: &EnvFile) -> Result<Vec<PathBuf>, CoreError> {
        let keep: Vec<String> = env
            .platforms
            .iter()
            .map(|p| burrow_schema::conda_lock_file_name(p))
            .collect();
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.ctx.project_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("conda-") && name.ends_with(".lock") && !keep.contains(&name) {
                warn!("removing stale lock file {name}");
                fs::remove_file(entry.path())?;
                removed.push(entry.path());
            }
        }
        removed.sort();
        Ok(removed)
    }

    /// Embedded hash of the host-platform conda lock manifest, if present.
    fn conda_lock_hash(&self) -> Result<Option<String>, CoreError> {
        let path = self.ctx.conda_lock_path(&self.ctx.platform);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        manifest_env_hash(&content)
            .map(Some)
            .ok_or_else(|| CoreError::MissingLock(self.ctx.platform.clone()))
    }

    fn subsystem_states(
        &self,
        env: &EnvFile,
    ) -> Result<(SubsystemState, Option<SubsystemState>), CoreError> {
        let prefix_exists = self.ctx.prefix.is_dir();

        let conda_hash = self.conda_lock_hash()?;
        let conda_marker = read_marker(&self.ctx.prefix, CONDA_MARKER_FILE);
        let system = subsystem_state(conda_hash.as_deref(), prefix_exists, conda_marker.as_deref());

        let language = if env.uses_pip() {
            let pip_hash = pip_lock_env_hash(self.ctx.pip_lock_path())?;
            let pip_marker = read_marker(&self.ctx.prefix, PIP_MARKER_FILE);
            Some(subsystem_state(
                pip_hash.as_deref(),
                prefix_exists,
                pip_marker.as_deref(),
            ))
        } else {
            None
        };

        Ok((system, language))
    }

    /// Report both subsystem states and the install plan they imply.
    pub fn status(&self) -> Result<StatusReport, CoreError> {
        let env = EnvFile::load(&self.ctx.spec_path, &self.ctx.platform)?;
        let (system, language) = self.subsystem_states(&env)?;
        Ok(StatusReport {
            env_name: self.ctx.env_name.clone(),
            platform: self.ctx.platform.clone(),
            prefix: self.ctx.prefix.clone(),
            system,
            language,
            plan: plan_install(system, language),
        })
    }

    /// Bring the environment prefix in line with the lock files, compiling
    /// them first when missing. Marker writes happen after the subsystem's
    /// install succeeds and never on failure, so an interrupted run is
    /// re-planned cleanly next time.
    pub fn install(&self, options: InstallOptions) -> Result<InstallReport, CoreError> {
        let env = EnvFile::load(&self.ctx.spec_path, &self.ctx.platform)?;

        let locked = if self.needs_lock(&env) {
            info!("lock files missing, compiling them first");
            Some(self.lock(true, true)?)
        } else {
            None
        };

        if !env.platforms.contains(&self.ctx.platform) {
            return Err(CoreError::UnsupportedHost(self.ctx.platform.clone()));
        }

        let (mut system, mut language) = self.subsystem_states(&env)?;
        if options.force {
            system = SubsystemState::LockedStale;
            language = language.map(|_| SubsystemState::LockedStale);
        }
        let mut plan = plan_install(system, language);
        if options.prune {
            plan.conda = CondaStep::Create;
        }
        // Recreating the prefix wipes language packages, so any create must
        // rerun the pip step when the spec declares one.
        if plan.conda == CondaStep::Create && language.is_some() {
            plan.pip = true;
        }

        let before = if options.with_diff {
            self.snapshot()?
        } else {
            Vec::new()
        };

        if plan.conda != CondaStep::Skip {
            let lock_path = self.ctx.conda_lock_path(&self.ctx.platform);
            let hash = self
                .conda_lock_hash()?
                .ok_or_else(|| CoreError::MissingLock(self.ctx.platform.clone()))?;
            let create = plan.conda == CondaStep::Create;
            info!(
                "{} {} from {}",
                if create { "creating" } else { "updating" },
                self.ctx.env_name,
                lock_path.display()
            );
            self.solver.install(&lock_path, &self.ctx.prefix, create)?;
            write_marker(&self.ctx.prefix, CONDA_MARKER_FILE, &hash)?;
            if create {
                // A fresh prefix has no pip marker, so the plan's pip step
                // already covers reinstallation when the spec wants it.
                clear_marker(&self.ctx.prefix, PIP_MARKER_FILE)?;
            }
        }

        if plan.pip {
            let lock_path = self.ctx.pip_lock_path();
            let hash = pip_lock_env_hash(&lock_path)?
                .ok_or_else(|| CoreError::MissingLock("pip".to_owned()))?;
            info!("installing language packages from {}", lock_path.display());
            self.pip.install(&self.ctx.prefix, &lock_path)?;
            write_marker(&self.ctx.prefix, PIP_MARKER_FILE, &hash)?;
        } else if language.is_none() {
            clear_marker(&self.ctx.prefix, PIP_MARKER_FILE)?;
        }

        let diff = if options.with_diff {
            let after = self.snapshot()?;
            Some(PackageDiff::between(&before, &after))
        } else {
            None
        };

        Ok(InstallReport { plan, locked, diff })
    }

    /// Remove the environment prefix entirely. Lock files stay in place; the
    /// next install recreates the environment from them. Returns `false`
    /// when there was nothing to remove.
    pub fn uninstall(&self) -> Result<bool, CoreError> {
        if !self.ctx.prefix.exists() {
            info!("environment {} does not exist", self.ctx.env_name);
            return Ok(false);
        }
        info!("removing environment {}", self.ctx.env_name);
        self.solver.remove_env(&self.ctx.prefix)?;
        Ok(true)
    }

    /// Installed-package snapshot, empty when the prefix does not exist yet.
    pub fn snapshot(&self) -> Result<Vec<PackageRecord>, CoreError> {
        if !self.ctx.prefix.is_dir() {
            return Ok(Vec::new());
        }
        Ok(self.solver.list_packages(&self.ctx.prefix)?)
    }

    fn needs_lock(&self, env: &EnvFile) -> bool {
        let conda_missing = env
            .platforms
            .iter()
            .any(|p| !self.ctx.conda_lock_path(p).exists());
        let pip_missing = env.uses_pip() && !self.ctx.pip_lock_path().exists();
        conda_missing || pip_missing
    }
}
