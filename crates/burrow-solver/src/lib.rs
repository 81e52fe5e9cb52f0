//! External solver adapter for Burrow.
//!
//! The solver is an opaque dry-run-install oracle: we hand it a constraint
//! set and a platform, it tells us exactly which package archives would be
//! fetched and linked. This crate owns that boundary — subprocess invocation
//! with the required environment overrides, normalization of the two backend
//! field layouts into one action-record shape, classification of failures,
//! and best-effort parsing of unsatisfiable-constraint prose into a
//! structured conflict graph.
//!
//! No solver failure is ever retried: failures are deterministic functions
//! of the input spec and the available package indices.

pub mod actions;
pub mod conda;
pub mod diagnose;
pub mod mock;
pub mod pip;

pub use actions::{dist_name_from_file, DryRunResult, FetchAction, LinkAction};
pub use conda::CondaCli;
pub use diagnose::{parse_unsatisfiable_message, Conflict, ConflictEdge, ConflictGraph};
pub use mock::{MockPip, MockSolver};
pub use pip::PipCli;

use burrow_schema::LockSpecification;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("failed to invoke solver: {0}")]
    Io(#[from] std::io::Error),
    /// The solver emitted something that is not JSON: it crashed rather than
    /// refused. Reported with the raw text, fatal.
    #[error("solver produced malformed (non-JSON) output")]
    MalformedOutput { raw: String },
    #[error("packages not found: {}", packages.join(", "))]
    PackagesNotFound { packages: Vec<String> },
    /// Unsatisfiable constraint set. Carries the raw solver message and the
    /// best-effort structured conflict graph parsed from it.
    #[error("unsatisfiable dependency constraints")]
    Unsatisfiable {
        message: String,
        conflicts: ConflictGraph,
    },
    /// Any other classified or unclassified solver refusal.
    #[error("solver failed: {0}")]
    Failed(String),
    /// A package archive name with an unknown suffix. This is a bug in the
    /// correlation between solver backends, not a recoverable condition.
    #[error("unexpected package archive name: {0}")]
    UnexpectedArchive(String),
    /// Non-zero exit from the actual install step (as opposed to the
    /// dry-run). The partially-applied environment is left as-is.
    #[error("install failed: {0}")]
    InstallFailed(String),
}

/// One installed package as reported by the solver's list operation. Used
/// transiently to compute before/after install diffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub channel: String,
}

/// The system-package subsystem boundary. `CondaCli` is the production
/// implementation; `MockSolver` serves tests.
pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    /// Dry-run "what would be installed" query for one platform.
    fn solve(&self, spec: &LockSpecification) -> Result<DryRunResult, SolverError>;

    /// Apply a lock manifest to an environment prefix. `create` replaces the
    /// environment wholesale; otherwise the install is incremental.
    fn install(&self, lock_path: &Path, prefix: &Path, create: bool) -> Result<(), SolverError>;

    /// Remove an environment prefix entirely.
    fn remove_env(&self, prefix: &Path) -> Result<(), SolverError>;

    /// Snapshot of currently installed packages in a prefix.
    fn list_packages(&self, prefix: &Path) -> Result<Vec<PackageRecord>, SolverError>;
}

/// The language-package subsystem boundary: pin a requirement set into an
/// exact lock, and apply that lock into a prefix.
pub trait PipRunner: Send + Sync {
    /// Compile loose requirements into fully pinned lock text.
    fn compile(&self, requirements: &str) -> Result<String, SolverError>;

    /// Install the pinned lock file into the environment prefix.
    fn install(&self, prefix: &Path, lock_path: &Path) -> Result<(), SolverError>;
}
