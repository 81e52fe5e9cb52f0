//! Core engine for Burrow.
//!
//! Ties the schema layer and the solver adapter together into the `Engine` —
//! lock compilation per platform, drift reconciliation across the two
//! package subsystems, install execution with hash markers, and before/after
//! package diffs.

pub mod compiler;
pub mod context;
pub mod engine;
pub mod reconcile;

pub use compiler::compile_lock;
pub use context::EnvContext;
pub use engine::{Engine, InstallOptions, InstallReport, LockOutcome, StatusReport};
pub use reconcile::{
    plan_install, subsystem_state, CondaStep, InstallPlan, PackageChange, PackageDiff,
    SubsystemState, CONDA_MARKER_FILE, PIP_MARKER_FILE,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("spec error: {0}")]
    Spec(#[from] burrow_schema::SpecError),
    #[error("lock error: {0}")]
    Lock(#[from] burrow_schema::LockError),
    #[error("solver error: {0}")]
    Solver(#[from] burrow_solver::SolverError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no lock file for platform {0}")]
    MissingLock(String),
    #[error("platform {0} is not supported on this machine")]
    UnsupportedHost(String),
}
