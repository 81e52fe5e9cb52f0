//! Environment specification schema layer for Burrow.
//!
//! This crate defines the read model for the human-edited environment spec
//! (`EnvFile`), the platform-conditional selector preprocessor, the immutable
//! per-platform `LockSpecification` with its canonical SHA-256 environment
//! hash, and the explicit lock manifest format (header fields, per-platform
//! file naming, durable whole-file writes).

pub mod lock;
pub mod platform;
pub mod selector;
pub mod spec;

pub use lock::{
    conda_lock_file_name, manifest_env_hash, manifest_platform, pip_lock_env_hash,
    pip_lock_file_name, write_lock_file, LockError, CONDA_LOCK_HEADER, EXPLICIT_MARKER,
    PIP_LOCK_HEADER,
};
pub use platform::{host_platform, platform_aliases, PLATFORMS};
pub use selector::filter_platform_selectors;
pub use spec::{EnvFile, LockSpecification, SpecError, SPEC_FILE_NAME};
