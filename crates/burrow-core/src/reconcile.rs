use burrow_solver::PackageRecord;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Marker recording the system-subsystem hash installed into a prefix.
pub const CONDA_MARKER_FILE: &str = "conda_hash.txt";

/// Marker recording the language-subsystem hash installed into a prefix.
pub const PIP_MARKER_FILE: &str = "pip_hash.txt";

/// Reconciliation state of one package subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubsystemState {
    /// No lock manifest exists for the active platform; locking must happen
    /// before any install decision.
    NoLock,
    /// A lock exists but the environment prefix has never been created.
    LockedUnused,
    /// The installed-state marker matches the manifest's embedded hash.
    LockedCurrent,
    /// Marker missing or different from the manifest hash.
    LockedStale,
}

impl SubsystemState {
    pub fn needs_install(self) -> bool {
        matches!(self, Self::LockedUnused | Self::LockedStale)
    }
}

/// Derive a subsystem's state from its lock hash, the prefix existence, and
/// the recorded marker.
pub fn subsystem_state(
    lock_hash: Option<&str>,
    prefix_exists: bool,
    marker: Option<&str>,
) -> SubsystemState {
    let Some(hash) = lock_hash else {
        return SubsystemState::NoLock;
    };
    if !prefix_exists {
        return SubsystemState::LockedUnused;
    }
    match marker {
        Some(recorded) if recorded == hash => SubsystemState::LockedCurrent,
        _ => SubsystemState::LockedStale,
    }
}

/// Action decided for the system-package subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CondaStep {
    Skip,
    /// Incremental install into the existing prefix.
    Update,
    /// Recreate the prefix from scratch.
    Create,
}

/// Combined install decision across both subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    pub conda: CondaStep,
    pub pip: bool,
}

/// Decide the install plan from both subsystem states.
///
/// A full recreate of the system subsystem is forced when both subsystems
/// are stale at once: pip-style installs do not support removal reliably, so
/// replacing language packages wants a fresh base environment underneath.
/// `language` is `None` when the spec declares no language-level packages.
pub fn plan_install(system: SubsystemState, language: Option<SubsystemState>) -> InstallPlan {
    let language_needs = language.is_some_and(SubsystemState::needs_install);

    let conda = if !system.needs_install() {
        CondaStep::Skip
    } else if system == SubsystemState::LockedUnused {
        CondaStep::Create
    } else if language_needs {
        CondaStep::Create
    } else {
        CondaStep::Update
    };

    InstallPlan {
        conda,
        pip: language_needs,
    }
}

/// Read a subsystem marker from the environment prefix.
pub fn read_marker(prefix: &Path, marker_file: &str) -> Option<String> {
    let path = prefix.join(marker_file);
    fs::read_to_string(path).ok().map(|s| s.trim().to_owned())
}

/// Record a subsystem hash after a successful install. This must be the
/// last step of that subsystem's install: a crash before this write leaves
/// the marker reflecting "not yet installed".
pub fn write_marker(prefix: &Path, marker_file: &str, hash: &str) -> std::io::Result<()> {
    fs::write(prefix.join(marker_file), hash)
}

/// Remove a subsystem marker (used when the subsystem disappears from the
/// spec entirely).
pub fn clear_marker(prefix: &Path, marker_file: &str) -> std::io::Result<()> {
    let path = prefix.join(marker_file);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// One package-level change across an install operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageChange {
    pub name: String,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub channel: String,
}

/// Presentational before/after diff of an install operation. Never feeds
/// back into the reconciliation decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDiff {
    pub removed: Vec<PackageChange>,
    pub added: Vec<PackageChange>,
    pub updated: Vec<PackageChange>,
}

impl PackageDiff {
    /// Compute three disjoint name-keyed sets: removed (before only), added
    /// (after only), updated (both, with a different recorded version).
    pub fn between(before: &[PackageRecord], after: &[PackageRecord]) -> Self {
        let mut diff = Self::default();

        for old in before {
            if !after.iter().any(|p| p.name == old.name) {
                diff.removed.push(PackageChange {
                    name: old.name.clone(),
                    old_version: Some(old.version.clone()),
                    new_version: None,
                    channel: old.channel.clone(),
                });
            }
        }
        for new in after {
            match before.iter().find(|p| p.name == new.name) {
                None => diff.added.push(PackageChange {
                    name: new.name.clone(),
                    old_version: None,
                    new_version: Some(new.version.clone()),
                    channel: new.channel.clone(),
                }),
                Some(old) if old.version != new.version => diff.updated.push(PackageChange {
                    name: new.name.clone(),
                    old_version: Some(old.version.clone()),
                    new_version: Some(new.version.clone()),
                    channel: new.channel.clone(),
                }),
                Some(_) => {}
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_owned(),
            version: version.to_owned(),
            channel: "conda-forge".to_owned(),
        }
    }

    #[test]
    fn missing_lock_means_no_lock() {
        assert_eq!(subsystem_state(None, true, None), SubsystemState::NoLock);
    }

    #[test]
    fn absent_prefix_means_locked_unused() {
        assert_eq!(
            subsystem_state(Some("abc123"), false, None),
            SubsystemState::LockedUnused
        );
    }

    #[test]
    fn matching_marker_means_current() {
        assert_eq!(
            subsystem_state(Some("abc123"), true, Some("abc123")),
            SubsystemState::LockedCurrent
        );
    }

    #[test]
    fn mismatched_marker_means_stale() {
        assert_eq!(
            subsystem_state(Some("abc123"), true, Some("xyz789")),
            SubsystemState::LockedStale
        );
    }

    #[test]
    fn missing_marker_means_stale() {
        assert_eq!(
            subsystem_state(Some("abc123"), true, None),
            SubsystemState::LockedStale
        );
    }

    #[test]
    fn state_is_independent_of_other_subsystem() {
        // Conda stale regardless of what pip looks like; the combinator,
        // not the state function, couples the two.
        for pip_marker in [None, Some("abc123"), Some("zzz")] {
            assert_eq!(
                subsystem_state(Some("abc123"), true, Some("xyz789")),
                SubsystemState::LockedStale,
                "pip marker {pip_marker:?} must not affect conda state"
            );
        }
    }

    #[test]
    fn plan_skips_when_everything_current() {
        let plan = plan_install(
            SubsystemState::LockedCurrent,
            Some(SubsystemState::LockedCurrent),
        );
        assert_eq!(plan.conda, CondaStep::Skip);
        assert!(!plan.pip);
    }

    #[test]
    fn plan_updates_when_only_system_stale() {
        let plan = plan_install(
            SubsystemState::LockedStale,
            Some(SubsystemState::LockedCurrent),
        );
        assert_eq!(plan.conda, CondaStep::Update);
        assert!(!plan.pip);
    }

    #[test]
    fn plan_updates_when_system_stale_without_language_subsystem() {
        let plan = plan_install(SubsystemState::LockedStale, None);
        assert_eq!(plan.conda, CondaStep::Update);
        assert!(!plan.pip);
    }

    #[test]
    fn plan_recreates_when_both_stale() {
        let plan = plan_install(
            SubsystemState::LockedStale,
            Some(SubsystemState::LockedStale),
        );
        assert_eq!(plan.conda, CondaStep::Create);
        assert!(plan.pip);
    }

    #[test]
    fn plan_creates_when_prefix_absent() {
        let plan = plan_install(
            SubsystemState::LockedUnused,
            Some(SubsystemState::LockedUnused),
        );
        assert_eq!(plan.conda, CondaStep::Create);
        assert!(plan.pip);
    }

    #[test]
    fn plan_pip_only_when_only_language_stale() {
        let plan = plan_install(
            SubsystemState::LockedCurrent,
            Some(SubsystemState::LockedStale),
        );
        assert_eq!(plan.conda, CondaStep::Skip);
        assert!(plan.pip);
    }

    #[test]
    fn markers_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_marker(dir.path(), CONDA_MARKER_FILE).is_none());
        write_marker(dir.path(), CONDA_MARKER_FILE, "abc123").unwrap();
        assert_eq!(
            read_marker(dir.path(), CONDA_MARKER_FILE).as_deref(),
            Some("abc123")
        );
        clear_marker(dir.path(), CONDA_MARKER_FILE).unwrap();
        assert!(read_marker(dir.path(), CONDA_MARKER_FILE).is_none());
    }

    #[test]
    fn diff_scenario_from_snapshots() {
        let before = vec![record("a", "1.0")];
        let after = vec![record("a", "2.0"), record("b", "1.0")];
        let diff = PackageDiff::between(&before, &after);
        assert!(diff.removed.is_empty());
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "b");
        assert_eq!(diff.updated.len(), 1);
        assert_eq!(diff.updated[0].name, "a");
        assert_eq!(diff.updated[0].old_version.as_deref(), Some("1.0"));
        assert_eq!(diff.updated[0].new_version.as_deref(), Some("2.0"));
    }

    #[test]
    fn diff_reports_removals() {
        let before = vec![record("a", "1.0"), record("b", "1.0")];
        let after = vec![record("b", "1.0")];
        let diff = PackageDiff::between(&before, &after);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].name, "a");
        assert!(diff.added.is_empty());
        assert!(diff.updated.is_empty());
    }

    #[test]
    fn identical_snapshots_yield_empty_diff() {
        let snapshot = vec![record("a", "1.0")];
        assert!(PackageDiff::between(&snapshot, &snapshot).is_empty());
    }
}
