use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One unmet requirement edge: `parent_name parent_version` requires
/// `required_version` of the conflicting package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictEdge {
    pub parent_name: String,
    pub parent_version: String,
    pub required_version: Option<String>,
}

/// Accumulated conflict state for one required package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    /// The root ask: the version constraint requested directly, when a line
    /// names the package without a requiring parent.
    pub root_constraint: Option<String>,
    pub children: Vec<ConflictEdge>,
    /// `false` once some other package's unmet requirement cascades from
    /// this one — the package is plausibly unavailable outright rather than
    /// merely over-constrained.
    pub compatible: bool,
}

impl Default for Conflict {
    fn default() -> Self {
        Self {
            root_constraint: None,
            children: Vec::new(),
            compatible: true,
        }
    }
}

/// Structured rendering of an unsatisfiable-constraint message. Keyed by
/// required-package name; BTreeMap so report ordering is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictGraph {
    pub conflicts: BTreeMap<String, Conflict>,
}

impl ConflictGraph {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Names of the packages marked incompatible: the probable root causes
    /// of the failure, plausibly unavailable outright.
    pub fn incompatible(&self) -> impl Iterator<Item = &str> {
        self.conflicts
            .iter()
            .filter(|(_, c)| !c.compatible)
            .map(|(name, _)| name.as_str())
    }
}

/// Grammar for one line of solver prose. An optional leading dash marks a
/// transitive link; an optional `name[version='c']` or `name==v` prefix is
/// the requiring package; the mandatory trailing name (with optional version
/// qualifier) is the required package. Multi-hop chains only bind their
/// final hop; the rest of the line is ignored.
fn conflict_pattern() -> &'static Regex {
    static PAT: OnceLock<Regex> = OnceLock::new();
    PAT.get_or_init(|| {
        Regex::new(
            r"^(- )?(?:([A-Za-z0-9_.-]+)(?:\[version='([^']+)'\]|(==?[^\s]+)) -> )?([A-Za-z0-9_.-]+)(?:\[version='([^']+)'\]|(==?[^\s]+))?",
        )
        .expect("conflict pattern is valid")
    })
}

/// Best-effort scrape of the solver's human-readable unsatisfiable report.
///
/// Lines that do not match the expected shape, or that carry no version
/// information on either side, are silently skipped: the diagnostic degrades
/// gracefully to a partial or empty graph instead of failing the run.
pub fn parse_unsatisfiable_message(message: &str) -> ConflictGraph {
    let pattern = conflict_pattern();
    let mut graph = ConflictGraph::default();

    for line in message.lines() {
        let Some(caps) = pattern.captures(line.trim()) else {
            continue;
        };
        let transitive = caps.get(1).is_some();
        let parent_name = caps.get(2).map(|m| m.as_str());
        let parent_version = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str());
        let dep_name = &caps[5];
        let dep_version = caps.get(6).or_else(|| caps.get(7)).map(|m| m.as_str());

        if parent_version.is_none() && dep_version.is_none() {
            continue;
        }

        let entry = graph.conflicts.entry(dep_name.to_owned()).or_default();
        match parent_name {
            None => entry.root_constraint = dep_version.map(ToOwned::to_owned),
            Some(parent) => {
                if transitive {
                    entry.compatible = false;
                }
                entry.children.push(ConflictEdge {
                    parent_name: parent.to_owned(),
                    parent_version: parent_version.unwrap_or_default().to_owned(),
                    required_version: dep_version.map(ToOwned::to_owned),
                });
            }
        }
    }
    graph
}
