pub mod completions;
pub mod install;
pub mod lock;
pub mod show;
pub mod status;
pub mod uninstall;

use burrow_core::{CoreError, SubsystemState};
use burrow_solver::{ConflictGraph, SolverError};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_SOLVER_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn state_label(state: SubsystemState) -> &'static str {
    match state {
        SubsystemState::NoLock => "no lock",
        SubsystemState::LockedUnused => "not installed",
        SubsystemState::LockedCurrent => "up to date",
        SubsystemState::LockedStale => "out of date",
    }
}

pub fn colorize_state(state: SubsystemState) -> String {
    let label = state_label(state);
    match state {
        SubsystemState::LockedCurrent => Style::new().green().apply_to(label).to_string(),
        SubsystemState::LockedStale => Style::new().red().apply_to(label).to_string(),
        SubsystemState::LockedUnused => Style::new().yellow().apply_to(label).to_string(),
        SubsystemState::NoLock => Style::new().dim().apply_to(label).to_string(),
    }
}

/// Render an engine error for the terminal. Solver refusals get the full
/// diagnostic treatment; everything else uses its display form.
pub fn render_core_error(err: &CoreError) -> String {
    match err {
        CoreError::Solver(solver_err) => render_solver_failure(solver_err),
        other => other.to_string(),
    }
}

fn render_solver_failure(err: &SolverError) -> String {
    match err {
        SolverError::PackagesNotFound { packages } => {
            let mut out = String::from("packages not found in the configured channels:\n");
            for package in packages {
                let _ = writeln!(out, "  - {package}");
            }
            out.trim_end().to_owned()
        }
        SolverError::Unsatisfiable { message, conflicts } => {
            if conflicts.is_empty() {
                format!("unsatisfiable dependency constraints:\n{message}")
            } else {
                format!(
                    "unsatisfiable dependency constraints\n{}",
                    render_conflicts(conflicts)
                )
            }
        }
        SolverError::MalformedOutput { raw } => {
            format!("solver produced malformed output:\n{raw}")
        }
        other => other.to_string(),
    }
}

/// Human rendering of a conflict graph: unavailable packages first, then
/// over-constrained ones, with one line per unmet requirement edge and a
/// root-cause callout when the graph points at one.
pub fn render_conflicts(graph: &ConflictGraph) -> String {
    let bad = Style::new().red().bold();
    let dim = Style::new().dim();
    let mut out = String::new();

    for (name, conflict) in graph.conflicts.iter().filter(|(_, c)| !c.compatible) {
        let _ = writeln!(out, "Cannot find package {}.", bad.apply_to(name));
        write_edges(&mut out, name, conflict, &dim);
    }
    for (name, conflict) in graph.conflicts.iter().filter(|(_, c)| c.compatible) {
        let _ = writeln!(
            out,
            "Cannot determine version of {}.",
            bad.apply_to(name)
        );
        if let Some(constraint) = &conflict.root_constraint {
            let _ = writeln!(out, "  requested directly: {}", dim.apply_to(constraint));
        }
        write_edges(&mut out, name, conflict, &dim);
    }

    let roots: Vec<&str> = graph.incompatible().collect();
    match roots.len() {
        0 => {}
        1 => {
            let _ = writeln!(out, "Probable root cause: {}.", bad.apply_to(roots[0]));
        }
        _ => {
            let joined = roots.join(", ");
            let _ = writeln!(out, "Probable root causes: {}.", bad.apply_to(joined));
        }
    }
    out.trim_end().to_owned()
}

fn write_edges(out: &mut String, name: &str, conflict: &burrow_solver::Conflict, dim: &Style) {
    for edge in &conflict.children {
        let requirement = edge
            .required_version
            .as_deref()
            .map_or_else(|| name.to_owned(), |v| format!("{name} {v}"));
        let _ = writeln!(
            out,
            "  - {} {} requires {}",
            edge.parent_name,
            dim.apply_to(&edge.parent_version),
            requirement
        );
    }
}
