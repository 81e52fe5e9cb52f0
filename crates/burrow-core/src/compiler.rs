use burrow_schema::{LockSpecification, CONDA_LOCK_HEADER, EXPLICIT_MARKER};
use burrow_solver::{Solver, SolverError};
use tracing::debug;

/// Compile an explicit lock manifest for one platform.
///
/// Invokes the solver's dry run and correlates its LINK actions against its
/// FETCH actions by normalized distribution name. Output ordering follows
/// the LINK action order and every lookup is by explicit key, so repeated
/// compilation of the same dry-run result is byte-identical.
pub fn compile_lock(
    solver: &dyn Solver,
    spec: &LockSpecification,
) -> Result<Vec<String>, SolverError> {
    let result = solver.solve(spec)?;
    debug!(
        "dry run for {}: {} link actions, {} fetch actions",
        spec.platform(),
        result.link.len(),
        result.fetch.len()
    );

    let mut lines = vec![
        CONDA_LOCK_HEADER.to_owned(),
        format!("# platform: {}", spec.platform()),
        format!("# env_hash: {}", spec.env_hash()),
        EXPLICIT_MARKER.to_owned(),
    ];

    let fetch_index = result.fetch_index()?;
    for link in &result.link {
        match fetch_index.get(&link.dist_name) {
            Some(fetch) => lines.push(format!("{}#{}", fetch.url, fetch.md5)),
            // Some backends report already-cached packages only under LINK.
            // A URL without a checksum still installs; a missing line does
            // not, so fall back rather than fail the compilation.
            None => lines.push(link.url.clone()),
        }
    }

    Ok(lines.iter().map(|l| sanitize_line(l)).collect())
}

/// The explicit-lock consumer requires one non-empty token per line: blank
/// lines become a bare `#`, and surrounding whitespace is stripped.
fn sanitize_line(line: &str) -> String {
    let line = line.trim();
    if line.is_empty() {
        "#".to_owned()
    } else {
        line.to_owned()
    }
}
