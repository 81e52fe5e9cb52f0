use super::{json_pretty, render_core_error, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use burrow_core::{CondaStep, Engine, InstallOptions, PackageChange, PackageDiff};
use console::Style;

pub fn run(engine: &Engine, options: InstallOptions, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("reconciling environment..."))
    };

    let report = match engine.install(options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                let msg = match (r.plan.conda, r.plan.pip) {
                    (CondaStep::Skip, false) => "environment already up to date",
                    (CondaStep::Create, _) => "environment created",
                    _ => "environment updated",
                };
                spin_ok(pb, msg);
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "install failed");
            }
            return Err(render_core_error(&e));
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else if let Some(diff) = &report.diff {
        print_diff(diff);
    }
    Ok(EXIT_SUCCESS)
}

fn print_diff(diff: &PackageDiff) {
    if diff.is_empty() {
        return;
    }
    let removed = Style::new().red();
    let added = Style::new().green();
    let updated = Style::new().yellow();

    for change in &diff.removed {
        println!(
            "  {} {} {}",
            removed.apply_to("-"),
            change.name,
            version_of(change)
        );
    }
    for change in &diff.added {
        println!(
            "  {} {} {}",
            added.apply_to("+"),
            change.name,
            version_of(change)
        );
    }
    for change in &diff.updated {
        println!(
            "  {} {} {} -> {}",
            updated.apply_to("~"),
            change.name,
            change.old_version.as_deref().unwrap_or("?"),
            change.new_version.as_deref().unwrap_or("?")
        );
    }
}

fn version_of(change: &PackageChange) -> &str {
    change
        .new_version
        .as_deref()
        .or(change.old_version.as_deref())
        .unwrap_or("?")
}
