use super::{json_pretty, render_core_error, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use burrow_core::Engine;

pub fn run(engine: &Engine, conda: bool, pip: bool, json: bool) -> Result<u8, String> {
    let pb = if json {
        None
    } else {
        Some(spinner("resolving environment..."))
    };

    let outcome = match engine.lock(conda, pip) {
        Ok(o) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "lock files written");
            }
            o
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "lock failed");
            }
            return Err(render_core_error(&e));
        }
    };

    if json {
        println!("{}", json_pretty(&outcome)?);
    } else {
        for platform in &outcome.conda_platforms {
            println!(
                "wrote {}",
                burrow_schema::conda_lock_file_name(platform)
            );
        }
        if outcome.pip_written {
            println!("wrote {}", burrow_schema::pip_lock_file_name());
        }
        for removed in &outcome.removed {
            println!("removed {}", removed.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
