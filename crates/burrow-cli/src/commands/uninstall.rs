use super::{json_pretty, render_core_error, EXIT_SUCCESS};
use burrow_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let env_name = engine.context().env_name.clone();
    let removed = engine.uninstall().map_err(|e| render_core_error(&e))?;

    if json {
        let payload = serde_json::json!({
            "environment": env_name,
            "status": if removed { "removed" } else { "absent" }
        });
        println!("{}", json_pretty(&payload)?);
    } else if removed {
        println!("removed environment {env_name}");
    } else {
        println!("nothing to remove: environment {env_name} does not exist");
    }
    Ok(EXIT_SUCCESS)
}
