use super::{json_pretty, render_core_error, EXIT_SUCCESS};
use burrow_core::Engine;
use console::Style;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let packages = engine.snapshot().map_err(|e| render_core_error(&e))?;

    if json {
        println!("{}", json_pretty(&packages)?);
        return Ok(EXIT_SUCCESS);
    }

    if packages.is_empty() {
        println!("no packages installed");
        return Ok(EXIT_SUCCESS);
    }

    let name_width = packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
    let version_width = packages.iter().map(|p| p.version.len()).max().unwrap_or(0);

    let name_style = Style::new().cyan();
    let channel_style = Style::new().dim();
    for package in &packages {
        // Pad before styling so ANSI escapes do not skew the columns.
        let name = format!("{:<name_width$}", package.name);
        let version = format!("{:<version_width$}", package.version);
        println!(
            "{}  {version}  {}",
            name_style.apply_to(name),
            channel_style.apply_to(&package.channel),
        );
    }
    Ok(EXIT_SUCCESS)
}
