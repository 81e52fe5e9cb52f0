use super::{colorize_state, json_pretty, render_core_error, EXIT_SUCCESS};
use burrow_core::{CondaStep, Engine};

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let report = engine.status().map_err(|e| render_core_error(&e))?;

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("environment: {}", report.env_name);
    println!("platform:    {}", report.platform);
    println!("prefix:      {}", report.prefix.display());
    println!("conda:       {}", colorize_state(report.system));
    match report.language {
        Some(state) => println!("pip:         {}", colorize_state(state)),
        None => println!("pip:         not used"),
    }

    let action = match (report.plan.conda, report.plan.pip) {
        (CondaStep::Skip, false) => "nothing to do".to_owned(),
        (CondaStep::Skip, true) => "install pip packages".to_owned(),
        (CondaStep::Create, pip) => format!(
            "create environment{}",
            if pip { " and install pip packages" } else { "" }
        ),
        (CondaStep::Update, pip) => format!(
            "update environment{}",
            if pip { " and install pip packages" } else { "" }
        ),
    };
    println!("next:        {action}");
    Ok(EXIT_SUCCESS)
}
