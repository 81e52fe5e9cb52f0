mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SOLVER_ERROR};
use burrow_core::{Engine, EnvContext, InstallOptions};
use burrow_solver::{CondaCli, PipCli};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "burrow",
    version,
    about = "Declarative multi-platform environment manager"
)]
struct Cli {
    /// Root directory holding environments and the package cache.
    #[arg(long, default_value = "~/.local/share/burrow")]
    root: String,

    /// Solver executable to invoke (falls back to $CONDA_EXE, then "conda").
    #[arg(long)]
    conda_exe: Option<PathBuf>,

    /// Target platform (defaults to the host platform).
    #[arg(long)]
    platform: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile lock files from environment.yml.
    Lock {
        /// Only lock the conda subsystem.
        #[arg(long, default_value_t = false, conflicts_with = "pip_only")]
        conda_only: bool,
        /// Only lock the pip subsystem.
        #[arg(long, default_value_t = false)]
        pip_only: bool,
    },
    /// Bring the environment in line with the lock files.
    Install {
        /// Reinstall even when the environment is current.
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Recreate the environment instead of updating in place.
        #[arg(long, default_value_t = false)]
        prune: bool,
    },
    /// Report drift between spec, locks, and the installed environment.
    Status,
    /// List installed packages.
    Show,
    /// Remove the environment (lock files stay).
    Uninstall,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BURROW_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    if let Commands::Completions { shell } = &cli.command {
        return match commands::completions::run::<Cli>(*shell) {
            Ok(code) => ExitCode::from(code),
            Err(_) => ExitCode::from(EXIT_FAILURE),
        };
    }

    let platform = match resolve_platform(cli.platform.as_deref()) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let project_dir = match std::env::current_dir() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: cannot determine working directory: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let root = expand_tilde(&cli.root);
    let mut ctx = EnvContext::new(project_dir, &root, platform);
    if let Ok(envs) = std::env::var("CONDA_ENVS_PATH") {
        ctx = ctx.with_envs_dir(expand_tilde(&envs));
    }
    if let Ok(pkgs) = std::env::var("CONDA_PKGS_DIRS") {
        ctx = ctx.with_pkgs_dir(expand_tilde(&pkgs));
    }

    let conda_exe = cli
        .conda_exe
        .or_else(|| std::env::var_os("CONDA_EXE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("conda"));
    tracing::debug!(
        "environment {} on {} (prefix {}, solver {})",
        ctx.env_name,
        ctx.platform,
        ctx.prefix.display(),
        conda_exe.display()
    );
    let solver = CondaCli::new(conda_exe, &ctx.pkgs_dir);
    let engine = Engine::new(ctx, Box::new(solver), Box::new(PipCli::default()));
    let json_output = cli.json;

    let result = match cli.command {
        Commands::Lock {
            conda_only,
            pip_only,
        } => commands::lock::run(&engine, !pip_only, !conda_only, json_output),
        Commands::Install { force, prune } => {
            let options = InstallOptions {
                force,
                prune,
                with_diff: true,
            };
            commands::install::run(&engine, options, json_output)
        }
        Commands::Status => commands::status::run(&engine, json_output),
        Commands::Show => commands::show::run(&engine, json_output),
        Commands::Uninstall => commands::uninstall::run(&engine, json_output),
        Commands::Completions { .. } => unreachable!("handled before engine setup"),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("spec error")
                || msg.starts_with("lock error")
                || msg.starts_with("no lock file")
                || msg.starts_with("platform ")
            {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("packages not found")
                || msg.starts_with("unsatisfiable")
                || msg.starts_with("solver")
            {
                EXIT_SOLVER_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn resolve_platform(requested: Option<&str>) -> Result<String, String> {
    match requested {
        Some(p) => {
            if burrow_schema::PLATFORMS.contains(&p) {
                Ok(p.to_owned())
            } else {
                Err(format!(
                    "unknown platform '{p}' (known: {})",
                    burrow_schema::PLATFORMS.join(", ")
                ))
            }
        }
        None => burrow_schema::host_platform()
            .map(str::to_owned)
            .ok_or_else(|| {
                format!(
                    "unsupported host platform {}-{}",
                    std::env::consts::OS,
                    std::env::consts::ARCH
                )
            }),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
