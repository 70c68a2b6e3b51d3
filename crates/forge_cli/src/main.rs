//! Forge CLI: composes an FPGA SoC and drives the toolchain that builds it.
//!
//! Provides `forge build` to run the full pipeline from composition to
//! bitstream, `forge check` to validate the composition without running any
//! program, and `forge doctor` to report which required programs are
//! installed.

#![warn(missing_docs)]

mod build;
mod check;
mod doctor;
mod pipeline;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Forge: SoC composition and FPGA build orchestration.
#[derive(Parser, Debug)]
#[command(name = "forge", version, about = "SoC composition and FPGA build orchestration")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `forge.toml` file or a project directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose the SoC and build a bitstream.
    Build(BuildArgs),
    /// Validate the composition and print the register and address maps.
    Check,
    /// Report which required programs are installed.
    Doctor,
}

/// Arguments for the `forge build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Place-and-route seed (default 0).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Placer algorithm: `sa` or `heap`.
    #[arg(long, value_name = "PLACER")]
    pub placer: Option<String>,

    /// Build without the clock-generating PLL.
    #[arg(long)]
    pub no_pll: bool,

    /// Root directory for run directories (default `build`).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file or project directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Check => check::run(&global),
        Command::Doctor => doctor::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` takes precedence over the flags.
fn init_logging(global: &GlobalArgs) {
    let default = default_log_level(global);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    }
}
