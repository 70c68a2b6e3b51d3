//! `forge doctor`: toolchain diagnostics.

use std::process::Command;

use forge_build::{find_in_path, CommandElaborator, Elaborator, Pipeline};
use forge_config::{resolve_build, BuildOverrides};
use forge_toolchain::{ice40, required_programs};

use crate::pipeline::load_project;
use crate::GlobalArgs;

/// Runs the `forge doctor` command.
///
/// Returns 0 when every program the project needs is installed, 1 otherwise.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    println!("=== Forge Doctor ===");
    println!();
    println!("Forge version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("--- Project Status ---");
    let programs = match project_programs(global) {
        Ok((name, programs)) => {
            println!("  Project: {name}");
            programs
        }
        Err(e) => {
            println!("  forge.toml: {e}");
            println!("  Checking the built-in iCE40 flow instead.");
            builtin_programs()
        }
    };
    println!();

    println!("--- Required Programs ---");
    let mut missing = 0;
    for program in &programs {
        if !print_tool_status(program) {
            missing += 1;
        }
    }
    println!();

    if missing == 0 {
        println!("All required programs found.");
        Ok(0)
    } else {
        println!("{missing} required program(s) missing.");
        Ok(1)
    }
}

/// The programs a build of the current project would run.
fn project_programs(
    global: &GlobalArgs,
) -> Result<(String, Vec<String>), Box<dyn std::error::Error>> {
    let (project_dir, config) = load_project(global)?;
    let resolved = resolve_build(&config, &project_dir, &BuildOverrides::default())?;
    let mut programs = match CommandElaborator::from_build(&resolved) {
        Ok(elaborator) => elaborator.programs(),
        Err(e) => {
            println!("  Elaborator: {e}");
            Vec::new()
        }
    };
    let name = resolved.project_name.clone();
    let pipeline = Pipeline::prepare(resolved)?;
    for program in required_programs(pipeline.stages()) {
        if !programs.contains(&program) {
            programs.push(program);
        }
    }
    Ok((name, programs))
}

fn builtin_programs() -> Vec<String> {
    let stages: Vec<_> = ice40::STAGE_ORDER
        .iter()
        .filter_map(|name| ice40::stage(name, None).ok())
        .collect();
    required_programs(&stages)
}

/// Prints where `name` was found and its version line. Returns whether it
/// was found.
fn print_tool_status(name: &str) -> bool {
    let Some(path) = find_in_path(name) else {
        println!("  {name:<16} not found");
        return false;
    };
    let version = Command::new(&path)
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .map(str::to_string)
        })
        .unwrap_or_default();
    println!("  {name:<16} {} {version}", path.display());
    true
}
