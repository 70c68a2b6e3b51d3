//! `forge check`: validate the composition and show what a build would do.

use std::fmt::Write as _;
use std::path::Path;

use forge_build::Pipeline;
use forge_config::{resolve_build, BuildOverrides};
use forge_toolchain::{RenderContext, ToolchainError};

use crate::pipeline::load_project;
use crate::GlobalArgs;

/// Runs the `forge check` command.
///
/// Composes the SoC and plans the stages without running any program, then
/// prints the CSR table, the memory map, the bus wiring and the stage
/// commands. Composition errors are returned as errors.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (project_dir, config) = load_project(global)?;
    let resolved = resolve_build(&config, &project_dir, &BuildOverrides::default())?;
    let pipeline = Pipeline::prepare(resolved)?;

    if !global.quiet {
        eprintln!("   Checked {}", pipeline.build().project_name);
    }
    print!("{}", describe(&pipeline)?);
    Ok(0)
}

/// Renders the report printed by `forge check`.
fn describe(pipeline: &Pipeline) -> Result<String, ToolchainError> {
    let composition = pipeline.composition();
    let layout = composition.csr_layout;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "CSR banks (base {:#010x}, stride {:#x}):",
        layout.base, layout.stride
    );
    for slot in composition.csr.slots() {
        let address = layout
            .address(slot.index)
            .map_or_else(|| "overflow".to_string(), |a| format!("{a:#010x}"));
        let _ = writeln!(out, "  {:>3}  {:<16} {}", slot.index, slot.name, address);
    }

    let _ = writeln!(out, "Memory regions:");
    for region in composition.memory.regions() {
        let _ = writeln!(
            out,
            "  {:<10} {:<16} {:#010x}  {:#x}",
            region.bus_id.as_str(),
            region.name,
            region.base_address,
            region.size
        );
    }

    let _ = writeln!(out, "Buses:");
    for bus in composition.buses.bus_ids() {
        let _ = writeln!(
            out,
            "  {:<10} masters [{}] slaves [{}]",
            bus.as_str(),
            composition.buses.masters(bus).join(", "),
            composition.buses.slaves(bus).join(", ")
        );
    }

    let build = pipeline.build();
    let netlist = Path::new("<run>").join(format!("{}.v", build.build_name));
    let ctx = RenderContext::for_build(build, &netlist);
    let _ = writeln!(out, "Stages:");
    for stage in pipeline.stages() {
        let argv = stage.render(&ctx)?;
        let _ = writeln!(out, "  {:<6} {}", stage.name(), argv.join(" "));
    }

    let _ = writeln!(out, "Fingerprint: {}", composition.fingerprint());
    Ok(out)
}
