//! `forge build`: composition, elaboration, synthesis, place-and-route and
//! packing, in a fresh run directory.

use forge_build::{
    BuildOrchestrator, CancelToken, CommandElaborator, ErrorKind, Pipeline, PipelineRun,
    ProcessToolchain, RunStatus,
};
use forge_config::{resolve_build, BuildOverrides};
use forge_toolchain::ArtifactKind;

use crate::pipeline::load_project;
use crate::{BuildArgs, GlobalArgs};

/// Exit code for a build stopped by Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

/// Runs the `forge build` command.
///
/// Everything that can be checked without running a program (configuration,
/// composition, stage commands, installed programs) is checked first and
/// reported as an error. Returns 0 on success, 1 if a stage fails and 130 if
/// the build is cancelled.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (project_dir, config) = load_project(global)?;
    let overrides = BuildOverrides {
        seed: args.seed,
        placer: args.placer.clone(),
        no_pll: args.no_pll,
        output_dir: args.output_dir.clone(),
    };
    let resolved = resolve_build(&config, &project_dir, &overrides)?;

    if !global.quiet {
        eprintln!(
            "   Building {} ({} {}-{}, {})",
            resolved.project_name,
            resolved.platform.name,
            resolved.device,
            resolved.package,
            resolved.clock
        );
    }

    let elaborator = CommandElaborator::from_build(&resolved)?;
    let pipeline = Pipeline::prepare(resolved)?;

    if !global.quiet {
        let composition = pipeline.composition();
        eprintln!(
            "   Composed {} peripherals, {} CSR banks, {} memory regions",
            composition.peripherals.len(),
            composition.csr.len(),
            composition.memory.regions().count()
        );
        let build = pipeline.build();
        let placer = build.placer.map_or("default".to_string(), |p| p.to_string());
        eprintln!(
            "   Options seed {}, placer {}, pll {}",
            build.seed,
            placer,
            if build.use_pll { "on" } else { "off" }
        );
    }

    let orchestrator = BuildOrchestrator::new(elaborator, ProcessToolchain);
    watch_for_interrupt(orchestrator.cancel_token());
    let run = orchestrator.run(&pipeline)?;

    if run.status() == RunStatus::Succeeded {
        if !global.quiet {
            report_success(&run);
        }
        Ok(0)
    } else {
        Ok(report_failure(&run))
    }
}

fn report_success(run: &PipelineRun) {
    eprintln!("   Finished run {}", run.id());
    for (label, kind) in [
        ("Bitstream", ArtifactKind::Bitstream),
        ("Registers", ArtifactKind::RegisterMap),
        ("Memory", ArtifactKind::AddressMap),
    ] {
        if let Some(path) = run.artifact(kind) {
            eprintln!("   {label:>9} {}", path.display());
        }
    }
}

/// Prints the failing stage and its diagnostics, and picks the exit code.
fn report_failure(run: &PipelineRun) -> i32 {
    let Some(err) = run.error() else {
        eprintln!("error: run {} failed", run.id());
        return 1;
    };
    eprintln!("error: {err}");
    if let Some(diagnostics) = err.diagnostics() {
        for line in diagnostics.lines() {
            eprintln!("  | {line}");
        }
    }
    eprintln!("  run directory: {}", run.run_dir().display());
    match err.kind() {
        ErrorKind::Cancelled => EXIT_CANCELLED,
        _ => 1,
    }
}

/// Cancels `token` on Ctrl-C for the rest of the process.
fn watch_for_interrupt(token: CancelToken) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "Ctrl-C handling unavailable");
                return;
            }
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            eprintln!("   Cancelling build");
            token.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_build::{FailureReason, StageFailure};
    use forge_common::Fingerprint;

    fn failed_run(failure: StageFailure) -> PipelineRun {
        let mut run = PipelineRun::new(
            "r1",
            Fingerprint::from_bytes(b"soc"),
            "/tmp/forge-test/runs/r1",
            vec!["synth".to_string(), "pnr".to_string()],
        );
        run.start().unwrap();
        run.fail(failure).unwrap();
        run
    }

    #[test]
    fn stage_failure_exits_one() {
        let run = failed_run(
            StageFailure::new("synth", FailureReason::Exited { exit_code: Some(1) })
                .with_diagnostics("ERROR: syntax error"),
        );
        assert_eq!(report_failure(&run), 1);
    }

    #[test]
    fn cancellation_exits_130() {
        let run = failed_run(StageFailure::new("pnr", FailureReason::Cancelled));
        assert_eq!(report_failure(&run), EXIT_CANCELLED);
    }
}
