//! Sequencing elaboration, toolchain stages and export for one run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use forge_common::{Fingerprint, InternalError};
use forge_compose::{compose, Composition};
use forge_config::ResolvedBuild;
use forge_toolchain::{plan_stages, ArtifactKind, RenderContext, ToolchainError, ToolchainStage};

use crate::cancel::CancelToken;
use crate::collab::{ElaborationJob, Elaborator, Invocation, InvocationError, Toolchain};
use crate::error::BuildError;
use crate::register_map::{export, write_run_record};
use crate::run::{FailureReason, PipelineRun, StageFailure};

/// Name of the elaboration step in run records.
pub const ELABORATE: &str = "elaborate";
/// Name of the register-map export step in run records.
pub const EXPORT: &str = "export";

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A build whose composition and stage commands have been validated.
///
/// Everything that can be rejected without running a program has been
/// rejected by the time a `Pipeline` exists.
#[derive(Debug, Clone)]
pub struct Pipeline {
    build: ResolvedBuild,
    composition: Composition,
    stages: Vec<ToolchainStage>,
}

impl Pipeline {
    /// Composes the SoC and plans the toolchain stages for `build`.
    pub fn prepare(build: ResolvedBuild) -> Result<Self, BuildError> {
        let composition = compose(&build.peripherals, &build.platform, build.csr_layout)?;
        let stages = plan_stages(&build)?;
        Ok(Self {
            build,
            composition,
            stages,
        })
    }

    /// The resolved build.
    pub fn build(&self) -> &ResolvedBuild {
        &self.build
    }

    /// The finalized composition.
    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Toolchain stages in execution order.
    pub fn stages(&self) -> &[ToolchainStage] {
        &self.stages
    }
}

/// Why the stage loop stopped early.
enum Abort {
    Stage(StageFailure),
    Internal(InternalError),
}

impl From<StageFailure> for Abort {
    fn from(failure: StageFailure) -> Self {
        Abort::Stage(failure)
    }
}

impl From<InternalError> for Abort {
    fn from(err: InternalError) -> Self {
        Abort::Internal(err)
    }
}

/// Runs pipelines with a given elaborator and toolchain.
///
/// Stages run strictly one after another. The first failure ends the run;
/// nothing is retried.
pub struct BuildOrchestrator<E, T> {
    elaborator: E,
    toolchain: T,
    cancel: CancelToken,
}

impl<E: Elaborator, T: Toolchain> BuildOrchestrator<E, T> {
    /// Creates an orchestrator with its own cancel token.
    pub fn new(elaborator: E, toolchain: T) -> Self {
        Self {
            elaborator,
            toolchain,
            cancel: CancelToken::new(),
        }
    }

    /// Uses `cancel` instead of the orchestrator's own token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The elaborator.
    pub fn elaborator(&self) -> &E {
        &self.elaborator
    }

    /// The toolchain.
    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// A handle that cancels runs of this orchestrator.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Checks that every program the pipeline needs can be found.
    pub fn preflight(&self, pipeline: &Pipeline) -> Result<(), BuildError> {
        let elaborator = self.elaborator.programs();
        let needed = elaborator
            .iter()
            .map(|p| (p.as_str(), ELABORATE))
            .chain(
                pipeline
                    .stages
                    .iter()
                    .flat_map(|s| s.required_programs().map(move |p| (p, s.name()))),
            );
        for (program, stage) in needed {
            if self.toolchain.locate(program).is_none() {
                return Err(BuildError::MissingProgram {
                    program: program.to_string(),
                    needed_by: stage.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Runs `pipeline` in a fresh run directory under its output directory.
    ///
    /// Returns `Err` only for problems found before the first program is
    /// started (missing programs, unrenderable commands, an unwritable output
    /// directory). Once the run has started, stage failures and cancellation
    /// are reported through the returned run's status and
    /// [`PipelineRun::error`].
    pub fn run(&self, pipeline: &Pipeline) -> Result<PipelineRun, BuildError> {
        self.preflight(pipeline)?;

        let build = &pipeline.build;
        let fingerprint = pipeline.composition.fingerprint();
        // Programs run with the run directory as their working directory, so
        // every path handed to them must be absolute.
        let output_dir = std::path::absolute(&build.output_dir).map_err(|source| BuildError::Io {
            path: build.output_dir.clone(),
            source,
        })?;
        let (id, run_dir) = next_run_dir(&output_dir, &fingerprint);

        let job = ElaborationJob {
            build,
            composition: &pipeline.composition,
            run_dir: &run_dir,
        };
        let ctx = RenderContext::for_build(build, &job.netlist_path());
        let commands = pipeline
            .stages
            .iter()
            .map(|stage| Ok((stage, stage.render(&ctx)?, stage.render_outputs(&ctx)?)))
            .collect::<Result<Vec<_>, ToolchainError>>()?;

        create_run_dir(&run_dir)?;

        let stage_names = std::iter::once(ELABORATE.to_string())
            .chain(pipeline.stages.iter().map(|s| s.name().to_string()))
            .chain(std::iter::once(EXPORT.to_string()))
            .collect();
        let mut run = PipelineRun::new(id, fingerprint, run_dir.clone(), stage_names);
        run.start()?;
        tracing::info!(run = run.id(), dir = %run_dir.display(), "pipeline started");

        match self.execute(pipeline, &job, &commands, &mut run) {
            Ok(()) => {
                run.succeed()?;
                tracing::info!(run = run.id(), "pipeline succeeded");
            }
            Err(Abort::Stage(failure)) => {
                tracing::warn!(run = run.id(), stage = %failure.stage, "pipeline failed");
                run.fail(failure)?;
            }
            Err(Abort::Internal(err)) => return Err(err.into()),
        }

        if let Err(e) = write_run_record(&run) {
            tracing::warn!(run = run.id(), error = %e, "could not write run record");
        }
        Ok(run)
    }

    fn execute(
        &self,
        pipeline: &Pipeline,
        job: &ElaborationJob<'_>,
        commands: &[(&ToolchainStage, Vec<String>, Vec<(ArtifactKind, String)>)],
        run: &mut PipelineRun,
    ) -> Result<(), Abort> {
        self.check_cancelled(ELABORATE)?;
        tracing::info!(stage = ELABORATE, "running stage");
        let invocation = self
            .elaborator
            .elaborate(job, &self.cancel)
            .map_err(|e| invocation_failure(ELABORATE, e))?;
        check_exit(ELABORATE, &invocation)?;
        let netlist = job.netlist_path();
        require_output(ELABORATE, &netlist)?;
        run.record_artifact(ArtifactKind::Netlist, netlist)?;
        let constraints = job.constraints_path();
        if constraints.is_file() {
            run.record_artifact(ArtifactKind::PinConstraints, constraints)?;
        }
        run.complete_stage(ELABORATE)?;

        for (stage, argv, outputs) in commands {
            let name = stage.name();
            self.check_cancelled(name)?;
            tracing::info!(stage = name, "running stage");
            tracing::debug!(stage = name, command = %argv.join(" "));
            let invocation = self
                .toolchain
                .invoke(name, argv, job.run_dir, &self.cancel)
                .map_err(|e| invocation_failure(name, e))?;
            check_exit(name, &invocation)?;
            for (kind, relative) in outputs {
                let path = job.run_dir.join(relative);
                require_output(name, &path)?;
                run.record_artifact(*kind, path)?;
            }
            run.complete_stage(name)?;
        }

        self.check_cancelled(EXPORT)?;
        let exported = export(
            &pipeline.composition,
            job.run_dir,
            pipeline.build.csr_csv.as_deref(),
        )
        .map_err(|e| match e {
            BuildError::Io { path, source } => StageFailure::new(
                EXPORT,
                FailureReason::Io {
                    path: Some(path),
                    message: source.to_string(),
                },
            ),
            other => StageFailure::new(
                EXPORT,
                FailureReason::Io {
                    path: None,
                    message: other.to_string(),
                },
            ),
        })?;
        run.record_artifact(ArtifactKind::RegisterMap, exported.register_map)?;
        run.record_artifact(ArtifactKind::AddressMap, exported.address_map)?;
        run.complete_stage(EXPORT)?;
        Ok(())
    }

    fn check_cancelled(&self, stage: &str) -> Result<(), StageFailure> {
        if self.cancel.is_cancelled() {
            tracing::info!(stage, "cancelled before stage start");
            return Err(StageFailure::new(stage, FailureReason::Cancelled));
        }
        Ok(())
    }
}

fn invocation_failure(stage: &str, err: InvocationError) -> StageFailure {
    match err {
        InvocationError::Cancelled => {
            tracing::info!(stage, "stage cancelled");
            StageFailure::new(stage, FailureReason::Cancelled)
        }
        InvocationError::Io(e) => StageFailure::new(
            stage,
            FailureReason::Io {
                path: None,
                message: e.to_string(),
            },
        ),
    }
}

fn check_exit(stage: &str, invocation: &Invocation) -> Result<(), StageFailure> {
    if invocation.success() {
        return Ok(());
    }
    tracing::debug!(stage, exit_code = ?invocation.exit_code, "stage exited unsuccessfully");
    Err(StageFailure::new(
        stage,
        FailureReason::Exited {
            exit_code: invocation.exit_code,
        },
    )
    .with_diagnostics(invocation.diagnostics()))
}

fn require_output(stage: &str, path: &Path) -> Result<(), StageFailure> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StageFailure::new(
            stage,
            FailureReason::MissingOutput {
                path: path.to_path_buf(),
            },
        ))
    }
}

/// Picks the id and directory of the next run: `<output_dir>/runs/<id>`.
///
/// The id combines the composition fingerprint, the wall clock, the process
/// id and a per-process sequence number.
fn next_run_dir(output_dir: &Path, fingerprint: &Fingerprint) -> (String, PathBuf) {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let id = format!(
        "{millis}-{}-{}-{seq}",
        fingerprint.short(8),
        std::process::id()
    );
    let dir = output_dir.join("runs").join(&id);
    (id, dir)
}

fn create_run_dir(run_dir: &Path) -> Result<(), BuildError> {
    if let Some(parent) = run_dir.parent() {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    // `create_dir` fails on an existing directory, so two runs can never
    // share one.
    std::fs::create_dir(run_dir).map_err(|source| BuildError::Io {
        path: run_dir.to_path_buf(),
        source,
    })
}
