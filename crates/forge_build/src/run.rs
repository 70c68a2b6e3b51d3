//! The record of one pipeline run and its lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use forge_common::{Fingerprint, ForgeResult, InternalError};
use forge_toolchain::ArtifactKind;

use crate::error::BuildError;

/// Lifecycle state of a [`PipelineRun`].
///
/// Runs only move forward: `Pending -> Running -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, nothing started.
    Pending,
    /// Stages are executing.
    Running,
    /// Every stage and the export completed.
    Succeeded,
    /// A stage failed or the run was cancelled.
    Failed,
}

impl RunStatus {
    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What went wrong in the failing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The program exited unsuccessfully.
    Exited {
        /// Exit code, `None` if killed by a signal.
        exit_code: Option<i32>,
    },
    /// The run was cancelled.
    Cancelled,
    /// The program could not be started, or a file could not be written.
    Io {
        /// The file involved, if any.
        path: Option<PathBuf>,
        /// The error message.
        message: String,
    },
    /// The program succeeded without writing a file it declares.
    MissingOutput {
        /// The expected file.
        path: PathBuf,
    },
}

/// The failing stage of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    /// The stage name.
    pub stage: String,
    /// Why it failed.
    #[serde(flatten)]
    pub reason: FailureReason,
    /// Captured diagnostic output.
    pub diagnostics: String,
}

impl StageFailure {
    /// Creates a failure with no diagnostics.
    pub fn new(stage: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            stage: stage.into(),
            reason,
            diagnostics: String::new(),
        }
    }

    /// Attaches captured diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }

    /// Converts the failure into the error reported to the user.
    pub fn to_error(&self) -> BuildError {
        let stage = self.stage.clone();
        match &self.reason {
            FailureReason::Exited { exit_code } => BuildError::ToolchainInvocationFailed {
                stage,
                exit_code: *exit_code,
                diagnostics: self.diagnostics.clone(),
            },
            FailureReason::Cancelled => BuildError::Cancelled { stage },
            FailureReason::Io {
                path: Some(path),
                message,
            } => BuildError::StageIo {
                stage,
                path: path.clone(),
                message: message.clone(),
            },
            FailureReason::Io { path: None, message } => BuildError::ToolchainInvocationFailed {
                stage,
                exit_code: None,
                diagnostics: message.clone(),
            },
            FailureReason::MissingOutput { path } if stage == crate::orchestrator::ELABORATE => {
                BuildError::ElaborationFailed { path: path.clone() }
            }
            FailureReason::MissingOutput { path } => BuildError::ToolchainInvocationFailed {
                stage,
                exit_code: Some(0),
                diagnostics: format!("expected output {} was not produced", path.display()),
            },
        }
    }
}

/// One execution of the build pipeline.
///
/// A run owns its own directory; artifact paths from different runs never
/// collide. Artifacts are recorded as each stage completes, so a failed run
/// keeps exactly the outputs of the stages before the failure.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    id: String,
    fingerprint: String,
    run_dir: PathBuf,
    stages: Vec<String>,
    completed: Vec<String>,
    status: RunStatus,
    artifacts: BTreeMap<ArtifactKind, PathBuf>,
    failure: Option<StageFailure>,
}

impl PipelineRun {
    /// Creates a pending run of `stages` in `run_dir`.
    pub fn new(
        id: impl Into<String>,
        fingerprint: Fingerprint,
        run_dir: impl Into<PathBuf>,
        stages: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            fingerprint: fingerprint.to_string(),
            run_dir: run_dir.into(),
            stages,
            completed: Vec::new(),
            status: RunStatus::Pending,
            artifacts: BTreeMap::new(),
            failure: None,
        }
    }

    fn expect(&self, status: RunStatus, action: &str) -> ForgeResult<()> {
        if self.status == status {
            Ok(())
        } else {
            Err(InternalError::new(format!(
                "cannot {action} run {} in state {}",
                self.id, self.status
            )))
        }
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) -> ForgeResult<()> {
        self.expect(RunStatus::Pending, "start")?;
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Marks `stage` as completed.
    pub fn complete_stage(&mut self, stage: &str) -> ForgeResult<()> {
        self.expect(RunStatus::Running, "complete a stage of")?;
        self.completed.push(stage.to_string());
        Ok(())
    }

    /// Records an artifact produced by the current stage.
    pub fn record_artifact(&mut self, kind: ArtifactKind, path: PathBuf) -> ForgeResult<()> {
        self.expect(RunStatus::Running, "record an artifact of")?;
        self.artifacts.insert(kind, path);
        Ok(())
    }

    /// `Running -> Succeeded`.
    pub fn succeed(&mut self) -> ForgeResult<()> {
        self.expect(RunStatus::Running, "finish")?;
        self.status = RunStatus::Succeeded;
        Ok(())
    }

    /// `Running -> Failed`.
    pub fn fail(&mut self, failure: StageFailure) -> ForgeResult<()> {
        self.expect(RunStatus::Running, "fail")?;
        self.status = RunStatus::Failed;
        self.failure = Some(failure);
        Ok(())
    }

    /// The run id, also the name of the run directory.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hex fingerprint of the composition this run was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The run directory.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Current lifecycle state.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Planned stages in execution order.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Stages that completed, in order.
    pub fn completed_stages(&self) -> &[String] {
        &self.completed
    }

    /// All recorded artifacts.
    pub fn artifacts(&self) -> &BTreeMap<ArtifactKind, PathBuf> {
        &self.artifacts
    }

    /// The artifact of `kind`, if recorded.
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Path> {
        self.artifacts.get(&kind).map(PathBuf::as_path)
    }

    /// The failure of a failed run.
    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    /// The user-facing error of a failed run.
    pub fn error(&self) -> Option<BuildError> {
        self.failure.as_ref().map(StageFailure::to_error)
    }
}
