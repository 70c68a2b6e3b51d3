//! Error types for build orchestration.

use std::path::PathBuf;

use forge_common::InternalError;
use forge_compose::ComposeError;
use forge_config::ConfigError;
use forge_toolchain::ToolchainError;

/// Broad classes of build failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected before any external process was started.
    Configuration,
    /// An external program failed, or its results could not be handled.
    Execution,
    /// The build was cancelled while a program was running.
    Cancelled,
    /// A bug in forge.
    Internal,
}

/// Errors that can occur while preparing or running a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The project configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The SoC composition is inconsistent.
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// A toolchain stage could not be built or rendered.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    /// A program the pipeline needs is not installed.
    #[error("required program '{program}' not found on PATH (needed by {needed_by})")]
    MissingProgram {
        /// The program name.
        program: String,
        /// The stage that runs it.
        needed_by: String,
    },

    /// The elaborator ran but did not produce a netlist.
    #[error("elaboration produced no netlist at {path}")]
    ElaborationFailed {
        /// Where the netlist was expected.
        path: PathBuf,
    },

    /// An external program exited unsuccessfully or could not be run.
    #[error("stage '{stage}' failed ({})", describe_exit(.exit_code))]
    ToolchainInvocationFailed {
        /// The failing stage.
        stage: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured diagnostic output.
        diagnostics: String,
    },

    /// The build was cancelled.
    #[error("stage '{stage}' cancelled")]
    Cancelled {
        /// The stage that was running.
        stage: String,
    },

    /// A stage could not read or write one of its files.
    #[error("stage '{stage}' failed at {path}: {message}")]
    StageIo {
        /// The stage that was running.
        stage: String,
        /// The path involved.
        path: PathBuf,
        /// The underlying error message.
        message: String,
    },

    /// A file operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An internal invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal or not started".to_string(),
    }
}

impl BuildError {
    /// Returns the broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::Config(_)
            | BuildError::Compose(_)
            | BuildError::Toolchain(_)
            | BuildError::MissingProgram { .. } => ErrorKind::Configuration,
            BuildError::ElaborationFailed { .. }
            | BuildError::ToolchainInvocationFailed { .. }
            | BuildError::StageIo { .. }
            | BuildError::Io { .. } => ErrorKind::Execution,
            BuildError::Cancelled { .. } => ErrorKind::Cancelled,
            BuildError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Captured diagnostics, for errors that carry them.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            BuildError::ToolchainInvocationFailed { diagnostics, .. } if !diagnostics.is_empty() => {
                Some(diagnostics.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_failed_display() {
        let err = BuildError::ToolchainInvocationFailed {
            stage: "synth".to_string(),
            exit_code: Some(1),
            diagnostics: "ERROR: syntax error".to_string(),
        };
        assert_eq!(err.to_string(), "stage 'synth' failed (exit code 1)");
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.diagnostics(), Some("ERROR: syntax error"));
    }

    #[test]
    fn wrapped_errors_are_configuration_kind() {
        let err: BuildError = ToolchainError::DuplicateOverride {
            stage: "pnr".to_string(),
            name: "seed".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "override 'seed' is already applied to stage 'pnr'");

        let err: BuildError = ConfigError::MissingField("project.name".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn cancelled_kind() {
        let err = BuildError::Cancelled {
            stage: "pnr".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.to_string(), "stage 'pnr' cancelled");
    }
}
