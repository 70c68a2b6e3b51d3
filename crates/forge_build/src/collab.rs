//! The external programs a build drives, behind traits.

use std::path::{Path, PathBuf};

use serde::Serialize;

use forge_compose::Composition;
use forge_config::{ConfigError, ResolvedBuild};

use crate::cancel::CancelToken;
use crate::process::run_process;

/// File the elaborator reads its request from, inside the run directory.
pub const ELABORATION_REQUEST_FILE: &str = "composition.json";

/// Outcome of one external program run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Exit code; `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl Invocation {
    /// Returns `true` for a zero exit code.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The output to show a user when the program failed: stderr, or stdout
    /// for tools that report errors there.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Why an external program produced no [`Invocation`].
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The cancel token was raised before or while the program ran.
    #[error("cancelled")]
    Cancelled,
    /// The program could not be started or waited on.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs toolchain stage commands.
pub trait Toolchain {
    /// Runs the rendered command of `stage` in `cwd`.
    fn invoke(
        &self,
        stage: &str,
        argv: &[String],
        cwd: &Path,
        cancel: &CancelToken,
    ) -> Result<Invocation, InvocationError>;

    /// Resolves `program` to an executable, or `None` if it is not installed.
    fn locate(&self, program: &str) -> Option<PathBuf> {
        find_in_path(program)
    }
}

/// Everything the elaborator gets to see for one run.
#[derive(Debug, Clone, Copy)]
pub struct ElaborationJob<'a> {
    /// The resolved build.
    pub build: &'a ResolvedBuild,
    /// The finalized composition.
    pub composition: &'a Composition,
    /// Directory the netlist must be written to.
    pub run_dir: &'a Path,
}

impl ElaborationJob<'_> {
    /// Where the netlist is expected: `<run_dir>/<build_name>.v`.
    pub fn netlist_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.v", self.build.build_name))
    }

    /// Where pin constraints are expected, if the elaborator emits them.
    pub fn constraints_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.pcf", self.build.build_name))
    }
}

/// Turns a composition into an HDL netlist.
///
/// The netlist is opaque to forge; it is only handed on to synthesis.
pub trait Elaborator {
    /// Programs that must be installed for [`elaborate`](Self::elaborate).
    fn programs(&self) -> Vec<String>;

    /// Writes the netlist for `job` to [`ElaborationJob::netlist_path`].
    fn elaborate(
        &self,
        job: &ElaborationJob<'_>,
        cancel: &CancelToken,
    ) -> Result<Invocation, InvocationError>;
}

/// Runs stage commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessToolchain;

impl Toolchain for ProcessToolchain {
    fn invoke(
        &self,
        stage: &str,
        argv: &[String],
        cwd: &Path,
        cancel: &CancelToken,
    ) -> Result<Invocation, InvocationError> {
        tracing::debug!(stage, command = %argv.join(" "), "spawning");
        run_process(argv, cwd, cancel)
    }
}

/// The request written for a [`CommandElaborator`].
#[derive(Debug, Serialize)]
struct ElaborationRequest<'a> {
    project: &'a str,
    build_name: &'a str,
    top: &'a str,
    device: &'a str,
    package: &'a str,
    clock_hz: u64,
    use_pll: bool,
    composition: &'a Composition,
}

/// Runs a configured elaborator command.
///
/// The composition and target details are written to
/// [`ELABORATION_REQUEST_FILE`] in the run directory, and the command is
/// called as
/// `<command> --request <file> --output-dir <run_dir> --build-name <name>`,
/// followed by `--no-pll` when the PLL is disabled.
#[derive(Debug, Clone)]
pub struct CommandElaborator {
    command: Vec<String>,
}

impl CommandElaborator {
    /// Creates an elaborator from explicit command tokens.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Creates the elaborator configured in `[toolchain] elaborator`.
    pub fn from_build(build: &ResolvedBuild) -> Result<Self, ConfigError> {
        if build.elaborator.is_empty() {
            return Err(ConfigError::MissingField("toolchain.elaborator".to_string()));
        }
        Ok(Self::new(build.elaborator.clone()))
    }

    fn argv(&self, job: &ElaborationJob<'_>, request: &Path) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.extend([
            "--request".to_string(),
            request.display().to_string(),
            "--output-dir".to_string(),
            job.run_dir.display().to_string(),
            "--build-name".to_string(),
            job.build.build_name.clone(),
        ]);
        if !job.build.use_pll {
            argv.push("--no-pll".to_string());
        }
        argv
    }
}

impl Elaborator for CommandElaborator {
    fn programs(&self) -> Vec<String> {
        self.command.first().cloned().into_iter().collect()
    }

    fn elaborate(
        &self,
        job: &ElaborationJob<'_>,
        cancel: &CancelToken,
    ) -> Result<Invocation, InvocationError> {
        let build = job.build;
        let request = ElaborationRequest {
            project: &build.project_name,
            build_name: &build.build_name,
            top: &build.top,
            device: &build.device,
            package: &build.package,
            clock_hz: build.clock.hz(),
            use_pll: build.use_pll,
            composition: job.composition,
        };
        let path = job.run_dir.join(ELABORATION_REQUEST_FILE);
        let json = serde_json::to_string_pretty(&request).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;

        let argv = self.argv(job, &path);
        tracing::debug!(command = %argv.join(" "), "spawning elaborator");
        run_process(&argv, job.run_dir, cancel)
    }
}

/// Searches `PATH` for an executable named `program`.
///
/// A name containing a path separator is checked as given.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
