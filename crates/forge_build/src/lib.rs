//! Build orchestration: from a resolved project to a bitstream.
//!
//! A build composes the SoC, plans the toolchain stages and checks that every
//! required program is installed before anything runs. The
//! [`BuildOrchestrator`] then drives the elaborator and each toolchain stage
//! in order inside a fresh run directory, stopping at the first failure, and
//! exports the register map once the bitstream exists.
//!
//! External programs are reached through the [`Elaborator`] and
//! [`Toolchain`] traits so that tests can script them.

#![warn(missing_docs)]

pub mod cancel;
pub mod collab;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod register_map;
pub mod run;

pub use cancel::CancelToken;
pub use collab::{
    find_in_path, CommandElaborator, ElaborationJob, Elaborator, Invocation, InvocationError,
    ProcessToolchain, Toolchain,
};
pub use error::{BuildError, ErrorKind};
pub use orchestrator::{BuildOrchestrator, Pipeline};
pub use register_map::{render_address_map, render_register_map};
pub use run::{FailureReason, PipelineRun, RunStatus, StageFailure};
