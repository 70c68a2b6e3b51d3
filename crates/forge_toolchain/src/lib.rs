//! Command templates for the external synthesis toolchain.
//!
//! A [`ToolchainStage`] is a base command plus an ordered list of named
//! overrides. Overrides only ever append tokens, so the relative order of
//! flags some tools are sensitive to is never disturbed, and each named
//! override can be applied at most once per stage.
//!
//! [`plan_stages`] turns a resolved build into the synthesis,
//! place-and-route and packaging stages, with seed, placer and density flags
//! layered on top of the built-in iCE40 templates.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;
pub mod ice40;
pub mod overrides;
pub mod plan;
pub mod render;
pub mod stage;

pub use artifact::ArtifactKind;
pub use error::ToolchainError;
pub use overrides::OverrideKind;
pub use plan::{plan_stages, required_programs};
pub use render::RenderContext;
pub use stage::{Override, StageOutput, ToolchainStage};
