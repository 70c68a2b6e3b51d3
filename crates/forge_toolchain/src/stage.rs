//! Toolchain stages: a base command plus append-only named overrides.

use serde::Serialize;

use crate::artifact::ArtifactKind;
use crate::error::ToolchainError;
use crate::render::{render_token, RenderContext};

/// Tokens appended to a stage command by a named override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Override {
    /// Override name, unique within a stage.
    pub name: String,
    /// Token offset at which the appended tokens start.
    pub position: usize,
    /// The appended tokens.
    pub tokens: Vec<String>,
}

/// A file a stage is expected to produce, relative to the run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutput {
    /// The artifact kind.
    pub kind: ArtifactKind,
    /// Path template, rendered like command tokens.
    pub path: String,
}

/// One external-tool invocation in the build pipeline.
///
/// The base command is fixed at construction. Overrides append tokens after
/// everything already present and can never remove or reorder them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainStage {
    name: String,
    base_command: Vec<String>,
    overrides: Vec<Override>,
    outputs: Vec<StageOutput>,
    requires: Vec<String>,
}

impl ToolchainStage {
    /// Builds a stage from its default command tokens.
    pub fn new(
        name: impl Into<String>,
        defaults: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ToolchainError> {
        let name = name.into();
        let base_command: Vec<String> = defaults.into_iter().map(Into::into).collect();
        if base_command.is_empty() {
            return Err(ToolchainError::EmptyCommand { stage: name });
        }
        Ok(Self {
            name,
            base_command,
            overrides: Vec::new(),
            outputs: Vec::new(),
            requires: Vec::new(),
        })
    }

    /// Declares an output file of this stage.
    pub fn with_output(mut self, kind: ArtifactKind, path: impl Into<String>) -> Self {
        self.outputs.push(StageOutput {
            kind,
            path: path.into(),
        });
        self
    }

    /// Declares a program the command runs indirectly (e.g. through a shell).
    pub fn with_required_program(mut self, program: impl Into<String>) -> Self {
        self.requires.push(program.into());
        self
    }

    /// Appends `tokens` under the override `name`.
    ///
    /// Each named override may be applied once per stage; a second attempt
    /// fails with [`ToolchainError::DuplicateOverride`] and leaves the stage
    /// unchanged.
    pub fn apply_override(
        &mut self,
        name: &str,
        tokens: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ToolchainError> {
        if self.has_override(name) {
            return Err(ToolchainError::DuplicateOverride {
                stage: self.name.clone(),
                name: name.to_string(),
            });
        }
        let position = self.len();
        self.overrides.push(Override {
            name: name.to_string(),
            position,
            tokens: tokens.into_iter().map(Into::into).collect(),
        });
        Ok(())
    }

    /// Returns `true` if the override `name` has been applied.
    pub fn has_override(&self, name: &str) -> bool {
        self.overrides.iter().any(|o| o.name == name)
    }

    /// Iterates the unrendered command: base tokens, then each override's
    /// tokens in application order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.base_command
            .iter()
            .chain(self.overrides.iter().flat_map(|o| o.tokens.iter()))
            .map(String::as_str)
    }

    /// Number of tokens in the unrendered command.
    pub fn len(&self) -> usize {
        self.base_command.len() + self.overrides.iter().map(|o| o.tokens.len()).sum::<usize>()
    }

    /// Always `false`; a stage has at least its program token.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Renders the final argument vector, filling `{placeholders}` from `ctx`.
    ///
    /// Rendering is a pure function of the stage and the context.
    pub fn render(&self, ctx: &RenderContext) -> Result<Vec<String>, ToolchainError> {
        self.tokens()
            .map(|token| render_token(&self.name, token, ctx))
            .collect()
    }

    /// Renders the declared output paths.
    pub fn render_outputs(
        &self,
        ctx: &RenderContext,
    ) -> Result<Vec<(ArtifactKind, String)>, ToolchainError> {
        self.outputs
            .iter()
            .map(|o| Ok((o.kind, render_token(&self.name, &o.path, ctx)?)))
            .collect()
    }

    /// The stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The program the command starts.
    pub fn program(&self) -> &str {
        &self.base_command[0]
    }

    /// Every program that must be installed for this stage to run.
    pub fn required_programs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program()).chain(self.requires.iter().map(String::as_str))
    }

    /// The tokens the stage was built with.
    pub fn base_command(&self) -> &[String] {
        &self.base_command
    }

    /// Applied overrides in application order.
    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    /// Declared outputs.
    pub fn outputs(&self) -> &[StageOutput] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pnr() -> ToolchainStage {
        ToolchainStage::new("pnr", ["nextpnr-ice40", "--up5k", "--json", "top.json"]).unwrap()
    }

    #[test]
    fn overrides_append_in_order() {
        let mut stage = pnr();
        stage.apply_override("seed", ["--seed", "42"]).unwrap();
        stage.apply_override("placer", ["--placer", "heap"]).unwrap();
        let tokens: Vec<_> = stage.tokens().collect();
        assert_eq!(
            tokens,
            vec!["nextpnr-ice40", "--up5k", "--json", "top.json", "--seed", "42", "--placer", "heap"]
        );
        assert_eq!(stage.overrides()[0].position, 4);
        assert_eq!(stage.overrides()[1].position, 6);
    }

    #[test]
    fn base_command_is_a_prefix() {
        let mut stage = pnr();
        let base: Vec<String> = stage.base_command().to_vec();
        stage.apply_override("seed", ["--seed", "1"]).unwrap();
        let tokens: Vec<_> = stage.tokens().map(str::to_string).collect();
        assert_eq!(&tokens[..base.len()], base.as_slice());
    }

    #[test]
    fn duplicate_override_rejected_and_stage_unchanged() {
        let mut stage = pnr();
        stage.apply_override("seed", ["--seed", "1"]).unwrap();
        let before = stage.clone();
        let err = stage.apply_override("seed", ["--seed", "2"]).unwrap_err();
        assert!(matches!(err, ToolchainError::DuplicateOverride { .. }));
        assert_eq!(stage, before);
    }

    #[test]
    fn same_override_name_on_different_stages() {
        let mut a = pnr();
        let mut b = ToolchainStage::new("synth", ["yosys"]).unwrap();
        a.apply_override("extra", ["-v"]).unwrap();
        b.apply_override("extra", ["-v"]).unwrap();
    }

    #[test]
    fn empty_command_rejected() {
        let err = ToolchainStage::new("pack", Vec::<String>::new()).unwrap_err();
        assert_eq!(err, ToolchainError::EmptyCommand { stage: "pack".to_string() });
    }

    #[test]
    fn required_programs_include_indirect() {
        let stage = ToolchainStage::new("synth", ["sh", "-c", "exec yosys"])
            .unwrap()
            .with_required_program("yosys");
        let programs: Vec<_> = stage.required_programs().collect();
        assert_eq!(programs, vec!["sh", "yosys"]);
    }

    #[test]
    fn render_is_deterministic() {
        let mut stage = ToolchainStage::new("pnr", ["nextpnr-ice40", "--json", "{build_name}.json"])
            .unwrap()
            .with_output(ArtifactKind::PlacedDesign, "{build_name}.asc");
        stage.apply_override("seed", ["--seed", "7"]).unwrap();
        let ctx = RenderContext::new().with("build_name", "top");
        let first = stage.render(&ctx).unwrap();
        let second = stage.render(&ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec!["nextpnr-ice40", "--json", "top.json", "--seed", "7"]);
        assert_eq!(
            stage.render_outputs(&ctx).unwrap(),
            vec![(ArtifactKind::PlacedDesign, "top.asc".to_string())]
        );
    }
}
