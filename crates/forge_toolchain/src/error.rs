//! Error types for stage construction and rendering.

/// Errors raised while building or rendering toolchain stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolchainError {
    /// A named override was applied to the same stage twice.
    #[error("override '{name}' is already applied to stage '{stage}'")]
    DuplicateOverride {
        /// The stage.
        stage: String,
        /// The override name.
        name: String,
    },

    /// A stage was built with no command tokens.
    #[error("stage '{stage}' has an empty command")]
    EmptyCommand {
        /// The stage.
        stage: String,
    },

    /// An override or template refers to a stage that is not in the pipeline.
    #[error("unknown toolchain stage '{stage}'")]
    UnknownStage {
        /// The missing stage name.
        stage: String,
    },

    /// A template token references a placeholder with no value.
    #[error("stage '{stage}' references unknown placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder {
        /// The stage being rendered.
        stage: String,
        /// The placeholder name, without braces.
        placeholder: String,
    },
}
