//! Error types for configuration loading and validation.

/// Errors that can occur when loading, validating or resolving `forge.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field holds a value outside its accepted set.
    #[error("invalid value '{value}' for {field} (expected {expected})")]
    InvalidConfiguration {
        /// Dotted path of the field (e.g. `build.placer`).
        field: String,
        /// The rejected value.
        value: String,
        /// What would have been accepted.
        expected: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("project.name".to_string());
        assert_eq!(format!("{err}"), "missing required field: project.name");
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_invalid_configuration() {
        let err = ConfigError::InvalidConfiguration {
            field: "build.placer".to_string(),
            value: "bogus".to_string(),
            expected: "one of: sa, heap".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "invalid value 'bogus' for build.placer (expected one of: sa, heap)"
        );
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }
}
