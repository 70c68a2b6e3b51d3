//! `{placeholder}` substitution in command templates.

use std::collections::BTreeMap;
use std::path::Path;

use forge_config::ResolvedBuild;

use crate::error::ToolchainError;

/// Values for the placeholders a stage template may reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one placeholder value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builds the context for one run of `build`.
    ///
    /// Provides `build_name`, `top`, `netlist`, `device`, `package` and
    /// `clock_mhz`.
    pub fn for_build(build: &ResolvedBuild, netlist: &Path) -> Self {
        Self::new()
            .with("build_name", build.build_name.as_str())
            .with("top", build.top.as_str())
            .with("netlist", netlist.display().to_string())
            .with("device", build.device.as_str())
            .with("package", build.package.as_str())
            .with("clock_mhz", build.clock.mhz().to_string())
    }

    /// Returns the value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// A placeholder name is a lowercase identifier. Anything else inside braces
/// is left alone, so shell and script syntax passes through untouched.
fn is_placeholder(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Replaces each `{name}` in `token` with its value from `ctx`.
pub(crate) fn render_token(
    stage: &str,
    token: &str,
    ctx: &RenderContext,
) -> Result<String, ToolchainError> {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_placeholder(&after[..close]) => {
                let key = &after[..close];
                let value = ctx
                    .get(key)
                    .ok_or_else(|| ToolchainError::UnknownPlaceholder {
                        stage: stage.to_string(),
                        placeholder: key.to_string(),
                    })?;
                out.push_str(value);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderContext {
        RenderContext::new()
            .with("build_name", "top")
            .with("device", "up5k")
    }

    #[test]
    fn substitutes_embedded_placeholders() {
        assert_eq!(render_token("pnr", "--{device}", &ctx()).unwrap(), "--up5k");
        assert_eq!(
            render_token("pnr", "{build_name}.{build_name}", &ctx()).unwrap(),
            "top.top"
        );
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = render_token("pack", "{bitstream}", &ctx()).unwrap_err();
        assert_eq!(
            err,
            ToolchainError::UnknownPlaceholder {
                stage: "pack".to_string(),
                placeholder: "bitstream".to_string(),
            }
        );
    }

    #[test]
    fn non_identifier_braces_pass_through() {
        for token in ["${HOME}", "{ }", "a{", "}{", "{A}", "{}"] {
            assert_eq!(render_token("synth", token, &ctx()).unwrap(), token);
        }
    }

    #[test]
    fn placeholder_names() {
        assert!(is_placeholder("clock_mhz"));
        assert!(is_placeholder("a1"));
        assert!(!is_placeholder("1a"));
        assert!(!is_placeholder("Top"));
        assert!(!is_placeholder(""));
    }
}
