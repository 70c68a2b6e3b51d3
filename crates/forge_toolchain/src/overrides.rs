//! The named overrides a resolved build layers onto the built-in stages.

use std::fmt;

use forge_config::ResolvedBuild;

use crate::ice40::{PNR, SYNTH};

/// A named, per-stage command override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// Packing-density flags appended to synthesis.
    DensityFlags,
    /// `--seed N` for place-and-route. Always applied.
    Seed,
    /// `--placer NAME` for place-and-route. Only applied when selected.
    Placer,
}

impl OverrideKind {
    /// The override name recorded on the stage.
    pub fn name(self) -> &'static str {
        match self {
            OverrideKind::DensityFlags => "density_flags",
            OverrideKind::Seed => "seed",
            OverrideKind::Placer => "placer",
        }
    }

    /// The stage this override targets.
    pub fn stage(self) -> &'static str {
        match self {
            OverrideKind::DensityFlags => SYNTH,
            OverrideKind::Seed | OverrideKind::Placer => PNR,
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lists the overrides `build` asks for, with their tokens, in the order
/// they are applied.
pub fn for_build(build: &ResolvedBuild) -> Vec<(OverrideKind, Vec<String>)> {
    let mut overrides = Vec::new();
    if !build.density_flags.is_empty() {
        overrides.push((OverrideKind::DensityFlags, build.density_flags.clone()));
    }
    overrides.push((
        OverrideKind::Seed,
        vec!["--seed".to_string(), build.seed.to_string()],
    ));
    if let Some(placer) = build.placer {
        overrides.push((
            OverrideKind::Placer,
            vec!["--placer".to_string(), placer.to_string()],
        ));
    }
    overrides
}
