//! Planning the stage list for one build.

use forge_config::ResolvedBuild;

use crate::error::ToolchainError;
use crate::ice40::{self, STAGE_ORDER};
use crate::overrides;
use crate::stage::ToolchainStage;

/// Builds the synthesis, place-and-route and packaging stages for `build`.
///
/// Stage commands from the project file replace the built-in templates; the
/// seed, placer and density-flag overrides are then appended to whichever
/// command each stage ended up with.
pub fn plan_stages(build: &ResolvedBuild) -> Result<Vec<ToolchainStage>, ToolchainError> {
    if let Some(name) = build
        .stage_commands
        .keys()
        .find(|name| !STAGE_ORDER.contains(&name.as_str()))
    {
        return Err(ToolchainError::UnknownStage {
            stage: name.clone(),
        });
    }

    let mut stages = STAGE_ORDER
        .iter()
        .map(|name| ice40::stage(name, build.stage_commands.get(*name).cloned()))
        .collect::<Result<Vec<_>, _>>()?;

    for (kind, tokens) in overrides::for_build(build) {
        let stage = stages
            .iter_mut()
            .find(|s| s.name() == kind.stage())
            .ok_or_else(|| ToolchainError::UnknownStage {
                stage: kind.stage().to_string(),
            })?;
        tracing::debug!(stage = kind.stage(), %kind, ?tokens, "applying override");
        stage.apply_override(kind.name(), tokens)?;
    }

    Ok(stages)
}

/// Every program the stages need, in first-use order without repeats.
pub fn required_programs(stages: &[ToolchainStage]) -> Vec<String> {
    let mut programs: Vec<String> = Vec::new();
    for program in stages.iter().flat_map(|s| s.required_programs()) {
        if !programs.iter().any(|p| p == program) {
            programs.push(program.to_string());
        }
    }
    programs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ice40::{PACK, PNR, SYNTH};
    use crate::render::RenderContext;
    use forge_config::{load_config_from_str, resolve_build, BuildOverrides};
    use std::path::Path;

    fn build(toml: &str, overrides: BuildOverrides) -> ResolvedBuild {
        let config = load_config_from_str(toml).unwrap();
        resolve_build(&config, Path::new("/proj"), &overrides).unwrap()
    }

    fn minimal(overrides: BuildOverrides) -> ResolvedBuild {
        build("[project]\nname = \"fomu\"\n", overrides)
    }

    fn rendered(stages: &[ToolchainStage], name: &str, build: &ResolvedBuild) -> Vec<String> {
        let ctx = RenderContext::for_build(build, Path::new("/proj/build/top.v"));
        stages
            .iter()
            .find(|s| s.name() == name)
            .unwrap()
            .render(&ctx)
            .unwrap()
    }

    #[test]
    fn stages_in_pipeline_order() {
        let stages = plan_stages(&minimal(BuildOverrides::default())).unwrap();
        let names: Vec<_> = stages.iter().map(ToolchainStage::name).collect();
        assert_eq!(names, vec![SYNTH, PNR, PACK]);
    }

    #[test]
    fn seed_always_present_placer_only_when_selected() {
        let resolved = minimal(BuildOverrides::default());
        let stages = plan_stages(&resolved).unwrap();
        let pnr = rendered(&stages, PNR, &resolved);
        assert_eq!(pnr[pnr.len() - 2..].to_vec(), vec!["--seed", "0"]);
        assert!(!pnr.contains(&"--placer".to_string()));
    }

    #[test]
    fn seed_and_placer_from_cli() {
        let resolved = minimal(BuildOverrides {
            seed: Some(42),
            placer: Some("heap".to_string()),
            ..BuildOverrides::default()
        });
        let stages = plan_stages(&resolved).unwrap();
        let pnr = rendered(&stages, PNR, &resolved);
        assert_eq!(
            pnr[pnr.len() - 4..].to_vec(),
            vec!["--seed", "42", "--placer", "heap"]
        );
    }

    #[test]
    fn density_flags_trail_synthesis() {
        let resolved = minimal(BuildOverrides::default());
        let stages = plan_stages(&resolved).unwrap();
        let synth = rendered(&stages, SYNTH, &resolved);
        assert_eq!(
            synth[synth.len() - 3..].to_vec(),
            vec!["-relut", "-dffe_min_ce_use", "4"]
        );
    }

    #[test]
    fn empty_density_flags_add_no_override() {
        let resolved = build(
            "[project]\nname = \"fomu\"\n[build]\ndensity_flags = []\n",
            BuildOverrides::default(),
        );
        let stages = plan_stages(&resolved).unwrap();
        assert!(stages[0].overrides().is_empty());
    }

    #[test]
    fn replaced_command_still_gets_overrides() {
        let resolved = build(
            "[project]\nname = \"fomu\"\n[toolchain.stages.pnr]\ncommand = \"my-pnr {build_name}.json\"\n",
            BuildOverrides::default(),
        );
        let stages = plan_stages(&resolved).unwrap();
        assert_eq!(
            rendered(&stages, PNR, &resolved),
            vec!["my-pnr", "top.json", "--seed", "0"]
        );
    }

    #[test]
    fn unknown_stage_in_config_rejected() {
        let resolved = build(
            "[project]\nname = \"fomu\"\n[toolchain.stages.route]\ncommand = \"x\"\n",
            BuildOverrides::default(),
        );
        let err = plan_stages(&resolved).unwrap_err();
        assert_eq!(
            err,
            ToolchainError::UnknownStage {
                stage: "route".to_string()
            }
        );
    }

    #[test]
    fn required_programs_deduplicated() {
        let stages = plan_stages(&minimal(BuildOverrides::default())).unwrap();
        assert_eq!(
            required_programs(&stages),
            vec!["sh", "yosys", "nextpnr-ice40", "icepack"]
        );
    }

    #[test]
    fn planning_is_deterministic() {
        let resolved = minimal(BuildOverrides {
            seed: Some(9),
            ..BuildOverrides::default()
        });
        assert_eq!(plan_stages(&resolved).unwrap(), plan_stages(&resolved).unwrap());
    }
}
