//! Built-in command templates for the open-source iCE40 flow
//! (yosys, nextpnr-ice40, icepack).

use crate::artifact::ArtifactKind;
use crate::error::ToolchainError;
use crate::stage::ToolchainStage;

/// Logic synthesis.
pub const SYNTH: &str = "synth";
/// Placement and routing.
pub const PNR: &str = "pnr";
/// Bitstream packing.
pub const PACK: &str = "pack";

/// Stage names in execution order.
pub const STAGE_ORDER: [&str; 3] = [SYNTH, PNR, PACK];

// `$0` is the build name, `$1` the netlist and `$2` the top module. Whatever
// follows is handed to `synth_ice40`, so flags appended to this stage land
// inside the yosys script.
const SYNTH_SCRIPT: &str = r#"n=$1; t=$2; shift 2; exec yosys -q -l "$0.rpt" -p "read_verilog $n; synth_ice40 -top $t -json $0.json $*""#;

/// Returns the built-in command for `stage`.
pub fn default_command(stage: &str) -> Option<Vec<String>> {
    let tokens: &[&str] = match stage {
        SYNTH => &["sh", "-c", SYNTH_SCRIPT, "{build_name}", "{netlist}", "{top}"],
        PNR => &[
            "nextpnr-ice40",
            "--{device}",
            "--package",
            "{package}",
            "--json",
            "{build_name}.json",
            "--pcf",
            "{build_name}.pcf",
            "--asc",
            "{build_name}.asc",
            "--freq",
            "{clock_mhz}",
        ],
        PACK => &["icepack", "{build_name}.asc", "{build_name}.bin"],
        _ => return None,
    };
    Some(tokens.iter().map(|t| t.to_string()).collect())
}

/// Builds the stage `name` from `command`, or from the built-in template
/// when `command` is `None`.
///
/// Declared outputs are the same either way, so a replacement command must
/// still write the files the next stage reads.
pub fn stage(name: &str, command: Option<Vec<String>>) -> Result<ToolchainStage, ToolchainError> {
    let unknown = || ToolchainError::UnknownStage {
        stage: name.to_string(),
    };
    let builtin = command.is_none();
    let tokens = match command {
        Some(tokens) => tokens,
        None => default_command(name).ok_or_else(unknown)?,
    };
    let output = match name {
        SYNTH => (ArtifactKind::SynthesizedNetlist, "{build_name}.json"),
        PNR => (ArtifactKind::PlacedDesign, "{build_name}.asc"),
        PACK => (ArtifactKind::Bitstream, "{build_name}.bin"),
        _ => return Err(unknown()),
    };
    let stage = ToolchainStage::new(name, tokens)?.with_output(output.0, output.1);
    Ok(if builtin && name == SYNTH {
        stage.with_required_program("yosys")
    } else {
        stage
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderContext;

    fn ctx() -> RenderContext {
        RenderContext::new()
            .with("build_name", "top")
            .with("netlist", "/run/top.v")
            .with("top", "top")
            .with("device", "up5k")
            .with("package", "uwg30")
            .with("clock_mhz", "12")
    }

    #[test]
    fn every_builtin_stage_renders() {
        for name in STAGE_ORDER {
            let stage = stage(name, None).unwrap();
            stage.render(&ctx()).unwrap();
            assert_eq!(stage.outputs().len(), 1);
        }
    }

    #[test]
    fn pnr_targets_up5k_uwg30() {
        let argv = stage(PNR, None).unwrap().render(&ctx()).unwrap();
        assert_eq!(argv[0], "nextpnr-ice40");
        assert!(argv.windows(2).any(|w| w[0] == "--package" && w[1] == "uwg30"));
        assert!(argv.contains(&"--up5k".to_string()));
    }

    #[test]
    fn synth_script_is_not_rendered() {
        let argv = stage(SYNTH, None).unwrap().render(&ctx()).unwrap();
        assert_eq!(argv[2], SYNTH_SCRIPT);
        assert_eq!(argv[3..].to_vec(), vec!["top", "/run/top.v", "top"]);
    }

    #[test]
    fn builtin_synth_requires_yosys() {
        let builtin = stage(SYNTH, None).unwrap();
        let programs: Vec<_> = builtin.required_programs().collect();
        assert_eq!(programs, vec!["sh", "yosys"]);

        let custom = stage(SYNTH, Some(vec!["my-synth".to_string()])).unwrap();
        let programs: Vec<_> = custom.required_programs().collect();
        assert_eq!(programs, vec!["my-synth"]);
    }

    #[test]
    fn unknown_stage_rejected() {
        let err = stage("route", None).unwrap_err();
        assert!(matches!(err, ToolchainError::UnknownStage { .. }));
        let err = stage("route", Some(vec!["x".to_string()])).unwrap_err();
        assert!(matches!(err, ToolchainError::UnknownStage { .. }));
    }
}
