//! Resolution of the project file and command-line overrides into one build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use forge_common::Frequency;
use forge_compose::{CsrLayout, PeripheralSpec, Platform};

use crate::error::ConfigError;
use crate::profile::{default_peripherals, default_resources};
use crate::types::{Placer, ProjectConfig};

/// Command-line values that take precedence over `forge.toml`.
#[derive(Debug, Default, Clone)]
pub struct BuildOverrides {
    /// `--seed`.
    pub seed: Option<u64>,
    /// `--placer`, unvalidated.
    pub placer: Option<String>,
    /// `--no-pll`.
    pub no_pll: bool,
    /// `--output-dir`.
    pub output_dir: Option<PathBuf>,
}

/// Everything one pipeline run needs, with all defaults applied and all
/// enumerated values validated.
#[derive(Debug, Clone)]
pub struct ResolvedBuild {
    /// Project name.
    pub project_name: String,
    /// Base name of generated files.
    pub build_name: String,
    /// Top-level HDL module name.
    pub top: String,
    /// The target board.
    pub platform: Platform,
    /// FPGA device variant.
    pub device: String,
    /// FPGA package.
    pub package: String,
    /// System clock.
    pub clock: Frequency,
    /// CSR placement.
    pub csr_layout: CsrLayout,
    /// Peripherals to compose.
    pub peripherals: Vec<PeripheralSpec>,
    /// Place-and-route seed.
    pub seed: u64,
    /// Selected placer, if any.
    pub placer: Option<Placer>,
    /// Extra synthesis flags.
    pub density_flags: Vec<String>,
    /// Whether the elaborator should instantiate a PLL.
    pub use_pll: bool,
    /// Root directory for run directories (absolute or project-relative).
    pub output_dir: PathBuf,
    /// Where to copy the register map after success.
    pub csr_csv: Option<PathBuf>,
    /// Stage command templates that replace the built-in ones.
    pub stage_commands: BTreeMap<String, Vec<String>>,
    /// Elaborator command. Empty when `[toolchain] elaborator` is unset,
    /// which `forge build` rejects.
    pub elaborator: Vec<String>,
}

/// Default packing-density flags for iCE40 synthesis.
///
/// `-relut` runs an extra LUT packing pass; `-dffe_min_ce_use 4` stops the
/// synthesizer from spending a clock-enable on fewer than four flip-flops.
pub const DEFAULT_DENSITY_FLAGS: [&str; 3] = ["-relut", "-dffe_min_ce_use", "4"];

/// Resolves `config` with `overrides` applied.
///
/// Precedence is command line, then `forge.toml`, then built-in defaults.
/// Relative paths are anchored at `project_dir`.
pub fn resolve_build(
    config: &ProjectConfig,
    project_dir: &Path,
    overrides: &BuildOverrides,
) -> Result<ResolvedBuild, ConfigError> {
    let placer = overrides
        .placer
        .as_deref()
        .or(config.build.placer.as_deref())
        .map(str::parse::<Placer>)
        .transpose()?;

    let clock = config.target.clock.parse::<Frequency>().map_err(|e| {
        ConfigError::InvalidConfiguration {
            field: "target.clock".to_string(),
            value: e.input,
            expected: "a frequency such as \"12MHz\"".to_string(),
        }
    })?;

    let resources = config
        .target
        .resources
        .clone()
        .unwrap_or_else(default_resources);

    let peripherals = if config.peripherals.is_empty() {
        default_peripherals()
    } else {
        config.peripherals.clone()
    };

    let density_flags = config
        .build
        .density_flags
        .clone()
        .unwrap_or_else(|| DEFAULT_DENSITY_FLAGS.map(String::from).to_vec());

    let output_dir = overrides
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.build.output_dir));

    Ok(ResolvedBuild {
        project_name: config.project.name.clone(),
        build_name: config.project.build_name.clone(),
        top: config.project.top.clone(),
        platform: Platform::new(config.target.platform.clone(), resources),
        device: config.target.device.clone(),
        package: config.target.package.clone(),
        clock,
        csr_layout: CsrLayout {
            base: config.csr.base,
            stride: config.csr.stride,
        },
        peripherals,
        seed: overrides.seed.or(config.build.seed).unwrap_or(0),
        placer,
        density_flags,
        use_pll: config.build.use_pll && !overrides.no_pll,
        output_dir: project_dir.join(output_dir),
        csr_csv: config.build.csr_csv.as_ref().map(|p| project_dir.join(p)),
        stage_commands: config
            .toolchain
            .stages
            .iter()
            .map(|(name, stage)| (name.clone(), stage.command.clone()))
            .collect(),
        elaborator: config.toolchain.elaborator.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    fn minimal() -> ProjectConfig {
        load_config_from_str("[project]\nname = \"fomu\"\n").unwrap()
    }

    #[test]
    fn defaults_applied() {
        let resolved = resolve_build(&minimal(), Path::new("/proj"), &BuildOverrides::default())
            .unwrap();
        assert_eq!(resolved.seed, 0);
        assert!(resolved.placer.is_none());
        assert!(resolved.use_pll);
        assert_eq!(resolved.density_flags, vec!["-relut", "-dffe_min_ce_use", "4"]);
        assert_eq!(resolved.output_dir, PathBuf::from("/proj/build"));
        assert_eq!(resolved.clock.hz(), 12_000_000);
        assert_eq!(resolved.peripherals, default_peripherals());
    }

    #[test]
    fn cli_overrides_file() {
        let config = load_config_from_str(
            "[project]\nname = \"fomu\"\n[build]\nseed = 3\nplacer = \"sa\"\n",
        )
        .unwrap();
        let overrides = BuildOverrides {
            seed: Some(42),
            placer: Some("heap".to_string()),
            no_pll: true,
            output_dir: Some(PathBuf::from("/tmp/out")),
        };
        let resolved = resolve_build(&config, Path::new("/proj"), &overrides).unwrap();
        assert_eq!(resolved.seed, 42);
        assert_eq!(resolved.placer, Some(Placer::Heap));
        assert!(!resolved.use_pll);
        assert_eq!(resolved.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn file_seed_used_without_cli() {
        let config =
            load_config_from_str("[project]\nname = \"fomu\"\n[build]\nseed = 3\n").unwrap();
        let resolved =
            resolve_build(&config, Path::new("."), &BuildOverrides::default()).unwrap();
        assert_eq!(resolved.seed, 3);
    }

    #[test]
    fn bogus_cli_placer_is_invalid_configuration() {
        let overrides = BuildOverrides {
            placer: Some("bogus".to_string()),
            ..BuildOverrides::default()
        };
        let err = resolve_build(&minimal(), Path::new("."), &overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfiguration { .. }));
    }

    #[test]
    fn csr_csv_anchored_at_project() {
        let config = load_config_from_str(
            "[project]\nname = \"fomu\"\n[build]\ncsr_csv = \"test/csr.csv\"\n",
        )
        .unwrap();
        let resolved =
            resolve_build(&config, Path::new("/proj"), &BuildOverrides::default()).unwrap();
        assert_eq!(resolved.csr_csv, Some(PathBuf::from("/proj/test/csr.csv")));
    }
}
