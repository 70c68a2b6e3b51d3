//! Configuration types deserialized from `forge.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use forge_compose::{PeripheralSpec, RequestKind};

use crate::error::ConfigError;

/// The top-level project configuration parsed from `forge.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Board and device selection.
    #[serde(default)]
    pub target: TargetConfig,
    /// CSR region placement.
    #[serde(default)]
    pub csr: CsrConfig,
    /// Peripherals of the SoC. Empty means the built-in profile.
    #[serde(default)]
    pub peripherals: Vec<PeripheralSpec>,
    /// External program templates.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Build options (seed, placer, flags, output locations).
    #[serde(default)]
    pub build: BuildConfig,
}

/// Project metadata.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Base name of generated files (`top.json`, `top.bin`, ...).
    #[serde(default = "default_build_name")]
    pub build_name: String,
    /// Name of the top-level HDL module.
    #[serde(default = "default_top")]
    pub top: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

fn default_build_name() -> String {
    "top".to_string()
}

fn default_top() -> String {
    "top".to_string()
}

/// The board and FPGA device being targeted.
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Board name, used in diagnostics.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Device variant passed to place-and-route (e.g. `up5k`).
    #[serde(default = "default_device")]
    pub device: String,
    /// Package name (e.g. `uwg30`).
    #[serde(default = "default_package")]
    pub package: String,
    /// System clock frequency, e.g. `"12MHz"`.
    #[serde(default = "default_clock")]
    pub clock: String,
    /// Board resources peripherals may request. `None` means the built-in
    /// board's resources.
    #[serde(default)]
    pub resources: Option<Vec<RequestKind>>,
}

fn default_platform() -> String {
    "fomu_evt".to_string()
}

fn default_device() -> String {
    "up5k".to_string()
}

fn default_package() -> String {
    "uwg30".to_string()
}

fn default_clock() -> String {
    "12MHz".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            device: default_device(),
            package: default_package(),
            clock: default_clock(),
            resources: None,
        }
    }
}

/// Placement of CSR banks in the CPU address space.
#[derive(Debug, Deserialize)]
pub struct CsrConfig {
    /// Address of CSR slot 0.
    #[serde(default = "default_csr_base")]
    pub base: u64,
    /// Bytes between consecutive CSR slots.
    #[serde(default = "default_csr_stride")]
    pub stride: u64,
}

fn default_csr_base() -> u64 {
    0xe000_0000
}

fn default_csr_stride() -> u64 {
    0x800
}

impl Default for CsrConfig {
    fn default() -> Self {
        Self {
            base: default_csr_base(),
            stride: default_csr_stride(),
        }
    }
}

/// External program templates.
#[derive(Debug, Default, Deserialize)]
pub struct ToolchainConfig {
    /// Command that elaborates the composition into a netlist.
    ///
    /// Accepts a single whitespace-separated string or a list of tokens.
    #[serde(default, deserialize_with = "deserialize_tokens")]
    pub elaborator: Vec<String>,
    /// Per-stage command templates replacing the built-in defaults.
    #[serde(default)]
    pub stages: BTreeMap<String, StageTemplate>,
}

/// A replacement command template for one pipeline stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StageTemplate {
    /// Command tokens; `{placeholders}` are filled in at render time.
    #[serde(deserialize_with = "deserialize_tokens")]
    pub command: Vec<String>,
}

/// Build options.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Place-and-route seed.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Placer algorithm name, validated against [`Placer`].
    #[serde(default)]
    pub placer: Option<String>,
    /// Extra synthesis flags. `None` uses the packing-density defaults.
    #[serde(default, deserialize_with = "deserialize_optional_tokens")]
    pub density_flags: Option<Vec<String>>,
    /// Whether the elaborator should instantiate a PLL.
    #[serde(default = "default_true")]
    pub use_pll: bool,
    /// Root directory for run directories.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Where to copy the register map after a successful build.
    #[serde(default)]
    pub csr_csv: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> String {
    "build".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            seed: None,
            placer: None,
            density_flags: None,
            use_pll: true,
            output_dir: default_output_dir(),
            csr_csv: None,
        }
    }
}

/// Place-and-route placer algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placer {
    /// Simulated annealing.
    Sa,
    /// Analytic (HeAP) placement.
    Heap,
}

impl Placer {
    /// All accepted placers.
    pub const ALL: [Placer; 2] = [Placer::Sa, Placer::Heap];

    /// Returns the name passed to the place-and-route tool.
    pub fn as_str(self) -> &'static str {
        match self {
            Placer::Sa => "sa",
            Placer::Heap => "heap",
        }
    }
}

impl fmt::Display for Placer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Placer::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidConfiguration {
                field: "placer".to_string(),
                value: s.to_string(),
                expected: format!(
                    "one of: {}",
                    Placer::ALL.map(Placer::as_str).join(", ")
                ),
            })
    }
}

/// Deserializes a command either as a list of tokens or as one string split
/// on whitespace.
fn deserialize_tokens<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Tokens;

    impl<'de> Visitor<'de> for Tokens {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.split_whitespace().map(str::to_string).collect())
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut tokens = Vec::new();
            while let Some(token) = seq.next_element::<String>()? {
                tokens.push(token);
            }
            Ok(tokens)
        }
    }

    deserializer.deserialize_any(Tokens)
}

fn deserialize_optional_tokens<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_tokens(deserializer).map(Some)
}
