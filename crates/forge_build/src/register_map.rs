//! Register-map and address-map exports, and the run record.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use forge_compose::{Composition, CsrTable, MemoryMap};

use crate::error::BuildError;
use crate::run::PipelineRun;

/// CSR register map inside the run directory.
pub const REGISTER_MAP_FILE: &str = "csr.csv";
/// Memory address map inside the run directory.
pub const ADDRESS_MAP_FILE: &str = "memory.csv";
/// Serialized [`PipelineRun`] inside the run directory.
pub const RUN_RECORD_FILE: &str = "run.json";

/// Renders one `name,index` row per CSR slot, in ascending index order.
pub fn render_register_map(table: &CsrTable) -> String {
    let mut out = String::new();
    for slot in table.slots() {
        let _ = writeln!(out, "{},{}", slot.name, slot.index);
    }
    out
}

/// Renders one `bus,name,base,size` row per memory region, grouped by bus
/// and in ascending base order within a bus. Addresses are hex.
pub fn render_address_map(map: &MemoryMap) -> String {
    let mut out = String::new();
    for region in map.regions() {
        let _ = writeln!(
            out,
            "{},{},{:#010x},{:#x}",
            region.bus_id, region.name, region.base_address, region.size
        );
    }
    out
}

/// Paths written by [`export`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    /// The register map in the run directory.
    pub register_map: PathBuf,
    /// The address map in the run directory.
    pub address_map: PathBuf,
}

/// Writes both maps into `run_dir`, then copies the register map to
/// `csr_csv` when one is configured.
pub fn export(
    composition: &Composition,
    run_dir: &Path,
    csr_csv: Option<&Path>,
) -> Result<Exported, BuildError> {
    let register_map = run_dir.join(REGISTER_MAP_FILE);
    write(&register_map, &render_register_map(&composition.csr))?;

    let address_map = run_dir.join(ADDRESS_MAP_FILE);
    write(&address_map, &render_address_map(&composition.memory))?;

    if let Some(dest) = csr_csv {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::copy(&register_map, dest).map_err(|source| BuildError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %dest.display(), "exported register map");
    }

    Ok(Exported {
        register_map,
        address_map,
    })
}

/// Writes `run` as JSON into its run directory.
pub fn write_run_record(run: &PipelineRun) -> Result<PathBuf, BuildError> {
    let path = run.run_dir().join(RUN_RECORD_FILE);
    let json = serde_json::to_string_pretty(run).map_err(|e| BuildError::Io {
        path: path.clone(),
        source: std::io::Error::other(e),
    })?;
    write(&path, &json)?;
    Ok(path)
}

fn write(path: &Path, contents: &str) -> Result<(), BuildError> {
    fs::write(path, contents).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}
