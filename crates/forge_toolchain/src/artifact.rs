//! Kinds of files a pipeline run produces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A class of build artifact, used as the key of a run's artifact map.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// HDL netlist from the elaborator.
    Netlist,
    /// Pin constraints emitted alongside the netlist.
    PinConstraints,
    /// Technology-mapped netlist from synthesis.
    SynthesizedNetlist,
    /// Placed-and-routed design.
    PlacedDesign,
    /// Final FPGA configuration image.
    Bitstream,
    /// CSR register map (`name,index` rows).
    RegisterMap,
    /// Memory address map (`bus,name,base,size` rows).
    AddressMap,
}

impl ArtifactKind {
    /// Returns the snake_case name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Netlist => "netlist",
            ArtifactKind::PinConstraints => "pin_constraints",
            ArtifactKind::SynthesizedNetlist => "synthesized_netlist",
            ArtifactKind::PlacedDesign => "placed_design",
            ArtifactKind::Bitstream => "bitstream",
            ArtifactKind::RegisterMap => "register_map",
            ArtifactKind::AddressMap => "address_map",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        for kind in [ArtifactKind::Bitstream, ArtifactKind::RegisterMap, ArtifactKind::PlacedDesign] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
