//! Turning a peripheral list into a validated [`Composition`].

use serde::{Deserialize, Serialize};

use forge_common::{Fingerprint, FingerprintBuilder};

use crate::csr::{AddressSpaceAllocator, CsrLayout, CsrTable};
use crate::error::ComposeError;
use crate::peripheral::{PeripheralKind, Platform};
use crate::region::{MemoryMap, MemoryRegionRegistry};
use crate::wiring::{BusId, BusRole, BusTopology, BusWiringGraph};

/// A memory window owned by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegionSpec {
    /// Region name. Defaults to the peripheral name.
    #[serde(default)]
    pub name: Option<String>,
    /// Base address on the bus.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
    /// The bus the region lives on.
    pub bus: BusId,
}

/// A bus attachment requested by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttachSpec {
    /// The bus to attach to.
    pub bus: BusId,
    /// The role to take on it.
    pub role: BusRole,
}

/// One peripheral as described in the project configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeripheralSpec {
    /// Instance name; also the CSR slot name.
    pub name: String,
    /// Peripheral variant.
    pub kind: PeripheralKind,
    /// Pinned CSR index. `None` assigns the lowest free index.
    #[serde(default)]
    pub csr: Option<u32>,
    /// Memory windows.
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
    /// Bus attachments.
    #[serde(default)]
    pub attach: Vec<AttachSpec>,
}

impl PeripheralSpec {
    /// Creates a spec with no pinned CSR index, regions or attachments.
    pub fn new(name: impl Into<String>, kind: PeripheralKind) -> Self {
        Self {
            name: name.into(),
            kind,
            csr: None,
            regions: Vec::new(),
            attach: Vec::new(),
        }
    }

    /// Pins the CSR index.
    pub fn with_csr(mut self, index: u32) -> Self {
        self.csr = Some(index);
        self
    }

    /// Adds a memory region named after the peripheral.
    pub fn with_region(mut self, base: u64, size: u64, bus: impl Into<BusId>) -> Self {
        self.regions.push(RegionSpec {
            name: None,
            base,
            size,
            bus: bus.into(),
        });
        self
    }

    /// Adds a bus attachment.
    pub fn with_attach(mut self, bus: impl Into<BusId>, role: BusRole) -> Self {
        self.attach.push(AttachSpec {
            bus: bus.into(),
            role,
        });
        self
    }
}

/// A validated, immutable SoC composition.
///
/// This is the only form in which CSR indices, memory regions and bus
/// wiring reach the elaborator and the register-map export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composition {
    /// Peripherals in declaration order.
    pub peripherals: Vec<PeripheralSpec>,
    /// CSR slot table.
    pub csr: CsrTable,
    /// CSR placement in the CPU address space.
    pub csr_layout: CsrLayout,
    /// Memory regions per bus.
    pub memory: MemoryMap,
    /// Bus attachments.
    pub buses: BusTopology,
}

impl Composition {
    /// Computes a fingerprint over everything that affects the generated
    /// hardware or the register map.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut fp = FingerprintBuilder::new();
        fp.u64(self.csr_layout.base).u64(self.csr_layout.stride);
        for slot in self.csr.slots() {
            fp.str("csr").str(&slot.name).u64(u64::from(slot.index));
        }
        for region in self.memory.regions() {
            fp.str("mem")
                .str(region.bus_id.as_str())
                .str(&region.name)
                .u64(region.base_address)
                .u64(region.size);
        }
        for attachment in self.buses.attachments() {
            fp.str("bus")
                .str(attachment.bus_id.as_str())
                .str(&attachment.role.to_string())
                .str(&attachment.peer);
        }
        for peripheral in &self.peripherals {
            fp.str("kind").str(&peripheral.name).str(peripheral.kind.name());
        }
        fp.finish()
    }
}

/// Validates and wires `peripherals` for `platform`.
///
/// Peripherals are processed in order; the first conflict aborts the whole
/// composition. For each peripheral the platform resources are checked
/// first, then its pinned CSR slot, memory regions and bus attachments are
/// registered. Unpinned CSR banks are allocated last, so they only ever take
/// indices no peripheral asked for.
pub fn compose(
    peripherals: &[PeripheralSpec],
    platform: &Platform,
    csr_layout: CsrLayout,
) -> Result<Composition, ComposeError> {
    let mut allocator = AddressSpaceAllocator::new();
    let mut registry = MemoryRegionRegistry::new();
    let mut wiring = BusWiringGraph::new();

    for peripheral in peripherals {
        let caps = peripheral.kind.capabilities();

        if let Some(missing) = caps.requests.iter().find(|r| !platform.supports(**r)) {
            return Err(ComposeError::UnsupportedRequest {
                peripheral: peripheral.name.clone(),
                request: missing.to_string(),
                platform: platform.name.clone(),
            });
        }

        match peripheral.csr {
            Some(index) if caps.has_csr => {
                allocator.register(&peripheral.name, Some(index))?;
            }
            Some(_) => {
                return Err(ComposeError::CsrNotSupported {
                    peripheral: peripheral.name.clone(),
                    kind: peripheral.kind.to_string(),
                });
            }
            None => {}
        }

        for region in &peripheral.regions {
            let name = region.name.as_deref().unwrap_or(&peripheral.name);
            registry.register(name, region.base, region.size, &region.bus)?;
        }

        wiring.add_peer(&peripheral.name, caps.roles)?;
        for attach in &peripheral.attach {
            wiring.attach(&attach.bus, attach.role, &peripheral.name)?;
        }
    }

    for peripheral in peripherals {
        if peripheral.csr.is_none() && peripheral.kind.capabilities().has_csr {
            allocator.register(&peripheral.name, None)?;
        }
    }

    let composition = Composition {
        peripherals: peripherals.to_vec(),
        csr: allocator.finalize(),
        csr_layout,
        memory: registry.finalize(),
        buses: wiring.finalize(),
    };
    tracing::info!(
        csr_slots = composition.csr.len(),
        regions = composition.memory.regions().count(),
        attachments = composition.buses.attachments().len(),
        "composition validated"
    );
    Ok(composition)
}
