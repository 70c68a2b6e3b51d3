//! Memory region registration and per-bus address maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;
use crate::wiring::BusId;

/// One past the highest address reachable on a 32-bit bus.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

/// A named, sized window in a bus address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    /// Region name (e.g. `"sram"`).
    pub name: String,
    /// First address of the region.
    pub base_address: u64,
    /// Size in bytes, never zero.
    pub size: u64,
    /// The bus whose address space the region occupies.
    pub bus_id: BusId,
}

impl MemoryRegion {
    /// Returns the first address past the region.
    pub fn end(&self) -> u64 {
        self.base_address + self.size
    }

    /// Returns `true` if `[base, base + size)` intersects this region.
    pub fn overlaps(&self, base: u64, size: u64) -> bool {
        base < self.end() && self.base_address < base + size
    }
}

/// Registers memory regions and rejects overlaps within a bus.
///
/// Buses are independent address spaces: two regions on different buses are
/// never compared, even if their intervals coincide.
#[derive(Debug, Default)]
pub struct MemoryRegionRegistry {
    buses: BTreeMap<BusId, BTreeMap<u64, MemoryRegion>>,
}

impl MemoryRegionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a region on `bus_id`.
    ///
    /// Fails with [`ComposeError::InvalidSize`] for `size == 0`,
    /// [`ComposeError::AddressOverflow`] when the region runs past the bus
    /// address space, and [`ComposeError::Overlap`] when it intersects a
    /// region already on the same bus.
    pub fn register(
        &mut self,
        name: &str,
        base_address: u64,
        size: u64,
        bus_id: &BusId,
    ) -> Result<MemoryRegion, ComposeError> {
        if size == 0 {
            return Err(ComposeError::InvalidSize {
                name: name.to_string(),
                bus: bus_id.clone(),
                base: base_address,
            });
        }
        match base_address.checked_add(size) {
            Some(end) if end <= ADDRESS_SPACE_END => {}
            _ => {
                return Err(ComposeError::AddressOverflow {
                    name: name.to_string(),
                    bus: bus_id.clone(),
                    base: base_address,
                    size,
                })
            }
        }

        let regions = self.buses.entry(bus_id.clone()).or_default();

        if regions.values().any(|r| r.name == name) {
            return Err(ComposeError::DuplicateName {
                name: name.to_string(),
                scope: format!("bus '{bus_id}'"),
            });
        }

        // Existing regions are disjoint, so only the nearest neighbour on
        // each side can intersect the new interval.
        let before = regions.range(..=base_address).next_back();
        let after = regions.range(base_address..).next();
        for existing in before.into_iter().chain(after).map(|(_, r)| r) {
            if existing.overlaps(base_address, size) {
                return Err(ComposeError::Overlap {
                    name: name.to_string(),
                    bus: bus_id.clone(),
                    base: base_address,
                    size,
                    existing: existing.name.clone(),
                    existing_base: existing.base_address,
                    existing_size: existing.size,
                });
            }
        }

        let region = MemoryRegion {
            name: name.to_string(),
            base_address,
            size,
            bus_id: bus_id.clone(),
        };
        regions.insert(base_address, region.clone());
        tracing::debug!(
            name,
            bus = %bus_id,
            base = base_address,
            size,
            "registered memory region"
        );
        Ok(region)
    }

    /// Iterates the regions on `bus_id` in ascending base-address order.
    ///
    /// The iterator is lazy and can be cloned to restart the walk.
    pub fn regions_for<'a>(
        &'a self,
        bus_id: &BusId,
    ) -> impl Iterator<Item = &'a MemoryRegion> + Clone + 'a {
        self.buses.get(bus_id).into_iter().flat_map(|r| r.values())
    }

    /// Freezes the registry into an immutable [`MemoryMap`].
    pub fn finalize(self) -> MemoryMap {
        MemoryMap { buses: self.buses }
    }
}

/// The immutable memory map of one composition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryMap {
    buses: BTreeMap<BusId, BTreeMap<u64, MemoryRegion>>,
}

impl MemoryMap {
    /// Iterates the regions on `bus_id` in ascending base-address order.
    pub fn regions_for<'a>(
        &'a self,
        bus_id: &BusId,
    ) -> impl Iterator<Item = &'a MemoryRegion> + Clone + 'a {
        self.buses.get(bus_id).into_iter().flat_map(|r| r.values())
    }

    /// Iterates every region, ordered by bus name and then base address.
    pub fn regions(&self) -> impl Iterator<Item = &MemoryRegion> + Clone {
        self.buses.values().flat_map(|r| r.values())
    }

    /// Iterates the buses that carry at least one region.
    pub fn buses(&self) -> impl Iterator<Item = &BusId> {
        self.buses.keys()
    }

    /// Returns the region named `name` on `bus_id`.
    pub fn get(&self, bus_id: &BusId, name: &str) -> Option<&MemoryRegion> {
        self.regions_for(bus_id).find(|r| r.name == name)
    }
}

impl Serialize for MemoryMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.regions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn wishbone() -> BusId {
        BusId::new("wishbone")
    }

    #[test]
    fn overlapping_regions_rejected() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("sram", 0x1000_0000, 0x2_0000, &wishbone())
            .unwrap();
        let err = reg
            .register("rom", 0x1001_0000, 0x1000, &wishbone())
            .unwrap_err();
        match err {
            ComposeError::Overlap { name, existing, .. } => {
                assert_eq!(name, "rom");
                assert_eq!(existing, "sram");
            }
            other => panic!("expected Overlap, got {other:?}"),
        }
    }

    #[test]
    fn overlap_with_following_region() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("spiflash", 0x2000_0000, 0x10_0000, &wishbone())
            .unwrap();
        let err = reg
            .register("sram", 0x1fff_f000, 0x2000, &wishbone())
            .unwrap_err();
        assert!(matches!(err, ComposeError::Overlap { .. }));
    }

    #[test]
    fn adjacent_regions_allowed() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("a", 0x0, 0x1000, &wishbone()).unwrap();
        reg.register("b", 0x1000, 0x1000, &wishbone()).unwrap();
        assert_eq!(reg.regions_for(&wishbone()).count(), 2);
    }

    #[test]
    fn different_buses_never_conflict() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("sram", 0x1000_0000, 0x2_0000, &wishbone())
            .unwrap();
        reg.register("shadow", 0x1000_0000, 0x2_0000, &BusId::new("csr"))
            .unwrap();
    }

    #[test]
    fn zero_size_always_invalid() {
        let mut reg = MemoryRegionRegistry::new();
        for (base, bus) in [(0u64, "wishbone"), (0x8000_0000, "csr"), (0xffff_ffff, "x")] {
            let err = reg.register("empty", base, 0, &BusId::new(bus)).unwrap_err();
            assert!(matches!(err, ComposeError::InvalidSize { .. }));
        }
    }

    #[test]
    fn region_past_address_space_rejected() {
        let mut reg = MemoryRegionRegistry::new();
        let err = reg
            .register("huge", 0xffff_f000, 0x2000, &wishbone())
            .unwrap_err();
        assert!(matches!(err, ComposeError::AddressOverflow { .. }));
        reg.register("top", 0xffff_f000, 0x1000, &wishbone()).unwrap();
    }

    #[test]
    fn duplicate_name_on_bus_rejected() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("sram", 0x0, 0x100, &wishbone()).unwrap();
        let err = reg.register("sram", 0x1000, 0x100, &wishbone()).unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateName { .. }));
    }

    #[test]
    fn regions_for_sorted_and_restartable() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("c", 0x3000, 0x100, &wishbone()).unwrap();
        reg.register("a", 0x1000, 0x100, &wishbone()).unwrap();
        reg.register("b", 0x2000, 0x100, &wishbone()).unwrap();

        let iter = reg.regions_for(&wishbone());
        let first: Vec<_> = iter.clone().map(|r| r.name.as_str()).collect();
        let second: Vec<_> = iter.map(|r| r.name.as_str()).collect();
        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn regions_for_unknown_bus_is_empty() {
        let reg = MemoryRegionRegistry::new();
        assert_eq!(reg.regions_for(&BusId::new("nope")).count(), 0);
    }

    #[test]
    fn random_registrations_stay_disjoint() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let mut reg = MemoryRegionRegistry::new();
            for n in 0..60 {
                let base = rng.gen_range(0..0x1_0000u64);
                let size = rng.gen_range(0..0x800u64);
                let _ = reg.register(&format!("r{n}"), base, size, &wishbone());
            }
            let accepted: Vec<_> = reg.regions_for(&wishbone()).cloned().collect();
            for (i, a) in accepted.iter().enumerate() {
                for b in &accepted[i + 1..] {
                    assert!(!a.overlaps(b.base_address, b.size), "{a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn finalized_map_keeps_order() {
        let mut reg = MemoryRegionRegistry::new();
        reg.register("sram", 0x1000_0000, 0x2_0000, &wishbone()).unwrap();
        reg.register("rom", 0x0, 0x2000, &wishbone()).unwrap();
        let map = reg.finalize();
        let names: Vec<_> = map.regions().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["rom", "sram"]);
        assert_eq!(map.get(&wishbone(), "sram").unwrap().end(), 0x1002_0000);
    }
}
