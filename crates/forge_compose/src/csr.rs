//! CSR slot allocation.
//!
//! Every peripheral with a CSR bank gets a slot index. The register address of
//! the bank is `csr_base + index * stride`, so indices must be unique and
//! stable across builds: firmware compiled against one register map must keep
//! working against the next bitstream.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// A named CSR bank and its slot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrSlot {
    /// The peripheral name owning the bank.
    pub name: String,
    /// The slot index.
    pub index: u32,
}

/// Placement of the CSR region in the CPU address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrLayout {
    /// Address of slot 0.
    pub base: u64,
    /// Distance in bytes between consecutive slots.
    pub stride: u64,
}

impl CsrLayout {
    /// Returns the bank address of the given slot index, or `None` on overflow.
    pub fn address(&self, index: u32) -> Option<u64> {
        self.stride
            .checked_mul(u64::from(index))
            .and_then(|offset| self.base.checked_add(offset))
    }
}

impl Default for CsrLayout {
    fn default() -> Self {
        Self {
            base: 0xe000_0000,
            stride: 0x800,
        }
    }
}

/// Hands out unique CSR slot indices for a single build.
///
/// The allocator is write-once: slots cannot be removed, and
/// [`finalize`](Self::finalize) consumes it so it cannot leak into a second
/// build.
#[derive(Debug, Default)]
pub struct AddressSpaceAllocator {
    by_index: BTreeMap<u32, String>,
    by_name: HashMap<String, u32>,
}

impl AddressSpaceAllocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a CSR slot.
    ///
    /// With `requested_index = None` the lowest unused index is assigned.
    /// An explicit index that is already taken fails with
    /// [`ComposeError::DuplicateIndex`]; a name that is already registered
    /// fails with [`ComposeError::DuplicateName`].
    pub fn register(
        &mut self,
        name: &str,
        requested_index: Option<u32>,
    ) -> Result<CsrSlot, ComposeError> {
        if self.by_name.contains_key(name) {
            return Err(ComposeError::DuplicateName {
                name: name.to_string(),
                scope: "the CSR map".to_string(),
            });
        }

        let index = match requested_index {
            Some(index) => {
                if let Some(holder) = self.by_index.get(&index) {
                    return Err(ComposeError::DuplicateIndex {
                        name: name.to_string(),
                        index,
                        holder: holder.clone(),
                    });
                }
                index
            }
            None => self.lowest_unused(),
        };

        self.by_index.insert(index, name.to_string());
        self.by_name.insert(name.to_string(), index);
        tracing::debug!(name, index, "registered CSR slot");

        Ok(CsrSlot {
            name: name.to_string(),
            index,
        })
    }

    /// Returns the number of registered slots.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Returns `true` if no slot has been registered.
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Freezes the allocator into the table used by every downstream stage.
    pub fn finalize(self) -> CsrTable {
        let slots = self
            .by_index
            .into_iter()
            .map(|(index, name)| CsrSlot { name, index })
            .collect();
        CsrTable::from_sorted(slots)
    }

    /// Walks the occupied indices in order and returns the first gap.
    fn lowest_unused(&self) -> u32 {
        let mut candidate = 0;
        for &taken in self.by_index.keys() {
            if taken != candidate {
                break;
            }
            candidate += 1;
        }
        candidate
    }
}

/// The immutable CSR map of one composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrTable {
    /// Slots in ascending index order.
    slots: Vec<CsrSlot>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl CsrTable {
    fn from_sorted(slots: Vec<CsrSlot>) -> Self {
        let by_name = slots
            .iter()
            .enumerate()
            .map(|(pos, slot)| (slot.name.clone(), pos))
            .collect();
        Self { slots, by_name }
    }

    /// Returns the slot index assigned to `name`.
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|&pos| self.slots[pos].index)
    }

    /// Returns the bank address of `name` under the given layout.
    pub fn address_of(&self, name: &str, layout: &CsrLayout) -> Option<u64> {
        self.index_of(name).and_then(|index| layout.address(index))
    }

    /// Iterates the slots in ascending index order.
    pub fn slots(&self) -> impl Iterator<Item = &CsrSlot> + Clone {
        self.slots.iter()
    }

    /// Returns the number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the `name -> index` mapping, ordered by name.
    pub fn to_map(&self) -> BTreeMap<String, u32> {
        self.slots
            .iter()
            .map(|slot| (slot.name.clone(), slot.index))
            .collect()
    }
}
