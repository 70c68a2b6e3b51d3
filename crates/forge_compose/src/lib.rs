//! SoC composition: CSR allocation, memory maps and bus wiring.
//!
//! A [`Composition`] is built once per build from a list of
//! [`PeripheralSpec`]s. The three leaf components each validate one kind of
//! conflict and are consumed when the composition is finalized:
//!
//! - [`AddressSpaceAllocator`] hands out unique CSR slot indices.
//! - [`MemoryRegionRegistry`] rejects overlapping regions on the same bus.
//! - [`BusWiringGraph`] checks bus roles against peripheral capabilities.
//!
//! Nothing here is global: two builds in the same process compose
//! independently.

#![warn(missing_docs)]

pub mod compose;
pub mod csr;
pub mod error;
pub mod peripheral;
pub mod region;
pub mod wiring;

pub use compose::{compose, AttachSpec, Composition, PeripheralSpec, RegionSpec};
pub use csr::{AddressSpaceAllocator, CsrLayout, CsrSlot, CsrTable};
pub use error::ComposeError;
pub use peripheral::{Capabilities, PeripheralKind, Platform, RequestKind};
pub use region::{MemoryMap, MemoryRegion, MemoryRegionRegistry, ADDRESS_SPACE_END};
pub use wiring::{BusAttachment, BusId, BusRole, BusTopology, BusWiringGraph, RoleSet};
