//! Error types for composition and validation.

use crate::wiring::{BusId, BusRole};

/// Errors detected while composing a SoC.
///
/// All of these are configuration-time errors: they are raised before any
/// external process is spawned, and a composition that hits one is discarded
/// whole rather than partially wired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    /// A requested CSR index is already held by another slot.
    #[error("CSR index {index} requested by '{name}' is already assigned to '{holder}'")]
    DuplicateIndex {
        /// The slot that asked for the index.
        name: String,
        /// The contested index.
        index: u32,
        /// The slot already holding the index.
        holder: String,
    },

    /// A name was registered twice within one scope.
    #[error("'{name}' is already registered in {scope}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
        /// Where the name clashed (e.g. `"the CSR map"`, `"bus 'wishbone'"`).
        scope: String,
    },

    /// A memory region intersects an existing region on the same bus.
    #[error(
        "region '{name}' at {base:#010x} (size {size:#x}) on bus '{bus}' overlaps '{existing}' at {existing_base:#010x} (size {existing_size:#x})"
    )]
    Overlap {
        /// The rejected region.
        name: String,
        /// The bus both regions live on.
        bus: BusId,
        /// Base address of the rejected region.
        base: u64,
        /// Size of the rejected region.
        size: u64,
        /// The region it collides with.
        existing: String,
        /// Base address of the existing region.
        existing_base: u64,
        /// Size of the existing region.
        existing_size: u64,
    },

    /// A memory region was registered with a size of zero.
    #[error("region '{name}' at {base:#010x} on bus '{bus}' has zero size")]
    InvalidSize {
        /// The rejected region.
        name: String,
        /// The bus it was registered on.
        bus: BusId,
        /// Its base address.
        base: u64,
    },

    /// A memory region extends past the end of the bus address space.
    #[error("region '{name}' at {base:#010x} (size {size:#x}) exceeds the address space of bus '{bus}'")]
    AddressOverflow {
        /// The rejected region.
        name: String,
        /// The bus it was registered on.
        bus: BusId,
        /// Its base address.
        base: u64,
        /// Its size.
        size: u64,
    },

    /// A peer tried to attach in a role its capabilities do not include.
    #[error("'{peer}' cannot attach to bus '{bus}' as {role}")]
    RoleNotSupported {
        /// The peer.
        peer: String,
        /// The bus.
        bus: BusId,
        /// The refused role.
        role: BusRole,
    },

    /// The same peer was attached to the same bus in the same role twice.
    #[error("'{peer}' is already attached to bus '{bus}' as {role}")]
    DuplicateAttachment {
        /// The peer.
        peer: String,
        /// The bus.
        bus: BusId,
        /// The duplicated role.
        role: BusRole,
    },

    /// An attachment referenced a peer that was never declared.
    #[error("unknown bus peer '{peer}'")]
    UnknownPeer {
        /// The undeclared peer.
        peer: String,
    },

    /// A peripheral needs a board resource the platform does not provide.
    #[error("peripheral '{peripheral}' requests '{request}', which platform '{platform}' does not provide")]
    UnsupportedRequest {
        /// The requesting peripheral.
        peripheral: String,
        /// The missing resource kind.
        request: String,
        /// The platform name.
        platform: String,
    },

    /// A CSR index was given for a peripheral kind that has no CSRs.
    #[error("peripheral '{peripheral}' of kind '{kind}' has no CSR bank")]
    CsrNotSupported {
        /// The peripheral.
        peripheral: String,
        /// Its kind.
        kind: String,
    },
}
