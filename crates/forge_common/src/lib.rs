//! Shared foundational types used across the forge SoC build tooling.
//!
//! Provides composition fingerprints, clock frequencies with unit parsing,
//! and the internal error type used for invariant violations.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod frequency;
pub mod result;

pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use frequency::{Frequency, ParseFrequencyError};
pub use result::{ForgeResult, InternalError};
