//! Content fingerprints for compositions and pipeline runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit XXH3 fingerprint.
///
/// Two compositions with the same fingerprint have the same CSR table, memory
/// map and bus wiring. The fingerprint is recorded with every pipeline run so
/// that artifacts can be traced back to the composition that produced them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Computes a fingerprint over a single byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Returns the first `len` hex characters, for use in directory names.
    pub fn short(&self, len: usize) -> String {
        let mut s = self.to_string();
        s.truncate(len);
        s
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short(8))
    }
}

/// Incrementally builds a [`Fingerprint`] from structured fields.
///
/// Every field is length-prefixed so that `("ab", "c")` and `("a", "bc")`
/// hash differently.
pub struct FingerprintBuilder {
    hasher: Xxh3,
}

impl FingerprintBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            hasher: Xxh3::new(),
        }
    }

    /// Feeds a string field.
    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    /// Feeds an integer field.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    /// Feeds a raw byte field.
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value);
        self
    }

    /// Finishes hashing.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.hasher.digest128().to_le_bytes())
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = Fingerprint::from_bytes(b"csr ctrl 0");
        let b = Fingerprint::from_bytes(b"csr ctrl 0");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = Fingerprint::from_bytes(b"usb 9");
        let b = Fingerprint::from_bytes(b"usb 10");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_hex() {
        let s = Fingerprint::from_bytes(b"test").to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_prefix() {
        let fp = Fingerprint::from_bytes(b"test");
        assert_eq!(fp.short(12).len(), 12);
        assert!(fp.to_string().starts_with(&fp.short(12)));
    }

    #[test]
    fn builder_length_prefixes_fields() {
        let a = FingerprintBuilder::new().str("ab").str("c").finish();
        let b = FingerprintBuilder::new().str("a").str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn builder_deterministic() {
        let make = || {
            let mut b = FingerprintBuilder::new();
            b.str("sram").u64(0x1000_0000).u64(0x2_0000);
            b.finish()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn serde_roundtrip() {
        let fp = Fingerprint::from_bytes(b"serde");
        let json = serde_json::to_string(&fp).unwrap();
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }
}
