//! 128-bit content fingerprints
//!
//! A `Fingerprint` identifies "what `compute` would produce" for a plug in a
//! context. Fingerprints are built with a `FingerprintHasher`, which feeds an
//! ordered stream of typed values through BLAKE3 and keeps the first 128 bits
//! of the digest.
//!
//! Two combination modes are available:
//!
//! - **Ordered**: append values to a `FingerprintHasher`. Order matters.
//! - **Unordered**: `Fingerprint::combine`, an associative and commutative
//!   operation used when summing child hashes. Callers tag each child hash
//!   with its position before combining, so the sum still depends on which
//!   child contributed what.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{PlugType, PlugValue};

/// A 128-bit fingerprint. The all-zero value is the null fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// The identity element of `combine`, also used as "not computed"
    pub const NULL: Fingerprint = Fingerprint(0);

    /// Build a fingerprint from its raw value
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Raw 128-bit value
    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// Whether this is the null fingerprint
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Order-independent combination.
    ///
    /// Associative and commutative, with `NULL` as identity.
    pub fn combine(self, other: Fingerprint) -> Fingerprint {
        Fingerprint(self.0.wrapping_add(other.0))
    }

    /// Lower-case hexadecimal representation (32 characters)
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental builder for fingerprints.
///
/// Every `append_*` method writes a type tag before the payload, so `1_i64`
/// and `1.0_f64` (or `"ab" + "c"` and `"a" + "bc"`) never collide.
#[derive(Clone)]
pub struct FingerprintHasher {
    inner: blake3::Hasher,
}

impl FingerprintHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Create a hasher separated into its own domain
    pub fn with_domain(domain: &str) -> Self {
        let mut hasher = Self::new();
        hasher.tag(b'D');
        hasher.raw_str(domain);
        hasher
    }

    fn tag(&mut self, tag: u8) {
        self.inner.update(&[tag]);
    }

    fn raw_str(&mut self, value: &str) {
        self.inner.update(&(value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
    }

    /// Append a length-prefixed byte string
    pub fn append_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.tag(b'b');
        self.inner.update(&(value.len() as u64).to_le_bytes());
        self.inner.update(value);
        self
    }

    pub fn append_str(&mut self, value: &str) -> &mut Self {
        self.tag(b's');
        self.raw_str(value);
        self
    }

    pub fn append_bool(&mut self, value: bool) -> &mut Self {
        self.tag(b'?');
        self.inner.update(&[value as u8]);
        self
    }

    pub fn append_i64(&mut self, value: i64) -> &mut Self {
        self.tag(b'i');
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.tag(b'u');
        self.inner.update(&value.to_le_bytes());
        self
    }

    /// Append a float by bit pattern (`-0.0` and `0.0` hash differently)
    pub fn append_f64(&mut self, value: f64) -> &mut Self {
        self.tag(b'f');
        self.inner.update(&value.to_bits().to_le_bytes());
        self
    }

    pub fn append_f32(&mut self, value: f32) -> &mut Self {
        self.tag(b'g');
        self.inner.update(&value.to_bits().to_le_bytes());
        self
    }

    pub fn append_i32_slice(&mut self, values: &[i32]) -> &mut Self {
        self.tag(b'I');
        self.inner.update(&(values.len() as u64).to_le_bytes());
        for v in values {
            self.inner.update(&v.to_le_bytes());
        }
        self
    }

    pub fn append_f32_slice(&mut self, values: &[f32]) -> &mut Self {
        self.tag(b'G');
        self.inner.update(&(values.len() as u64).to_le_bytes());
        for v in values {
            self.inner.update(&v.to_bits().to_le_bytes());
        }
        self
    }

    pub fn append_i64_slice(&mut self, values: &[i64]) -> &mut Self {
        self.tag(b'L');
        self.inner.update(&(values.len() as u64).to_le_bytes());
        for v in values {
            self.inner.update(&v.to_le_bytes());
        }
        self
    }

    pub fn append_fingerprint(&mut self, value: Fingerprint) -> &mut Self {
        self.tag(b'h');
        self.inner.update(&value.as_u128().to_le_bytes());
        self
    }

    /// Finish, keeping the first 128 bits of the digest
    pub fn finish(&self) -> Fingerprint {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest.as_bytes()[..16]);
        Fingerprint(u128::from_le_bytes(bytes))
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash of an unconnected leaf plug holding `value`.
pub(crate) fn static_value_hash(plug_type: PlugType, value: &PlugValue) -> Fingerprint {
    let mut h = FingerprintHasher::with_domain("static");
    h.append_str(plug_type.name());
    value.hash_into(&mut h);
    h.finish()
}

/// Hash of a compound plug from its children's names and hashes, in child
/// order.
///
/// Children are tagged with their index and name and summed with `combine`.
/// Compound values carry child names, so the names must reach the hash too.
pub(crate) fn compound_hash(plug_type: PlugType, children: &[(&str, Fingerprint)]) -> Fingerprint {
    let mut h = FingerprintHasher::with_domain("compound");
    h.append_str(plug_type.name());
    h.append_u64(children.len() as u64);
    let mut sum = h.finish();
    for (index, (name, child)) in children.iter().enumerate() {
        let mut tagged = FingerprintHasher::with_domain("child");
        tagged
            .append_u64(index as u64)
            .append_str(name)
            .append_fingerprint(*child);
        sum = sum.combine(tagged.finish());
    }
    sum
}

/// Hash of a leaf plug whose input has a different (but accepted) type.
pub(crate) fn converted_hash(source: Fingerprint, target: PlugType) -> Fingerprint {
    let mut h = FingerprintHasher::with_domain("convert");
    h.append_fingerprint(source).append_str(target.name());
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_is_deterministic() {
        let mut a = FingerprintHasher::new();
        a.append_str("frame").append_f64(1.0);
        let mut b = FingerprintHasher::new();
        b.append_str("frame").append_f64(1.0);
        assert_eq!(a.finish(), b.finish());
        assert!(!a.finish().is_null());
    }

    #[test]
    fn test_hasher_type_tags_separate_values() {
        let mut a = FingerprintHasher::new();
        a.append_i64(1);
        let mut b = FingerprintHasher::new();
        b.append_f64(1.0);
        assert_ne!(a.finish(), b.finish());

        let mut c = FingerprintHasher::new();
        c.append_str("ab").append_str("c");
        let mut d = FingerprintHasher::new();
        d.append_str("a").append_str("bc");
        assert_ne!(c.finish(), d.finish());
    }

    #[test]
    fn test_domains_separate_hashes() {
        let mut a = FingerprintHasher::with_domain("one");
        a.append_i64(5);
        let mut b = FingerprintHasher::with_domain("two");
        b.append_i64(5);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_combine_is_associative_and_commutative() {
        let x = Fingerprint::from_u128(0x1234);
        let y = Fingerprint::from_u128(u128::MAX - 3);
        let z = Fingerprint::from_u128(99);

        assert_eq!(x.combine(y), y.combine(x));
        assert_eq!(x.combine(y).combine(z), x.combine(y.combine(z)));
        assert_eq!(x.combine(Fingerprint::NULL), x);
    }

    #[test]
    fn test_compound_hash_is_position_sensitive() {
        let a = static_value_hash(PlugType::Float, &PlugValue::Float(1.0));
        let b = static_value_hash(PlugType::Float, &PlugValue::Float(2.0));

        let ab = compound_hash(PlugType::Compound, &[("x", a), ("y", b)]);
        let ba = compound_hash(PlugType::Compound, &[("x", b), ("y", a)]);
        assert_ne!(ab, ba);
        assert_eq!(ab, compound_hash(PlugType::Compound, &[("x", a), ("y", b)]));
    }

    #[test]
    fn test_compound_hash_includes_child_names() {
        let a = static_value_hash(PlugType::Float, &PlugValue::Float(3.0));

        let w = compound_hash(PlugType::Compound, &[("w", a)]);
        let v = compound_hash(PlugType::Compound, &[("v", a)]);
        assert_ne!(w, v);
    }

    #[test]
    fn test_hex_formatting() {
        let fp = Fingerprint::from_u128(255);
        assert_eq!(fp.to_hex().len(), 32);
        assert!(fp.to_hex().ends_with("ff"));
        assert_eq!(format!("{fp}"), fp.to_hex());
    }
}
