//! [`UL`] (SMPTE universal label) and [`Uuid`] (instance identifier).
//!
//! Both are 16-byte identifiers; a `UL` and a `Uuid` are only distinguishable
//! by context (which field of which set declares it), so they share almost
//! no code — `UL` additionally supports "versionless" comparison, masking
//! out the version octet at byte index 7 so that e.g. a Preface key encoded
//! against version 1 of a register compares equal to the same key encoded
//! against version 2.

use std::fmt;

/// A 16-byte SMPTE universal label.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UL(pub [u8; 16]);

impl UL {
    pub const fn new(bytes: [u8; 16]) -> Self {
        UL(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(UL)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Byte index of the SMPTE UL version octet.
    pub const VERSION_BYTE: usize = 7;

    /// Compare two ULs ignoring the version octet (byte index 7).
    ///
    /// Reflexive, symmetric, and transitive: it is ordinary equality over a
    /// 15-byte projection of the label, which inherits all three properties
    /// from slice equality.
    pub fn versionless_eq(&self, other: &UL) -> bool {
        for i in 0..16 {
            if i == Self::VERSION_BYTE {
                continue;
            }
            if self.0[i] != other.0[i] {
                return false;
            }
        }
        true
    }

    /// Does this UL have a static (non-dynamic) 2-byte local tag per the SMPTE
    /// register convention: bytes 0-3 equal `06 0E 2B 34` and byte 4 equal
    /// `01` (a "metadata dictionary" designator) with a non-zero value in
    /// bytes 13-14 used as the tag itself. Static keys are looked up by the
    /// type registry; this predicate only identifies the *shape*.
    pub fn has_smpte_register_prefix(&self) -> bool {
        self.0[0..4] == [0x06, 0x0E, 0x2B, 0x34]
    }
}

impl fmt::Debug for UL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UL(")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for UL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A 16-byte instance identifier (UUID, in context — see module docs).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Uuid(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(Uuid)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Generate a new random (v4) instance UID — used by the metadata
    /// facade when it creates a fresh object or bumps a generation UID.
    pub fn new_v4() -> Self {
        Uuid(*::uuid::Uuid::new_v4().as_bytes())
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ::uuid::Uuid::from_bytes(self.0))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ul_with_version(version: u8) -> UL {
        let mut bytes = [0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, version, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes[7] = version;
        UL(bytes)
    }

    #[test]
    fn versionless_eq_ignores_byte_7() {
        let a = ul_with_version(1);
        let b = ul_with_version(2);
        assert_ne!(a, b);
        assert!(a.versionless_eq(&b));
    }

    #[test]
    fn versionless_eq_is_reflexive_symmetric_transitive() {
        let a = ul_with_version(1);
        let b = ul_with_version(2);
        let c = ul_with_version(3);
        assert!(a.versionless_eq(&a));
        assert_eq!(a.versionless_eq(&b), b.versionless_eq(&a));
        assert!(a.versionless_eq(&b) && b.versionless_eq(&c) && a.versionless_eq(&c));
    }

    #[test]
    fn differing_non_version_byte_is_unequal() {
        let mut a = ul_with_version(1);
        let b = a;
        a.0[3] = 0xFF;
        assert!(!a.versionless_eq(&b));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// spec.md §8: "Versionless-UL equality is reflexive, symmetric, and
        /// transitive over any set of UL literals that differ only in byte
        /// 7" — checked over arbitrary 15-byte projections with three
        /// independently chosen version octets.
        #[test]
        fn versionless_eq_is_an_equivalence_relation(
            bytes in prop::array::uniform16(any::<u8>()),
            v1: u8, v2: u8, v3: u8,
        ) {
            let mk = |v: u8| { let mut b = bytes; b[UL::VERSION_BYTE] = v; UL(b) };
            let a = mk(v1);
            let b = mk(v2);
            let c = mk(v3);

            prop_assert!(a.versionless_eq(&a));
            prop_assert_eq!(a.versionless_eq(&b), b.versionless_eq(&a));
            if a.versionless_eq(&b) && b.versionless_eq(&c) {
                prop_assert!(a.versionless_eq(&c));
            }
        }

        /// Changing any byte other than the version octet always breaks
        /// versionless equality.
        #[test]
        fn differing_any_non_version_byte_breaks_equality(
            bytes in prop::array::uniform16(any::<u8>()),
            index in 0usize..16,
            delta in 1u8..=255,
        ) {
            prop_assume!(index != UL::VERSION_BYTE);
            let a = UL(bytes);
            let mut other = bytes;
            other[index] = other[index].wrapping_add(delta);
            let b = UL(other);
            prop_assert!(!a.versionless_eq(&b));
        }
    }
}
