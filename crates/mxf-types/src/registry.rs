//! [`TypeRegistry`] — the dynamic type dictionary and its traits bindings.
//!
//! Mirrors the teacher's dictionary-driven tag lookup (a name or numeric key
//! maps to a record describing how to interpret bytes) but keyed by type
//! name rather than EXIF tag ID, and two-staged: a [`TypeRecord`] describes
//! *shape* (fixed size, interpretation of another type, array, compound);
//! a [`MDTraits`] implementation, looked up separately by a traits name,
//! describes *behavior* (how to get/set a value). The indirection lets many
//! type names share one traits implementation (`Length` and `Position` are
//! both plain 8-byte signed integers underneath).
use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{
    Int16Traits, Int32Traits, Int64Traits, Int8Traits, MDTraits, RationalTraits, StringTraits,
    TimestampTraits, UInt16Traits, UInt32Traits, UInt64Traits, UInt8Traits, UlTraits, Utf16Traits,
    UuidTraits,
};
use crate::type_record::{ArrayKind, CompoundMember, TypeRecord};
use crate::{Error, Result, UL};

/// Static name -> traits-name seed table, analogous to the teacher's
/// `phf_map!` tag dictionaries: known at compile time, looked up once at
/// registry construction rather than re-resolved on every access.
static DEFAULT_TRAITS_MAPPING: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Int8" => "Int8",
    "UInt8" => "UInt8",
    "Int16" => "Int16",
    "UInt16" => "UInt16",
    "Int32" => "Int32",
    "UInt32" => "UInt32",
    "Int64" => "Int64",
    "UInt64" => "UInt64",
    "Length" => "Int64",
    "Position" => "Int64",
    "VersionType" => "UInt16",
    "String" => "String",
    "UTF16String" => "UTF16",
    "Timestamp" => "Timestamp",
    "UL" => "UL",
    "AUID" => "UL",
    "UUID" => "UUID",
    "PackageID" => "UUID",
    "Rational" => "Rational",
};

/// Dynamic type/traits dictionary: one per running process, built with the
/// built-in SMPTE-register basic/interpretation types pre-registered, and
/// open to further registrations the way a mxflib-style dictionary load
/// would add vendor or application-private extension types.
pub struct TypeRegistry {
    types: HashMap<String, TypeRecord>,
    traits_by_name: HashMap<&'static str, Arc<dyn MDTraits>>,
    traits_mapping: HashMap<String, String>,
    /// UL <-> type-name bindings, so an MDObject can be constructed directly
    /// from the 16-byte key a KLV or local-set member declares (spec.md §4.3
    /// "Constructing ... by UL").
    ul_to_type: HashMap<UL, String>,
    /// Static (non-dynamic) 2-byte local tags the SMPTE register assigns to
    /// a handful of well-known ULs, consulted by `Primer::lookup` before it
    /// falls back to dynamic tag allocation.
    static_tags: HashMap<UL, u16>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            types: HashMap::new(),
            traits_by_name: HashMap::new(),
            traits_mapping: HashMap::new(),
            ul_to_type: HashMap::new(),
            static_tags: HashMap::new(),
        };
        reg.register_builtin_traits();
        reg.register_builtin_types();
        reg
    }

    fn register_builtin_traits(&mut self) {
        self.traits_by_name.insert("Int8", Arc::new(Int8Traits));
        self.traits_by_name.insert("UInt8", Arc::new(UInt8Traits));
        self.traits_by_name.insert("Int16", Arc::new(Int16Traits));
        self.traits_by_name.insert("UInt16", Arc::new(UInt16Traits));
        self.traits_by_name.insert("Int32", Arc::new(Int32Traits));
        self.traits_by_name.insert("UInt32", Arc::new(UInt32Traits));
        self.traits_by_name.insert("Int64", Arc::new(Int64Traits));
        self.traits_by_name.insert("UInt64", Arc::new(UInt64Traits));
        self.traits_by_name.insert("String", Arc::new(StringTraits));
        self.traits_by_name.insert("UTF16", Arc::new(Utf16Traits));
        self.traits_by_name.insert("Timestamp", Arc::new(TimestampTraits));
        self.traits_by_name.insert("UL", Arc::new(UlTraits));
        self.traits_by_name.insert("UUID", Arc::new(UuidTraits));
        self.traits_by_name.insert("Rational", Arc::new(RationalTraits));

        for (type_name, traits_name) in DEFAULT_TRAITS_MAPPING.entries() {
            self.traits_mapping.insert(type_name.to_string(), traits_name.to_string());
        }
    }

    fn register_builtin_types(&mut self) {
        for (name, size) in [
            ("Int8", 1),
            ("UInt8", 1),
            ("Int16", 2),
            ("UInt16", 2),
            ("Int32", 4),
            ("UInt32", 4),
            ("Int64", 8),
            ("UInt64", 8),
            ("UL", 16),
            ("UUID", 16),
            ("Timestamp", 8),
        ] {
            self.register_basic(name, size);
        }
        self.register_interpretation("Length", "Int64");
        self.register_interpretation("Position", "Int64");
        self.register_interpretation("VersionType", "UInt16");
        self.register_interpretation("AUID", "UL");
        self.register_interpretation("PackageID", "UUID");

        self.register_array("String", "UInt8", ArrayKind::Implied);
        self.register_array("UTF16String", "UInt16", ArrayKind::Implied);
        self.register_array("UUIDBatch", "UUID", ArrayKind::Batch);
        self.register_array("StrongReferenceBatch", "UUID", ArrayKind::Batch);
        self.register_array("WeakReferenceBatch", "UUID", ArrayKind::Batch);
        self.register_interpretation("StrongReference", "UUID");
        self.register_interpretation("WeakReference", "UUID");

        self.register_compound(
            "Rational",
            vec![CompoundMember::new("Numerator", "Int32"), CompoundMember::new("Denominator", "Int32")],
        );
    }

    pub fn register_basic(&mut self, name: impl Into<String>, size: usize) {
        let name = name.into();
        self.types.insert(name.clone(), TypeRecord::Basic { name, size });
    }

    pub fn register_interpretation(&mut self, name: impl Into<String>, base: impl Into<String>) {
        let name = name.into();
        self.types.insert(name.clone(), TypeRecord::Interpretation { name, base: base.into() });
    }

    pub fn register_array(&mut self, name: impl Into<String>, element: impl Into<String>, kind: ArrayKind) {
        let name = name.into();
        self.types.insert(name.clone(), TypeRecord::Array { name, element: element.into(), kind });
    }

    pub fn register_compound(&mut self, name: impl Into<String>, members: Vec<CompoundMember>) {
        let name = name.into();
        self.types.insert(name.clone(), TypeRecord::Compound { name, members });
    }

    pub fn lookup(&self, name: &str) -> Result<&TypeRecord> {
        self.types.get(name).ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Follow a chain of `Interpretation` records down to the first `Basic`,
    /// `Array`, or `Compound` record — the type whose traits actually own
    /// the wire bytes.
    pub fn effective_type(&self, name: &str) -> Result<&TypeRecord> {
        let mut current = name;
        let mut seen = std::collections::HashSet::new();
        loop {
            if !seen.insert(current.to_string()) {
                return Err(Error::CircularInterpretation(name.to_string()));
            }
            match self.lookup(current)? {
                TypeRecord::Interpretation { base, .. } => current = base,
                record => return Ok(record),
            }
        }
    }

    /// Register (or override) which traits implementation backs a type
    /// name, the way a dictionary extension might bind a new vendor type to
    /// an existing traits class instead of writing a bespoke one.
    pub fn add_traits_mapping(&mut self, type_name: impl Into<String>, traits_name: impl Into<String>) {
        self.traits_mapping.insert(type_name.into(), traits_name.into());
    }

    /// Resolve a type name to its traits name, falling back to the
    /// effective (interpretation-resolved) type's own name if there is no
    /// direct mapping — e.g. a newly registered `Int32` alias with no
    /// explicit mapping still resolves through to the `Int32` traits.
    pub fn lookup_traits_mapping(&self, type_name: &str) -> Result<&str> {
        if let Some(mapped) = self.traits_mapping.get(type_name) {
            return Ok(mapped.as_str());
        }
        let effective = self.effective_type(type_name)?;
        let effective_name = effective.name();
        self.traits_mapping
            .get(effective_name)
            .map(|s| s.as_str())
            .ok_or_else(|| Error::UnknownTraitsMapping(type_name.to_string()))
    }

    /// Resolve a type name all the way to its [`MDTraits`] object.
    pub fn traits_for(&self, type_name: &str) -> Result<Arc<dyn MDTraits>> {
        let traits_name = self.lookup_traits_mapping(type_name)?;
        self.traits_by_name
            .get(traits_name)
            .cloned()
            .ok_or_else(|| Error::UnknownTraitsMapping(type_name.to_string()))
    }

    /// Bind a UL to the type name it declares, so that later constructing an
    /// object from that UL resolves to the right type record.
    pub fn register_ul(&mut self, ul: UL, type_name: impl Into<String>) {
        self.ul_to_type.insert(ul, type_name.into());
    }

    pub fn type_for_ul(&self, ul: &UL) -> Option<&str> {
        self.ul_to_type.get(ul).map(|s| s.as_str())
    }

    /// Reverse of [`Self::type_for_ul`]: the UL bound to a type name, if any
    /// was registered via `register_ul`.
    pub fn ul_for_type(&self, type_name: &str) -> Option<UL> {
        self.ul_to_type.iter().find(|(_, name)| name.as_str() == type_name).map(|(ul, _)| *ul)
    }

    /// Bind a UL to its static (schema-assigned) 2-byte local tag.
    pub fn register_static_tag(&mut self, ul: UL, tag: u16) {
        self.static_tags.insert(ul, tag);
    }

    pub fn static_tag_for_ul(&self, ul: &UL) -> Option<u16> {
        self.static_tags.get(ul).copied()
    }

    /// Look up a named member's type within a compound type record.
    pub fn compound_member_type<'a>(&'a self, compound_name: &str, member_name: &str) -> Result<&'a str> {
        match self.lookup(compound_name)? {
            TypeRecord::Compound { members, .. } => members
                .iter()
                .find(|m| m.name == member_name)
                .map(|m| m.type_name.as_str())
                .ok_or_else(|| Error::NoSuchMember { compound: compound_name.to_string(), member: member_name.to_string() }),
            _ => Err(Error::NotCompound(compound_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_type_follows_interpretation_chain() {
        let reg = TypeRegistry::new();
        let effective = reg.effective_type("Length").unwrap();
        assert_eq!(effective.name(), "Int64");
    }

    #[test]
    fn traits_for_resolves_through_mapping() {
        let reg = TypeRegistry::new();
        let traits = reg.traits_for("Position").unwrap();
        let mut chunk = mxf_core::DataChunk::new();
        traits.set_int64(&mut chunk, 42).unwrap();
        assert_eq!(traits.get_int64(&chunk).unwrap(), 42);
    }

    #[test]
    fn unknown_type_is_reported() {
        let reg = TypeRegistry::new();
        assert!(matches!(reg.lookup("NoSuchType"), Err(Error::UnknownType(_))));
    }

    #[test]
    fn compound_member_lookup() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.compound_member_type("Rational", "Numerator").unwrap(), "Int32");
        assert!(reg.compound_member_type("Rational", "Nope").is_err());
    }
}
