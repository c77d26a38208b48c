//! [`Primer`] — a bijection between 2-byte local tags and 16-byte ULs.
//!
//! No direct teacher analogue; grounded on the general bidirectional-lookup
//! pattern the teacher uses for tag name <-> numeric id tables, generalized
//! here to a pair of `HashMap`s kept in sync plus downward dynamic
//! allocation from `0xFFFF`.

use std::collections::HashMap;

use mxf_types::{TypeRegistry, UL};

/// First dynamic tag considered: allocation descends from here, skipping
/// any tag already present in the primer.
const FIRST_DYNAMIC_TAG: u16 = 0xFFFF;

#[derive(Default)]
pub struct Primer {
    tag_to_ul: HashMap<u16, UL>,
    ul_to_tag: HashMap<UL, u16>,
    next_dynamic: u16,
}

impl Primer {
    pub fn new() -> Self {
        Self { tag_to_ul: HashMap::new(), ul_to_tag: HashMap::new(), next_dynamic: FIRST_DYNAMIC_TAG }
    }

    /// Record a (tag, UL) pair; also records the reverse entry.
    pub fn insert(&mut self, tag: u16, ul: UL) {
        self.tag_to_ul.insert(tag, ul);
        self.ul_to_tag.insert(ul, tag);
    }

    pub fn lookup_ul(&self, tag: u16) -> Option<UL> {
        self.tag_to_ul.get(&tag).copied()
    }

    pub fn lookup_tag(&self, ul: &UL) -> Option<u16> {
        self.ul_to_tag.get(ul).copied()
    }

    pub fn len(&self) -> usize {
        self.tag_to_ul.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag_to_ul.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u16, UL)> + '_ {
        self.tag_to_ul.iter().map(|(&tag, &ul)| (tag, ul))
    }

    /// Allocate the next free tag descending from `0xFFFF`, skipping any
    /// value already in use, and record it against `ul`.
    pub fn allocate_dynamic_tag(&mut self, ul: UL) -> u16 {
        while self.tag_to_ul.contains_key(&self.next_dynamic) {
            self.next_dynamic -= 1;
        }
        let tag = self.next_dynamic;
        self.insert(tag, ul);
        self.next_dynamic = self.next_dynamic.saturating_sub(1);
        tag
    }

    /// The write-path tag computation of spec.md §4.3: accept a
    /// caller-hinted tag if its primer entry already matches `ul`;
    /// otherwise reuse an existing entry for `ul`; otherwise consult the
    /// type registry's static key; otherwise allocate dynamically.
    pub fn lookup(&mut self, registry: &TypeRegistry, ul: &UL, try_tag: Option<u16>) -> u16 {
        if let Some(tag) = try_tag {
            if self.tag_to_ul.get(&tag) == Some(ul) {
                return tag;
            }
        }
        if let Some(existing) = self.lookup_tag(ul) {
            return existing;
        }
        if let Some(static_tag) = registry.static_tag_for_ul(ul) {
            self.insert(static_tag, *ul);
            return static_tag;
        }
        self.allocate_dynamic_tag(*ul)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ul(byte: u8) -> UL {
        let mut bytes = [0u8; 16];
        bytes[0] = byte;
        UL::new(bytes)
    }

    #[test]
    fn dynamic_allocation_descends_and_skips_used() {
        let mut primer = Primer::new();
        primer.insert(0xFFFF, ul(1));
        let tag = primer.allocate_dynamic_tag(ul(2));
        assert_eq!(tag, 0xFFFE);
    }

    #[test]
    fn reverse_lookup_matches_forward() {
        let mut primer = Primer::new();
        primer.insert(0x0102, ul(9));
        assert_eq!(primer.lookup_tag(&ul(9)), Some(0x0102));
        assert_eq!(primer.lookup_ul(0x0102), Some(ul(9)));
    }

    #[test]
    fn lookup_prefers_hinted_tag_when_it_matches() {
        let mut primer = Primer::new();
        let registry = TypeRegistry::new();
        primer.insert(0x1000, ul(5));
        assert_eq!(primer.lookup(&registry, &ul(5), Some(0x1000)), 0x1000);
    }

    #[test]
    fn lookup_falls_back_to_static_then_dynamic() {
        let mut primer = Primer::new();
        let mut registry = TypeRegistry::new();
        registry.register_static_tag(ul(7), 0x0042);
        assert_eq!(primer.lookup(&registry, &ul(7), None), 0x0042);
        let dynamic = primer.lookup(&registry, &ul(8), None);
        assert_eq!(dynamic, 0xFFFF);
    }
}
