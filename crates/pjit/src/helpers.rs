//! Helper function addresses.

use pjit_emit::{CallKind, CallResolver, CallSite, Resolution};
use rustc_hash::FxHashMap;

/// Spacing between helper slots laid out by [`HelperTable::with_slots`].
pub const HELPER_SLOT: u32 = 16;

/// Maps helper ids to absolute addresses.
///
/// Helper addresses never move, so every resolution is `fixed`.
#[derive(Clone, Debug, Default)]
pub struct HelperTable {
    addrs: FxHashMap<i32, u32>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place helpers `ids` at consecutive slots starting at `base`.
    pub fn with_slots(base: u32, ids: impl IntoIterator<Item = i32>) -> Self {
        let mut table = Self::new();
        for (slot, id) in (0u32..).zip(ids) {
            table.insert(id, base + slot * HELPER_SLOT);
        }
        table
    }

    pub fn insert(&mut self, id: i32, addr: u32) {
        self.addrs.insert(id, addr);
    }

    pub fn get(&self, id: i32) -> Option<u32> {
        self.addrs.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// `(id, addr)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, u32)> {
        let mut entries: Vec<_> = self.addrs.iter().map(|(&id, &addr)| (id, addr)).collect();
        entries.sort_unstable();
        entries.into_iter()
    }
}

impl CallResolver for HelperTable {
    fn resolve(&self, site: &CallSite) -> Option<Resolution> {
        match site.kind {
            CallKind::Helper(id) => self.get(id).map(|addr| Resolution::Resolved { addr, fixed: true }),
            CallKind::Subprog(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(kind: CallKind) -> CallSite {
        CallSite { index: 0, kind }
    }

    #[test]
    fn test_slots() {
        let table = HelperTable::with_slots(0x4000_0000, [1, 5, 7]);
        assert_eq!(table.get(5), Some(0x4000_0010));
        assert_eq!(table.get(2), None);
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec![(1, 0x4000_0000), (5, 0x4000_0010), (7, 0x4000_0020)]
        );
    }

    #[test]
    fn test_resolve() {
        let table = HelperTable::with_slots(0x100, [3]);
        assert_eq!(
            table.resolve(&site(CallKind::Helper(3))),
            Some(Resolution::Resolved {
                addr: 0x100,
                fixed: true
            })
        );
        assert_eq!(table.resolve(&site(CallKind::Helper(4))), None);
        assert_eq!(table.resolve(&site(CallKind::Subprog(1))), None);
    }
}
