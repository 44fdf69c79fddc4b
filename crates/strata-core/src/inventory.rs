//! Item counts held by entities and by container blocks.

use std::collections::BTreeMap;

use crate::id::ItemId;

/// A bag of item counts. Items with a count of zero are not stored, so
/// two inventories holding the same items always compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    items: BTreeMap<ItemId, u32>,
}

impl Inventory {
    /// An empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many of `item` this inventory holds.
    pub fn count(&self, item: ItemId) -> u32 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    /// Add `count` of `item`, saturating at `u32::MAX`.
    pub fn add(&mut self, item: ItemId, count: u32) {
        if count == 0 {
            return;
        }
        let slot = self.items.entry(item).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Remove `count` of `item`.
    ///
    /// Returns `false` and leaves the inventory untouched if fewer than
    /// `count` are held.
    pub fn remove(&mut self, item: ItemId, count: u32) -> bool {
        let held = self.count(item);
        if held < count {
            return false;
        }
        if held == count {
            self.items.remove(&item);
        } else {
            self.items.insert(item, held - count);
        }
        true
    }

    /// Whether no items are held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate `(item, count)` pairs in item order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, u32)> + '_ {
        self.items.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_requires_enough_items() {
        let mut inv = Inventory::new();
        inv.add(ItemId(1), 3);
        assert!(!inv.remove(ItemId(1), 4));
        assert_eq!(inv.count(ItemId(1)), 3);
        assert!(inv.remove(ItemId(1), 3));
        assert!(inv.is_empty());
    }

    #[test]
    fn emptied_slot_compares_equal_to_fresh() {
        let mut inv = Inventory::new();
        inv.add(ItemId(9), 1);
        assert!(inv.remove(ItemId(9), 1));
        assert_eq!(inv, Inventory::new());
    }
}
