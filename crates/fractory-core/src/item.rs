//! The item catalog.
//!
//! Items are plain values: an [`ItemId`] plus a display name. Components hold
//! ids, never definitions, so an item can be referenced from any number of
//! slots without copying.

use crate::id::ItemId;
use std::collections::HashMap;

/// An item type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDef {
    pub id: ItemId,
    pub name: String,
}

/// Immutable catalog of item definitions. Built by
/// [`RegistryBuilder`](crate::registry::RegistryBuilder).
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: Vec<ItemDef>,
    name_to_id: HashMap<String, ItemId>,
}

impl ItemCatalog {
    pub(crate) fn from_defs(items: Vec<ItemDef>) -> Self {
        let name_to_id = items
            .iter()
            .map(|item| (item.name.clone(), item.id))
            .collect();
        Self { items, name_to_id }
    }

    /// Resolve an id (e.g. one read back from a snapshot) to its definition.
    pub fn resolve(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    /// Lookup item id by name.
    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.name_to_id.get(name).copied()
    }

    /// Display name for an id, if it exists.
    pub fn name(&self, id: ItemId) -> Option<&str> {
        self.resolve(id).map(|item| item.name.as_str())
    }

    pub fn contains(&self, id: ItemId) -> bool {
        (id.0 as usize) < self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate definitions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.iter()
    }
}
