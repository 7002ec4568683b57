use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a grid (root or nested) in the world arena.
    pub struct GridId;

    /// Identifies a placed component in the world arena.
    pub struct ComponentId;

    /// Identifies a tick observer registered on the clock.
    pub struct ObserverId;
}

/// Identifies an item type in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);
