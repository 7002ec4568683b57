//! The goal/scoring collaborator collectors hand items to.

use crate::id::ItemId;
use std::collections::BTreeMap;

/// Receives every item a collector accepts. Fire-and-forget: the core
/// assumes submission always succeeds.
pub trait ItemSink {
    fn submit(&mut self, item: ItemId);
}

/// Default sink: counts deliveries per item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryTally {
    counts: BTreeMap<ItemId, u64>,
}

impl DeliveryTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_counts(counts: impl IntoIterator<Item = (ItemId, u64)>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
        }
    }

    pub fn count(&self, item: ItemId) -> u64 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, u64)> + '_ {
        self.counts.iter().map(|(&item, &n)| (item, n))
    }
}

impl ItemSink for DeliveryTally {
    fn submit(&mut self, item: ItemId) {
        *self.counts.entry(item).or_insert(0) += 1;
    }
}

impl<F: FnMut(ItemId)> ItemSink for F {
    fn submit(&mut self, item: ItemId) {
        self(item)
    }
}
