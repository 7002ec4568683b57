//! Commutative two-input recipe table used by combiners.

use crate::id::ItemId;
use std::collections::HashMap;

/// A recipe definition: two inputs combine into one output. Input order is
/// irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeDef {
    pub input_a: ItemId,
    pub input_b: ItemId,
    pub output: ItemId,
}

impl RecipeDef {
    pub fn new(input_a: ItemId, input_b: ItemId, output: ItemId) -> Self {
        Self {
            input_a,
            input_b,
            output,
        }
    }

    /// Order-insensitive table key for this recipe's inputs.
    pub fn key(&self) -> (ItemId, ItemId) {
        recipe_key(self.input_a, self.input_b)
    }
}

/// Normalize an input pair so `(a, b)` and `(b, a)` share a key.
pub(crate) fn recipe_key(a: ItemId, b: ItemId) -> (ItemId, ItemId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Frozen recipe lookup table. O(1) lookups keyed by normalized input pairs.
#[derive(Debug, Clone, Default)]
pub struct RecipeTable {
    recipes: HashMap<(ItemId, ItemId), ItemId>,
}

impl RecipeTable {
    pub(crate) fn from_map(recipes: HashMap<(ItemId, ItemId), ItemId>) -> Self {
        Self { recipes }
    }

    /// Output for an input pair, in either order.
    pub fn lookup(&self, a: ItemId, b: ItemId) -> Option<ItemId> {
        self.recipes.get(&recipe_key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// All recipes, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = RecipeDef> + '_ {
        self.recipes
            .iter()
            .map(|(&(a, b), &output)| RecipeDef::new(a, b, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RecipeTable {
        let mut map = HashMap::new();
        let steam = RecipeDef::new(ItemId(1), ItemId(0), ItemId(2));
        map.insert(steam.key(), steam.output);
        RecipeTable::from_map(map)
    }

    #[test]
    fn key_is_order_insensitive() {
        assert_eq!(recipe_key(ItemId(4), ItemId(1)), recipe_key(ItemId(1), ItemId(4)));
        assert_eq!(recipe_key(ItemId(3), ItemId(3)), (ItemId(3), ItemId(3)));
    }

    #[test]
    fn lookup_is_commutative() {
        let table = table();
        assert_eq!(table.lookup(ItemId(0), ItemId(1)), Some(ItemId(2)));
        assert_eq!(table.lookup(ItemId(1), ItemId(0)), Some(ItemId(2)));
    }

    #[test]
    fn lookup_miss() {
        let table = table();
        assert_eq!(table.lookup(ItemId(0), ItemId(0)), None);
        assert_eq!(table.lookup(ItemId(2), ItemId(1)), None);
    }

    #[test]
    fn iter_yields_normalized_pairs() {
        let table = table();
        let all: Vec<_> = table.iter().collect();
        assert_eq!(all, vec![RecipeDef::new(ItemId(0), ItemId(1), ItemId(2))]);
        assert_eq!(table.len(), 1);
    }
}
