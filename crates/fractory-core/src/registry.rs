use crate::id::ItemId;
use crate::item::{ItemCatalog, ItemDef};
use crate::recipe::{RecipeDef, RecipeTable};
use std::collections::HashMap;

/// Builder for constructing an immutable [`Registry`].
/// Two-phase lifecycle: registration -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item type. Returns its ID. Registering an existing name
    /// returns the existing ID.
    pub fn register_item(&mut self, name: &str) -> ItemId {
        if let Some(&id) = self.item_name_to_id.get(name) {
            return id;
        }
        let id = ItemId(self.items.len() as u32);
        self.items.push(ItemDef {
            id,
            name: name.to_string(),
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Register a two-input recipe.
    pub fn register_recipe(&mut self, input_a: ItemId, input_b: ItemId, output: ItemId) {
        self.recipes.push(RecipeDef::new(input_a, input_b, output));
    }

    /// Register a recipe by item names.
    pub fn register_recipe_by_name(
        &mut self,
        input_a: &str,
        input_b: &str,
        output: &str,
    ) -> Result<(), RegistryError> {
        let a = self.require(input_a)?;
        let b = self.require(input_b)?;
        let out = self.require(output)?;
        self.register_recipe(a, b, out);
        Ok(())
    }

    /// Lookup item ID by name.
    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<ItemId, RegistryError> {
        self.item_id(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let item_count = self.items.len();
        let mut table = HashMap::with_capacity(self.recipes.len());

        for recipe in &self.recipes {
            for id in [recipe.input_a, recipe.input_b, recipe.output] {
                if id.0 as usize >= item_count {
                    return Err(RegistryError::InvalidItemRef(id));
                }
            }
            match table.insert(recipe.key(), recipe.output) {
                Some(previous) if previous != recipe.output => {
                    return Err(RegistryError::ConflictingRecipe {
                        a: recipe.input_a,
                        b: recipe.input_b,
                    });
                }
                _ => {}
            }
        }

        Ok(Registry {
            items: ItemCatalog::from_defs(self.items),
            recipes: RecipeTable::from_map(table),
        })
    }
}

/// Immutable registry of items and recipes. Frozen after build().
#[derive(Debug, Clone, Default)]
pub struct Registry {
    items: ItemCatalog,
    recipes: RecipeTable,
}

impl Registry {
    pub fn items(&self) -> &ItemCatalog {
        &self.items
    }

    pub fn recipes(&self) -> &RecipeTable {
        &self.recipes
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.items.item_id(name)
    }

    pub fn lookup(&self, a: ItemId, b: ItemId) -> Option<ItemId> {
        self.recipes.lookup(a, b)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemId),
    #[error("conflicting outputs registered for recipe {a:?} + {b:?}")]
    ConflictingRecipe { a: ItemId, b: ItemId },
}
