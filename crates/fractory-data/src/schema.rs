//! Serde data file structs for Fractory content and layouts.
//!
//! These structs define the on-disk format for items, recipes, world
//! configuration and prebuilt layouts. They are deserialized from RON, JSON,
//! or TOML data files and then resolved into engine types by the loader.

use fractory_core::geometry::Direction;
use fractory_core::grid::Wall;
use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A two-input combination. Inputs are unordered: `a + b` also matches
/// `b + a`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub a: String,
    pub b: String,
    pub output: String,
}

// ===========================================================================
// World configuration
// ===========================================================================

/// World parameters. Every field is optional and falls back to
/// [`WorldConfig::default`](fractory_core::config::WorldConfig). Intervals
/// are in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigData {
    pub root_width: Option<u32>,
    pub root_height: Option<u32>,
    pub module_size: Option<u32>,
    pub tick_interval: Option<f64>,
    pub min_tick_interval: Option<f64>,
    pub event_capacity: Option<usize>,
}

// ===========================================================================
// Layouts
// ===========================================================================

/// Placeable component kinds as named in layout files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindData {
    Emitter,
    Collector,
    Mover,
    Balancer,
    Distributor,
    Combiner,
    TunnelEntrance,
    TunnelExit,
    RecursiveModule,
}

/// A prebuilt arrangement of components for one grid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutData {
    #[serde(default)]
    pub components: Vec<PlacementData>,
}

/// One component in a layout.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacementData {
    pub kind: KindData,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_facing")]
    pub facing: Direction,
    #[serde(default)]
    pub flipped: bool,
    #[serde(default)]
    pub protected: bool,
    /// Emitted item name. Required for emitters, ignored otherwise.
    #[serde(default)]
    pub item: Option<String>,
    /// Port sources. Only valid on modules in the root grid.
    #[serde(default)]
    pub sources: Vec<PortSourceData>,
    /// Child grid contents. Only valid on recursive modules.
    #[serde(default)]
    pub contents: Vec<PlacementData>,
}

fn default_facing() -> Direction {
    Direction::Up
}

/// An infinite inbound source on one wall of a module.
#[derive(Debug, Clone, Deserialize)]
pub struct PortSourceData {
    pub wall: Wall,
    pub item: String,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// TOML wrapper for items (TOML requires a top-level table).
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

/// TOML wrapper for recipes.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlRecipes {
    pub recipes: Vec<RecipeData>,
}
