//! Data-driven content loading for Fractory.
//!
//! A data directory holds `items`, `recipes`, `config` and `layout` files in
//! RON, TOML or JSON (one format per file). Names are resolved into ids, the
//! registry is frozen, and a layout can be applied to a fresh world.

pub mod loader;
pub mod schema;

pub use loader::{apply_layout, load_game_data, load_world, DataLoadError, GameData};
