//! Resolution pipeline: reads data files, resolves names, builds the registry,
//! the world configuration and any prebuilt layout.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers used by the higher-level loading functions.

use crate::schema::{ConfigData, ItemData, KindData, LayoutData, PlacementData, RecipeData};
use fractory_core::component::ComponentKind;
use fractory_core::config::{ConfigError, WorldConfig};
use fractory_core::fixed::Fixed64;
use fractory_core::geometry::{GridPosition, Orientation};
use fractory_core::id::{ComponentId, GridId, ItemId};
use fractory_core::registry::{Registry, RegistryBuilder, RegistryError};
use fractory_core::world::{PlacementError, PortConfigError, World};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error, or content that parsed but makes no sense.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A layout entry could not be placed.
    #[error("cannot place component at ({x}, {y}) in {file}: {source}")]
    Placement {
        file: PathBuf,
        x: i32,
        y: i32,
        source: PlacementError,
    },

    #[error("invalid port source at ({x}, {y}) in {file}: {source}")]
    PortSource {
        file: PathBuf,
        x: i32,
        y: i32,
        source: PortConfigError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn item_names(registry: &Registry) -> HashMap<String, ItemId> {
    registry
        .items()
        .iter()
        .map(|def| (def.name.clone(), def.id))
        .collect()
}

// ===========================================================================
// Registry
// ===========================================================================

/// Build a frozen registry from `items.*` (required) and `recipes.*`
/// (optional) in `dir`.
pub fn load_registry(dir: &Path) -> Result<Registry, DataLoadError> {
    let items_path = require_data_file(dir, "items")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;

    let mut builder = RegistryBuilder::new();
    let mut names: HashMap<String, ItemId> = HashMap::with_capacity(items.len());
    for item in &items {
        check_duplicate(&names, &item.name, &items_path)?;
        names.insert(item.name.clone(), builder.register_item(&item.name));
    }

    if let Some(recipes_path) = find_data_file(dir, "recipes")? {
        let recipes: Vec<RecipeData> = deserialize_list(&recipes_path, "recipes")?;
        for recipe in &recipes {
            let a = *resolve_name(&names, &recipe.a, &recipes_path, "item")?;
            let b = *resolve_name(&names, &recipe.b, &recipes_path, "item")?;
            let output = *resolve_name(&names, &recipe.output, &recipes_path, "item")?;
            builder.register_recipe(a, b, output);
        }
    }

    let registry = builder.build()?;
    log::debug!(
        "loaded {} items and {} recipes from {}",
        registry.item_count(),
        registry.recipe_count(),
        dir.display()
    );
    Ok(registry)
}

// ===========================================================================
// Configuration
// ===========================================================================

fn seconds(value: f64, field: &str, file: &Path) -> Result<Fixed64, DataLoadError> {
    Fixed64::checked_from_num(value)
        .filter(|_| value.is_finite())
        .ok_or_else(|| parse_error(file, format!("{field} = {value} is not a representable duration")))
}

/// Overlay a [`ConfigData`] on the default configuration and validate it.
pub fn resolve_config(data: &ConfigData, file: &Path) -> Result<WorldConfig, DataLoadError> {
    let mut config = WorldConfig::default();
    if let Some(width) = data.root_width {
        config.root_width = width;
    }
    if let Some(height) = data.root_height {
        config.root_height = height;
    }
    if let Some(size) = data.module_size {
        config.module_size = size;
    }
    if let Some(interval) = data.tick_interval {
        config.tick_interval = seconds(interval, "tick_interval", file)?;
    }
    if let Some(interval) = data.min_tick_interval {
        config.min_tick_interval = seconds(interval, "min_tick_interval", file)?;
    }
    if let Some(capacity) = data.event_capacity {
        config.event_capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

/// Read `config.*` from `dir`, or the default configuration if absent.
pub fn load_config(dir: &Path) -> Result<WorldConfig, DataLoadError> {
    match find_data_file(dir, "config")? {
        Some(path) => {
            let data: ConfigData = deserialize_file(&path)?;
            resolve_config(&data, &path)
        }
        None => Ok(WorldConfig::default()),
    }
}

// ===========================================================================
// Layouts
// ===========================================================================

fn resolve_kind(
    placement: &PlacementData,
    items: &HashMap<String, ItemId>,
    file: &Path,
) -> Result<ComponentKind, DataLoadError> {
    Ok(match placement.kind {
        KindData::Emitter => {
            let name = placement.item.as_deref().ok_or_else(|| {
                parse_error(
                    file,
                    format!("emitter at ({}, {}) has no item", placement.x, placement.y),
                )
            })?;
            ComponentKind::Emitter {
                item: *resolve_name(items, name, file, "item")?,
            }
        }
        KindData::Collector => ComponentKind::Collector,
        KindData::Mover => ComponentKind::Mover,
        KindData::Balancer => ComponentKind::Balancer,
        KindData::Distributor => ComponentKind::Distributor,
        KindData::Combiner => ComponentKind::Combiner,
        KindData::TunnelEntrance => ComponentKind::TunnelEntrance,
        KindData::TunnelExit => ComponentKind::TunnelExit,
        KindData::RecursiveModule => ComponentKind::RecursiveModule,
    })
}

/// Place every entry of `placements` into `grid`, recursing into module
/// contents. Returns the ids of everything placed, parents before children.
///
/// Stops at the first failure; components placed before it stay placed.
pub fn apply_layout(
    world: &mut World,
    grid: GridId,
    placements: &[PlacementData],
    file: &Path,
) -> Result<Vec<ComponentId>, DataLoadError> {
    let items = item_names(world.registry());
    let mut placed = Vec::new();
    place_all(world, grid, placements, &items, file, &mut placed)?;
    log::debug!("applied layout from {}: {} components", file.display(), placed.len());
    Ok(placed)
}

fn place_all(
    world: &mut World,
    grid: GridId,
    placements: &[PlacementData],
    items: &HashMap<String, ItemId>,
    file: &Path,
    placed: &mut Vec<ComponentId>,
) -> Result<(), DataLoadError> {
    for placement in placements {
        let (x, y) = (placement.x, placement.y);
        let kind = resolve_kind(placement, items, file)?;
        let orientation = Orientation::new(Orientation::facing(placement.facing).rotation, placement.flipped);
        let id = world
            .place(grid, kind, GridPosition::new(x, y), orientation)
            .map_err(|source| DataLoadError::Placement {
                file: file.to_path_buf(),
                x,
                y,
                source,
            })?;
        placed.push(id);
        if placement.protected {
            world.set_protected(id, true);
        }

        for source in &placement.sources {
            let item = *resolve_name(items, &source.item, file, "item")?;
            world
                .set_port_source(id, source.wall, Some(item))
                .map_err(|source| DataLoadError::PortSource {
                    file: file.to_path_buf(),
                    x,
                    y,
                    source,
                })?;
        }

        match world.child_grid(id) {
            Some(child) => place_all(world, child, &placement.contents, items, file, placed)?,
            None if !placement.contents.is_empty() => {
                return Err(parse_error(
                    file,
                    format!("component at ({x}, {y}) has contents but is not a recursive module"),
                ));
            }
            None => {}
        }
    }
    Ok(())
}

/// Read `layout.*` from `dir`, if present.
pub fn load_layout(dir: &Path) -> Result<Option<(LayoutData, PathBuf)>, DataLoadError> {
    match find_data_file(dir, "layout")? {
        Some(path) => {
            let layout: LayoutData = deserialize_file(&path)?;
            Ok(Some((layout, path)))
        }
        None => Ok(None),
    }
}

// ===========================================================================
// Whole directory
// ===========================================================================

/// Everything loaded from one data directory.
#[derive(Debug)]
pub struct GameData {
    pub registry: Registry,
    pub config: WorldConfig,
    pub layout: Option<(LayoutData, PathBuf)>,
}

impl GameData {
    /// Build a world and apply the layout, if any, to its root grid.
    pub fn into_world(self) -> Result<World, DataLoadError> {
        let mut world = World::new(self.config, self.registry)?;
        if let Some((layout, path)) = &self.layout {
            let root = world.root();
            apply_layout(&mut world, root, &layout.components, path)?;
        }
        Ok(world)
    }
}

/// Load items, recipes, configuration and layout from `dir`.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    Ok(GameData {
        registry: load_registry(dir)?,
        config: load_config(dir)?,
        layout: load_layout(dir)?,
    })
}

/// Load `dir` and build a ready-to-run world from it.
pub fn load_world(dir: &Path) -> Result<World, DataLoadError> {
    load_game_data(dir)?.into_world()
}

// ===========================================================================
// Tests
// ===========================================================================
