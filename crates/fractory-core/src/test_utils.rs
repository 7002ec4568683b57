//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::component::{ComponentKind, Variant};
use crate::config::WorldConfig;
use crate::event::{Event, EventKind};
use crate::fixed::Fixed64;
use crate::geometry::{Direction, GridPosition, Orientation};
use crate::id::{ComponentId, GridId, ItemId};
use crate::registry::{Registry, RegistryBuilder};
use crate::sink::ItemSink;
use crate::world::World;
use std::cell::RefCell;
use std::rc::Rc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Registry
// ===========================================================================

/// Item ids registered by [`test_registry`].
#[derive(Debug, Clone, Copy)]
pub struct TestItems {
    pub fire: ItemId,
    pub water: ItemId,
    pub steam: ItemId,
    pub earth: ItemId,
    pub mud: ItemId,
    /// Takes part in no recipe.
    pub ore: ItemId,
}

/// Six items and two recipes: fire + water = steam, earth + water = mud.
pub fn test_registry() -> (Registry, TestItems) {
    let mut builder = RegistryBuilder::new();
    let items = TestItems {
        fire: builder.register_item("fire"),
        water: builder.register_item("water"),
        steam: builder.register_item("steam"),
        earth: builder.register_item("earth"),
        mud: builder.register_item("mud"),
        ore: builder.register_item("ore"),
    };
    builder.register_recipe(items.fire, items.water, items.steam);
    builder.register_recipe(items.earth, items.water, items.mud);
    let registry = builder.build().expect("test registry is valid");
    (registry, items)
}

/// A 16x16 root grid with 7x7 module grids.
pub fn test_world() -> (World, TestItems) {
    test_world_with(WorldConfig::default())
}

pub fn test_world_with(config: WorldConfig) -> (World, TestItems) {
    let (registry, items) = test_registry();
    let world = World::new(config, registry).expect("test config is valid");
    (world, items)
}

// ===========================================================================
// Placement
// ===========================================================================

/// Place in the root grid, facing `dir`. Panics on failure.
pub fn place(world: &mut World, kind: ComponentKind, x: i32, y: i32, dir: Direction) -> ComponentId {
    let root = world.root();
    place_in(world, root, kind, x, y, dir)
}

pub fn place_in(
    world: &mut World,
    grid: GridId,
    kind: ComponentKind,
    x: i32,
    y: i32,
    dir: Direction,
) -> ComponentId {
    world
        .place(grid, kind, GridPosition::new(x, y), Orientation::facing(dir))
        .unwrap_or_else(|e| panic!("placing {} at ({x}, {y}): {e}", kind.name()))
}

/// Place a flipped component in the root grid.
pub fn place_flipped(world: &mut World, kind: ComponentKind, x: i32, y: i32, dir: Direction) -> ComponentId {
    let root = world.root();
    let mut orientation = Orientation::facing(dir);
    orientation.flipped = true;
    world
        .place(root, kind, GridPosition::new(x, y), orientation)
        .unwrap_or_else(|e| panic!("placing flipped {} at ({x}, {y}): {e}", kind.name()))
}

// ===========================================================================
// Ticking & inspection
// ===========================================================================

pub fn run_ticks(world: &mut World, n: u64) {
    for _ in 0..n {
        world.step();
    }
}

pub fn held(world: &World, id: ComponentId) -> Option<ItemId> {
    world.held_item(id)
}

/// Combiner slots `(A, B)`.
pub fn combiner_slots(world: &World, id: ComponentId) -> (Option<ItemId>, Option<ItemId>) {
    match world.component(id).map(|c| &c.variant) {
        Some(Variant::Combiner { slot_a, slot_b }) => (*slot_a, *slot_b),
        _ => panic!("{id:?} is not a combiner"),
    }
}

/// Index into `collectors` of the collector named by the most recent
/// `ItemCollected` event.
pub fn last_collected_by(world: &World, collectors: &[ComponentId]) -> usize {
    let last = world
        .events()
        .events(EventKind::ItemCollected)
        .last()
        .and_then(|event| match event {
            Event::ItemCollected { collector, .. } => Some(*collector),
            _ => None,
        })
        .expect("no item collected yet");
    collectors
        .iter()
        .position(|&c| c == last)
        .expect("collected by an unexpected component")
}

// ===========================================================================
// Recording sink
// ===========================================================================

/// A sink that records every submission in order. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub items: Rc<RefCell<Vec<ItemId>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<ItemId> {
        self.items.borrow().clone()
    }
}

impl ItemSink for RecordingSink {
    fn submit(&mut self, item: ItemId) {
        self.items.borrow_mut().push(item);
    }
}
