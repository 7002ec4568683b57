//! Fractory Core -- a tick-driven, grid-based item-routing simulation with
//! recursively nested grids.
//!
//! Components occupy cells on a bounded 2D grid and pass single items to
//! their neighbours once per tick. A recursive module is a 1x1 component
//! that owns a whole child grid, connected to its parent through four
//! boundary ports, and modules nest without limit.
//!
//! # Tick
//!
//! Each call to [`world::World::step`] (or each interval crossed by
//! [`world::World::advance`]) runs one tick:
//!
//! 1. The clock increments the tick counter.
//! 2. Every live component runs `on_tick` exactly once, in placement order.
//!    A component that received an item during this tick skips its turn,
//!    so an item moves at most one hop per tick.
//! 3. Tick observers are notified.
//! 4. Buffered events are delivered to listeners.
//!
//! # Transfer
//!
//! A holding component pushes at the cell in its output direction. The grid
//! resolves the occupant, whose accept rule either takes the item (and
//! stamps its tick guard) or refuses with no side effects.
//!
//! ```rust,ignore
//! let (registry, _) = test_registry();
//! let mut world = World::new(WorldConfig::default(), registry)?;
//! let root = world.root();
//! let mover = world.place(root, ComponentKind::Mover, GridPosition::new(2, 2), Orientation::facing(Direction::Right))?;
//! world.step();
//! ```
//!
//! # Key Types
//!
//! - [`world::World`] -- arenas, clock, registry, sink and event bus.
//! - [`grid::Grid`] -- per-grid occupancy index with bounds checks.
//! - [`component::Component`] / [`component::Variant`] -- shared component
//!   state plus the closed set of behaviours.
//! - [`geometry::Orientation`] -- rotation and flip transforms.
//! - [`registry::Registry`] -- frozen item catalog and recipe table.
//! - [`sim::TickClock`] -- tick counter, accumulator and observers.
//! - [`event::EventBus`] -- typed events with ring-buffered delivery.
//! - [`serialize`] -- versioned snapshots via bitcode.

pub mod boundary;
pub mod component;
pub mod config;
pub mod event;
pub mod fixed;
pub mod geometry;
pub mod grid;
pub mod id;
pub mod item;
pub mod query;
pub mod recipe;
pub mod registry;
pub mod serialize;
pub mod sim;
pub mod sink;
pub mod transfer;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
