//! Versioned binary snapshots of a whole world tree via `bitcode`.
//!
//! A snapshot records every grid and component by position, never by arena
//! key. Restoring re-places each component through the normal placement
//! path (so footprints are re-validated and child grids and ports are
//! recreated), then overwrites slot and variant state. Every item id is
//! checked against the catalog of the registry the world is restored into.
//!
//! Snapshotting a freshly restored world yields the same bytes.

use crate::component::{Component, ComponentKind, PortHeading, Variant};
use crate::config::{ConfigError, WorldConfig};
use crate::fixed::{Fixed64, Ticks};
use crate::geometry::{Direction, GridPosition, Orientation};
use crate::grid::Wall;
use crate::id::{ComponentId, GridId, ItemId};
use crate::registry::Registry;
use crate::sim::ClockState;
use crate::sink::DeliveryTally;
use crate::world::{PlacementError, World};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a world snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xF4AC_7001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("snapshot config is invalid: {0}")]
    Config(#[from] ConfigError),
    #[error("component could not be re-placed: {0}")]
    Placement(#[from] PlacementError),
    #[error("item {0:?} is not in the catalog")]
    UnknownItem(ItemId),
    #[error("grid is {found:?} but the snapshot expects {expected:?}")]
    GridSizeMismatch { expected: (u32, u32), found: (u32, u32) },
    #[error("recursive module at {0:?} has no child grid in the snapshot")]
    MissingChildGrid(GridPosition),
    /// A port record for a grid that has no port on that wall (the root).
    #[error("grid has no {0:?} port to restore")]
    UnexpectedPort(Wall),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the snapshot was taken.
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Decode a snapshot and return only its header.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: WorldSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct WorldSnapshot {
    header: SnapshotHeader,
    config: WorldConfig,
    clock: ClockRecord,
    deliveries: Vec<(ItemId, u64)>,
    root: GridSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClockRecord {
    state: ClockState,
    accumulator: Fixed64,
    interval: Fixed64,
}

#[derive(Debug, Serialize, Deserialize)]
struct GridSnapshot {
    width: u32,
    height: u32,
    /// Placed components in tick order.
    components: Vec<ComponentRecord>,
    /// Empty for the root grid.
    ports: Vec<PortRecord>,
}

/// Slot state shared by components and ports.
#[derive(Debug, Serialize, Deserialize)]
struct SlotRecord {
    /// Position in the world's tick order.
    order: u32,
    held: Option<ItemId>,
    last_serviced: Option<Ticks>,
    last_input: Option<Direction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComponentRecord {
    kind: ComponentKind,
    anchor: GridPosition,
    orientation: Orientation,
    protected: bool,
    slot: SlotRecord,
    state: VariantState,
    child: Option<GridSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
enum VariantState {
    Stateless,
    Toggle { prefer_right: bool },
    Combiner {
        slot_a: Option<ItemId>,
        slot_b: Option<ItemId>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct PortRecord {
    wall: Wall,
    heading: PortHeading,
    source: Option<ItemId>,
    slot: SlotRecord,
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

impl World {
    /// Serialize the whole world tree. Observers, listeners, buffered events
    /// and the external sink are not part of a snapshot.
    pub fn save(&self) -> Result<Vec<u8>, SerializeError> {
        let order: HashMap<ComponentId, u32> = self
            .tick_order
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index as u32))
            .collect();
        let snapshot = WorldSnapshot {
            header: SnapshotHeader::new(self.clock.current_tick()),
            config: self.config.clone(),
            clock: ClockRecord {
                state: self.clock.state(),
                accumulator: self.clock.accumulator(),
                interval: self.clock.interval(),
            },
            deliveries: self.deliveries.iter().collect(),
            root: self.grid_snapshot(self.root, &order),
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    fn grid_snapshot(&self, grid: GridId, order: &HashMap<ComponentId, u32>) -> GridSnapshot {
        let (width, height) = self
            .grids
            .get(grid)
            .map(|g| (g.width(), g.height()))
            .unwrap_or_default();
        let mut snapshot = GridSnapshot {
            width,
            height,
            components: Vec::new(),
            ports: Vec::new(),
        };
        for id in self.components_in(grid) {
            let Some(component) = self.components.get(id) else {
                continue;
            };
            let slot = slot_record(order.get(&id).copied().unwrap_or(u32::MAX), component);
            let (state, child) = match component.variant {
                Variant::Port(port) => {
                    snapshot.ports.push(PortRecord {
                        wall: port.wall,
                        heading: port.heading,
                        source: port.source,
                        slot,
                    });
                    continue;
                }
                Variant::Balancer { prefer_right } | Variant::Distributor { prefer_right } => {
                    (VariantState::Toggle { prefer_right }, None)
                }
                Variant::Combiner { slot_a, slot_b } => (VariantState::Combiner { slot_a, slot_b }, None),
                Variant::RecursiveModule { child } => {
                    (VariantState::Stateless, Some(self.grid_snapshot(child, order)))
                }
                _ => (VariantState::Stateless, None),
            };
            let Some(kind) = component.variant.kind() else {
                continue;
            };
            snapshot.components.push(ComponentRecord {
                kind,
                anchor: component.anchor,
                orientation: component.orientation,
                protected: component.protected,
                slot,
                state,
                child,
            });
        }
        snapshot
    }
}

fn slot_record(order: u32, component: &Component) -> SlotRecord {
    SlotRecord {
        order,
        held: component.held,
        last_serviced: component.last_serviced,
        last_input: component.last_input,
    }
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

impl World {
    /// Rebuild a world from [`save`](Self::save) output, resolving every
    /// item against `registry`.
    pub fn restore(data: &[u8], registry: Registry) -> Result<World, DeserializeError> {
        Self::restore_inner(data, registry).inspect_err(|e| log::warn!("rejected snapshot: {e}"))
    }

    fn restore_inner(data: &[u8], registry: Registry) -> Result<World, DeserializeError> {
        let snapshot: WorldSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        let mut world = World::new(snapshot.config, registry)?;
        let mut order = Vec::new();
        world.restore_grid(world.root, &snapshot.root, &mut order)?;
        order.sort_by_key(|&(index, _)| index);
        world.tick_order = order.into_iter().map(|(_, id)| id).collect();

        match snapshot.clock.state {
            ClockState::Idle => {}
            ClockState::Running => world.clock.start(),
            ClockState::Paused => {
                world.clock.start();
                world.clock.pause();
            }
        }
        world.clock.set_interval(snapshot.clock.interval);
        world.clock.restore(snapshot.header.tick, snapshot.clock.accumulator);
        for &(item, _) in &snapshot.deliveries {
            world.check_item(Some(item))?;
        }
        world.deliveries = DeliveryTally::from_counts(snapshot.deliveries);
        world.events.clear_all();

        log::debug!(
            "restored snapshot at tick {} ({} components)",
            snapshot.header.tick,
            world.components.len()
        );
        Ok(world)
    }

    fn check_item(&self, item: Option<ItemId>) -> Result<(), DeserializeError> {
        match item {
            Some(item) if self.registry.items().resolve(item).is_none() => {
                Err(DeserializeError::UnknownItem(item))
            }
            _ => Ok(()),
        }
    }

    fn restore_grid(
        &mut self,
        grid: GridId,
        snapshot: &GridSnapshot,
        order: &mut Vec<(u32, ComponentId)>,
    ) -> Result<(), DeserializeError> {
        let found = self
            .grids
            .get(grid)
            .map(|g| (g.width(), g.height()))
            .unwrap_or_default();
        let expected = (snapshot.width, snapshot.height);
        if found != expected {
            return Err(DeserializeError::GridSizeMismatch { expected, found });
        }

        for record in &snapshot.components {
            self.check_item(record.slot.held)?;
            let variant_items = match record.state {
                VariantState::Combiner { slot_a, slot_b } => [slot_a, slot_b],
                _ => [None, None],
            };
            for item in variant_items {
                self.check_item(item)?;
            }

            let id = self.place(grid, record.kind, record.anchor, record.orientation)?;
            if let Some(component) = self.components.get_mut(id) {
                restore_slot(component, &record.slot);
                component.protected = record.protected;
                match (&mut component.variant, &record.state) {
                    (
                        Variant::Balancer { prefer_right } | Variant::Distributor { prefer_right },
                        VariantState::Toggle { prefer_right: saved },
                    ) => *prefer_right = *saved,
                    (Variant::Combiner { slot_a, slot_b }, VariantState::Combiner { slot_a: a, slot_b: b }) => {
                        *slot_a = *a;
                        *slot_b = *b;
                    }
                    _ => {}
                }
            }
            order.push((record.slot.order, id));

            if let Some(child) = self.child_grid(id) {
                let child_snapshot = record
                    .child
                    .as_ref()
                    .ok_or(DeserializeError::MissingChildGrid(record.anchor))?;
                self.restore_grid(child, child_snapshot, order)?;
            }
        }

        for record in &snapshot.ports {
            self.check_item(record.slot.held)?;
            self.check_item(record.source)?;
            let port = self
                .grids
                .get(grid)
                .and_then(|g| g.port(record.wall))
                .ok_or(DeserializeError::UnexpectedPort(record.wall))?;
            if let Some(component) = self.components.get_mut(port) {
                restore_slot(component, &record.slot);
                if let Variant::Port(state) = &mut component.variant {
                    state.heading = record.heading;
                    state.source = record.source;
                }
            }
            order.push((record.slot.order, port));
        }
        Ok(())
    }
}

fn restore_slot(component: &mut Component, slot: &SlotRecord) {
    component.held = slot.held;
    component.last_serviced = slot.last_serviced;
    component.last_input = slot.last_input;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    /// Emitter feeding a module that passes items through to a collector,
    /// plus a combiner with one input loaded.
    fn busy_world() -> (World, TestItems) {
        let (mut world, items) = test_world();
        place(&mut world, ComponentKind::Emitter { item: items.fire }, 3, 1, Direction::Up);
        let module = place(&mut world, ComponentKind::RecursiveModule, 3, 2, Direction::Up);
        let child = world.child_grid(module).unwrap();
        for y in 0..7 {
            place_in(&mut world, child, ComponentKind::Mover, 3, y, Direction::Up);
        }
        place(&mut world, ComponentKind::Collector, 3, 3, Direction::Up);
        let combiner = place_flipped(&mut world, ComponentKind::Combiner, 10, 10, Direction::Left);
        world.try_accept(combiner, items.water, Direction::Left, GridPosition::new(11, 10));
        let balancer = place(&mut world, ComponentKind::Balancer, 0, 10, Direction::Up);
        world.set_protected(balancer, true);
        world.set_port_source(module, Wall::Left, Some(items.earth)).unwrap();
        run_ticks(&mut world, 6);
        (world, items)
    }

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::new(3).validate().is_ok());
        let mut header = SnapshotHeader::new(3);
        header.magic = 0xDEAD_BEEF;
        assert!(matches!(header.validate(), Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))));
        let mut header = SnapshotHeader::new(3);
        header.version = FORMAT_VERSION + 1;
        assert!(matches!(header.validate(), Err(DeserializeError::FutureVersion(_))));
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let (world, _) = busy_world();
        let bytes = world.save().unwrap();
        let (registry, _) = test_registry();
        let restored = World::restore(&bytes, registry).unwrap();
        assert_eq!(restored.save().unwrap(), bytes);
        assert_eq!(restored.state_hash(), world.state_hash());
        assert_eq!(read_snapshot_header(&bytes).unwrap().tick, 6);
    }

    #[test]
    fn restored_world_continues_identically() {
        let (mut world, _) = busy_world();
        let bytes = world.save().unwrap();
        let (registry, _) = test_registry();
        let mut restored = World::restore(&bytes, registry).unwrap();
        run_ticks(&mut world, 10);
        run_ticks(&mut restored, 10);
        assert_eq!(restored.state_hash(), world.state_hash());
        assert_eq!(restored.deliveries(), world.deliveries());
    }

    #[test]
    fn unknown_item_rejected() {
        let (world, _) = busy_world();
        let bytes = world.save().unwrap();
        let mut builder = crate::registry::RegistryBuilder::new();
        builder.register_item("fire");
        let registry = builder.build().unwrap();
        assert!(matches!(
            World::restore(&bytes, registry),
            Err(DeserializeError::UnknownItem(_))
        ));
    }

    #[test]
    fn port_record_on_root_rejected() {
        let (world, _) = test_world();
        let mut snapshot: WorldSnapshot = bitcode::deserialize(&world.save().unwrap()).unwrap();
        snapshot.root.ports.push(PortRecord {
            wall: Wall::Top,
            heading: PortHeading::Inbound,
            source: None,
            slot: SlotRecord {
                order: 0,
                held: None,
                last_serviced: None,
                last_input: None,
            },
        });
        let bytes = bitcode::serialize(&snapshot).unwrap();
        let (registry, _) = test_registry();
        assert!(matches!(
            World::restore(&bytes, registry),
            Err(DeserializeError::UnexpectedPort(Wall::Top))
        ));
    }

    #[test]
    fn garbage_rejected() {
        let (registry, _) = test_registry();
        assert!(matches!(
            World::restore(&[1, 2, 3], registry),
            Err(DeserializeError::Decode(_))
        ));
    }
}
