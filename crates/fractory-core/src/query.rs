//! Read-only query API for presentation and inspection.
//!
//! Snapshot types are owned copies, no references into world storage.

use crate::component::{Component, PortHeading, Variant};
use crate::fixed::Ticks;
use crate::geometry::{Direction, GridPosition, Orientation};
use crate::grid::{GridParent, Wall};
use crate::id::{ComponentId, GridId, ItemId};
use crate::sim::StateHash;
use crate::world::World;

// ---------------------------------------------------------------------------
// Component snapshot
// ---------------------------------------------------------------------------

/// A read-only view of one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSnapshot {
    pub id: ComponentId,
    pub grid: GridId,
    /// Variant name, e.g. `"mover"` or `"port"`.
    pub kind: &'static str,
    pub anchor: GridPosition,
    /// World cells covered, anchor first.
    pub cells: Vec<GridPosition>,
    pub orientation: Orientation,
    pub held: Option<ItemId>,
    pub last_input: Option<Direction>,
    /// Combiner inputs A and B. `(None, None)` for every other kind.
    pub inputs: (Option<ItemId>, Option<ItemId>),
    /// Wall and heading for ports.
    pub port: Option<(Wall, PortHeading)>,
    pub child: Option<GridId>,
    pub protected: bool,
}

impl ComponentSnapshot {
    fn of(id: ComponentId, component: &Component) -> Self {
        let inputs = match component.variant {
            Variant::Combiner { slot_a, slot_b } => (slot_a, slot_b),
            _ => (None, None),
        };
        let port = match component.variant {
            Variant::Port(state) => Some((state.wall, state.heading)),
            _ => None,
        };
        Self {
            id,
            grid: component.grid,
            kind: component.variant.name(),
            anchor: component.anchor,
            cells: component.cells(),
            orientation: component.orientation,
            held: component.held,
            last_input: component.last_input,
            inputs,
            port,
            child: component.variant.child_grid(),
            protected: component.protected,
        }
    }
}

// ---------------------------------------------------------------------------
// Grid view
// ---------------------------------------------------------------------------

/// A read-only view of one grid and everything placed in it.
#[derive(Debug, Clone)]
pub struct GridView {
    pub id: GridId,
    pub width: u32,
    pub height: u32,
    pub parent: Option<GridParent>,
    /// Placed components in tick order. Ports are listed separately.
    pub components: Vec<ComponentSnapshot>,
    pub ports: Vec<ComponentSnapshot>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl World {
    pub fn snapshot_component(&self, id: ComponentId) -> Option<ComponentSnapshot> {
        self.components
            .get(id)
            .map(|component| ComponentSnapshot::of(id, component))
    }

    pub fn view_grid(&self, grid: GridId) -> Option<GridView> {
        let g = self.grids.get(grid)?;
        let (ports, components): (Vec<_>, Vec<_>) = self
            .components_in(grid)
            .into_iter()
            .filter_map(|id| self.snapshot_component(id))
            .partition(|snapshot| snapshot.port.is_some());
        Some(GridView {
            id: grid,
            width: g.width(),
            height: g.height(),
            parent: g.parent(),
            components,
            ports,
        })
    }

    /// Ids of every component (ports included) in `grid`, in tick order.
    pub fn components_in(&self, grid: GridId) -> Vec<ComponentId> {
        self.tick_order
            .iter()
            .copied()
            .filter(|&id| self.components.get(id).is_some_and(|c| c.grid == grid))
            .collect()
    }

    /// The item a component is holding. Collectors and modules never hold.
    pub fn held_item(&self, id: ComponentId) -> Option<ItemId> {
        self.components.get(id)?.held
    }

    /// Direction the most recently accepted item was travelling.
    pub fn last_input(&self, id: ComponentId) -> Option<Direction> {
        self.components.get(id)?.last_input
    }

    /// The occupant of `cell` in `grid`.
    pub fn component_at(&self, grid: GridId, cell: GridPosition) -> Option<ComponentId> {
        self.grids.get(grid)?.component_at(cell)
    }

    /// Deterministic hash of the simulation state. Independent of arena
    /// keys, so two worlds built and ticked the same way hash the same.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.clock.current_tick());
        for &id in &self.tick_order {
            let Some(component) = self.components.get(id) else {
                continue;
            };
            hash_component(&mut hasher, component);
        }
        hasher.finish()
    }
}

fn hash_item(hasher: &mut StateHash, item: Option<ItemId>) {
    match item {
        Some(item) => {
            hasher.write_u8(1);
            hasher.write_u32(item.0);
        }
        None => hasher.write_u8(0),
    }
}

fn hash_component(hasher: &mut StateHash, component: &Component) {
    hasher.write(component.variant.name().as_bytes());
    hasher.write_i32(component.anchor.x);
    hasher.write_i32(component.anchor.y);
    hasher.write_u8(component.orientation.rotation.quarter_turns());
    hasher.write_u8(component.orientation.flipped as u8);
    hash_item(hasher, component.held);
    hasher.write_u64(component.last_serviced.unwrap_or(Ticks::MAX));

    match component.variant {
        Variant::Emitter { item } => hasher.write_u32(item.0),
        Variant::Balancer { prefer_right } | Variant::Distributor { prefer_right } => {
            hasher.write_u8(prefer_right as u8)
        }
        Variant::Combiner { slot_a, slot_b } => {
            hash_item(hasher, slot_a);
            hash_item(hasher, slot_b);
        }
        Variant::Port(state) => {
            hasher.write_u8(state.wall as u8);
            hasher.write_u8(state.heading as u8);
            hash_item(hasher, state.source);
        }
        Variant::Collector
        | Variant::Mover
        | Variant::TunnelEntrance
        | Variant::TunnelExit
        | Variant::RecursiveModule { .. } => {}
    }
}
