//! Component data: the shared per-component state and the closed set of
//! variants.
//!
//! Behaviour (accept/emit) lives on [`World`](crate::world::World) in
//! [`transfer`](crate::transfer) and [`boundary`](crate::boundary), which
//! match on [`Variant`].

use crate::fixed::Ticks;
use crate::geometry::{Direction, Footprint, GridPosition, Orientation};
use crate::grid::Wall;
use crate::id::{GridId, ItemId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Placeable kinds
// ---------------------------------------------------------------------------

/// What an external placement request asks for. Ports are not placeable;
/// they are created together with their recursive module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Infinite source of one item.
    Emitter { item: ItemId },
    /// Sink that forwards everything to the world's [`ItemSink`](crate::sink::ItemSink).
    Collector,
    /// One-cell conveyor.
    Mover,
    /// 2x1 splitter alternating between its two front cells.
    Balancer,
    /// 2x1 splitter alternating between forward and sideways.
    Distributor,
    /// 2x1 two-input recipe machine.
    Combiner,
    TunnelEntrance,
    TunnelExit,
    /// 1x1 component owning a nested grid.
    RecursiveModule,
}

impl ComponentKind {
    /// Unrotated footprint.
    pub fn footprint(self) -> Footprint {
        match self {
            ComponentKind::Balancer | ComponentKind::Distributor | ComponentKind::Combiner => {
                Footprint::double()
            }
            _ => Footprint::single(),
        }
    }

    /// Whether the horizontal flip bit applies.
    pub fn is_flippable(self) -> bool {
        matches!(self, ComponentKind::Distributor | ComponentKind::Combiner)
    }

    /// Whether the orientation may change after placement.
    pub fn is_rotatable(self) -> bool {
        !matches!(self, ComponentKind::RecursiveModule)
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Emitter { .. } => "emitter",
            ComponentKind::Collector => "collector",
            ComponentKind::Mover => "mover",
            ComponentKind::Balancer => "balancer",
            ComponentKind::Distributor => "distributor",
            ComponentKind::Combiner => "combiner",
            ComponentKind::TunnelEntrance => "tunnel_entrance",
            ComponentKind::TunnelExit => "tunnel_exit",
            ComponentKind::RecursiveModule => "recursive_module",
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime variants
// ---------------------------------------------------------------------------

/// Which way an item held by a port is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortHeading {
    /// Entering the child grid; pushed into the interior.
    Inbound,
    /// Leaving the child grid; pushed to the module's outer neighbour.
    Outbound,
}

/// Runtime state of a boundary port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    pub wall: Wall,
    /// Direction of the item in the held slot. Meaningless when empty.
    pub heading: PortHeading,
    /// Infinite inbound source, if configured.
    pub source: Option<ItemId>,
}

/// The closed set of component behaviours plus their variant-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    Emitter { item: ItemId },
    Collector,
    Mover,
    Balancer {
        /// Next push prefers the right-hand port.
        prefer_right: bool,
    },
    Distributor {
        /// Next push prefers the sideways (local Right) output.
        prefer_right: bool,
    },
    Combiner {
        slot_a: Option<ItemId>,
        slot_b: Option<ItemId>,
    },
    TunnelEntrance,
    TunnelExit,
    Port(PortState),
    RecursiveModule { child: GridId },
}

impl Variant {
    /// Fresh state for a placeable kind. Recursive modules need their child
    /// grid id, so they are constructed by the world instead.
    pub(crate) fn initial(kind: ComponentKind, child: Option<GridId>) -> Self {
        match kind {
            ComponentKind::Emitter { item } => Variant::Emitter { item },
            ComponentKind::Collector => Variant::Collector,
            ComponentKind::Mover => Variant::Mover,
            ComponentKind::Balancer => Variant::Balancer {
                prefer_right: false,
            },
            ComponentKind::Distributor => Variant::Distributor {
                prefer_right: false,
            },
            ComponentKind::Combiner => Variant::Combiner {
                slot_a: None,
                slot_b: None,
            },
            ComponentKind::TunnelEntrance => Variant::TunnelEntrance,
            ComponentKind::TunnelExit => Variant::TunnelExit,
            ComponentKind::RecursiveModule => match child {
                Some(child) => Variant::RecursiveModule { child },
                None => unreachable!("recursive modules are created with a child grid"),
            },
        }
    }

    /// The placeable kind, or `None` for ports.
    pub fn kind(&self) -> Option<ComponentKind> {
        Some(match self {
            Variant::Emitter { item } => ComponentKind::Emitter { item: *item },
            Variant::Collector => ComponentKind::Collector,
            Variant::Mover => ComponentKind::Mover,
            Variant::Balancer { .. } => ComponentKind::Balancer,
            Variant::Distributor { .. } => ComponentKind::Distributor,
            Variant::Combiner { .. } => ComponentKind::Combiner,
            Variant::TunnelEntrance => ComponentKind::TunnelEntrance,
            Variant::TunnelExit => ComponentKind::TunnelExit,
            Variant::RecursiveModule { .. } => ComponentKind::RecursiveModule,
            Variant::Port(_) => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.name(),
            None => "port",
        }
    }

    pub fn footprint(&self) -> Footprint {
        self.kind()
            .map(ComponentKind::footprint)
            .unwrap_or(Footprint::single())
    }

    /// Child grid owned by a recursive module.
    pub fn child_grid(&self) -> Option<GridId> {
        match self {
            Variant::RecursiveModule { child } => Some(*child),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A placed component. Shared fields are hoisted here; behaviour-specific
/// state lives in [`Variant`].
#[derive(Debug, Clone)]
pub struct Component {
    /// Grid this component is placed in.
    pub grid: GridId,
    /// Origin of the footprint.
    pub anchor: GridPosition,
    pub orientation: Orientation,
    /// Single-item slot. Always `None` for collectors and modules.
    pub held: Option<ItemId>,
    /// Tick on which this component last received an item. A component never
    /// emits on the tick it received.
    pub last_serviced: Option<Ticks>,
    /// World direction the last accepted item was travelling. Presentation only.
    pub last_input: Option<Direction>,
    /// Removal is refused while set.
    pub protected: bool,
    pub variant: Variant,
}

impl Component {
    pub(crate) fn new(grid: GridId, anchor: GridPosition, orientation: Orientation, variant: Variant) -> Self {
        Self {
            grid,
            anchor,
            orientation,
            held: None,
            last_serviced: None,
            last_input: None,
            protected: false,
            variant,
        }
    }

    /// World cells currently occupied.
    pub fn cells(&self) -> Vec<GridPosition> {
        self.variant.footprint().cells(self.anchor, self.orientation)
    }

    /// World cell for a local footprint offset.
    pub fn world_cell(&self, local: GridPosition) -> GridPosition {
        self.anchor.offset(self.orientation.local_to_world(local))
    }

    /// Local footprint offset for a world cell.
    pub fn local_cell(&self, world: GridPosition) -> GridPosition {
        self.orientation.world_to_local(world.relative_to(self.anchor))
    }

    /// World direction of local Up.
    pub fn output(&self) -> Direction {
        self.orientation.output()
    }

    /// Output points as `(cell the item leaves from, world travel direction)`,
    /// in preference-independent order. Empty for components that never
    /// push to a neighbour (collectors, tunnel entrances, ports, modules).
    pub fn outputs(&self) -> Vec<(GridPosition, Direction)> {
        let forward = self.output();
        match self.variant {
            Variant::Emitter { .. } | Variant::Mover | Variant::TunnelExit | Variant::Combiner { .. } => {
                vec![(self.anchor, forward)]
            }
            Variant::Balancer { .. } => vec![
                (self.world_cell(GridPosition::new(0, 0)), forward),
                (self.world_cell(GridPosition::new(1, 0)), forward),
            ],
            Variant::Distributor { .. } => vec![
                (self.world_cell(GridPosition::new(0, 0)), forward),
                (
                    self.world_cell(GridPosition::new(1, 0)),
                    self.orientation.local_to_world_dir(Direction::Right),
                ),
            ],
            Variant::Collector
            | Variant::TunnelEntrance
            | Variant::Port(_)
            | Variant::RecursiveModule { .. } => Vec::new(),
        }
    }

    /// Cells this component would push into.
    pub fn emit_targets(&self) -> Vec<GridPosition> {
        self.outputs()
            .into_iter()
            .map(|(cell, dir)| cell.step(dir))
            .collect()
    }

    /// True if this component received an item on `tick`.
    pub fn serviced_on(&self, tick: Ticks) -> bool {
        self.last_serviced == Some(tick)
    }

    /// Fill the slot as the result of a successful accept.
    pub(crate) fn receive(&mut self, item: ItemId, travel: Direction, tick: Ticks) {
        assert!(
            self.held.is_none(),
            "invariant violation: {} already holds {:?}",
            self.variant.name(),
            self.held
        );
        self.held = Some(item);
        self.last_input = Some(travel);
        self.last_serviced = Some(tick);
    }
}
