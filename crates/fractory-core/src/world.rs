//! The simulation context: grid and component arenas, the tick clock, the
//! registry, the sink and the event bus.
//!
//! There is no global state. Everything a tick touches hangs off [`World`],
//! and mutation goes through `&mut self`, so placement, removal and rotation
//! can only happen strictly between ticks.
//!
//! # World tree
//!
//! The root grid is created with the world. Placing a
//! [`ComponentKind::RecursiveModule`] creates a child grid plus four boundary
//! ports sitting just outside the child's interior. Removing the module
//! destroys the child grid and everything in it, recursively.

use crate::component::{Component, ComponentKind, PortHeading, PortState, Variant};
use crate::config::{ConfigError, WorldConfig};
use crate::event::{Event, EventBus};
use crate::fixed::{Fixed64, Ticks};
use crate::geometry::{GridPosition, Orientation};
use crate::grid::{Grid, GridParent, Wall};
use crate::id::{ComponentId, GridId, ItemId, ObserverId};
use crate::registry::Registry;
use crate::sim::{TickClock, TickObserver};
use crate::sink::{DeliveryTally, ItemSink};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a placement request was refused. The world is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("cell {0:?} is outside the grid")]
    OutOfBounds(GridPosition),
    #[error("cell {cell:?} is occupied by {occupant:?}")]
    Occupied {
        cell: GridPosition,
        occupant: ComponentId,
    },
    #[error("grid {0:?} does not exist")]
    UnknownGrid(GridId),
    #[error("item {0:?} is not in the catalog")]
    UnknownItem(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemovalError {
    #[error("component {0:?} does not exist")]
    NotFound(ComponentId),
    #[error("component {0:?} is protected")]
    Protected(ComponentId),
    /// Ports belong to their module and go away with it.
    #[error("component {0:?} cannot be removed on its own")]
    NotRemovable(ComponentId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RotateError {
    #[error("component {0:?} does not exist")]
    NotFound(ComponentId),
    #[error("component {0:?} cannot be rotated")]
    NotRotatable(ComponentId),
    #[error("component {0:?} cannot be flipped")]
    NotFlippable(ComponentId),
    #[error("new footprint of {0:?} is out of bounds or overlaps another component")]
    Blocked(ComponentId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortConfigError {
    #[error("component {0:?} does not exist")]
    NotFound(ComponentId),
    #[error("component {0:?} is not a recursive module")]
    NotAModule(ComponentId),
    /// Port sources feed the world from outside; only root-level modules
    /// have an outside.
    #[error("module {0:?} is not placed in the root grid")]
    NotRootLevel(ComponentId),
    #[error("item {0:?} is not in the catalog")]
    UnknownItem(ItemId),
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) registry: Registry,
    pub(crate) grids: SlotMap<GridId, Grid>,
    pub(crate) components: SlotMap<ComponentId, Component>,
    pub(crate) root: GridId,
    /// Every live component, ports included, in the order `on_tick` runs.
    /// Placement appends; removal preserves the relative order of survivors.
    pub(crate) tick_order: Vec<ComponentId>,
    pub(crate) clock: TickClock,
    pub(crate) events: EventBus,
    pub(crate) deliveries: DeliveryTally,
    pub(crate) sink: Option<Box<dyn ItemSink>>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("grids", &self.grids.len())
            .field("components", &self.components.len())
            .field("root", &self.root)
            .field("clock", &self.clock)
            .field("deliveries", &self.deliveries)
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl World {
    /// Create an empty world with an idle clock at tick 0.
    pub fn new(config: WorldConfig, registry: Registry) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut grids = SlotMap::with_key();
        let root = grids.insert(Grid::new(config.root_width, config.root_height));
        log::debug!(
            "created root grid {root:?} ({}x{})",
            config.root_width,
            config.root_height
        );
        Ok(Self {
            clock: TickClock::new(config.tick_interval, config.min_tick_interval),
            events: EventBus::new(config.event_capacity),
            config,
            registry,
            grids,
            components: SlotMap::with_key(),
            root,
            tick_order: Vec::new(),
            deliveries: DeliveryTally::new(),
            sink: None,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn root(&self) -> GridId {
        self.root
    }

    pub fn grid(&self, id: GridId) -> Option<&Grid> {
        self.grids.get(id)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    /// Component ids in tick order.
    pub fn tick_order(&self) -> &[ComponentId] {
        &self.tick_order
    }

    /// The child grid owned by a recursive module.
    pub fn child_grid(&self, module: ComponentId) -> Option<GridId> {
        self.components.get(module)?.variant.child_grid()
    }

    /// The port on `wall` of a recursive module's child grid.
    pub fn module_port(&self, module: ComponentId, wall: Wall) -> Option<ComponentId> {
        self.grids.get(self.child_grid(module)?)?.port(wall)
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    pub fn current_tick(&self) -> Ticks {
        self.clock.current_tick()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Per-item counts of everything collectors have accepted.
    pub fn deliveries(&self) -> &DeliveryTally {
        &self.deliveries
    }

    /// Install an external sink. Collectors forward to it in addition to the
    /// built-in tally.
    pub fn set_sink(&mut self, sink: Box<dyn ItemSink>) {
        self.sink = Some(sink);
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn ItemSink>> {
        self.sink.take()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a component with its anchor at `anchor` in `grid`.
    ///
    /// The flip bit is ignored for kinds that cannot flip. Placing a
    /// recursive module also creates its child grid and the four ports.
    pub fn place(
        &mut self,
        grid: GridId,
        kind: ComponentKind,
        anchor: GridPosition,
        orientation: Orientation,
    ) -> Result<ComponentId, PlacementError> {
        let target = self
            .grids
            .get(grid)
            .ok_or(PlacementError::UnknownGrid(grid))?;
        if let ComponentKind::Emitter { item } = kind {
            if !self.registry.items().contains(item) {
                return Err(PlacementError::UnknownItem(item));
            }
        }

        let orientation = Orientation {
            flipped: orientation.flipped && kind.is_flippable(),
            ..orientation
        };
        let cells = kind.footprint().cells(anchor, orientation);
        for &cell in &cells {
            if !target.in_bounds(cell) {
                return Err(PlacementError::OutOfBounds(cell));
            }
            if let Some(occupant) = target.component_at(cell) {
                return Err(PlacementError::Occupied { cell, occupant });
            }
        }

        let id = if kind == ComponentKind::RecursiveModule {
            self.insert_module(grid, anchor, orientation)
        } else {
            self.components.insert(Component::new(
                grid,
                anchor,
                orientation,
                Variant::initial(kind, None),
            ))
        };
        if let Some(target) = self.grids.get_mut(grid) {
            target.register(id, &cells);
        }
        self.tick_order.push(id);
        if let Some(child) = self.child_grid(id) {
            self.create_ports(child);
        }

        log::debug!(
            "placed {} {id:?} at {anchor:?} in {grid:?} facing {:?}",
            kind.name(),
            orientation.output()
        );
        self.events.emit(Event::ComponentPlaced {
            component: id,
            grid,
            kind,
            tick: self.clock.current_tick(),
        });
        Ok(id)
    }

    fn insert_module(&mut self, grid: GridId, anchor: GridPosition, orientation: Orientation) -> ComponentId {
        let grids = &mut self.grids;
        let size = self.config.module_size;
        self.components.insert_with_key(|module| {
            let child = grids.insert(Grid::nested(size, GridParent { grid, module }));
            log::debug!("created child grid {child:?} ({size}x{size}) for module {module:?}");
            Component::new(grid, anchor, orientation, Variant::RecursiveModule { child })
        })
    }

    fn create_ports(&mut self, child: GridId) {
        for wall in Wall::all() {
            let Some(cell) = self.grids.get(child).map(|g| g.port_cell(wall)) else {
                return;
            };
            let port = self.components.insert(Component::new(
                child,
                cell,
                Orientation::facing(wall.inward()),
                Variant::Port(PortState {
                    wall,
                    heading: PortHeading::Inbound,
                    source: None,
                }),
            ));
            if let Some(grid) = self.grids.get_mut(child) {
                grid.set_port(wall, port);
            }
            self.tick_order.push(port);
        }
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Remove a component. Removing a recursive module destroys its child
    /// grid and everything inside it.
    pub fn remove(&mut self, id: ComponentId) -> Result<(), RemovalError> {
        let component = self.components.get(id).ok_or(RemovalError::NotFound(id))?;
        if matches!(component.variant, Variant::Port(_)) {
            return Err(RemovalError::NotRemovable(id));
        }
        if component.protected {
            return Err(RemovalError::Protected(id));
        }
        self.destroy(id);
        let components = &self.components;
        self.tick_order.retain(|c| components.contains_key(*c));
        Ok(())
    }

    fn destroy(&mut self, id: ComponentId) {
        let Some(component) = self.components.remove(id) else {
            return;
        };
        if let Some(grid) = self.grids.get_mut(component.grid) {
            grid.unregister(id, &component.cells());
        }
        if let Some(child) = component.variant.child_grid() {
            self.destroy_grid(child);
        }
        if matches!(component.variant, Variant::Port(_)) {
            return;
        }
        log::debug!(
            "removed {} {id:?} from {:?}",
            component.variant.name(),
            component.grid
        );
        self.events.emit(Event::ComponentRemoved {
            component: id,
            grid: component.grid,
            tick: self.clock.current_tick(),
        });
    }

    fn destroy_grid(&mut self, grid: GridId) {
        let doomed: Vec<ComponentId> = self
            .components
            .iter()
            .filter(|(_, c)| c.grid == grid)
            .map(|(id, _)| id)
            .collect();
        for id in doomed {
            self.destroy(id);
        }
        self.grids.remove(grid);
        log::debug!("destroyed grid {grid:?}");
    }

    /// Mark a component as protected from removal. Returns false if it does
    /// not exist.
    pub fn set_protected(&mut self, id: ComponentId, protected: bool) -> bool {
        match self.components.get_mut(id) {
            Some(component) => {
                component.protected = protected;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Rotation
    // -----------------------------------------------------------------------

    /// Re-orient a component in place. The new footprint must fit, ignoring
    /// the component's own cells.
    pub fn set_orientation(&mut self, id: ComponentId, orientation: Orientation) -> Result<(), RotateError> {
        let component = self.components.get(id).ok_or(RotateError::NotFound(id))?;
        let kind = component
            .variant
            .kind()
            .filter(|k| k.is_rotatable())
            .ok_or(RotateError::NotRotatable(id))?;
        if orientation.flipped && !kind.is_flippable() {
            return Err(RotateError::NotFlippable(id));
        }

        let old_cells = component.cells();
        let new_cells = kind.footprint().cells(component.anchor, orientation);
        let grid_id = component.grid;
        let grid = self.grids.get_mut(grid_id).ok_or(RotateError::NotFound(id))?;
        if !grid.area_clear_except(&new_cells, id) {
            return Err(RotateError::Blocked(id));
        }

        grid.unregister(id, &old_cells);
        if let Some(component) = self.components.get_mut(id) {
            component.orientation = orientation;
        }
        grid.register(id, &new_cells);
        log::debug!("re-oriented {id:?}: now facing {:?}", orientation.output());
        Ok(())
    }

    /// Turn a component one quarter clockwise.
    pub fn rotate_cw(&mut self, id: ComponentId) -> Result<(), RotateError> {
        let current = self
            .components
            .get(id)
            .ok_or(RotateError::NotFound(id))?
            .orientation;
        self.set_orientation(
            id,
            Orientation::new(current.rotation.rotate_cw(), current.flipped),
        )
    }

    /// Toggle the horizontal flip of a flippable component.
    pub fn flip(&mut self, id: ComponentId) -> Result<(), RotateError> {
        let component = self.components.get(id).ok_or(RotateError::NotFound(id))?;
        if !component.variant.kind().is_some_and(ComponentKind::is_flippable) {
            return Err(RotateError::NotFlippable(id));
        }
        let current = component.orientation;
        self.set_orientation(id, Orientation::new(current.rotation, !current.flipped))
    }

    // -----------------------------------------------------------------------
    // Ports
    // -----------------------------------------------------------------------

    /// Configure (or clear) the infinite inbound source on one port of a
    /// root-level module.
    pub fn set_port_source(
        &mut self,
        module: ComponentId,
        wall: Wall,
        source: Option<ItemId>,
    ) -> Result<(), PortConfigError> {
        let component = self
            .components
            .get(module)
            .ok_or(PortConfigError::NotFound(module))?;
        let child = component
            .variant
            .child_grid()
            .ok_or(PortConfigError::NotAModule(module))?;
        if component.grid != self.root {
            return Err(PortConfigError::NotRootLevel(module));
        }
        if let Some(item) = source {
            if !self.registry.items().contains(item) {
                return Err(PortConfigError::UnknownItem(item));
            }
        }
        let port = self.port_of(child, wall);
        if let Some(Component {
            variant: Variant::Port(state),
            ..
        }) = self.components.get_mut(port)
        {
            state.source = source;
        }
        Ok(())
    }

    /// Drop an item straight into a component's slot, outside the transfer
    /// protocol. Refused for collectors, modules and occupied slots. The
    /// tick guard is left alone, so the item can move on the next tick.
    pub fn insert_item(&mut self, id: ComponentId, item: ItemId) -> bool {
        let Some(component) = self.components.get_mut(id) else {
            return false;
        };
        if component.held.is_some()
            || matches!(
                component.variant,
                Variant::Collector | Variant::RecursiveModule { .. }
            )
        {
            return false;
        }
        component.held = Some(item);
        true
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    pub fn start(&mut self) {
        self.clock.start();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Returns the interval actually applied after the floor.
    pub fn set_tick_interval(&mut self, interval: Fixed64) -> Fixed64 {
        self.clock.set_interval(interval)
    }

    pub fn subscribe(&mut self, observer: TickObserver) -> ObserverId {
        self.clock.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, observer: ObserverId) -> bool {
        self.clock.unsubscribe(observer)
    }

    /// Run exactly one tick, starting the clock if it is idle. Returns the
    /// tick number, or `None` while paused.
    pub fn step(&mut self) -> Option<Ticks> {
        if self.clock.is_paused() {
            return None;
        }
        self.clock.start();
        Some(self.run_tick())
    }

    /// Feed `dt` seconds of real time and run every tick that became due.
    /// Returns the number of ticks run; 0 unless the clock is running.
    pub fn advance(&mut self, dt: Fixed64) -> u64 {
        let due = self.clock.accumulate(dt);
        for _ in 0..due {
            self.run_tick();
        }
        due
    }

    fn run_tick(&mut self) -> Ticks {
        let tick = self.clock.next_tick();
        for index in 0..self.tick_order.len() {
            let id = self.tick_order[index];
            self.on_tick(id, tick);
        }
        self.clock.notify(tick);
        self.events.deliver();
        log::trace!("tick {tick} complete ({} components)", self.tick_order.len());
        tick
    }
}
