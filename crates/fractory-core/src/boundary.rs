//! Items crossing between a recursive module's child grid and its parent.
//!
//! A child grid is the module's local frame: module-local directions are
//! child-grid directions. Each wall has one port just outside the interior,
//! next to the wall's midpoint cell.
//!
//! - **Import.** An item pushed into the module from the parent is mapped
//!   to the wall it enters and lands in that port. The port pushes it into
//!   the interior on a later tick.
//! - **Export.** An interior component whose output points at a port cell
//!   pushes into that port like any other neighbour. The port then pushes
//!   the item to the module's outer neighbour in the parent grid.

use crate::component::{PortHeading, Variant};
use crate::event::Event;
use crate::fixed::Ticks;
use crate::geometry::Direction;
use crate::grid::Wall;
use crate::id::{ComponentId, GridId, ItemId};
use crate::world::World;

impl World {
    /// The port on `wall` of `grid`.
    ///
    /// # Panics
    ///
    /// Panics if the grid or port is missing. Every child grid gets four
    /// ports when its module is placed.
    pub(crate) fn port_of(&self, grid: GridId, wall: Wall) -> ComponentId {
        match self.grids.get(grid).and_then(|g| g.port(wall)) {
            Some(port) => port,
            None => panic!("invariant violation: grid {grid:?} has no {wall:?} port"),
        }
    }

    /// Accept an item arriving at `module` from its parent grid.
    pub(crate) fn import(&mut self, module: ComponentId, item: ItemId, travel: Direction, tick: Ticks) -> bool {
        let Some(component) = self.components.get(module) else {
            return false;
        };
        let Some(child) = component.variant.child_grid() else {
            return false;
        };
        let local = component.orientation.world_to_local_dir(travel);
        let wall = Wall::entered_by(local);
        let port = self.port_of(child, wall);

        let Some(port_component) = self.components.get_mut(port) else {
            return false;
        };
        if port_component.held.is_some() {
            return false;
        }
        port_component.receive(item, local, tick);
        if let Variant::Port(state) = &mut port_component.variant {
            state.heading = PortHeading::Inbound;
        }

        log::trace!("tick {tick}: {item:?} entered {module:?} through {wall:?}");
        self.events.emit(Event::BoundaryCrossed {
            module,
            wall,
            heading: PortHeading::Inbound,
            item,
            tick,
        });
        true
    }

    /// Accept an item pushed at a port from inside its grid.
    pub(crate) fn export(&mut self, port: ComponentId, item: ItemId, travel: Direction, tick: Ticks) -> bool {
        let Some(component) = self.components.get_mut(port) else {
            return false;
        };
        let Variant::Port(state) = &mut component.variant else {
            return false;
        };
        if component.held.is_some() || travel != state.wall.outward() {
            return false;
        }
        state.heading = PortHeading::Outbound;
        component.receive(item, travel, tick);
        true
    }

    /// Port behaviour: refill from the source if configured, then push the
    /// held item inward or out to the parent grid depending on its heading.
    pub(crate) fn tick_port(&mut self, id: ComponentId) {
        let Some(port) = self.components.get_mut(id) else {
            return;
        };
        let Variant::Port(state) = &mut port.variant else {
            return;
        };
        if port.held.is_none() {
            let Some(source) = state.source else {
                return;
            };
            state.heading = PortHeading::Inbound;
            port.held = Some(source);
        }
        let (wall, heading) = (state.wall, state.heading);
        let Some(item) = port.held else {
            return;
        };
        let (grid, cell) = (port.grid, port.anchor);

        let pushed = match heading {
            PortHeading::Inbound => self.push(id, grid, cell, wall.inward(), item),
            PortHeading::Outbound => self.push_outward(id, grid, wall, item),
        };
        if pushed {
            if let Some(port) = self.components.get_mut(id) {
                port.held = None;
            }
        }
    }

    /// Push an exported item from the owning module's cell in the parent
    /// grid, along the wall's outward direction in the parent's frame.
    fn push_outward(&mut self, port: ComponentId, grid: GridId, wall: Wall, item: ItemId) -> bool {
        let Some(parent) = self.grids.get(grid).and_then(|g| g.parent()) else {
            return false;
        };
        let Some(module) = self.components.get(parent.module) else {
            return false;
        };
        let travel = module.orientation.local_to_world_dir(wall.outward());
        let anchor = module.anchor;
        if !self.push(port, parent.grid, anchor, travel, item) {
            return false;
        }

        let tick = self.clock.current_tick();
        log::trace!("tick {tick}: {item:?} left {:?} through {wall:?}", parent.module);
        self.events.emit(Event::BoundaryCrossed {
            module: parent.module,
            wall,
            heading: PortHeading::Outbound,
            item,
            tick,
        });
        true
    }
}
