//! Fixed-size occupancy index for one grid in the world tree.
//!
//! A [`Grid`] maps cells to the component occupying them. It knows nothing
//! about component behaviour: callers hand it a component id plus the cells
//! of that component's current footprint.
//!
//! Child grids (owned by a recursive module) also record their parent link
//! and the four boundary [`Wall`] ports sitting just outside the interior.

use crate::geometry::{Direction, GridPosition};
use crate::id::{ComponentId, GridId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Walls
// ---------------------------------------------------------------------------

/// One of the four edges of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Wall {
    Top,
    Right,
    Bottom,
    Left,
}

impl Wall {
    pub fn all() -> [Wall; 4] {
        [Wall::Top, Wall::Right, Wall::Bottom, Wall::Left]
    }

    /// Direction pointing out of the grid through this wall.
    pub fn outward(self) -> Direction {
        match self {
            Wall::Top => Direction::Up,
            Wall::Right => Direction::Right,
            Wall::Bottom => Direction::Down,
            Wall::Left => Direction::Left,
        }
    }

    /// Direction pointing into the grid through this wall.
    pub fn inward(self) -> Direction {
        self.outward().opposite()
    }

    /// The wall an item crosses when travelling `travel` from outside.
    /// Travelling Up enters through the bottom wall.
    pub fn entered_by(travel: Direction) -> Wall {
        Wall::exited_by(travel.opposite())
    }

    /// The wall an item crosses when travelling `travel` from inside.
    pub fn exited_by(travel: Direction) -> Wall {
        match travel {
            Direction::Up => Wall::Top,
            Direction::Right => Wall::Right,
            Direction::Down => Wall::Bottom,
            Direction::Left => Wall::Left,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// The out-of-bounds cell where this wall's port sits.
    pub fn port_cell(self, width: u32, height: u32) -> GridPosition {
        self.edge_cell(width, height).step(self.outward())
    }

    /// The interior cell at this wall's midpoint, adjacent to the port.
    pub fn edge_cell(self, width: u32, height: u32) -> GridPosition {
        let (w, h) = (width as i32, height as i32);
        match self {
            Wall::Top => GridPosition::new(w / 2, h - 1),
            Wall::Right => GridPosition::new(w - 1, h / 2),
            Wall::Bottom => GridPosition::new(w / 2, 0),
            Wall::Left => GridPosition::new(0, h / 2),
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Back-reference from a child grid to where it lives in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridParent {
    /// The grid the owning module is placed in.
    pub grid: GridId,
    /// The recursive module that owns this grid.
    pub module: ComponentId,
}

/// A bounded 2D occupancy index.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    tiles: BTreeMap<GridPosition, ComponentId>,
    parent: Option<GridParent>,
    ports: [Option<ComponentId>; 4],
}

impl Grid {
    /// A root grid (no parent).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: BTreeMap::new(),
            parent: None,
            ports: [None; 4],
        }
    }

    /// A grid nested inside `parent.module`.
    pub fn nested(size: u32, parent: GridParent) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(size, size)
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn parent(&self) -> Option<GridParent> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    // -- Bounds & occupancy --

    pub fn in_bounds(&self, cell: GridPosition) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// The component occupying `cell`, if any.
    pub fn component_at(&self, cell: GridPosition) -> Option<ComponentId> {
        self.tiles.get(&cell).copied()
    }

    pub fn is_occupied(&self, cell: GridPosition) -> bool {
        self.tiles.contains_key(&cell)
    }

    /// True iff every cell is in bounds and unoccupied.
    pub fn area_clear(&self, cells: &[GridPosition]) -> bool {
        cells
            .iter()
            .all(|&cell| self.in_bounds(cell) && !self.is_occupied(cell))
    }

    /// Like [`area_clear`](Self::area_clear), but cells held by `ignore`
    /// count as free. Used when re-footprinting a component in place.
    pub fn area_clear_except(&self, cells: &[GridPosition], ignore: ComponentId) -> bool {
        cells.iter().all(|&cell| {
            self.in_bounds(cell) && self.component_at(cell).is_none_or(|id| id == ignore)
        })
    }

    // -- Registration --

    /// Write `component` into every cell. Re-registering the same cells is a
    /// no-op. Stale cells from a previous position are the caller's job
    /// (call [`unregister`](Self::unregister) first).
    ///
    /// # Panics
    ///
    /// Panics if a cell is out of bounds or held by a different component.
    /// Either means placement validation was bypassed.
    pub fn register(&mut self, component: ComponentId, cells: &[GridPosition]) {
        for &cell in cells {
            assert!(
                self.in_bounds(cell),
                "invariant violation: registering {component:?} at out-of-bounds cell {cell:?}"
            );
            if let Some(existing) = self.tiles.insert(cell, component) {
                assert!(
                    existing == component,
                    "invariant violation: footprint overlap at {cell:?} ({existing:?} vs {component:?})"
                );
            }
        }
    }

    /// Clear every cell currently held by `component`. Cells held by other
    /// components are left alone.
    pub fn unregister(&mut self, component: ComponentId, cells: &[GridPosition]) {
        for cell in cells {
            if self.tiles.get(cell) == Some(&component) {
                self.tiles.remove(cell);
            }
        }
    }

    // -- Ports --

    pub fn port(&self, wall: Wall) -> Option<ComponentId> {
        self.ports[wall.index()]
    }

    pub(crate) fn set_port(&mut self, wall: Wall, port: ComponentId) {
        self.ports[wall.index()] = Some(port);
    }

    /// All registered ports with their walls.
    pub fn ports(&self) -> impl Iterator<Item = (Wall, ComponentId)> + '_ {
        Wall::all()
            .into_iter()
            .filter_map(|wall| self.port(wall).map(|id| (wall, id)))
    }

    pub fn port_cell(&self, wall: Wall) -> GridPosition {
        wall.port_cell(self.width, self.height)
    }

    pub fn edge_cell(&self, wall: Wall) -> GridPosition {
        wall.edge_cell(self.width, self.height)
    }

    // -- Stats --

    /// Distinct components registered in the tile index, in cell order.
    pub fn occupants(&self) -> Vec<ComponentId> {
        let mut seen = Vec::new();
        for &id in self.tiles.values() {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }

    /// Total number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Read-only view of the tile index, in cell order.
    pub fn tiles(&self) -> impl Iterator<Item = (GridPosition, ComponentId)> + '_ {
        self.tiles.iter().map(|(&cell, &id)| (cell, id))
    }
}
