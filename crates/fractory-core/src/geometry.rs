//! Grid coordinates, directions, orientations and footprints.
//!
//! World axes: `x` grows to the right, `y` grows upward. A component's local
//! frame is the world frame after undoing its orientation, so local Up is
//! always the direction the component emits toward.
//!
//! Every frame change goes through [`Orientation::local_to_world`] and
//! [`Orientation::world_to_local`]: flip negates local `x`, then `r`
//! clockwise quarter turns map `(x, y) -> (y, -x)`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GridPosition
// ---------------------------------------------------------------------------

/// A cell (or cell offset) on a 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const ORIGIN: GridPosition = GridPosition { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent cell in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        self.offset(dir.offset())
    }

    pub fn offset(self, delta: GridPosition) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }

    /// Component-wise difference `self - origin`.
    pub fn relative_to(self, origin: GridPosition) -> Self {
        Self::new(self.x - origin.x, self.y - origin.y)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Cardinal directions, in clockwise order starting from Up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [Direction::Up, Direction::Right, Direction::Down, Direction::Left]
    }

    /// Unit offset for this direction.
    pub fn offset(self) -> GridPosition {
        match self {
            Direction::Up => GridPosition::new(0, 1),
            Direction::Right => GridPosition::new(1, 0),
            Direction::Down => GridPosition::new(0, -1),
            Direction::Left => GridPosition::new(-1, 0),
        }
    }

    /// Inverse of [`Direction::offset`]. Returns `None` for non-unit offsets.
    pub fn from_offset(offset: GridPosition) -> Option<Direction> {
        match (offset.x, offset.y) {
            (0, 1) => Some(Direction::Up),
            (1, 0) => Some(Direction::Right),
            (0, -1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            _ => None,
        }
    }

    pub fn opposite(self) -> Direction {
        self.rotated(Rotation::Cw180)
    }

    /// Rotate this direction clockwise by `rotation`.
    pub fn rotated(self, rotation: Rotation) -> Direction {
        Direction::all()[(self.index() + rotation.quarter_turns() as usize) % 4]
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Clockwise rotation applied to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// Facing Up.
    #[default]
    None,
    /// 90 degrees clockwise (facing Right).
    Cw90,
    /// 180 degrees (facing Down).
    Cw180,
    /// 270 degrees clockwise (facing Left).
    Cw270,
}

impl Rotation {
    /// All four rotation values.
    pub fn all() -> [Rotation; 4] {
        [Rotation::None, Rotation::Cw90, Rotation::Cw180, Rotation::Cw270]
    }

    pub fn from_quarter_turns(turns: u8) -> Self {
        Rotation::all()[(turns % 4) as usize]
    }

    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }

    /// The rotation whose local Up points at `dir`.
    pub fn facing(dir: Direction) -> Self {
        Rotation::from_quarter_turns(dir as u8)
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        Rotation::from_quarter_turns(self.quarter_turns() + 1)
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn rotate_ccw(self) -> Self {
        Rotation::from_quarter_turns(self.quarter_turns() + 3)
    }
}

// ---------------------------------------------------------------------------
// Orientation
// ---------------------------------------------------------------------------

/// Rotation plus horizontal flip. The flip is only meaningful for width-2
/// flippable components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub rotation: Rotation,
    pub flipped: bool,
}

impl Orientation {
    pub fn new(rotation: Rotation, flipped: bool) -> Self {
        Self { rotation, flipped }
    }

    /// Unflipped orientation whose output points at `dir`.
    pub fn facing(dir: Direction) -> Self {
        Self::new(Rotation::facing(dir), false)
    }

    /// Map a local offset into world space.
    pub fn local_to_world(self, local: GridPosition) -> GridPosition {
        let (mut x, mut y) = (local.x, local.y);
        if self.flipped {
            x = -x;
        }
        for _ in 0..self.rotation.quarter_turns() {
            (x, y) = (y, -x);
        }
        GridPosition::new(x, y)
    }

    /// Map a world offset into local space. Inverse of [`local_to_world`](Self::local_to_world).
    pub fn world_to_local(self, world: GridPosition) -> GridPosition {
        let (mut x, mut y) = (world.x, world.y);
        for _ in 0..self.rotation.quarter_turns() {
            (x, y) = (-y, x);
        }
        if self.flipped {
            x = -x;
        }
        GridPosition::new(x, y)
    }

    pub fn local_to_world_dir(self, local: Direction) -> Direction {
        self.map_dir(local, Self::local_to_world)
    }

    pub fn world_to_local_dir(self, world: Direction) -> Direction {
        self.map_dir(world, Self::world_to_local)
    }

    fn map_dir(self, dir: Direction, f: fn(Self, GridPosition) -> GridPosition) -> Direction {
        match Direction::from_offset(f(self, dir.offset())) {
            Some(mapped) => mapped,
            None => unreachable!("orientation transforms preserve unit offsets"),
        }
    }

    /// World direction this orientation emits toward (local Up).
    pub fn output(self) -> Direction {
        self.local_to_world_dir(Direction::Up)
    }
}

// ---------------------------------------------------------------------------
// Footprint
// ---------------------------------------------------------------------------

/// Unrotated size of a component, measured in its local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    /// A 1x1 footprint.
    pub const fn single() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }

    /// A 2x1 footprint (two cells side by side, local `x = 0` and `x = 1`).
    pub const fn double() -> Self {
        Self {
            width: 2,
            height: 1,
        }
    }

    /// Local cell offsets, row-major from the anchor.
    pub fn local_cells(&self) -> impl Iterator<Item = GridPosition> {
        let w = self.width as i32;
        let h = self.height as i32;
        (0..h).flat_map(move |y| (0..w).map(move |x| GridPosition::new(x, y)))
    }

    /// World cells occupied when anchored at `anchor` with `orientation`.
    pub fn cells(&self, anchor: GridPosition, orientation: Orientation) -> Vec<GridPosition> {
        self.local_cells()
            .map(|local| anchor.offset(orientation.local_to_world(local)))
            .collect()
    }
}
