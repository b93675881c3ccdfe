use crate::disc::boundary::BoundaryPosition;

pub mod structured;

/// Compass face of a structured cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    East,
    West,
    North,
    South,
}

impl Face {
    pub const ALL: [Face; 4] = [Face::East, Face::West, Face::North, Face::South];

    pub fn index(self) -> usize {
        match self {
            Face::East => 0,
            Face::West => 1,
            Face::North => 2,
            Face::South => 3,
        }
    }
    /// +1 where the outward normal points along +x or +y.
    pub fn sign(self) -> f64 {
        match self {
            Face::East | Face::North => 1.0,
            Face::West | Face::South => -1.0,
        }
    }
    pub fn offset(self) -> (isize, isize) {
        match self {
            Face::East => (1, 0),
            Face::West => (-1, 0),
            Face::North => (0, 1),
            Face::South => (0, -1),
        }
    }
    pub fn is_x_face(self) -> bool {
        matches!(self, Face::East | Face::West)
    }
    pub fn opposite(self) -> Face {
        match self {
            Face::East => Face::West,
            Face::West => Face::East,
            Face::North => Face::South,
            Face::South => Face::North,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Neighbor {
    /// Index of an active cell.
    Cell(usize),
    Boundary(BoundaryPosition),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellStatus {
    Active(usize),
    Blanked,
}

#[derive(Clone, Debug)]
pub struct ActiveCell {
    pub i: usize,
    pub j: usize,
    /// Indexed by [`Face::index`].
    pub neighbors: [Neighbor; 4],
}

impl ActiveCell {
    pub fn neighbor(&self, face: Face) -> Neighbor {
        self.neighbors[face.index()]
    }
}
