use rkyv::{Archive, Deserialize, Serialize};

use crate::grid::Difficulty;
use crate::placement::{is_placed, Tolerance};

/// A cell of the sliced image. Doubles as piece identity and target slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct GridCoord {
    pub row: u32,
    pub col: u32,
}

impl GridCoord {
    pub fn from_id(id: u32, cols: u32) -> Self {
        let cols = cols.max(1);
        Self {
            row: id / cols,
            col: id % cols,
        }
    }

    pub fn id(self, cols: u32) -> u32 {
        self.row * cols + self.col
    }

    /// Where a piece for this cell sits on a solved board. Positions are in
    /// piece units, so cell `(r, c)` lives at `x = c, y = r`.
    pub fn home(self) -> Transform {
        Transform::new(self.col as f32, self.row as f32, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub rot_deg: f32,
}

impl Transform {
    pub const fn new(x: f32, y: f32, rot_deg: f32) -> Self {
        Self { x, y, rot_deg }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn with_position(self, x: f32, y: f32) -> Self {
        Self { x, y, ..self }
    }

    pub fn with_rotation(self, rot_deg: f32) -> Self {
        Self { rot_deg, ..self }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rot_deg.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Piece {
    pub id: u32,
    pub correct: GridCoord,
    pub current: Transform,
    pub placed: bool,
}

impl Piece {
    pub fn correct_transform(&self) -> Transform {
        self.correct.home()
    }

    /// Stores `current` and recomputes the placed flag. Returns the flag as it
    /// was before the update.
    pub fn set_transform(&mut self, current: Transform, tolerance: &Tolerance) -> bool {
        let was_placed = self.placed;
        self.current = current;
        self.placed = is_placed(&self.current, self.correct, tolerance);
        was_placed
    }
}

/// One record per grid cell in row-major order, every piece at home.
pub fn build_pieces(difficulty: Difficulty) -> Vec<Piece> {
    let total = difficulty.piece_count();
    let mut pieces = Vec::with_capacity(total);
    for row in 0..difficulty.rows {
        for col in 0..difficulty.cols {
            let correct = GridCoord { row, col };
            pieces.push(Piece {
                id: correct.id(difficulty.cols),
                correct,
                current: correct.home(),
                placed: true,
            });
        }
    }
    pieces
}
