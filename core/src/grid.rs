use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};

pub const GRID_MIN_DIM: u32 = 1;
pub const GRID_MAX_DIM: u32 = 32;

pub const TARGET_PIECE_COUNTS: [u32; 7] = [9, 16, 36, 64, 100, 150, 300];
pub const GRID_REL_COUNT_TOL: f32 = 0.15;
pub const GRID_PIECE_RATIO_MAX: f32 = 1.42;
pub const GRID_ROW_MIN: u32 = 2;
pub const GRID_ROW_WIDEN: f32 = 1.5;
pub const GRID_NEIGHBOR_COLS: i32 = 3;
pub const GRID_SCORE_COUNT: f32 = 1.0;
pub const GRID_SCORE_GRID: f32 = 1.0;
pub const GRID_SCORE_PIECE: f32 = 0.5;

/// Grid dimensions of a puzzle. This is the whole of "difficulty".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct Difficulty {
    pub rows: u32,
    pub cols: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DifficultyError {
    #[error(
        "grid {rows}x{cols} is out of range ({min}..={max} per side)",
        min = GRID_MIN_DIM,
        max = GRID_MAX_DIM
    )]
    OutOfRange { rows: u32, cols: u32 },
    #[error("unrecognized difficulty '{0}' (expected easy, medium, hard, expert or RxC)")]
    Unrecognized(String),
    #[error("no grid near {target} pieces fits a {width}x{height} image")]
    NoFit { target: u32, width: u32, height: u32 },
}

impl Difficulty {
    pub const EASY: Difficulty = Difficulty { rows: 3, cols: 3 };
    pub const MEDIUM: Difficulty = Difficulty { rows: 4, cols: 4 };
    pub const HARD: Difficulty = Difficulty { rows: 6, cols: 6 };
    pub const EXPERT: Difficulty = Difficulty { rows: 8, cols: 8 };

    pub fn new(rows: u32, cols: u32) -> Result<Self, DifficultyError> {
        let range = GRID_MIN_DIM..=GRID_MAX_DIM;
        if !range.contains(&rows) || !range.contains(&cols) {
            return Err(DifficultyError::OutOfRange { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn validate(self) -> Result<Self, DifficultyError> {
        Self::new(self.rows, self.cols)
    }

    pub fn piece_count(self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Picks the grid closest to `target` pieces whose cells stay roughly
    /// square for a `width`x`height` image.
    pub fn for_image(width: u32, height: u32, target: u32) -> Result<Self, DifficultyError> {
        best_grid_for_count(width, height, target)
            .ok_or(DifficultyError::NoFit {
                target,
                width,
                height,
            })
            .and_then(Difficulty::validate)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::EASY
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for Difficulty {
    type Err = DifficultyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "easy" => return Ok(Self::EASY),
            "medium" => return Ok(Self::MEDIUM),
            "hard" => return Ok(Self::HARD),
            "expert" => return Ok(Self::EXPERT),
            _ => {}
        }
        let Some((rows, cols)) = trimmed.split_once(['x', 'X']) else {
            return Err(DifficultyError::Unrecognized(trimmed.to_string()));
        };
        let rows = rows
            .trim()
            .parse::<u32>()
            .map_err(|_| DifficultyError::Unrecognized(trimmed.to_string()))?;
        let cols = cols
            .trim()
            .parse::<u32>()
            .map_err(|_| DifficultyError::Unrecognized(trimmed.to_string()))?;
        Self::new(rows, cols)
    }
}

fn best_grid_for_count(width: u32, height: u32, target: u32) -> Option<Difficulty> {
    if target == 0 || width == 0 || height == 0 {
        return None;
    }
    if target > GRID_MAX_DIM.saturating_mul(GRID_MAX_DIM) {
        return None;
    }
    let aspect = width as f32 / height as f32;
    let piece_ratio_max = GRID_PIECE_RATIO_MAX.max(1.0);
    let piece_ratio_min = 1.0 / piece_ratio_max;
    let base = (target as f32).sqrt().ceil() as u32;
    let r_hi = (((base as f32) * GRID_ROW_WIDEN).ceil() as u32)
        .max(GRID_ROW_MIN)
        .min(GRID_MAX_DIM);
    let mut best: Option<(Difficulty, f32)> = None;
    for r in GRID_ROW_MIN..=r_hi {
        let c0 = (target as f32 / r as f32).round() as i32;
        for dc in -GRID_NEIGHBOR_COLS..=GRID_NEIGHBOR_COLS {
            let c = c0.saturating_add(dc);
            if c < 2 || c > GRID_MAX_DIM as i32 {
                continue;
            }
            let actual = r * c as u32;
            let rel_err = ((actual as f32) - (target as f32)).abs() / target as f32;
            if rel_err > GRID_REL_COUNT_TOL {
                continue;
            }
            let grid_ratio = c as f32 / r as f32;
            let piece_ratio = aspect / grid_ratio;
            if piece_ratio < piece_ratio_min || piece_ratio > piece_ratio_max {
                continue;
            }
            let eps = 1e-12;
            let score = GRID_SCORE_COUNT * rel_err.powi(2)
                + GRID_SCORE_GRID * ((grid_ratio + eps) / (aspect + eps)).ln().powi(2)
                + GRID_SCORE_PIECE * (piece_ratio + eps).ln().powi(2);
            let candidate = Difficulty {
                rows: r,
                cols: c as u32,
            };
            match &best {
                Some((_, best_score)) if score >= *best_score => {}
                _ => best = Some((candidate, score)),
            }
        }
    }
    best.map(|(choice, _)| choice)
}

/// Every preset piece count that has a reasonable grid for the image.
pub fn grid_choices(width: u32, height: u32) -> Vec<Difficulty> {
    let mut choices: Vec<Difficulty> = TARGET_PIECE_COUNTS
        .iter()
        .filter_map(|target| best_grid_for_count(width, height, *target))
        .collect();
    choices.dedup();
    choices
}
