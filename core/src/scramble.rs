use std::f32::consts::TAU;

use crate::game::{rand_index, rand_range, rand_unit, QUARTER_TURNS, ROTATION_STEP_DEG};
use crate::grid::Difficulty;
use crate::piece::{GridCoord, Transform};
use crate::placement::{is_placed, Tolerance};

pub const SCRAMBLE_RADIUS_RATIO_DEFAULT: f32 = 0.9;
pub const SCRAMBLE_RADIUS_RATIO_MIN: f32 = 0.25;
pub const SCRAMBLE_RADIUS_RATIO_MAX: f32 = 3.0;
pub const SCRAMBLE_MAX_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrambleConfig {
    /// Radius of the disk pieces are dropped into, in piece units.
    pub radius: f32,
    pub rotate: bool,
    pub max_attempts: u32,
}

impl ScrambleConfig {
    /// Disk radius scales with the longer side of the grid.
    pub fn for_grid(difficulty: Difficulty, radius_ratio: f32, rotate: bool) -> Self {
        let long_side = difficulty.rows.max(difficulty.cols).max(1) as f32;
        Self {
            radius: long_side * radius_ratio.max(SCRAMBLE_RADIUS_RATIO_MIN),
            rotate,
            max_attempts: SCRAMBLE_MAX_ATTEMPTS,
        }
    }
}

pub fn scramble_seed(base: u32, nonce: u32, difficulty: Difficulty) -> u32 {
    let grid = (difficulty.cols << 16) ^ difficulty.rows;
    base ^ nonce.wrapping_mul(0x9E37_79B9) ^ grid ^ 0x5CA7_7EED
}

pub fn board_center(difficulty: Difficulty) -> (f32, f32) {
    (
        (difficulty.cols.max(1) - 1) as f32 * 0.5,
        (difficulty.rows.max(1) - 1) as f32 * 0.5,
    )
}

/// Scrambled transform for every piece, indexed by piece id.
///
/// Each piece gets a uniform point inside a disk around the board center and,
/// when `rotate` is set, a quarter-turn rotation. A draw that would already
/// count as placed is redrawn with a fresh salt up to `max_attempts` times;
/// the last draw is kept regardless.
pub fn scramble(
    difficulty: Difficulty,
    seed: u32,
    config: &ScrambleConfig,
    tolerance: &Tolerance,
) -> Vec<Transform> {
    let total = difficulty.piece_count();
    let (center_x, center_y) = board_center(difficulty);
    let attempts = config.max_attempts.max(1);
    let mut transforms = Vec::with_capacity(total);
    for id in 0..total as u32 {
        let correct = GridCoord::from_id(id, difficulty.cols);
        let mut candidate = Transform::default();
        for attempt in 0..attempts {
            let salt = (attempt << 20) ^ (id << 2);
            let radius = config.radius * rand_unit(seed, salt).sqrt();
            let theta = rand_range(seed, salt + 1, 0.0, TAU);
            let rot_deg = if config.rotate {
                rand_index(seed, salt + 2, QUARTER_TURNS as usize) as f32 * ROTATION_STEP_DEG
            } else {
                0.0
            };
            candidate = Transform::new(
                center_x + radius * theta.cos(),
                center_y + radius * theta.sin(),
                rot_deg,
            );
            if !is_placed(&candidate, correct, tolerance) {
                break;
            }
        }
        transforms.push(candidate);
    }
    transforms
}

/// Fisher-Yates draw order, bottom of the stack first.
pub fn shuffle_order(seed: u32, total: usize) -> Vec<u32> {
    let mut order: Vec<u32> = (0..total as u32).collect();
    for i in (1..order.len()).rev() {
        let salt = 0xC0DE_u32.wrapping_add(i as u32);
        let j = rand_index(seed, salt, i + 1);
        order.swap(i, j);
    }
    order
}
