//! Decides whether a piece counts as correctly placed.
//!
//! A piece is placed when its position is strictly within
//! `Tolerance::position` of its home cell and its rotation, taken modulo 360,
//! is within `Tolerance::rotation_deg` of zero. A piece turned a quarter, half
//! or three quarters is never placed, however close it sits.

use rkyv::{Archive, Deserialize, Serialize};

use crate::game::{angle_matches, distance_sq, normalize_angle, snap_quarter};
use crate::piece::{GridCoord, Transform};

pub const POSITION_TOLERANCE_DEFAULT: f32 = 0.2;
pub const POSITION_TOLERANCE_MIN: f32 = 0.05;
pub const POSITION_TOLERANCE_MAX: f32 = 0.45;

pub const ROTATION_TOLERANCE_DEFAULT_DEG: f32 = 1.5;
pub const ROTATION_TOLERANCE_MIN_DEG: f32 = 0.0;
pub const ROTATION_TOLERANCE_MAX_DEG: f32 = 12.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    serde::Serialize,
    serde::Deserialize,
    Archive,
    Serialize,
    Deserialize,
)]
#[serde(default)]
pub struct Tolerance {
    /// Maximum distance from home, in piece units (exclusive).
    pub position: f32,
    /// Maximum rotation error from 0 degrees (inclusive).
    pub rotation_deg: f32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            position: POSITION_TOLERANCE_DEFAULT,
            rotation_deg: ROTATION_TOLERANCE_DEFAULT_DEG,
        }
    }
}

impl Tolerance {
    pub fn sanitized(self) -> Self {
        let position = if self.position.is_finite() {
            self.position
                .clamp(POSITION_TOLERANCE_MIN, POSITION_TOLERANCE_MAX)
        } else {
            POSITION_TOLERANCE_DEFAULT
        };
        let rotation_deg = if self.rotation_deg.is_finite() {
            self.rotation_deg
                .clamp(ROTATION_TOLERANCE_MIN_DEG, ROTATION_TOLERANCE_MAX_DEG)
        } else {
            ROTATION_TOLERANCE_DEFAULT_DEG
        };
        Self {
            position,
            rotation_deg,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    Archive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Pieces only ever rest at 0, 90, 180 or 270 degrees.
    #[default]
    Quarter,
    Free,
}

impl RotationMode {
    /// Normalizes a requested rotation into the value that gets stored.
    pub fn apply(self, rot_deg: f32) -> f32 {
        match self {
            RotationMode::Quarter => snap_quarter(rot_deg),
            RotationMode::Free => normalize_angle(rot_deg),
        }
    }
}

pub fn is_placed(current: &Transform, correct: GridCoord, tolerance: &Tolerance) -> bool {
    if !current.is_finite() {
        return false;
    }
    let home = correct.home();
    let limit = tolerance.position * tolerance.position;
    distance_sq(current.position(), home.position()) < limit
        && angle_matches(current.rot_deg, 0.0, tolerance.rotation_deg)
}
