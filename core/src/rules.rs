use std::path::Path;

use rkyv::{Archive, Deserialize, Serialize};

use crate::placement::{RotationMode, Tolerance};
use crate::scramble::{
    SCRAMBLE_RADIUS_RATIO_DEFAULT, SCRAMBLE_RADIUS_RATIO_MAX, SCRAMBLE_RADIUS_RATIO_MIN,
};

pub const LOCK_TIMEOUT_MS_DEFAULT: u32 = 5_000;
pub const LOCK_TIMEOUT_MS_MIN: u32 = 500;
pub const LOCK_TIMEOUT_MS_MAX: u32 = 60_000;

pub const POINTS_PER_PIECE_DEFAULT: u32 = 10;
pub const COMPLETION_BONUS_DEFAULT: u32 = 50;
pub const SCORE_AWARD_MAX: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rules json: {0}")]
    Json(#[from] serde_json::Error),
}

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
pub struct GameRules {
    pub tolerance: Tolerance,
    pub rotation_mode: RotationMode,
    /// Whether scrambling turns pieces at all.
    pub rotation_enabled: bool,
    pub scramble_radius_ratio: f32,
    pub lock_timeout_ms: u32,
    pub points_per_piece: u32,
    pub completion_bonus: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            rotation_mode: RotationMode::default(),
            rotation_enabled: true,
            scramble_radius_ratio: SCRAMBLE_RADIUS_RATIO_DEFAULT,
            lock_timeout_ms: LOCK_TIMEOUT_MS_DEFAULT,
            points_per_piece: POINTS_PER_PIECE_DEFAULT,
            completion_bonus: COMPLETION_BONUS_DEFAULT,
        }
    }
}

impl GameRules {
    pub fn sanitized(self) -> Self {
        let scramble_radius_ratio = if self.scramble_radius_ratio.is_finite() {
            self.scramble_radius_ratio
                .clamp(SCRAMBLE_RADIUS_RATIO_MIN, SCRAMBLE_RADIUS_RATIO_MAX)
        } else {
            SCRAMBLE_RADIUS_RATIO_DEFAULT
        };
        Self {
            tolerance: self.tolerance.sanitized(),
            rotation_mode: self.rotation_mode,
            rotation_enabled: self.rotation_enabled,
            scramble_radius_ratio,
            lock_timeout_ms: self
                .lock_timeout_ms
                .clamp(LOCK_TIMEOUT_MS_MIN, LOCK_TIMEOUT_MS_MAX),
            points_per_piece: self.points_per_piece.min(SCORE_AWARD_MAX),
            completion_bonus: self.completion_bonus.min(SCORE_AWARD_MAX),
        }
    }

    /// Parses rules from JSON; missing fields fall back to defaults and every
    /// value is clamped into range.
    pub fn from_json(raw: &str) -> Result<Self, RulesError> {
        let rules: GameRules = serde_json::from_str(raw)?;
        Ok(rules.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self, RulesError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
