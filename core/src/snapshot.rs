use rkyv::{Archive, Deserialize, Serialize};

use crate::catalog::ImageRef;
use crate::completion::{progress, Completion, Progress};
use crate::grid::Difficulty;
use crate::lock::PieceLock;
use crate::piece::Piece;
use crate::protocol::RoomUpdate;
use crate::rules::GameRules;
use crate::session::Player;

pub const GAME_SNAPSHOT_VERSION: u32 = 1;

/// Full copy of a session, as sent to joining clients and kept by mirrors.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub version: u32,
    pub seq: u64,
    pub room_id: String,
    pub difficulty: Difficulty,
    pub image: ImageRef,
    pub rules: GameRules,
    pub seed: u32,
    pub generation: u32,
    pub pieces: Vec<Piece>,
    pub draw_order: Vec<u32>,
    pub players: Vec<Player>,
    pub locks: Vec<PieceLock>,
    pub started_at_ms: i64,
    pub stopped_at_ms: Option<i64>,
    pub completion: Option<Completion>,
}

impl GameSnapshot {
    pub fn progress(&self) -> Progress {
        progress(&self.pieces)
    }

    pub fn lock_owner(&self, piece: u32) -> Option<u64> {
        self.locks
            .iter()
            .find(|lock| lock.piece == piece)
            .map(|lock| lock.owner)
    }

    /// Folds one incremental update into a client-side copy. Returns `false`
    /// when the update does not fit this snapshot and was ignored.
    pub fn apply_update(&mut self, update: &RoomUpdate) -> bool {
        let total = self.pieces.len();
        match update {
            RoomUpdate::Piece {
                piece,
                transform,
                placed,
                ..
            } => match self.pieces.get_mut(*piece as usize) {
                Some(slot) => {
                    slot.current = *transform;
                    slot.placed = *placed;
                    true
                }
                None => false,
            },
            RoomUpdate::Lock {
                piece,
                owner,
                at_ms,
            } => {
                if *piece as usize >= total {
                    return false;
                }
                self.locks.retain(|lock| lock.piece != *piece);
                if let Some(owner) = owner {
                    self.locks.retain(|lock| lock.owner != *owner);
                    self.locks.push(PieceLock {
                        piece: *piece,
                        owner: *owner,
                        acquired_at_ms: *at_ms,
                    });
                }
                true
            }
            RoomUpdate::Order { order } => {
                self.draw_order = order
                    .iter()
                    .copied()
                    .filter(|id| (*id as usize) < total)
                    .collect();
                true
            }
            RoomUpdate::Roster { players } => {
                self.players = players.clone();
                true
            }
        }
    }
}
