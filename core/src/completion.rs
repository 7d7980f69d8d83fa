use rkyv::{Archive, Deserialize, Serialize};

use crate::piece::Piece;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Archive, Serialize, Deserialize)]
pub struct Progress {
    pub placed: u32,
    pub total: u32,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.placed == self.total
    }

    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.placed as f32 * 100.0 / self.total as f32
    }
}

pub fn progress(pieces: &[Piece]) -> Progress {
    Progress {
        placed: pieces.iter().filter(|piece| piece.placed).count() as u32,
        total: pieces.len() as u32,
    }
}

/// What gets persisted and announced when a puzzle instance is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Completion {
    pub generation: u32,
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
    pub elapsed_ms: i64,
}

/// One-shot latch per puzzle generation.
///
/// `observe` may be called after every mutation; it reports `true` only the
/// first time a complete board is seen for the armed generation. Losing a
/// piece afterwards and putting it back does not fire again, and observations
/// tagged with another generation are ignored until `reset` arms that one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionLatch {
    generation: u32,
    fired: bool,
}

impl CompletionLatch {
    pub fn new(generation: u32) -> Self {
        Self {
            generation,
            fired: false,
        }
    }

    /// A latch that has already fired, used when restoring a finished game.
    pub fn fired(generation: u32) -> Self {
        Self {
            generation,
            fired: true,
        }
    }

    pub fn reset(&mut self, generation: u32) {
        self.generation = generation;
        self.fired = false;
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn observe(&mut self, generation: u32, progress: Progress) -> bool {
        if generation != self.generation || self.fired || !progress.is_complete() {
            return false;
        }
        self.fired = true;
        true
    }
}
