//! Exclusive drag locks and last-writer-wins stamps.
//!
//! A player holds at most one piece. Grabbing a second piece drops the first.
//! Locks expire `timeout_ms` after they were last refreshed so a vanished
//! client cannot pin a piece forever. Independently of locking, every accepted
//! write carries a [`Stamp`]; a write stamped earlier than the last one applied
//! to the same piece is stale and rejected.

use std::collections::HashMap;

use rkyv::{Archive, Deserialize, Serialize};

pub type PlayerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct Stamp {
    pub at_ms: i64,
    pub player: PlayerId,
}

impl Stamp {
    pub fn new(at_ms: i64, player: PlayerId) -> Self {
        Self { at_ms, player }
    }

    /// Equal times resolve to the newer arrival.
    pub fn supersedes(&self, previous: &Stamp) -> bool {
        self.at_ms >= previous.at_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct PieceLock {
    pub piece: u32,
    pub owner: PlayerId,
    pub acquired_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("piece {piece} is held by player {owner}")]
    Held { piece: u32, owner: PlayerId },
    #[error("piece {piece} is not held by player {player}")]
    NotOwner { piece: u32, player: PlayerId },
    #[error("write for piece {piece} at {at_ms} is older than the last applied write")]
    Stale { piece: u32, at_ms: i64 },
}

#[derive(Debug, Clone, Default)]
pub struct LockTable {
    by_piece: HashMap<u32, PieceLock>,
    by_player: HashMap<PlayerId, u32>,
    timeout_ms: i64,
}

impl LockTable {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            by_piece: HashMap::new(),
            by_player: HashMap::new(),
            timeout_ms: i64::from(timeout_ms),
        }
    }

    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = i64::from(timeout_ms);
    }

    fn is_expired(&self, lock: &PieceLock, now_ms: i64) -> bool {
        now_ms.saturating_sub(lock.acquired_at_ms) >= self.timeout_ms
    }

    pub fn owner(&self, piece: u32) -> Option<PlayerId> {
        self.by_piece.get(&piece).map(|lock| lock.owner)
    }

    pub fn held_by(&self, player: PlayerId) -> Option<u32> {
        self.by_player.get(&player).copied()
    }

    /// Takes or refreshes `piece` for `player`. On success returns the piece
    /// the player held before, if grabbing this one released it.
    pub fn try_acquire(
        &mut self,
        piece: u32,
        player: PlayerId,
        now_ms: i64,
    ) -> Result<Option<u32>, LockError> {
        if let Some(existing) = self.by_piece.get(&piece).copied() {
            if existing.owner != player {
                if !self.is_expired(&existing, now_ms) {
                    return Err(LockError::Held {
                        piece,
                        owner: existing.owner,
                    });
                }
                self.by_player.remove(&existing.owner);
            }
        }

        let previous = self
            .by_player
            .get(&player)
            .copied()
            .filter(|held| *held != piece);
        if let Some(previous) = previous {
            self.by_piece.remove(&previous);
        }

        self.by_piece.insert(
            piece,
            PieceLock {
                piece,
                owner: player,
                acquired_at_ms: now_ms,
            },
        );
        self.by_player.insert(player, piece);
        Ok(previous)
    }

    pub fn release(&mut self, piece: u32, player: PlayerId) -> Result<(), LockError> {
        match self.by_piece.get(&piece) {
            Some(lock) if lock.owner == player => {
                self.by_piece.remove(&piece);
                self.by_player.remove(&player);
                Ok(())
            }
            _ => Err(LockError::NotOwner { piece, player }),
        }
    }

    pub fn release_player(&mut self, player: PlayerId) -> Option<u32> {
        let piece = self.by_player.remove(&player)?;
        self.by_piece.remove(&piece);
        Some(piece)
    }

    /// Drops every lock whose holder went quiet for `timeout_ms`.
    pub fn expire(&mut self, now_ms: i64) -> Vec<PieceLock> {
        let mut expired: Vec<PieceLock> = self
            .by_piece
            .values()
            .filter(|lock| self.is_expired(lock, now_ms))
            .copied()
            .collect();
        expired.sort_by_key(|lock| lock.piece);
        for lock in &expired {
            self.by_piece.remove(&lock.piece);
            self.by_player.remove(&lock.owner);
        }
        expired
    }

    pub fn clear(&mut self) {
        self.by_piece.clear();
        self.by_player.clear();
    }

    pub fn locks(&self) -> Vec<PieceLock> {
        let mut locks: Vec<PieceLock> = self.by_piece.values().copied().collect();
        locks.sort_by_key(|lock| lock.piece);
        locks
    }

    pub fn restore(&mut self, locks: &[PieceLock]) {
        self.clear();
        for lock in locks {
            if self.by_player.contains_key(&lock.owner) {
                continue;
            }
            self.by_piece.insert(lock.piece, *lock);
            self.by_player.insert(lock.owner, lock.piece);
        }
    }
}

/// Last applied stamp per piece.
#[derive(Debug, Clone, Default)]
pub struct StampLedger {
    stamps: Vec<Option<Stamp>>,
}

impl StampLedger {
    pub fn new(total: usize) -> Self {
        Self {
            stamps: vec![None; total],
        }
    }

    pub fn reset(&mut self, total: usize) {
        self.stamps.clear();
        self.stamps.resize(total, None);
    }

    pub fn last(&self, piece: u32) -> Option<Stamp> {
        self.stamps.get(piece as usize).copied().flatten()
    }

    /// Fails with `Stale` when `stamp` would not supersede the last write.
    /// Nothing is recorded.
    pub fn check(&self, piece: u32, stamp: Stamp) -> Result<(), LockError> {
        match self.last(piece) {
            Some(previous) if !stamp.supersedes(&previous) => Err(LockError::Stale {
                piece,
                at_ms: stamp.at_ms,
            }),
            _ => Ok(()),
        }
    }

    pub fn accept(&mut self, piece: u32, stamp: Stamp) -> Result<(), LockError> {
        self.check(piece, stamp)?;
        if let Some(slot) = self.stamps.get_mut(piece as usize) {
            *slot = Some(stamp);
        }
        Ok(())
    }
}
