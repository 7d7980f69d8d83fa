//! The one authoritative copy of a game.
//!
//! `GameSession` owns the pieces, the roster, the locks, the timer and the
//! completion latch. Rooms, bots and headless play all drive it through the
//! same methods, each of which takes the caller's clock explicitly.

use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{ImageRef, ImageRefError};
use crate::completion::{progress, Completion, CompletionLatch, Progress};
use crate::grid::{Difficulty, DifficultyError};
use crate::lock::{LockError, LockTable, PieceLock, PlayerId, Stamp, StampLedger};
use crate::piece::{build_pieces, Piece, Transform};
use crate::room_id::RoomId;
use crate::rules::GameRules;
use crate::scramble::{scramble, scramble_seed, shuffle_order, ScrambleConfig};
use crate::snapshot::{GameSnapshot, GAME_SNAPSHOT_VERSION};

pub const PLAYER_NAME_MAX: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub host: bool,
    pub connected: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown piece {0}")]
    UnknownPiece(u32),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is not the host")]
    NotHost(PlayerId),
    #[error("puzzle already completed")]
    Completed,
    #[error("transform must be finite")]
    InvalidTransform,
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
    #[error(transparent)]
    Image(#[from] ImageRefError),
    #[error("snapshot version {found} is not supported (expected {expected})")]
    SnapshotVersion { expected: u32, found: u32 },
    #[error("snapshot is inconsistent: {0}")]
    Snapshot(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left {
        new_host: Option<PlayerId>,
        released: Option<u32>,
    },
    /// Nobody is connected any more; the session can be torn down.
    Empty { released: Option<u32> },
    Unknown,
}

/// Result of a grab: the lock taken plus the one it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grab {
    pub lock: PieceLock,
    pub released: Option<u32>,
}

/// Everything a caller needs to mirror or broadcast after a piece moved.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceChange {
    pub piece: u32,
    pub transform: Transform,
    pub placed: bool,
    pub was_placed: bool,
    pub stamp: Stamp,
    /// Lock the acting player lost by touching this piece instead.
    pub released_lock: Option<u32>,
    /// Whether the acting player no longer holds this piece.
    pub unlocked: bool,
    /// Other pieces whose locks were dropped because this write completed
    /// the puzzle.
    pub cleared_locks: Vec<u32>,
    pub score_delta: u32,
    pub completion: Option<Completion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    started_at_ms: i64,
    stopped_at_ms: Option<i64>,
}

impl Timer {
    fn start(now_ms: i64) -> Self {
        Self {
            started_at_ms: now_ms,
            stopped_at_ms: None,
        }
    }

    fn elapsed_ms(&self, now_ms: i64) -> i64 {
        let end = self.stopped_at_ms.unwrap_or(now_ms);
        end.saturating_sub(self.started_at_ms).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: RoomId,
    difficulty: Difficulty,
    image: ImageRef,
    rules: GameRules,
    seed: u32,
    generation: u32,
    pieces: Vec<Piece>,
    draw_order: Vec<u32>,
    players: Vec<Player>,
    locks: LockTable,
    stamps: StampLedger,
    timer: Timer,
    latch: CompletionLatch,
    completion: Option<Completion>,
}

impl GameSession {
    pub fn new(
        id: RoomId,
        difficulty: Difficulty,
        image: ImageRef,
        rules: GameRules,
        seed: u32,
        now_ms: i64,
    ) -> Result<Self, SessionError> {
        let difficulty = difficulty.validate()?;
        image.validate()?;
        let rules = rules.sanitized();
        let mut session = Self {
            id,
            difficulty,
            image,
            rules,
            seed,
            generation: 0,
            pieces: Vec::new(),
            draw_order: Vec::new(),
            players: Vec::new(),
            locks: LockTable::new(rules.lock_timeout_ms),
            stamps: StampLedger::default(),
            timer: Timer::start(now_ms),
            latch: CompletionLatch::new(0),
            completion: None,
        };
        session.deal(now_ms);
        Ok(session)
    }

    fn deal(&mut self, now_ms: i64) {
        let seed = scramble_seed(self.seed, self.generation, self.difficulty);
        let config = ScrambleConfig::for_grid(
            self.difficulty,
            self.rules.scramble_radius_ratio,
            self.rules.rotation_enabled,
        );
        let transforms = scramble(self.difficulty, seed, &config, &self.rules.tolerance);
        let mut pieces = build_pieces(self.difficulty);
        for (piece, transform) in pieces.iter_mut().zip(transforms) {
            piece.set_transform(transform, &self.rules.tolerance);
        }
        self.pieces = pieces;
        self.draw_order = shuffle_order(seed, self.pieces.len());
        self.locks.clear();
        self.stamps.reset(self.pieces.len());
        self.timer = Timer::start(now_ms);
        self.latch.reset(self.generation);
        self.completion = None;
        let progress = self.progress();
        debug!(
            room = %self.id,
            generation = self.generation,
            grid = %self.difficulty,
            placed = progress.placed,
            total = progress.total,
            "dealt puzzle"
        );
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, piece: u32) -> Option<&Piece> {
        self.pieces.get(piece as usize)
    }

    pub fn draw_order(&self) -> &[u32] {
        &self.draw_order
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, player: PlayerId) -> Option<&Player> {
        self.players.iter().find(|entry| entry.id == player)
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|entry| entry.host && entry.connected)
            .map(|entry| entry.id)
    }

    pub fn lock_owner(&self, piece: u32) -> Option<PlayerId> {
        self.locks.owner(piece)
    }

    pub fn locks(&self) -> Vec<PieceLock> {
        self.locks.locks()
    }

    pub fn progress(&self) -> Progress {
        progress(&self.pieces)
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_some()
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn started_at_ms(&self) -> i64 {
        self.timer.started_at_ms
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> i64 {
        self.timer.elapsed_ms(now_ms)
    }

    /// Adds or reconnects a player. The first connected player hosts; a
    /// returning player keeps their score.
    pub fn join(&mut self, player: PlayerId, name: &str, now_ms: i64) -> &Player {
        let name = sanitize_name(name, player);
        let needs_host = self.host().is_none();
        let idx = match self.players.iter().position(|entry| entry.id == player) {
            Some(idx) => {
                let entry = &mut self.players[idx];
                entry.name = name;
                entry.connected = true;
                idx
            }
            None => {
                self.players.push(Player {
                    id: player,
                    name,
                    score: 0,
                    host: false,
                    connected: true,
                });
                self.players.len() - 1
            }
        };
        if needs_host {
            for entry in &mut self.players {
                entry.host = false;
            }
            self.players[idx].host = true;
        }
        info!(
            room = %self.id,
            player,
            host = self.players[idx].host,
            at_ms = now_ms,
            "player joined"
        );
        &self.players[idx]
    }

    /// Disconnects a player, releasing their lock and handing the host role to
    /// the longest-connected remaining player.
    pub fn leave(&mut self, player: PlayerId) -> LeaveOutcome {
        let Some(idx) = self.players.iter().position(|entry| entry.id == player) else {
            return LeaveOutcome::Unknown;
        };
        let released = self.locks.release_player(player);
        let was_host = self.players[idx].host;
        self.players[idx].connected = false;
        self.players[idx].host = false;

        let Some(next) = self.players.iter().position(|entry| entry.connected) else {
            info!(room = %self.id, player, "last player left");
            return LeaveOutcome::Empty { released };
        };
        let new_host = if was_host {
            self.players[next].host = true;
            Some(self.players[next].id)
        } else {
            None
        };
        info!(room = %self.id, player, ?new_host, "player left");
        LeaveOutcome::Left { new_host, released }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_completed() {
            return Err(SessionError::Completed);
        }
        Ok(())
    }

    fn ensure_player(&self, player: PlayerId) -> Result<(), SessionError> {
        match self.player(player) {
            Some(entry) if entry.connected => Ok(()),
            _ => Err(SessionError::UnknownPlayer(player)),
        }
    }

    fn ensure_piece(&self, piece: u32) -> Result<(), SessionError> {
        if piece as usize >= self.pieces.len() {
            return Err(SessionError::UnknownPiece(piece));
        }
        Ok(())
    }

    fn raise(&mut self, piece: u32) {
        self.draw_order.retain(|id| *id != piece);
        self.draw_order.push(piece);
    }

    pub fn grab(&mut self, player: PlayerId, piece: u32, now_ms: i64) -> Result<Grab, SessionError> {
        self.ensure_active()?;
        self.ensure_player(player)?;
        self.ensure_piece(piece)?;
        let released = self.locks.try_acquire(piece, player, now_ms)?;
        self.raise(piece);
        Ok(Grab {
            lock: PieceLock {
                piece,
                owner: player,
                acquired_at_ms: now_ms,
            },
            released,
        })
    }

    pub fn release(&mut self, player: PlayerId, piece: u32) -> Result<(), SessionError> {
        self.ensure_piece(piece)?;
        self.locks.release(piece, player)?;
        Ok(())
    }

    pub fn move_piece(
        &mut self,
        player: PlayerId,
        piece: u32,
        x: f32,
        y: f32,
        now_ms: i64,
    ) -> Result<PieceChange, SessionError> {
        self.ensure_piece(piece)?;
        let transform = self.pieces[piece as usize].current.with_position(x, y);
        self.apply(player, piece, transform, now_ms, false)
    }

    pub fn rotate_piece(
        &mut self,
        player: PlayerId,
        piece: u32,
        rot_deg: f32,
        now_ms: i64,
    ) -> Result<PieceChange, SessionError> {
        self.ensure_piece(piece)?;
        let transform = self.pieces[piece as usize].current.with_rotation(rot_deg);
        self.apply(player, piece, transform, now_ms, false)
    }

    /// Final transform at the end of a drag; the lock is released afterwards.
    pub fn drop_piece(
        &mut self,
        player: PlayerId,
        piece: u32,
        transform: Transform,
        now_ms: i64,
    ) -> Result<PieceChange, SessionError> {
        self.apply(player, piece, transform, now_ms, true)
    }

    fn apply(
        &mut self,
        player: PlayerId,
        piece: u32,
        transform: Transform,
        now_ms: i64,
        release_after: bool,
    ) -> Result<PieceChange, SessionError> {
        self.ensure_active()?;
        self.ensure_player(player)?;
        self.ensure_piece(piece)?;
        if !transform.is_finite() {
            return Err(SessionError::InvalidTransform);
        }
        let stamp = Stamp::new(now_ms, player);
        self.stamps.check(piece, stamp)?;
        let released_lock = self.locks.try_acquire(piece, player, now_ms)?;
        self.stamps.accept(piece, stamp)?;

        let stored = Transform {
            rot_deg: self.rules.rotation_mode.apply(transform.rot_deg),
            ..transform
        };
        let tolerance = self.rules.tolerance;
        let entry = &mut self.pieces[piece as usize];
        let was_placed = entry.set_transform(stored, &tolerance);
        let placed = entry.placed;

        let mut score_delta = 0;
        if placed && !was_placed {
            score_delta = self.rules.points_per_piece;
            if let Some(scorer) = self.players.iter_mut().find(|entry| entry.id == player) {
                scorer.score = scorer.score.saturating_add(score_delta);
            }
        }

        let mut unlocked = false;
        if release_after {
            self.locks.release(piece, player)?;
            unlocked = true;
        }

        let progress = self.progress();
        let mut cleared_locks = Vec::new();
        let completion = if self.latch.observe(self.generation, progress) {
            unlocked = true;
            let (completion, cleared) = self.complete(now_ms);
            cleared_locks = cleared
                .into_iter()
                .map(|lock| lock.piece)
                .filter(|held| *held != piece)
                .collect();
            Some(completion)
        } else {
            None
        };

        Ok(PieceChange {
            piece,
            transform: stored,
            placed,
            was_placed,
            stamp,
            released_lock,
            unlocked,
            cleared_locks,
            score_delta,
            completion,
        })
    }

    /// Stops the timer and drops every lock; the dropped locks are returned.
    fn complete(&mut self, now_ms: i64) -> (Completion, Vec<PieceLock>) {
        self.timer.stopped_at_ms = Some(now_ms);
        let cleared = self.locks.locks();
        self.locks.clear();
        let bonus = self.rules.completion_bonus;
        for entry in self.players.iter_mut().filter(|entry| entry.connected) {
            entry.score = entry.score.saturating_add(bonus);
        }
        let completion = Completion {
            generation: self.generation,
            started_at_ms: self.timer.started_at_ms,
            finished_at_ms: now_ms,
            elapsed_ms: self.timer.elapsed_ms(now_ms),
        };
        self.completion = Some(completion);
        info!(
            room = %self.id,
            generation = self.generation,
            elapsed_ms = completion.elapsed_ms,
            "puzzle completed"
        );
        (completion, cleared)
    }

    /// Drops locks whose holders went quiet.
    pub fn expire_locks(&mut self, now_ms: i64) -> Vec<PieceLock> {
        let expired = self.locks.expire(now_ms);
        for lock in &expired {
            debug!(room = %self.id, piece = lock.piece, owner = lock.owner, "lock expired");
        }
        expired
    }

    /// Starts a fresh instance of the same puzzle. Scores reset with it.
    pub fn reshuffle(&mut self, seed: Option<u32>, now_ms: i64) {
        if let Some(seed) = seed {
            self.seed = seed;
        }
        self.generation = self.generation.wrapping_add(1);
        for entry in &mut self.players {
            entry.score = 0;
        }
        self.deal(now_ms);
    }

    /// Host-only variant used by player requests.
    pub fn reshuffle_as(
        &mut self,
        player: PlayerId,
        seed: Option<u32>,
        now_ms: i64,
    ) -> Result<(), SessionError> {
        if self.host() != Some(player) {
            return Err(SessionError::NotHost(player));
        }
        self.reshuffle(seed, now_ms);
        Ok(())
    }

    /// Replaces the image and grid; every piece is rebuilt.
    pub fn change_puzzle(
        &mut self,
        difficulty: Difficulty,
        image: ImageRef,
        now_ms: i64,
    ) -> Result<(), SessionError> {
        let difficulty = difficulty.validate()?;
        image.validate()?;
        self.difficulty = difficulty;
        self.image = image;
        self.reshuffle(None, now_ms);
        Ok(())
    }

    pub fn snapshot(&self, seq: u64) -> GameSnapshot {
        GameSnapshot {
            version: GAME_SNAPSHOT_VERSION,
            seq,
            room_id: self.id.to_string(),
            difficulty: self.difficulty,
            image: self.image.clone(),
            rules: self.rules,
            seed: self.seed,
            generation: self.generation,
            pieces: self.pieces.clone(),
            draw_order: self.draw_order.clone(),
            players: self.players.clone(),
            locks: self.locks.locks(),
            started_at_ms: self.timer.started_at_ms,
            stopped_at_ms: self.timer.stopped_at_ms,
            completion: self.completion,
        }
    }

    /// Rebuilds a session from a snapshot. Placed flags are recomputed from
    /// the stored transforms rather than trusted.
    pub fn from_snapshot(snapshot: GameSnapshot) -> Result<Self, SessionError> {
        if snapshot.version != GAME_SNAPSHOT_VERSION {
            return Err(SessionError::SnapshotVersion {
                expected: GAME_SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        let id = RoomId::parse(&snapshot.room_id)
            .map_err(|err| SessionError::Snapshot(err.to_string()))?;
        let difficulty = snapshot.difficulty.validate()?;
        snapshot.image.validate()?;
        let rules = snapshot.rules.sanitized();
        let total = difficulty.piece_count();
        if snapshot.pieces.len() != total {
            return Err(SessionError::Snapshot(format!(
                "expected {total} pieces, found {}",
                snapshot.pieces.len()
            )));
        }

        let mut pieces = build_pieces(difficulty);
        for (slot, stored) in pieces.iter_mut().zip(&snapshot.pieces) {
            if stored.id != slot.id || stored.correct != slot.correct {
                return Err(SessionError::Snapshot(format!(
                    "piece {} does not match its grid cell",
                    stored.id
                )));
            }
            slot.set_transform(stored.current, &rules.tolerance);
        }

        let mut draw_order: Vec<u32> = snapshot
            .draw_order
            .iter()
            .copied()
            .filter(|id| (*id as usize) < total)
            .collect();
        for id in 0..total as u32 {
            if !draw_order.contains(&id) {
                draw_order.push(id);
            }
        }

        let mut locks = LockTable::new(rules.lock_timeout_ms);
        if snapshot.completion.is_none() {
            let valid: Vec<PieceLock> = snapshot
                .locks
                .iter()
                .copied()
                .filter(|lock| (lock.piece as usize) < total)
                .collect();
            locks.restore(&valid);
        }

        let latch = if snapshot.completion.is_some() {
            CompletionLatch::fired(snapshot.generation)
        } else {
            CompletionLatch::new(snapshot.generation)
        };

        Ok(Self {
            id,
            difficulty,
            image: snapshot.image,
            rules,
            seed: snapshot.seed,
            generation: snapshot.generation,
            pieces,
            draw_order,
            players: snapshot.players,
            locks,
            stamps: StampLedger::new(total),
            timer: Timer {
                started_at_ms: snapshot.started_at_ms,
                stopped_at_ms: snapshot.stopped_at_ms,
            },
            latch,
            completion: snapshot.completion,
        })
    }
}

fn sanitize_name(name: &str, player: PlayerId) -> String {
    let trimmed: String = name
        .trim()
        .chars()
        .filter(|ch| !ch.is_control())
        .take(PLAYER_NAME_MAX)
        .collect();
    if trimmed.is_empty() {
        format!("player-{player}")
    } else {
        trimmed
    }
}
