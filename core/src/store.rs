//! Seam to the realtime key-value store that mirrors a session for clients.
//!
//! The store only holds flat records: pieces keyed by id, players keyed by id
//! and one metadata record per room. Piece writes are last-writer-wins on
//! [`Stamp`]; a write older than what is stored is dropped and reported as
//! not applied. Transport and durability belong to the implementation.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::catalog::ImageRef;
use crate::grid::Difficulty;
use crate::lock::{PlayerId, Stamp};
use crate::room_id::RoomId;
use crate::session::{GameSession, PieceChange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceRecord {
    pub x: f32,
    pub y: f32,
    pub rot_deg: f32,
    pub placed: bool,
    pub stamp: Stamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub score: u32,
    pub host: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameMeta {
    pub difficulty: Difficulty,
    pub image: ImageRef,
    pub generation: u32,
    pub started_at_ms: i64,
    pub elapsed_ms: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} has no stored session")]
    UnknownRoom(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait RealtimeStore {
    /// Returns whether the record was applied (`false` when superseded).
    fn put_piece(
        &mut self,
        room: &RoomId,
        piece: u32,
        record: PieceRecord,
    ) -> Result<bool, StoreError>;
    fn get_piece(&self, room: &RoomId, piece: u32) -> Result<Option<PieceRecord>, StoreError>;
    fn put_player(
        &mut self,
        room: &RoomId,
        player: PlayerId,
        record: PlayerRecord,
    ) -> Result<(), StoreError>;
    fn remove_player(&mut self, room: &RoomId, player: PlayerId) -> Result<(), StoreError>;
    fn players(&self, room: &RoomId) -> Result<Vec<(PlayerId, PlayerRecord)>, StoreError>;
    fn put_meta(&mut self, room: &RoomId, meta: GameMeta) -> Result<(), StoreError>;
    fn get_meta(&self, room: &RoomId) -> Result<Option<GameMeta>, StoreError>;
    fn clear(&mut self, room: &RoomId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
struct RoomRecords {
    meta: Option<GameMeta>,
    pieces: BTreeMap<u32, PieceRecord>,
    players: BTreeMap<PlayerId, PlayerRecord>,
}

/// In-process store. `set_offline(true)` makes every call fail, which is how
/// callers exercise their failure path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rooms: HashMap<RoomId, RoomRecords>,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl RealtimeStore for MemoryStore {
    fn put_piece(
        &mut self,
        room: &RoomId,
        piece: u32,
        record: PieceRecord,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let pieces = &mut self.rooms.entry(room.clone()).or_default().pieces;
        if let Some(existing) = pieces.get(&piece) {
            if !record.stamp.supersedes(&existing.stamp) {
                return Ok(false);
            }
        }
        pieces.insert(piece, record);
        Ok(true)
    }

    fn get_piece(&self, room: &RoomId, piece: u32) -> Result<Option<PieceRecord>, StoreError> {
        self.check()?;
        Ok(self
            .rooms
            .get(room)
            .and_then(|records| records.pieces.get(&piece))
            .copied())
    }

    fn put_player(
        &mut self,
        room: &RoomId,
        player: PlayerId,
        record: PlayerRecord,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.rooms
            .entry(room.clone())
            .or_default()
            .players
            .insert(player, record);
        Ok(())
    }

    fn remove_player(&mut self, room: &RoomId, player: PlayerId) -> Result<(), StoreError> {
        self.check()?;
        let records = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| StoreError::UnknownRoom(room.to_string()))?;
        records.players.remove(&player);
        Ok(())
    }

    fn players(&self, room: &RoomId) -> Result<Vec<(PlayerId, PlayerRecord)>, StoreError> {
        self.check()?;
        Ok(self
            .rooms
            .get(room)
            .map(|records| {
                records
                    .players
                    .iter()
                    .map(|(id, record)| (*id, record.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn put_meta(&mut self, room: &RoomId, meta: GameMeta) -> Result<(), StoreError> {
        self.check()?;
        self.rooms.entry(room.clone()).or_default().meta = Some(meta);
        Ok(())
    }

    fn get_meta(&self, room: &RoomId) -> Result<Option<GameMeta>, StoreError> {
        self.check()?;
        Ok(self
            .rooms
            .get(room)
            .and_then(|records| records.meta.clone()))
    }

    fn clear(&mut self, room: &RoomId) -> Result<(), StoreError> {
        self.check()?;
        self.rooms.remove(room);
        Ok(())
    }
}

pub fn game_meta(session: &GameSession, now_ms: i64) -> GameMeta {
    GameMeta {
        difficulty: session.difficulty(),
        image: session.image().clone(),
        generation: session.generation(),
        started_at_ms: session.started_at_ms(),
        elapsed_ms: session.elapsed_ms(now_ms),
        completed: session.is_completed(),
    }
}

/// Replaces everything stored for the session's room with its current state.
/// Pieces that were never written get a stamp at the session start.
pub fn mirror_session<S: RealtimeStore + ?Sized>(
    session: &GameSession,
    store: &mut S,
    now_ms: i64,
) -> Result<(), StoreError> {
    let room = session.id();
    store.clear(room)?;
    store.put_meta(room, game_meta(session, now_ms))?;
    for piece in session.pieces() {
        let record = PieceRecord {
            x: piece.current.x,
            y: piece.current.y,
            rot_deg: piece.current.rot_deg,
            placed: piece.placed,
            stamp: Stamp::new(session.started_at_ms(), 0),
        };
        store.put_piece(room, piece.id, record)?;
    }
    mirror_roster(session, store)
}

pub fn mirror_roster<S: RealtimeStore + ?Sized>(
    session: &GameSession,
    store: &mut S,
) -> Result<(), StoreError> {
    let room = session.id();
    for player in session.players() {
        if player.connected {
            let record = PlayerRecord {
                name: player.name.clone(),
                score: player.score,
                host: player.host,
            };
            store.put_player(room, player.id, record)?;
        } else {
            store.remove_player(room, player.id)?;
        }
    }
    Ok(())
}

/// Writes one piece change; on completion the metadata and scores follow.
pub fn mirror_change<S: RealtimeStore + ?Sized>(
    session: &GameSession,
    change: &PieceChange,
    store: &mut S,
    now_ms: i64,
) -> Result<bool, StoreError> {
    let room = session.id();
    let record = PieceRecord {
        x: change.transform.x,
        y: change.transform.y,
        rot_deg: change.transform.rot_deg,
        placed: change.placed,
        stamp: change.stamp,
    };
    let applied = store.put_piece(room, change.piece, record)?;
    if !applied {
        warn!(room = %room, piece = change.piece, "store kept a newer piece record");
    }
    if change.score_delta > 0 || change.completion.is_some() {
        mirror_roster(session, store)?;
    }
    if change.completion.is_some() {
        store.put_meta(room, game_meta(session, now_ms))?;
    }
    Ok(applied)
}
