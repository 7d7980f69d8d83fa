//! One hosted session plus its connected clients.
//!
//! All handlers run under the room registry lock, so commands for a room are
//! applied strictly in arrival order; that arrival order is the whole of the
//! last-write-wins story. Handlers return the messages to send instead of
//! sending them, and `deliver` fans them out.

use std::collections::HashMap;

use kakera_core::store::{mirror_change, mirror_roster, mirror_session};
use kakera_core::{
    ClientMsg, Difficulty, GameRules, GameSession, ImageRef, LeaveOutcome, MemoryStore,
    PieceChange, PlayerId, RoomId, RoomUpdate, ServerMsg, SessionError, StoreError,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::ErrorCode;

#[derive(Debug, Clone)]
pub enum Outbound {
    Broadcast(ServerMsg),
    Direct(PlayerId, ServerMsg),
}

pub struct Room {
    id: RoomId,
    session: GameSession,
    store: MemoryStore,
    clients: HashMap<PlayerId, UnboundedSender<ServerMsg>>,
    next_player_id: PlayerId,
    seq: u64,
    /// Set while no client is connected.
    idle_since_ms: Option<i64>,
}

impl Room {
    pub fn create(
        id: RoomId,
        difficulty: Difficulty,
        image: ImageRef,
        rules: GameRules,
        seed: u32,
        now_ms: i64,
    ) -> Result<Self, SessionError> {
        let session = GameSession::new(id.clone(), difficulty, image, rules, seed, now_ms)?;
        let mut room = Self {
            id,
            session,
            store: MemoryStore::new(),
            clients: HashMap::new(),
            next_player_id: 1,
            seq: 0,
            idle_since_ms: Some(now_ms),
        };
        let result = mirror_session(&room.session, &mut room.store, now_ms);
        room.report_store(result);
        info!(room = %room.id, grid = %difficulty, seed, "room created");
        Ok(room)
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// True once the room has had no clients for at least `ttl_ms`.
    pub fn is_abandoned(&self, now_ms: i64, ttl_ms: u64) -> bool {
        let ttl_ms = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
        self.clients.is_empty()
            && self
                .idle_since_ms
                .is_some_and(|since| now_ms.saturating_sub(since) >= ttl_ms)
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn update(&mut self, update: RoomUpdate, source: Option<PlayerId>) -> Outbound {
        let seq = self.next_seq();
        Outbound::Broadcast(ServerMsg::Update {
            seq,
            update,
            source,
        })
    }

    fn roster_update(&mut self) -> Outbound {
        let players = self.session.players().to_vec();
        self.update(RoomUpdate::Roster { players }, None)
    }

    fn full_state(&mut self) -> ServerMsg {
        let seq = self.next_seq();
        ServerMsg::State {
            seq,
            snapshot: self.session.snapshot(seq),
        }
    }

    /// Store failures are logged once and the mirror write is abandoned.
    fn report_store<T>(&self, result: Result<T, StoreError>) {
        if let Err(err) = result {
            warn!(room = %self.id, error = %err, "failed to mirror room state");
        }
    }

    fn reject(&self, player: PlayerId, err: &SessionError) -> Vec<Outbound> {
        debug!(room = %self.id, player, error = %err, "command rejected");
        vec![Outbound::Direct(
            player,
            ServerMsg::error(err.error_code(), err.to_string()),
        )]
    }

    pub fn join(
        &mut self,
        name: &str,
        resume: Option<PlayerId>,
        sender: UnboundedSender<ServerMsg>,
        now_ms: i64,
    ) -> (PlayerId, Vec<Outbound>) {
        let resumable = resume.filter(|id| {
            self.session
                .player(*id)
                .map(|player| !player.connected)
                .unwrap_or(false)
        });
        let player_id = match resumable {
            Some(id) => id,
            None => {
                let id = self.next_player_id;
                self.next_player_id += 1;
                id
            }
        };
        self.next_player_id = self.next_player_id.max(player_id + 1);
        self.session.join(player_id, name, now_ms);
        self.clients.insert(player_id, sender);
        self.idle_since_ms = None;
        let result = mirror_roster(&self.session, &mut self.store);
        self.report_store(result);

        let welcome = ServerMsg::Welcome {
            room_id: self.id.to_string(),
            player_id,
        };
        let state = self.full_state();
        let roster = self.roster_update();
        (
            player_id,
            vec![
                Outbound::Direct(player_id, welcome),
                Outbound::Direct(player_id, state),
                roster,
            ],
        )
    }

    pub fn leave(&mut self, player: PlayerId) -> (LeaveOutcome, Vec<Outbound>) {
        self.clients.remove(&player);
        let outcome = self.session.leave(player);
        let mut out = Vec::new();
        let released = match outcome {
            LeaveOutcome::Left { released, .. } | LeaveOutcome::Empty { released } => released,
            LeaveOutcome::Unknown => return (outcome, out),
        };
        if let Some(piece) = released {
            out.push(self.update(
                RoomUpdate::Lock {
                    piece,
                    owner: None,
                    at_ms: 0,
                },
                Some(player),
            ));
        }
        out.push(self.roster_update());
        let result = mirror_roster(&self.session, &mut self.store);
        self.report_store(result);
        (outcome, out)
    }

    pub fn handle(&mut self, player: PlayerId, msg: ClientMsg, now_ms: i64) -> Vec<Outbound> {
        match msg {
            ClientMsg::Join { .. } => vec![Outbound::Direct(
                player,
                ServerMsg::error("E_ALREADY_JOINED", "player already joined this room"),
            )],
            ClientMsg::Ping { nonce } => vec![Outbound::Direct(player, ServerMsg::Pong { nonce })],
            ClientMsg::Grab { piece } => match self.session.grab(player, piece, now_ms) {
                Ok(grab) => {
                    let mut out = Vec::new();
                    if let Some(previous) = grab.released {
                        out.push(self.update(
                            RoomUpdate::Lock {
                                piece: previous,
                                owner: None,
                                at_ms: now_ms,
                            },
                            Some(player),
                        ));
                    }
                    out.push(self.update(
                        RoomUpdate::Lock {
                            piece,
                            owner: Some(player),
                            at_ms: grab.lock.acquired_at_ms,
                        },
                        Some(player),
                    ));
                    let order = self.session.draw_order().to_vec();
                    out.push(self.update(RoomUpdate::Order { order }, Some(player)));
                    out
                }
                Err(err) => self.reject(player, &err),
            },
            ClientMsg::Release { piece } => match self.session.release(player, piece) {
                Ok(()) => vec![self.update(
                    RoomUpdate::Lock {
                        piece,
                        owner: None,
                        at_ms: now_ms,
                    },
                    Some(player),
                )],
                Err(err) => self.reject(player, &err),
            },
            ClientMsg::Move { piece, x, y } => {
                let result = self.session.move_piece(player, piece, x, y, now_ms);
                self.after_change(player, result, now_ms)
            }
            ClientMsg::Rotate { piece, rot_deg } => {
                let result = self.session.rotate_piece(player, piece, rot_deg, now_ms);
                self.after_change(player, result, now_ms)
            }
            ClientMsg::Drop { piece, transform } => {
                let result = self.session.drop_piece(player, piece, transform, now_ms);
                self.after_change(player, result, now_ms)
            }
            ClientMsg::Reshuffle { seed } => {
                match self.session.reshuffle_as(player, seed, now_ms) {
                    Ok(()) => self.restart(now_ms),
                    Err(err) => self.reject(player, &err),
                }
            }
        }
    }

    fn after_change(
        &mut self,
        player: PlayerId,
        result: Result<PieceChange, SessionError>,
        now_ms: i64,
    ) -> Vec<Outbound> {
        let change = match result {
            Ok(change) => change,
            Err(err) => return self.reject(player, &err),
        };
        let mirrored = mirror_change(&self.session, &change, &mut self.store, now_ms);
        self.report_store(mirrored);

        let mut out = Vec::new();
        if let Some(previous) = change.released_lock {
            out.push(self.update(
                RoomUpdate::Lock {
                    piece: previous,
                    owner: None,
                    at_ms: now_ms,
                },
                Some(player),
            ));
        }
        out.push(self.update(
            RoomUpdate::Piece {
                piece: change.piece,
                transform: change.transform,
                placed: change.placed,
                stamp: change.stamp,
            },
            Some(player),
        ));
        if change.unlocked {
            out.push(self.update(
                RoomUpdate::Lock {
                    piece: change.piece,
                    owner: None,
                    at_ms: now_ms,
                },
                Some(player),
            ));
        }
        for piece in &change.cleared_locks {
            out.push(self.update(
                RoomUpdate::Lock {
                    piece: *piece,
                    owner: None,
                    at_ms: now_ms,
                },
                None,
            ));
        }
        if change.score_delta > 0 || change.completion.is_some() {
            out.push(self.roster_update());
        }
        if let Some(completion) = change.completion {
            info!(
                room = %self.id,
                generation = completion.generation,
                elapsed_ms = completion.elapsed_ms,
                "announcing completion"
            );
            out.push(Outbound::Broadcast(ServerMsg::Completed {
                completion,
                players: self.session.players().to_vec(),
            }));
        }
        out
    }

    fn restart(&mut self, now_ms: i64) -> Vec<Outbound> {
        let result = mirror_session(&self.session, &mut self.store, now_ms);
        self.report_store(result);
        let state = self.full_state();
        vec![Outbound::Broadcast(state)]
    }

    pub fn change_puzzle(
        &mut self,
        difficulty: Difficulty,
        image: ImageRef,
        now_ms: i64,
    ) -> Result<Vec<Outbound>, SessionError> {
        self.session.change_puzzle(difficulty, image, now_ms)?;
        info!(room = %self.id, grid = %difficulty, "puzzle changed");
        Ok(self.restart(now_ms))
    }

    pub fn expire_locks(&mut self, now_ms: i64) -> Vec<Outbound> {
        let expired = self.session.expire_locks(now_ms);
        let mut out = Vec::with_capacity(expired.len());
        for lock in expired {
            out.push(self.update(
                RoomUpdate::Lock {
                    piece: lock.piece,
                    owner: None,
                    at_ms: now_ms,
                },
                None,
            ));
        }
        out
    }

    pub fn deliver(&self, outbound: Vec<Outbound>) {
        for message in outbound {
            match message {
                Outbound::Broadcast(msg) => {
                    for sender in self.clients.values() {
                        let _ = sender.send(msg.clone());
                    }
                }
                Outbound::Direct(player, msg) => {
                    if let Some(sender) = self.clients.get(&player) {
                        let _ = sender.send(msg);
                    }
                }
            }
        }
    }
}
