//! WebSocket front door: routing, admin commands and per-connection loops.
//!
//! Clients connect to `<prefix><room_id>`; admins add `?admin_token=`. Admin
//! sockets speak `AdminMsg`, player sockets speak `ClientMsg`, and both get
//! `ServerMsg` back. Every frame is a binary rkyv payload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, Stream, StreamExt};
use kakera_core::codec::{decode, encode};
use kakera_core::game::{splitmix32, PUZZLE_SEED};
use kakera_core::{AdminMsg, ClientMsg, GameRules, LeaveOutcome, PlayerId, RoomId, ServerMsg};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ServerConfig;
use crate::error::{ErrorCode, ServerError};
use crate::room::Room;

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    config: ServerConfig,
    default_rules: GameRules,
    rooms: Mutex<HashMap<RoomId, Room>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let default_rules = config.default_rules()?;
        Ok(Self {
            inner: Arc::new(AppInner {
                config,
                default_rules,
                rooms: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn rooms(&self) -> &Mutex<HashMap<RoomId, Room>> {
        &self.inner.rooms
    }

    pub async fn room_count(&self) -> usize {
        self.inner.rooms.lock().await.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    room_id: RoomId,
    admin_token: Option<String>,
}

fn parse_route(target: &str, prefix: &str) -> Option<Route> {
    let url = Url::parse(&format!("ws://localhost{target}")).ok()?;
    let room = url.path().strip_prefix(prefix)?;
    if room.is_empty() || room.contains('/') {
        return None;
    }
    let room_id = RoomId::parse(room).ok()?;
    let admin_token = url
        .query_pairs()
        .find(|(key, _)| key == "admin_token")
        .map(|(_, value)| value.into_owned());
    Some(Route {
        room_id,
        admin_token,
    })
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                warn!(%addr, code = err.error_code(), error = %err, "connection ended with error");
            }
        });
    }
}

/// Expires stale locks and drops rooms nobody joined within the idle TTL.
/// Returns the number of rooms removed.
pub async fn sweep_rooms(state: &AppState, now: i64) -> usize {
    let ttl_ms = state.config().idle_room_ttl_ms;
    let mut rooms = state.rooms().lock().await;
    for room in rooms.values_mut() {
        let out = room.expire_locks(now);
        room.deliver(out);
    }
    let before = rooms.len();
    rooms.retain(|room_id, room| {
        let abandoned = room.is_abandoned(now, ttl_ms);
        if abandoned {
            info!(room = %room_id, "idle room torn down");
        }
        !abandoned
    });
    before - rooms.len()
}

pub fn spawn_room_sweeper(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_millis(state.config().sweep_interval_ms.max(10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            sweep_rooms(&state, now_ms()).await;
        }
    })
}

async fn handle_connection(stream: TcpStream, state: AppState) -> Result<(), ServerError> {
    let mut target = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |request: &Request, response: Response| {
        target = request.uri().to_string();
        Ok::<Response, ErrorResponse>(response)
    })
    .await?;
    let (mut write, mut read) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMsg>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let bytes = match encode(&msg) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "dropping unencodable message");
                    continue;
                }
            };
            if write.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let prefix = state.config().room_path_prefix();
    let Some(route) = parse_route(&target, &prefix) else {
        let _ = tx.send(ServerMsg::error("E_NOT_FOUND", format!("no room at {target}")));
        drop(tx);
        let _ = writer.await;
        return Ok(());
    };

    let result = match route.admin_token.as_deref() {
        Some(token) => {
            let expected = state.config().admin_token.as_deref();
            if expected != Some(token) {
                let _ = tx.send(ServerMsg::error("E_FORBIDDEN", "invalid admin token"));
                Ok(())
            } else {
                admin_loop(&mut read, &tx, &state, &route.room_id).await
            }
        }
        None => player_loop(&mut read, &tx, &state, &route.room_id).await,
    };

    drop(tx);
    let _ = writer.await;
    result
}

async fn next_binary<S>(read: &mut S) -> Option<Result<Vec<u8>, ServerError>>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Binary(bytes)) => return Some(Ok(bytes.to_vec())),
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(err) => return Some(Err(err.into())),
        }
    }
    None
}

async fn admin_loop<S>(
    read: &mut S,
    tx: &mpsc::UnboundedSender<ServerMsg>,
    state: &AppState,
    room_id: &RoomId,
) -> Result<(), ServerError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = next_binary(read).await {
        let msg = match decode::<AdminMsg>(&frame?) {
            Ok(msg) => msg,
            Err(err) => {
                let _ = tx.send(ServerMsg::error("E_BAD_MESSAGE", err.to_string()));
                continue;
            }
        };
        let now = now_ms();
        let mut rooms = state.rooms().lock().await;
        match msg {
            AdminMsg::Create {
                difficulty,
                image,
                seed,
                rules,
            } => {
                if rooms.contains_key(room_id) {
                    let _ = tx.send(ServerMsg::error("E_ROOM_EXISTS", "room already exists"));
                    continue;
                }
                let rules = rules.unwrap_or(state.inner.default_rules);
                let seed = seed.unwrap_or_else(|| splitmix32(PUZZLE_SEED ^ now as u32));
                match Room::create(room_id.clone(), difficulty, image, rules, seed, now) {
                    Ok(room) => {
                        rooms.insert(room_id.clone(), room);
                        let _ = tx.send(ServerMsg::AdminAck {
                            room_id: room_id.to_string(),
                        });
                    }
                    Err(err) => {
                        let _ = tx.send(ServerMsg::error(err.error_code(), err.to_string()));
                    }
                }
            }
            AdminMsg::ChangePuzzle { difficulty, image } => {
                let Some(room) = rooms.get_mut(room_id) else {
                    let _ = tx.send(ServerMsg::error("E_NOT_FOUND", "room does not exist"));
                    continue;
                };
                match room.change_puzzle(difficulty, image, now) {
                    Ok(out) => {
                        room.deliver(out);
                        let _ = tx.send(ServerMsg::AdminAck {
                            room_id: room_id.to_string(),
                        });
                    }
                    Err(err) => {
                        let _ = tx.send(ServerMsg::error(err.error_code(), err.to_string()));
                    }
                }
            }
        }
    }
    Ok(())
}

async fn player_loop<S>(
    read: &mut S,
    tx: &mpsc::UnboundedSender<ServerMsg>,
    state: &AppState,
    room_id: &RoomId,
) -> Result<(), ServerError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut player: Option<PlayerId> = None;
    let mut result = Ok(());
    while let Some(frame) = next_binary(read).await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                result = Err(err);
                break;
            }
        };
        let msg = match decode::<ClientMsg>(&frame) {
            Ok(msg) => msg,
            Err(err) => {
                let _ = tx.send(ServerMsg::error("E_BAD_MESSAGE", err.to_string()));
                continue;
            }
        };
        let now = now_ms();
        let mut rooms = state.rooms().lock().await;
        let Some(room) = rooms.get_mut(room_id) else {
            let _ = tx.send(ServerMsg::error("E_NOT_FOUND", "room does not exist"));
            break;
        };
        match (player, msg) {
            (None, ClientMsg::Join { name, resume }) => {
                let (id, out) = room.join(&name, resume, tx.clone(), now);
                player = Some(id);
                room.deliver(out);
            }
            (None, ClientMsg::Ping { nonce }) => {
                let _ = tx.send(ServerMsg::Pong { nonce });
            }
            (None, _) => {
                let _ = tx.send(ServerMsg::error("E_NOT_JOINED", "join the room first"));
            }
            (Some(id), msg) => {
                let out = room.handle(id, msg, now);
                room.deliver(out);
            }
        }
    }

    if let Some(id) = player {
        let mut rooms = state.rooms().lock().await;
        if let Some(room) = rooms.get_mut(room_id) {
            let (outcome, out) = room.leave(id);
            room.deliver(out);
            if matches!(outcome, LeaveOutcome::Empty { .. }) {
                rooms.remove(room_id);
                info!(room = %room_id, "room torn down");
            }
        }
        debug!(room = %room_id, player = id, "player disconnected");
    }
    result
}
