//! Scripted player that joins a room over WebSocket and solves the puzzle.
//!
//! The bot keeps its own mirror of the room by applying `State` and `Update`
//! messages to a `GameSnapshot`, the same way a browser client would. Each
//! turn it picks a loose piece nobody holds, grabs it, drags it home in a few
//! `Move` steps and drops it on its correct transform.

use std::time::Instant;

use futures_util::SinkExt;
use kakera_core::{ClientMsg, Completion, GameSnapshot, PlayerId, ServerMsg, Transform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, Duration};
use tracing::{debug, info};
use url::Url;

use crate::net::{connect, err_msg, recv_server_msg_timeout, send_client_msg, CliError, WsRead};

/// Server errors a bot expects while racing other players.
const CONTENDED_CODES: [&str; 4] = ["E_PIECE_HELD", "E_NOT_OWNER", "E_STALE_WRITE", "E_COMPLETED"];

#[derive(Debug, Clone, Copy)]
pub struct BotConfig {
    pub duration: Duration,
    pub think_min_ms: u64,
    pub think_max_ms: u64,
    pub drag_steps: u32,
    pub step_ms: u64,
    /// Chance of deliberately going for a piece another player holds.
    pub conflict_rate: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            think_min_ms: 120,
            think_max_ms: 600,
            drag_steps: 4,
            step_ms: 16,
            conflict_rate: 0.0,
        }
    }
}

impl BotConfig {
    fn validate(&self) -> Result<(), CliError> {
        if self.think_min_ms > self.think_max_ms {
            return Err(err_msg("think_min_ms must be <= think_max_ms"));
        }
        if !(0.0..=1.0).contains(&self.conflict_rate) {
            return Err(err_msg("conflict_rate must be within 0..=1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotReport {
    pub player_id: PlayerId,
    pub drops: u32,
    pub rejected: u32,
    pub score: u32,
    pub completion: Option<Completion>,
}

#[derive(Debug, Default)]
pub struct BotState {
    pub player_id: Option<PlayerId>,
    pub snapshot: Option<GameSnapshot>,
    pub completion: Option<Completion>,
    pub rejected: u32,
    last_seq: u64,
}

impl BotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_server_msg(&mut self, msg: &ServerMsg) -> Result<(), CliError> {
        match msg {
            ServerMsg::Welcome { player_id, .. } => {
                self.player_id = Some(*player_id);
            }
            ServerMsg::State { seq, snapshot } => {
                self.last_seq = *seq;
                self.completion = snapshot.completion;
                self.snapshot = Some(snapshot.clone());
            }
            ServerMsg::Update { seq, update, .. } => {
                if *seq <= self.last_seq {
                    return Ok(());
                }
                self.last_seq = *seq;
                if let Some(snapshot) = self.snapshot.as_mut() {
                    snapshot.apply_update(update);
                    snapshot.seq = *seq;
                }
            }
            ServerMsg::Completed {
                completion,
                players,
            } => {
                self.completion = Some(*completion);
                if let Some(snapshot) = self.snapshot.as_mut() {
                    snapshot.completion = Some(*completion);
                    snapshot.players = players.clone();
                }
            }
            ServerMsg::Error { code, message } => {
                if CONTENDED_CODES.contains(&code.as_str()) {
                    self.rejected += 1;
                    debug!(%code, %message, "move rejected");
                } else {
                    return Err(err_msg(format!("server error {code}: {message}")));
                }
            }
            ServerMsg::AdminAck { .. } | ServerMsg::Pong { .. } => {}
        }
        Ok(())
    }

    fn score(&self) -> u32 {
        let (Some(snapshot), Some(me)) = (self.snapshot.as_ref(), self.player_id) else {
            return 0;
        };
        snapshot
            .players
            .iter()
            .find(|player| player.id == me)
            .map(|player| player.score)
            .unwrap_or(0)
    }
}

/// Picks a loose piece. Pieces held by someone else are skipped unless the
/// roll lands under `conflict_rate` and such a piece exists.
pub fn choose_piece<R: Rng + ?Sized>(
    snapshot: &GameSnapshot,
    me: PlayerId,
    conflict_rate: f32,
    rng: &mut R,
) -> Option<u32> {
    let mut free = Vec::new();
    let mut contested = Vec::new();
    for piece in snapshot.pieces.iter().filter(|piece| !piece.placed) {
        match snapshot.lock_owner(piece.id) {
            Some(owner) if owner != me => contested.push(piece.id),
            _ => free.push(piece.id),
        }
    }
    let pool = if !contested.is_empty() && rng.random::<f32>() < conflict_rate {
        contested
    } else {
        free
    };
    if pool.is_empty() {
        return None;
    }
    Some(pool[rng.random_range(0..pool.len())])
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

async fn pump_messages(
    read: &mut WsRead,
    state: &mut BotState,
    window: Duration,
) -> Result<(), CliError> {
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let Some(msg) = recv_server_msg_timeout(read, remaining.min(Duration::from_millis(60))).await?
        else {
            continue;
        };
        state.apply_server_msg(&msg)?;
    }
    Ok(())
}

/// Waits until the room confirms our lock on `piece` or refuses it.
async fn wait_for_lock(
    read: &mut WsRead,
    state: &mut BotState,
    piece: u32,
    me: PlayerId,
) -> Result<bool, CliError> {
    let rejected_before = state.rejected;
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let owner = state
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.lock_owner(piece));
        if owner == Some(me) {
            return Ok(true);
        }
        if state.rejected > rejected_before || state.completion.is_some() {
            return Ok(false);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        if let Some(msg) = recv_server_msg_timeout(read, remaining.min(Duration::from_millis(60))).await? {
            state.apply_server_msg(&msg)?;
        }
    }
}

pub async fn run_bot(
    url: &Url,
    name: &str,
    config: BotConfig,
    seed: Option<u64>,
) -> Result<BotReport, CliError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or_else(|| rand::rng().random()));

    let (mut write, mut read) = connect(url).await?;
    send_client_msg(
        &mut write,
        &ClientMsg::Join {
            name: name.to_string(),
            resume: None,
        },
    )
    .await?;

    let mut state = BotState::new();
    let init_deadline = Instant::now() + Duration::from_secs(15);
    while state.player_id.is_none() || state.snapshot.is_none() {
        let remaining = init_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(err_msg("failed to receive welcome+state before timeout"));
        }
        if let Some(msg) = recv_server_msg_timeout(&mut read, remaining).await? {
            state.apply_server_msg(&msg)?;
        }
    }
    let me = state.player_id.ok_or_else(|| err_msg("missing player id"))?;
    info!(player = me, %url, "bot joined");

    let end_at = Instant::now() + config.duration;
    let mut drops = 0u32;
    while Instant::now() < end_at && state.completion.is_none() {
        let think = rng.random_range(config.think_min_ms..=config.think_max_ms);
        pump_messages(&mut read, &mut state, Duration::from_millis(think)).await?;
        if state.completion.is_some() {
            break;
        }

        let Some(snapshot) = state.snapshot.as_ref() else {
            continue;
        };
        let Some(piece) = choose_piece(snapshot, me, config.conflict_rate, &mut rng) else {
            continue;
        };
        let Some(start) = snapshot.pieces.get(piece as usize).map(|p| p.current) else {
            continue;
        };
        let target = snapshot.pieces[piece as usize].correct_transform();

        send_client_msg(&mut write, &ClientMsg::Grab { piece }).await?;
        if !wait_for_lock(&mut read, &mut state, piece, me).await? {
            debug!(player = me, piece, "grab did not stick");
            continue;
        }

        for step in 1..config.drag_steps {
            let t = step as f32 / config.drag_steps as f32;
            let x = lerp(start.x, target.x, t) + rng.random_range(-0.02..0.02);
            let y = lerp(start.y, target.y, t) + rng.random_range(-0.02..0.02);
            send_client_msg(&mut write, &ClientMsg::Move { piece, x, y }).await?;
            sleep(Duration::from_millis(config.step_ms)).await;
        }
        let transform = Transform::new(target.x, target.y, target.rot_deg);
        send_client_msg(&mut write, &ClientMsg::Drop { piece, transform }).await?;
        drops += 1;
    }

    // Give the final roster a moment to arrive so the reported score is current.
    pump_messages(&mut read, &mut state, Duration::from_millis(50)).await?;
    let report = BotReport {
        player_id: me,
        drops,
        rejected: state.rejected,
        score: state.score(),
        completion: state.completion,
    };
    info!(
        player = me,
        drops = report.drops,
        rejected = report.rejected,
        score = report.score,
        completed = report.completion.is_some(),
        "bot finished"
    );
    let _ = write.close().await;
    Ok(report)
}
