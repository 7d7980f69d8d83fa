use rkyv::{Archive, Deserialize, Serialize};

use crate::catalog::ImageRef;
use crate::completion::Completion;
use crate::grid::Difficulty;
use crate::lock::{PlayerId, Stamp};
use crate::piece::Transform;
use crate::rules::GameRules;
use crate::session::Player;
use crate::snapshot::GameSnapshot;

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum AdminMsg {
    Create {
        difficulty: Difficulty,
        image: ImageRef,
        seed: Option<u32>,
        rules: Option<GameRules>,
    },
    ChangePuzzle {
        difficulty: Difficulty,
        image: ImageRef,
    },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum ClientMsg {
    /// `resume` reclaims a disconnected roster entry and its score.
    Join {
        name: String,
        resume: Option<PlayerId>,
    },
    Grab {
        piece: u32,
    },
    Move {
        piece: u32,
        x: f32,
        y: f32,
    },
    Rotate {
        piece: u32,
        rot_deg: f32,
    },
    Drop {
        piece: u32,
        transform: Transform,
    },
    Release {
        piece: u32,
    },
    Reshuffle {
        seed: Option<u32>,
    },
    Ping {
        nonce: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum RoomUpdate {
    Piece {
        piece: u32,
        transform: Transform,
        placed: bool,
        stamp: Stamp,
    },
    Lock {
        piece: u32,
        owner: Option<PlayerId>,
        at_ms: i64,
    },
    Order {
        order: Vec<u32>,
    },
    Roster {
        players: Vec<Player>,
    },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum ServerMsg {
    Welcome {
        room_id: String,
        player_id: PlayerId,
    },
    AdminAck {
        room_id: String,
    },
    State {
        seq: u64,
        snapshot: GameSnapshot,
    },
    Update {
        seq: u64,
        update: RoomUpdate,
        source: Option<PlayerId>,
    },
    Completed {
        completion: Completion,
        players: Vec<Player>,
    },
    Error {
        code: String,
        message: String,
    },
    Pong {
        nonce: Option<u64>,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
