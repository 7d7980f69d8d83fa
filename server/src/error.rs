use kakera_core::{CodecError, LockError, RulesError, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Stable string codes sent to clients in `ServerMsg::Error`.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownPiece(_) => "E_UNKNOWN_PIECE",
            Self::UnknownPlayer(_) => "E_UNKNOWN_PLAYER",
            Self::NotHost(_) => "E_NOT_HOST",
            Self::Completed => "E_COMPLETED",
            Self::InvalidTransform => "E_INVALID_TRANSFORM",
            Self::Lock(LockError::Held { .. }) => "E_PIECE_HELD",
            Self::Lock(LockError::NotOwner { .. }) => "E_NOT_OWNER",
            Self::Lock(LockError::Stale { .. }) => "E_STALE_WRITE",
            Self::Difficulty(_) => "E_DIFFICULTY",
            Self::Image(_) => "E_IMAGE",
            Self::SnapshotVersion { .. } | Self::Snapshot(_) => "E_SNAPSHOT",
        }
    }
}

impl ErrorCode for ServerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_IO",
            Self::WebSocket(_) => "E_WEBSOCKET",
            Self::Codec(_) => "E_BAD_MESSAGE",
            Self::Rules(_) => "E_RULES",
        }
    }
}
