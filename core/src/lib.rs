pub mod catalog;
pub mod codec;
pub mod completion;
pub mod game;
pub mod grid;
pub mod lock;
pub mod piece;
pub mod placement;
pub mod protocol;
pub mod room_id;
pub mod rules;
pub mod scramble;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod view;

pub use catalog::{puzzle_by_slug, CatalogEntry, ImageRef, DEFAULT_PUZZLE_SLUG, PUZZLE_CATALOG};
pub use codec::{decode, encode, CodecError};
pub use completion::{progress, Completion, CompletionLatch, Progress};
pub use grid::{Difficulty, DifficultyError};
pub use lock::{LockError, LockTable, PieceLock, PlayerId, Stamp};
pub use piece::{build_pieces, GridCoord, Piece, Transform};
pub use placement::{is_placed, RotationMode, Tolerance};
pub use protocol::{AdminMsg, ClientMsg, RoomUpdate, ServerMsg};
pub use room_id::{is_valid_room_id, RoomId, RoomIdError, ROOM_ID_ALPHABET, ROOM_ID_LEN};
pub use rules::{GameRules, RulesError};
pub use scramble::{scramble, ScrambleConfig};
pub use session::{GameSession, Grab, LeaveOutcome, PieceChange, Player, SessionError};
pub use snapshot::{GameSnapshot, GAME_SNAPSHOT_VERSION};
pub use store::{MemoryStore, RealtimeStore, StoreError};
pub use view::{sync_view, PieceView};
