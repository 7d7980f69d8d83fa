pub mod config;
pub mod error;
pub mod room;
pub mod server;

pub use config::ServerConfig;
pub use error::{ErrorCode, ServerError};
pub use room::{Outbound, Room};
pub use server::{now_ms, serve, spawn_room_sweeper, sweep_rooms, AppState};
