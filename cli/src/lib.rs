pub mod bot;
pub mod net;
pub mod play;

pub use bot::{run_bot, BotConfig, BotReport, BotState};
pub use net::{build_admin_url, build_join_url, create_room, parse_seed_arg, CliError};
pub use play::{format_frame, play, PlayOptions, PlayReport, TextBoard};
