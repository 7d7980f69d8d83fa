use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kakera_cli::net::err_msg;
use kakera_cli::{
    build_join_url, create_room, format_frame, parse_seed_arg, play, run_bot, BotConfig, CliError,
    PlayOptions,
};
use kakera_core::catalog::{puzzle_by_slug, DEFAULT_PUZZLE_SLUG, PUZZLE_CATALOG};
use kakera_core::{AdminMsg, Difficulty, GameRules, ImageRef, RoomId, ServerMsg};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kakera-cli", version, about = "Admin, bot and local play tools for kakera rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Rooms {
        #[command(subcommand)]
        command: RoomCommand,
    },
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },
    /// Solve a board locally with simulated players and print each frame.
    Play {
        #[command(flatten)]
        puzzle: PuzzleArgs,
        #[arg(long, default_value_t = 2)]
        players: u32,
        #[arg(long, default_value_t = 250)]
        step_ms: u32,
        #[arg(long, env = "KAKERA_RULES")]
        rules: Option<PathBuf>,
        /// Only print the final board.
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Args)]
struct RoomArgs {
    #[arg(long, env = "ROOM_WS_BASE_URL", default_value = "ws://localhost:8787/ws")]
    base_url: String,
    #[arg(long)]
    room_id: String,
}

#[derive(Args)]
struct PuzzleArgs {
    #[arg(long, default_value = DEFAULT_PUZZLE_SLUG)]
    puzzle: String,
    /// Target piece count; the grid is fitted to the image aspect.
    #[arg(long, conflicts_with = "difficulty")]
    pieces: Option<u32>,
    /// Preset name (easy, medium, hard, expert) or `RxC`.
    #[arg(long)]
    difficulty: Option<Difficulty>,
    #[arg(long)]
    seed: Option<String>,
}

impl PuzzleArgs {
    fn resolve(&self) -> Result<(ImageRef, Difficulty, Option<u32>), CliError> {
        let Some(entry) = puzzle_by_slug(&self.puzzle) else {
            let mut message = format!("unknown puzzle: {}\navailable puzzles:", self.puzzle);
            for entry in PUZZLE_CATALOG {
                message.push_str(&format!("\n  {} ({})", entry.slug, entry.label));
            }
            return Err(err_msg(message));
        };
        let difficulty = match (self.difficulty, self.pieces) {
            (Some(difficulty), _) => difficulty.validate()?,
            (None, Some(target)) => Difficulty::for_image(entry.width, entry.height, target)?,
            (None, None) => Difficulty::MEDIUM,
        };
        let seed = self.seed.as_deref().map(parse_seed_arg).transpose()?;
        Ok((ImageRef::catalog(entry.slug), difficulty, seed))
    }
}

#[derive(Subcommand)]
enum RoomCommand {
    Create {
        #[arg(long, env = "ROOM_WS_BASE_URL", default_value = "ws://localhost:8787/ws")]
        base_url: String,
        #[arg(long, env = "ROOM_ADMIN_TOKEN")]
        admin_token: String,
        #[command(flatten)]
        puzzle: PuzzleArgs,
        #[arg(long)]
        room_id: Option<String>,
        /// JSON rules file; the server defaults apply when omitted.
        #[arg(long)]
        rules: Option<PathBuf>,
        #[arg(long)]
        no_connect: bool,
    },
}

#[derive(Subcommand)]
enum BotCommand {
    Run {
        #[command(flatten)]
        room: RoomArgs,
        #[arg(long, default_value = "bot")]
        name: String,
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 120)]
        think_min_ms: u64,
        #[arg(long, default_value_t = 600)]
        think_max_ms: u64,
        #[arg(long, default_value_t = 4)]
        drag_steps: u32,
        #[arg(long, default_value_t = 16)]
        step_ms: u64,
        #[arg(long, default_value_t = 0.0)]
        conflict_rate: f32,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Rooms { command } => match command {
            RoomCommand::Create {
                base_url,
                admin_token,
                puzzle,
                room_id,
                rules,
                no_connect,
            } => {
                let (image, difficulty, seed) = puzzle.resolve()?;
                let room_id = match room_id {
                    Some(id) => RoomId::parse(&id)?,
                    None => RoomId::generate(&mut rand::rng()),
                };
                let rules = rules.as_deref().map(GameRules::load).transpose()?;
                let join_url = build_join_url(&base_url, room_id.as_str())?;

                println!("room_id: {room_id}");
                println!("grid: {difficulty} ({} pieces)", difficulty.piece_count());
                println!("join_url: {join_url}");
                if no_connect {
                    return Ok(());
                }

                let msg = AdminMsg::Create {
                    difficulty,
                    image,
                    seed,
                    rules,
                };
                match create_room(&base_url, &admin_token, room_id.as_str(), &msg).await? {
                    ServerMsg::AdminAck { room_id } => println!("created: {room_id}"),
                    ServerMsg::Error { code, message } => {
                        return Err(err_msg(format!("server error {code}: {message}")));
                    }
                    other => println!("server: {other:?}"),
                }
            }
        },
        Commands::Bot { command } => match command {
            BotCommand::Run {
                room,
                name,
                duration_secs,
                seed,
                think_min_ms,
                think_max_ms,
                drag_steps,
                step_ms,
                conflict_rate,
            } => {
                let url = build_join_url(&room.base_url, RoomId::parse(&room.room_id)?.as_str())?;
                let config = BotConfig {
                    duration: Duration::from_secs(duration_secs),
                    think_min_ms,
                    think_max_ms,
                    drag_steps,
                    step_ms,
                    conflict_rate,
                };
                let report = run_bot(&url, &name, config, seed).await?;
                println!(
                    "player {}: drops={} rejected={} score={}",
                    report.player_id, report.drops, report.rejected, report.score
                );
                match report.completion {
                    Some(completion) => println!("solved in {} ms", completion.elapsed_ms),
                    None => println!("not solved before the deadline"),
                }
            }
        },
        Commands::Play {
            puzzle,
            players,
            step_ms,
            rules,
            quiet,
        } => {
            let (image, difficulty, seed) = puzzle.resolve()?;
            let rules = match rules {
                Some(path) => GameRules::load(&path)?,
                None => GameRules::default(),
            };
            let options = PlayOptions {
                difficulty,
                image,
                rules,
                seed: seed.unwrap_or_else(rand::random),
                players,
                step_ms,
            };
            let report = play(&options, |board, progress| {
                if !quiet {
                    println!("{}", format_frame(board, progress));
                }
            })?;
            println!("{}", report.board);
            if let Some(completion) = report.completion {
                println!("solved in {} ms of simulated time", completion.elapsed_ms);
            }
            for player in &report.players {
                println!("{:<12} {:>6}", player.name, player.score);
            }
        }
    }
    Ok(())
}
