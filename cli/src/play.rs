//! Headless local game: a few simulated players solve a board in-process
//! while a text view mirrors the pieces.

use std::collections::HashMap;
use std::fmt::Write as _;

use kakera_core::{
    sync_view, Completion, Difficulty, GameRules, GameSession, ImageRef, PieceView, Player,
    Progress, RoomId, SessionError, Transform,
};
use tracing::debug;

/// Character grid over the home cells; `#` where the home piece is placed.
#[derive(Debug, Clone)]
pub struct TextBoard {
    rows: u32,
    cols: u32,
    cells: HashMap<u32, (Transform, bool)>,
    writes: usize,
}

impl TextBoard {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            rows: difficulty.rows,
            cols: difficulty.cols,
            cells: HashMap::new(),
            writes: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn placed_count(&self) -> usize {
        self.cells.values().filter(|(_, placed)| *placed).count()
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(((self.cols + 1) * self.rows) as usize);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let id = row * self.cols + col;
                let placed = self.cells.get(&id).map(|(_, placed)| *placed).unwrap_or(false);
                out.push(if placed { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }
}

impl PieceView for TextBoard {
    fn set_transform(&mut self, piece: u32, transform: Transform, placed: bool) {
        self.cells.insert(piece, (transform, placed));
        self.writes += 1;
    }

    fn read_transform(&self, piece: u32) -> Option<Transform> {
        self.cells.get(&piece).map(|(transform, _)| *transform)
    }
}

#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub difficulty: Difficulty,
    pub image: ImageRef,
    pub rules: GameRules,
    pub seed: u32,
    pub players: u32,
    /// Simulated time between two actions; the clock never runs backwards.
    pub step_ms: u32,
}

#[derive(Debug, Clone)]
pub struct PlayReport {
    pub completion: Option<Completion>,
    pub players: Vec<Player>,
    pub drops: u32,
    pub board: String,
}

/// Runs a local game to completion. `on_frame` sees the view after every drop.
pub fn play<F>(options: &PlayOptions, mut on_frame: F) -> Result<PlayReport, SessionError>
where
    F: FnMut(&TextBoard, Progress),
{
    let room_id = RoomId::generate(&mut rand::rng());
    let step_ms = i64::from(options.step_ms);
    let mut now = 0i64;
    let mut session = GameSession::new(
        room_id,
        options.difficulty,
        options.image.clone(),
        options.rules,
        options.seed,
        now,
    )?;
    let players = options.players.max(1) as u64;
    for player in 1..=players {
        session.join(player, &format!("local-{player}"), now);
    }

    let mut board = TextBoard::new(options.difficulty);
    sync_view(session.pieces(), &mut board);
    on_frame(&board, session.progress());

    let loose: Vec<u32> = session
        .pieces()
        .iter()
        .filter(|piece| !piece.placed)
        .map(|piece| piece.id)
        .collect();
    let mut drops = 0u32;
    let mut completion = session.completion().copied();
    for (turn, piece) in loose.into_iter().enumerate() {
        if completion.is_some() {
            break;
        }
        let player = (turn as u64 % players) + 1;
        now += step_ms;
        session.grab(player, piece, now)?;

        let target = session
            .piece(piece)
            .map(|piece| piece.correct_transform())
            .ok_or(SessionError::UnknownPiece(piece))?;
        if let Some(current) = session.piece(piece).map(|piece| piece.current) {
            let mid_x = (current.x + target.x) * 0.5;
            let mid_y = (current.y + target.y) * 0.5;
            now += step_ms;
            let change = session.move_piece(player, piece, mid_x, mid_y, now)?;
            if change.completion.is_some() {
                completion = change.completion;
                sync_view(session.pieces(), &mut board);
                on_frame(&board, session.progress());
                break;
            }
        }
        now += step_ms;
        let change = session.drop_piece(player, piece, target, now)?;
        drops += 1;
        sync_view(session.pieces(), &mut board);
        debug!(piece, player, placed = change.placed, "local drop");
        on_frame(&board, session.progress());
        if change.completion.is_some() {
            completion = change.completion;
        }
    }

    Ok(PlayReport {
        completion,
        players: session.players().to_vec(),
        drops,
        board: board.render(),
    })
}

/// One line per frame: the board followed by a progress bar.
pub fn format_frame(board: &TextBoard, progress: Progress) -> String {
    let mut out = board.render();
    let _ = writeln!(
        out,
        "{}/{} placed ({:.0}%)",
        progress.placed,
        progress.total,
        progress.percent()
    );
    out
}
