use kakera_cli::{play, PlayOptions};
use kakera_core::{Difficulty, GameRules, ImageRef};

fn options(players: u32) -> PlayOptions {
    PlayOptions {
        difficulty: Difficulty { rows: 3, cols: 4 },
        image: ImageRef::catalog("lantern-street"),
        rules: GameRules::default(),
        seed: 1234,
        players,
        step_ms: 100,
    }
}

#[test]
fn local_play_solves_the_board() {
    let mut frames = 0;
    let mut last = None;
    let report = play(&options(3), |board, progress| {
        frames += 1;
        assert_eq!(board.placed_count() as u32, progress.placed);
        last = Some(progress);
    })
    .expect("play");

    let completion = report.completion.expect("solved");
    assert_eq!(completion.generation, 0);
    assert!(completion.elapsed_ms > 0);
    assert!(last.expect("frames").is_complete());
    assert_eq!(report.board, "####\n####\n####\n");
    assert!(frames >= 2);
    assert_eq!(report.players.len(), 3);
    assert!(report.players.iter().all(|player| player.score >= 50));
}

#[test]
fn same_seed_plays_out_identically() {
    let a = play(&options(2), |_, _| {}).expect("first");
    let b = play(&options(2), |_, _| {}).expect("second");
    assert_eq!(a.drops, b.drops);
    assert_eq!(a.completion, b.completion);
    let scores = |report: &kakera_cli::PlayReport| {
        report.players.iter().map(|player| player.score).collect::<Vec<_>>()
    };
    assert_eq!(scores(&a), scores(&b));
}
