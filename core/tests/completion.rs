use kakera_core::{build_pieces, progress, CompletionLatch, Difficulty, Progress};

#[test]
fn progress_counts_placed_pieces() {
    let mut pieces = build_pieces(Difficulty::EASY);
    pieces[0].placed = false;
    pieces[4].placed = false;
    let progress = progress(&pieces);
    assert_eq!(progress, Progress { placed: 7, total: 9 });
    assert!(!progress.is_complete());
}

#[test]
fn empty_board_is_never_complete() {
    let progress = progress(&[]);
    assert!(!progress.is_complete());
    assert_eq!(progress.percent(), 0.0);
}

#[test]
fn latch_fires_once_per_generation() {
    let done = Progress { placed: 4, total: 4 };
    let partial = Progress { placed: 3, total: 4 };
    let mut latch = CompletionLatch::new(0);

    assert!(!latch.observe(0, partial));
    assert!(latch.observe(0, done));
    for _ in 0..5 {
        assert!(!latch.observe(0, done));
    }
    assert!(!latch.observe(0, partial));
    assert!(!latch.observe(0, done));
    assert!(latch.has_fired());
}

#[test]
fn latch_ignores_other_generations_until_reset() {
    let done = Progress { placed: 1, total: 1 };
    let mut latch = CompletionLatch::new(3);
    assert!(!latch.observe(2, done));
    assert!(latch.observe(3, done));

    latch.reset(4);
    assert!(!latch.has_fired());
    assert!(!latch.observe(3, done));
    assert!(latch.observe(4, done));
}
