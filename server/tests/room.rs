use kakera_core::{
    ClientMsg, Difficulty, GameRules, ImageRef, LeaveOutcome, RoomId, RoomUpdate, ServerMsg,
};
use kakera_room::{ErrorCode, Outbound, Room};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn room(difficulty: Difficulty) -> Room {
    Room::create(
        RoomId::parse("RoomTest01").expect("room id"),
        difficulty,
        ImageRef::catalog("harbor-dusk"),
        GameRules::default(),
        42,
        1_000,
    )
    .expect("room")
}

fn join(room: &mut Room, name: &str, now: i64) -> (u64, UnboundedReceiver<ServerMsg>) {
    let (tx, rx) = unbounded_channel();
    let (id, out) = room.join(name, None, tx, now);
    room.deliver(out);
    (id, rx)
}

fn drain(rx: &mut UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

fn error_codes(out: &[Outbound]) -> Vec<String> {
    out.iter()
        .filter_map(|message| match message {
            Outbound::Direct(_, ServerMsg::Error { code, .. }) => Some(code.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn join_sends_welcome_then_state_then_roster() {
    let mut room = room(Difficulty::EASY);
    let (id, mut rx) = join(&mut room, "ana", 1_000);
    let messages = drain(&mut rx);

    assert!(matches!(&messages[0], ServerMsg::Welcome { player_id, .. } if *player_id == id));
    match &messages[1] {
        ServerMsg::State { snapshot, .. } => {
            assert_eq!(snapshot.pieces.len(), 9);
            assert_eq!(snapshot.room_id, "RoomTest01");
        }
        other => panic!("expected state, got {other:?}"),
    }
    assert!(matches!(
        &messages[2],
        ServerMsg::Update {
            update: RoomUpdate::Roster { players },
            ..
        } if players.len() == 1 && players[0].host
    ));

    let (_, _rx2) = join(&mut room, "bo", 1_100);
    let roster = drain(&mut rx);
    assert_eq!(roster.len(), 1);
    assert_eq!(room.client_count(), 2);
}

#[test]
fn held_piece_is_refused_to_others() {
    let mut room = room(Difficulty::EASY);
    let (ana, _ana_rx) = join(&mut room, "ana", 1_000);
    let (bo, _bo_rx) = join(&mut room, "bo", 1_000);

    let out = room.handle(ana, ClientMsg::Grab { piece: 4 }, 2_000);
    assert!(error_codes(&out).is_empty());
    assert!(out.iter().any(|message| matches!(
        message,
        Outbound::Broadcast(ServerMsg::Update {
            update: RoomUpdate::Lock { piece: 4, owner: Some(owner), .. },
            ..
        }) if *owner == ana
    )));

    let out = room.handle(bo, ClientMsg::Grab { piece: 4 }, 2_100);
    assert_eq!(error_codes(&out), vec!["E_PIECE_HELD".to_string()]);
    let out = room.handle(bo, ClientMsg::Move { piece: 4, x: 0.0, y: 0.0 }, 2_200);
    assert_eq!(error_codes(&out), vec!["E_PIECE_HELD".to_string()]);
}

#[test]
fn solving_broadcasts_completion_once() {
    let mut room = room(Difficulty { rows: 2, cols: 2 });
    let (ana, mut ana_rx) = join(&mut room, "ana", 1_000);
    let (_bo, mut bo_rx) = join(&mut room, "bo", 1_000);
    drain(&mut ana_rx);
    drain(&mut bo_rx);

    let mut now = 2_000;
    for piece in 0..4 {
        let Some(state) = room.session().piece(piece) else {
            continue;
        };
        if state.placed {
            continue;
        }
        let transform = state.correct_transform();
        now += 50;
        let out = room.handle(ana, ClientMsg::Drop { piece, transform }, now);
        room.deliver(out);
    }
    assert!(room.session().is_completed());

    for rx in [&mut ana_rx, &mut bo_rx] {
        let completions: Vec<_> = drain(rx)
            .into_iter()
            .filter(|msg| matches!(msg, ServerMsg::Completed { .. }))
            .collect();
        assert_eq!(completions.len(), 1);
    }

    let transform = room.session().pieces()[0].correct_transform();
    let out = room.handle(ana, ClientMsg::Drop { piece: 0, transform }, now + 10);
    assert_eq!(error_codes(&out), vec!["E_COMPLETED".to_string()]);
}

#[test]
fn leaving_releases_the_lock_and_last_leave_empties() {
    let mut room = room(Difficulty::EASY);
    let (ana, _ana_rx) = join(&mut room, "ana", 1_000);
    let (bo, mut bo_rx) = join(&mut room, "bo", 1_000);
    room.handle(ana, ClientMsg::Grab { piece: 2 }, 2_000);
    drain(&mut bo_rx);

    let (outcome, out) = room.leave(ana);
    assert_eq!(
        outcome,
        LeaveOutcome::Left {
            new_host: Some(bo),
            released: Some(2)
        }
    );
    room.deliver(out);
    let messages = drain(&mut bo_rx);
    assert!(messages.iter().any(|msg| matches!(
        msg,
        ServerMsg::Update {
            update: RoomUpdate::Lock { piece: 2, owner: None, .. },
            ..
        }
    )));
    assert_eq!(room.session().lock_owner(2), None);

    let (outcome, _) = room.leave(bo);
    assert_eq!(outcome, LeaveOutcome::Empty { released: None });
    assert_eq!(room.client_count(), 0);
}

#[test]
fn offline_store_does_not_block_moves() {
    let mut room = room(Difficulty::EASY);
    let (ana, _rx) = join(&mut room, "ana", 1_000);
    room.store_mut().set_offline(true);

    let out = room.handle(ana, ClientMsg::Move { piece: 1, x: 2.5, y: 0.5 }, 2_000);
    assert!(error_codes(&out).is_empty());
    let piece = room.session().piece(1).expect("piece");
    assert_eq!(piece.current.position(), (2.5, 0.5));
}

#[test]
fn only_the_host_can_reshuffle() {
    let mut room = room(Difficulty::EASY);
    let (ana, mut ana_rx) = join(&mut room, "ana", 1_000);
    let (bo, _bo_rx) = join(&mut room, "bo", 1_000);
    drain(&mut ana_rx);

    let out = room.handle(bo, ClientMsg::Reshuffle { seed: None }, 2_000);
    assert_eq!(error_codes(&out), vec!["E_NOT_HOST".to_string()]);

    let out = room.handle(ana, ClientMsg::Reshuffle { seed: Some(9) }, 2_100);
    room.deliver(out);
    assert_eq!(room.session().generation(), 1);
    let messages = drain(&mut ana_rx);
    assert!(matches!(
        messages.as_slice(),
        [ServerMsg::State { snapshot, .. }] if snapshot.generation == 1 && snapshot.seed == 9
    ));
}

#[test]
fn stale_locks_are_swept() {
    let mut room = room(Difficulty::EASY);
    let (ana, _rx) = join(&mut room, "ana", 1_000);
    room.handle(ana, ClientMsg::Grab { piece: 0 }, 2_000);

    assert!(room.expire_locks(3_000).is_empty());
    let out = room.expire_locks(2_000 + GameRules::default().lock_timeout_ms as i64);
    assert_eq!(out.len(), 1);
    assert_eq!(room.session().lock_owner(0), None);
}

#[test]
fn change_puzzle_sends_one_fresh_state_to_everyone() {
    let mut room = room(Difficulty::EASY);
    let (_ana, mut ana_rx) = join(&mut room, "ana", 1_000);
    let (_bo, mut bo_rx) = join(&mut room, "bo", 1_000);
    drain(&mut ana_rx);
    drain(&mut bo_rx);

    let out = room
        .change_puzzle(Difficulty::MEDIUM, ImageRef::catalog("alpine-meadow"), 2_000)
        .expect("change puzzle");
    room.deliver(out);
    for rx in [&mut ana_rx, &mut bo_rx] {
        let messages = drain(rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMsg::State { snapshot, .. } => {
                assert_eq!(snapshot.pieces.len(), 16);
                assert_eq!(snapshot.generation, 1);
                assert_eq!(snapshot.image, ImageRef::catalog("alpine-meadow"));
            }
            other => panic!("expected state, got {other:?}"),
        }
    }
}

#[test]
fn change_puzzle_with_bad_grid_leaves_room_alone() {
    let mut room = room(Difficulty::EASY);
    let (_ana, mut ana_rx) = join(&mut room, "ana", 1_000);
    drain(&mut ana_rx);
    let before = room.session().snapshot(0);

    let err = match room.change_puzzle(
        Difficulty { rows: 0, cols: 4 },
        ImageRef::catalog("alpine-meadow"),
        2_000,
    ) {
        Ok(_) => panic!("zero-row grid was accepted"),
        Err(err) => err,
    };
    assert_eq!(err.error_code(), "E_DIFFICULTY");
    assert_eq!(room.session().snapshot(0), before);
    assert!(drain(&mut ana_rx).is_empty());
}

#[test]
fn stale_write_sends_only_the_error() {
    let mut room = room(Difficulty::EASY);
    let (ana, mut ana_rx) = join(&mut room, "ana", 1_000);
    let (bo, _bo_rx) = join(&mut room, "bo", 1_000);
    room.handle(bo, ClientMsg::Move { piece: 5, x: 0.4, y: 0.4 }, 9_000);
    room.handle(bo, ClientMsg::Release { piece: 5 }, 9_000);
    room.handle(ana, ClientMsg::Grab { piece: 1 }, 8_000);
    drain(&mut ana_rx);

    let out = room.handle(ana, ClientMsg::Move { piece: 5, x: 0.6, y: 0.6 }, 8_500);
    assert_eq!(error_codes(&out), vec!["E_STALE_WRITE".to_string()]);
    assert_eq!(out.len(), 1);
    assert_eq!(room.session().lock_owner(1), Some(ana));
    assert_eq!(room.session().lock_owner(5), None);
}

#[test]
fn completion_unlocks_pieces_held_by_others() {
    let mut room = room(Difficulty { rows: 1, cols: 3 });
    let (ana, mut ana_rx) = join(&mut room, "ana", 1_000);
    let (bo, _bo_rx) = join(&mut room, "bo", 1_000);

    let mut now = 2_000;
    for piece in 0..2 {
        now += 50;
        let transform = room.session().pieces()[piece as usize].correct_transform();
        let out = room.handle(ana, ClientMsg::Drop { piece, transform }, now);
        room.deliver(out);
    }
    if room.session().is_completed() {
        return;
    }
    now += 50;
    room.handle(bo, ClientMsg::Grab { piece: 0 }, now);
    drain(&mut ana_rx);

    now += 50;
    let transform = room.session().pieces()[2].correct_transform();
    let out = room.handle(ana, ClientMsg::Drop { piece: 2, transform }, now);
    room.deliver(out);
    assert!(room.session().is_completed());
    let messages = drain(&mut ana_rx);
    assert!(messages.iter().any(|msg| matches!(
        msg,
        ServerMsg::Update {
            update: RoomUpdate::Lock { piece: 0, owner: None, .. },
            ..
        }
    )));
}

#[test]
fn unjoined_room_is_abandoned_after_the_idle_ttl() {
    let mut room = room(Difficulty::EASY);
    assert!(!room.is_abandoned(60_000, 60_000));
    assert!(room.is_abandoned(61_000, 60_000));

    let (_ana, _rx) = join(&mut room, "ana", 2_000);
    assert!(!room.is_abandoned(1_000_000, 60_000));
}
