use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kakera_core::codec::{decode, encode};
use kakera_core::{
    AdminMsg, ClientMsg, Difficulty, GameSnapshot, ImageRef, RoomUpdate, ServerMsg,
};
use kakera_room::{serve, AppState, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ROOM: &str = "WsRoom0001";

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = AppState::new(ServerConfig::local("secret")).expect("state");
    tokio::spawn(serve(listener, state));
    format!("ws://{addr}/ws/{ROOM}")
}

async fn send_frame(socket: &mut Socket, bytes: Vec<u8>) {
    socket.send(Message::Binary(bytes.into())).await.expect("send");
}

async fn send_admin(socket: &mut Socket, msg: &AdminMsg) {
    send_frame(socket, encode(msg).expect("encode")).await;
}

async fn send(socket: &mut Socket, msg: &ClientMsg) {
    send_frame(socket, encode(msg).expect("encode")).await;
}

async fn recv(socket: &mut Socket) -> ServerMsg {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for server")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Binary(bytes) = frame {
            return decode::<ServerMsg>(&bytes).expect("decode");
        }
    }
}

#[tokio::test]
async fn admin_creates_room_and_player_solves_it() {
    let base = start_server().await;

    let (mut admin, _) = connect_async(format!("{base}?admin_token=secret"))
        .await
        .expect("admin connect");
    send_admin(
        &mut admin,
        &AdminMsg::Create {
            difficulty: Difficulty { rows: 2, cols: 2 },
            image: ImageRef::catalog("harbor-dusk"),
            seed: Some(11),
            rules: None,
        },
    )
    .await;
    assert!(matches!(recv(&mut admin).await, ServerMsg::AdminAck { room_id } if room_id == ROOM));

    let (mut player, _) = connect_async(base.as_str()).await.expect("player connect");
    send(
        &mut player,
        &ClientMsg::Join {
            name: "ana".to_string(),
            resume: None,
        },
    )
    .await;
    let player_id = match recv(&mut player).await {
        ServerMsg::Welcome { player_id, .. } => player_id,
        other => panic!("expected welcome, got {other:?}"),
    };
    let mut snapshot: GameSnapshot = match recv(&mut player).await {
        ServerMsg::State { snapshot, .. } => snapshot,
        other => panic!("expected state, got {other:?}"),
    };
    assert_eq!(snapshot.seed, 11);

    let targets: Vec<_> = snapshot
        .pieces
        .iter()
        .filter(|piece| !piece.placed)
        .map(|piece| (piece.id, piece.correct_transform()))
        .collect();
    assert!(!targets.is_empty());
    for (piece, transform) in targets {
        send(&mut player, &ClientMsg::Drop { piece, transform }).await;
    }

    let mut completions = 0;
    loop {
        match recv(&mut player).await {
            ServerMsg::Update { update, .. } => {
                snapshot.apply_update(&update);
                if let RoomUpdate::Roster { players } = &update {
                    assert!(players.iter().any(|player| player.id == player_id));
                }
            }
            ServerMsg::Completed { completion, players } => {
                completions += 1;
                assert_eq!(completion.generation, 0);
                assert!(players.iter().any(|p| p.id == player_id && p.score > 0));
                break;
            }
            ServerMsg::Error { code, message } => panic!("{code}: {message}"),
            _ => {}
        }
    }
    assert_eq!(completions, 1);
    assert!(snapshot.progress().is_complete());

    send(&mut player, &ClientMsg::Ping { nonce: Some(5) }).await;
    loop {
        match recv(&mut player).await {
            ServerMsg::Pong { nonce } => {
                assert_eq!(nonce, Some(5));
                break;
            }
            ServerMsg::Completed { .. } => panic!("completion announced twice"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn bad_admin_token_is_refused() {
    let base = start_server().await;
    let (mut admin, _) = connect_async(format!("{base}?admin_token=nope"))
        .await
        .expect("connect");
    match recv(&mut admin).await {
        ServerMsg::Error { code, .. } => assert_eq!(code, "E_FORBIDDEN"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn joining_a_missing_room_fails() {
    let base = start_server().await;
    let (mut player, _) = connect_async(base.as_str()).await.expect("connect");
    send(
        &mut player,
        &ClientMsg::Join {
            name: "ana".to_string(),
            resume: None,
        },
    )
    .await;
    match recv(&mut player).await {
        ServerMsg::Error { code, .. } => assert_eq!(code, "E_NOT_FOUND"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn admin_change_puzzle_reaches_players() {
    let base = start_server().await;
    let (mut admin, _) = connect_async(format!("{base}?admin_token=secret"))
        .await
        .expect("admin connect");
    send_admin(
        &mut admin,
        &AdminMsg::Create {
            difficulty: Difficulty::EASY,
            image: ImageRef::catalog("harbor-dusk"),
            seed: Some(3),
            rules: None,
        },
    )
    .await;
    assert!(matches!(recv(&mut admin).await, ServerMsg::AdminAck { .. }));

    let (mut player, _) = connect_async(base.as_str()).await.expect("player connect");
    send(
        &mut player,
        &ClientMsg::Join {
            name: "ana".to_string(),
            resume: None,
        },
    )
    .await;
    assert!(matches!(recv(&mut player).await, ServerMsg::Welcome { .. }));
    assert!(matches!(recv(&mut player).await, ServerMsg::State { .. }));

    send_admin(
        &mut admin,
        &AdminMsg::ChangePuzzle {
            difficulty: Difficulty { rows: 0, cols: 2 },
            image: ImageRef::catalog("alpine-meadow"),
        },
    )
    .await;
    match recv(&mut admin).await {
        ServerMsg::Error { code, .. } => assert_eq!(code, "E_DIFFICULTY"),
        other => panic!("expected error, got {other:?}"),
    }

    send_admin(
        &mut admin,
        &AdminMsg::ChangePuzzle {
            difficulty: Difficulty::MEDIUM,
            image: ImageRef::catalog("alpine-meadow"),
        },
    )
    .await;
    assert!(matches!(recv(&mut admin).await, ServerMsg::AdminAck { room_id } if room_id == ROOM));
    loop {
        match recv(&mut player).await {
            ServerMsg::State { snapshot, .. } => {
                assert_eq!(snapshot.pieces.len(), 16);
                assert_eq!(snapshot.generation, 1);
                break;
            }
            ServerMsg::Update { .. } => {}
            other => panic!("expected state, got {other:?}"),
        }
    }
}
