//! WebSocket plumbing shared by the admin command and the bot runner.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use kakera_core::codec::{decode, encode};
use kakera_core::{AdminMsg, ClientMsg, ServerMsg};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

pub type CliError = Box<dyn std::error::Error + Send + Sync>;
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWrite = SplitSink<WsStream, Message>;
pub type WsRead = SplitStream<WsStream>;

pub fn err_msg(message: impl Into<String>) -> CliError {
    message.into().into()
}

fn room_url(base_url: &str, room_id: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    let base_path = url.path().trim_end_matches('/');
    let path = format!("{base_path}/{room_id}");
    url.set_path(&path);
    Ok(url)
}

pub fn build_admin_url(base_url: &str, room_id: &str, token: &str) -> Result<Url, url::ParseError> {
    let mut url = room_url(base_url, room_id)?;
    url.set_query(None);
    url.query_pairs_mut().append_pair("admin_token", token);
    Ok(url)
}

pub fn build_join_url(base_url: &str, room_id: &str) -> Result<Url, url::ParseError> {
    let mut url = room_url(base_url, room_id)?;
    url.set_query(None);
    Ok(url)
}

/// Accepts decimal or `0x`-prefixed hex.
pub fn parse_seed_arg(raw: &str) -> Result<u32, CliError> {
    let trimmed = raw.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)?
    } else {
        trimmed.parse::<u32>()?
    };
    Ok(value)
}

pub async fn connect(url: &Url) -> Result<(WsWrite, WsRead), CliError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    Ok(ws.split())
}

pub async fn send_client_msg(write: &mut WsWrite, msg: &ClientMsg) -> Result<(), CliError> {
    let payload = encode(msg)?;
    write.send(Message::Binary(payload.into())).await?;
    Ok(())
}

pub async fn send_admin_msg(write: &mut WsWrite, msg: &AdminMsg) -> Result<(), CliError> {
    let payload = encode(msg)?;
    write.send(Message::Binary(payload.into())).await?;
    Ok(())
}

/// `Ok(None)` when nothing decodable arrived within `dur`.
pub async fn recv_server_msg_timeout(
    read: &mut WsRead,
    dur: Duration,
) -> Result<Option<ServerMsg>, CliError> {
    let frame = match timeout(dur, read.next()).await {
        Err(_) => return Ok(None),
        Ok(None) => return Err(err_msg("server closed the connection")),
        Ok(Some(frame)) => frame?,
    };
    match frame {
        Message::Binary(bytes) => Ok(Some(decode::<ServerMsg>(&bytes)?)),
        Message::Close(frame) => Err(err_msg(format!("server closed: {frame:?}"))),
        _ => Ok(None),
    }
}

/// Sends one admin command and waits for the server's answer.
pub async fn create_room(
    base_url: &str,
    admin_token: &str,
    room_id: &str,
    msg: &AdminMsg,
) -> Result<ServerMsg, CliError> {
    let url = build_admin_url(base_url, room_id, admin_token)?;
    let (mut write, mut read) = connect(&url).await?;
    send_admin_msg(&mut write, msg).await?;
    let reply = recv_server_msg_timeout(&mut read, Duration::from_secs(10))
        .await?
        .ok_or_else(|| err_msg("no reply from server"))?;
    let _ = write.close().await;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_append_room_and_token() {
        let admin = build_admin_url("ws://localhost:8787/ws/", "Abc123XYZ0", "tok").expect("url");
        assert_eq!(admin.as_str(), "ws://localhost:8787/ws/Abc123XYZ0?admin_token=tok");
        let join = build_join_url("ws://localhost:8787/ws?x=1", "Abc123XYZ0").expect("url");
        assert_eq!(join.as_str(), "ws://localhost:8787/ws/Abc123XYZ0");
    }

    #[test]
    fn seeds_parse_as_hex_or_decimal() {
        assert_eq!(parse_seed_arg("0x10").expect("hex"), 16);
        assert_eq!(parse_seed_arg(" 42 ").expect("dec"), 42);
        assert!(parse_seed_arg("nope").is_err());
    }
}
