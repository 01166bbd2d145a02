use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use doodle_core::net::messages::{ClientMessage, ServerMessage};
use doodle_core::net::protocol::{decode_server_message, encode_client_message};

use doodle_server::build_app;
use doodle_server::config::{GameConfig, ServerConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server whose word bank only contains "cat".
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, room_id: &str, name: &str) -> String {
        format!("ws://{}/ws/{room_id}/{name}", self.addr)
    }

    /// Connect and consume the scoreboard sent on join.
    pub async fn join(&self, room_id: &str, name: &str) -> WsStream {
        let mut stream = ws_connect(&self.ws_url(room_id, name)).await;
        match ws_read_server_msg(&mut stream).await {
            ServerMessage::ScoresUpdate { scores } => {
                assert_eq!(scores.get(name), 0, "joiner should be on the scoreboard");
            },
            other => panic!("Expected ScoresUpdate, got: {other:?}"),
        }
        stream
    }
}

/// Defaults with a deterministic one-word bank.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        game: GameConfig {
            words: Some(vec!["cat".to_string()]),
            ..GameConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Read the next text frame (5s timeout).
pub async fn ws_read_text(stream: &mut WsStream) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerMessage (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let text = ws_read_text(stream).await;
    decode_server_message(&text).unwrap()
}

/// Read the next ServerMessage that is not a countdown update.
pub async fn ws_read_non_tick(stream: &mut WsStream) -> ServerMessage {
    loop {
        let msg = ws_read_server_msg(stream).await;
        if !matches!(msg, ServerMessage::TimeUpdate { .. }) {
            return msg;
        }
    }
}

/// Like `ws_read_non_tick`, but returns None if nothing arrives in time.
pub async fn ws_try_read_non_tick(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), ws_read_non_tick(stream))
        .await
        .ok()
}

/// Send a ClientMessage as a text frame.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

pub async fn ws_send_raw(stream: &mut WsStream, text: &str) {
    stream.send(Message::Text(text.into())).await.unwrap();
}

pub async fn ws_guess(stream: &mut WsStream, guess: &str) {
    let msg = ClientMessage::Guess {
        guess: guess.to_string(),
    };
    ws_send_client_msg(stream, &msg).await;
}

/// Wait until the socket is closed by the server (5s timeout).
pub async fn ws_expect_closed(stream: &mut WsStream) {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for close");
}
