#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use zycare_relay::app_state::AppState;
use zycare_relay::config::RelayConfig;
use zycare_relay::domain::RoomName;
use zycare_relay::server;

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay bound to an ephemeral local port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestRelay {
    pub async fn start() -> Self {
        Self::start_with(RelayConfig::default()).await
    }

    pub async fn start_with(config: RelayConfig) -> Self {
        let state = AppState::new(&config);
        let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(server::serve(listener, state.clone()));
        Self { addr, state }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Polls until `room` has exactly `count` members.
    pub async fn wait_for_members(&self, room: &str, count: usize) {
        let room = RoomName::new(room);
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while self.state.registry.members(&room).await.len() != count {
            if tokio::time::Instant::now() > deadline {
                panic!("room {room} never reached {count} members");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_connections(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while self.state.registry.connection_count().await != count {
            if tokio::time::Instant::now() > deadline {
                panic!("never reached {count} connections");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn client(&self) -> TestClient {
        let Ok((stream, _)) = connect_async(self.ws_url()).await else {
            panic!("ws connect failed");
        };
        let (tx, rx) = stream.split();
        TestClient { tx, rx }
    }

    pub async fn doctor(&self, id: &str) -> TestClient {
        let members = self.state.registry.members(&RoomName::new(format!("doctor_{id}"))).await;
        let mut client = self.client().await;
        client.emit("join_doctor_room", json!(id)).await;
        self.wait_for_members(&format!("doctor_{id}"), members.len() + 1)
            .await;
        client
    }

    pub async fn patient(&self, id: &str) -> TestClient {
        let members = self.state.registry.members(&RoomName::new(format!("patient_{id}"))).await;
        let mut client = self.client().await;
        client.emit("join_patient_room", json!(id)).await;
        self.wait_for_members(&format!("patient_{id}"), members.len() + 1)
            .await;
        client
    }
}

/// Raw socket client speaking the relay's frame format.
pub struct TestClient {
    tx: SplitSink<Stream, Message>,
    rx: SplitStream<Stream>,
}

impl TestClient {
    pub async fn emit(&mut self, event: &str, data: Value) {
        let frame = json!({"event": event, "data": data}).to_string();
        if self.tx.send(Message::text(frame)).await.is_err() {
            panic!("send failed");
        }
    }

    pub async fn send_raw(&mut self, text: &str) {
        if self.tx.send(Message::text(text.to_string())).await.is_err() {
            panic!("send failed");
        }
    }

    /// Next event frame as `(event, data)`.
    pub async fn recv(&mut self) -> (String, Value) {
        match self.try_recv(RECV_TIMEOUT).await {
            Some(frame) => frame,
            None => panic!("no event within {RECV_TIMEOUT:?}"),
        }
    }

    /// Next event frame, or `None` if nothing arrives in `wait` or the
    /// socket closes.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<(String, Value)> {
        loop {
            let msg = tokio::time::timeout(wait, self.rx.next()).await.ok()??;
            match msg {
                Ok(Message::Text(text)) => {
                    let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                        panic!("non-JSON frame: {text}");
                    };
                    let event = value
                        .get("event")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let data = value.get("data").cloned().unwrap_or(Value::Null);
                    return Some((event, data));
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Asserts nothing arrives for a short while.
    pub async fn assert_silent(&mut self) {
        if let Some((event, data)) = self.try_recv(Duration::from_millis(150)).await {
            panic!("unexpected {event}: {data}");
        }
    }

    /// Close code of the server's close frame, skipping frames before it.
    /// `None` if the socket ends without one or stays open.
    pub async fn close_code(&mut self) -> Option<u16> {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.rx.next()).await {
                Ok(Some(Ok(Message::Close(frame)))) => return frame.map(|f| u16::from(f.code)),
                Ok(Some(Ok(_))) => {}
                _ => return None,
            }
        }
    }

    /// Returns `true` once the server has closed the socket.
    pub async fn is_closed(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.rx.next()).await {
                Ok(None | Some(Err(_)) | Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }
}
