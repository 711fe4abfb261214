//! WebSocket mock of the recognition endpoint.
//!
//! Accepts one connection per test, records the handshake and every frame the
//! client sends, and answers with a scripted reply.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How the mock answers once the client has finished streaming.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// One final result with `transcript`, then the completion signal.
    Transcribe { transcript: String },
    /// An inactivity timeout error, then a server-side close.
    InactivityTimeout,
    /// Rejects the start frame with an error, then closes.
    Reject { message: String },
}

/// What the mock saw on its connection.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub uri: String,
    pub authorization: Option<String>,
    pub learning_opt_out: Option<String>,
    pub start: Option<Value>,
    pub chunk_sizes: Vec<usize>,
    pub stop_received: bool,
    pub close_action_received: bool,
    pub close_code: Option<u16>,
}

pub struct WatsonWebSocketMock {
    pub addr: SocketAddr,
    pub recorded: Arc<Mutex<Recorded>>,
    handle: JoinHandle<()>,
}

impl WatsonWebSocketMock {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let state = recorded.clone();
        let handle = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                if let Err(e) = handle_connection(stream, behavior, state).await {
                    eprintln!("Mock connection error: {e}");
                }
            }
        });

        Self {
            addr,
            recorded,
            handle,
        }
    }

    /// HTTP base URL the client should be configured with.
    pub fn service_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the connection to finish and return what was recorded.
    pub async fn finish(self) -> Recorded {
        let _ = self.handle.await;
        self.recorded.lock().clone()
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: MockBehavior,
    state: Arc<Mutex<Recorded>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handshake_state = state.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let mut recorded = handshake_state.lock();
        recorded.uri = request.uri().to_string();
        recorded.authorization = header("authorization");
        recorded.learning_opt_out = header("x-watson-learning-opt-out");
        Ok(response)
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Binary(data) => state.lock().chunk_sizes.push(data.len()),
            Message::Text(text) => {
                let frame: Value = serde_json::from_str(text.as_str())?;
                match frame["action"].as_str() {
                    Some("start") => {
                        state.lock().start = Some(frame.clone());
                        if let MockBehavior::Reject { message } = &behavior {
                            write
                                .send(Message::Text(json!({"error": message}).to_string().into()))
                                .await?;
                            write.close().await?;
                            break;
                        }
                        write
                            .send(Message::Text(json!({"state": "listening"}).to_string().into()))
                            .await?;
                    }
                    Some("stop") => {
                        state.lock().stop_received = true;
                        match &behavior {
                            MockBehavior::Transcribe { transcript } => {
                                let results = json!({
                                    "result_index": 0,
                                    "results": [{
                                        "final": true,
                                        "alternatives": [{"transcript": transcript, "confidence": 0.93}]
                                    }]
                                });
                                write.send(Message::Text(results.to_string().into())).await?;
                                write
                                    .send(Message::Text(
                                        json!({"state": "listening"}).to_string().into(),
                                    ))
                                    .await?;
                            }
                            MockBehavior::InactivityTimeout => {
                                let error = json!({"error": "No speech detected for 5s."});
                                write.send(Message::Text(error.to_string().into())).await?;
                                write.close().await?;
                                break;
                            }
                            MockBehavior::Reject { .. } => {}
                        }
                    }
                    Some("close") => state.lock().close_action_received = true,
                    _ => {}
                }
            }
            Message::Close(frame) => {
                state.lock().close_code = frame.map(|f| u16::from(f.code));
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
