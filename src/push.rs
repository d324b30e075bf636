use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

pub const INSERT_EVENT: &str = "insert";

/// Server-to-client notification frame. The push channel is a latency
/// optimization only; polling remains the reliability fallback, so anything
/// unrecognized here is simply dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Option<PushMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    #[serde(rename = "waId")]
    pub wa_id: String,
}

impl PushEvent {
    pub fn is_insert(&self) -> bool {
        self.kind == INSERT_EVENT
    }
}

/// Derive the push endpoint from the HTTP base URL: swap the scheme for its
/// WebSocket counterpart and append `/ws`.
pub fn push_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}/ws")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}/ws")
    } else {
        format!("{base}/ws")
    }
}

/// Lenient frame parse; malformed payloads become `None`.
pub fn parse_push_frame(text: &str) -> Option<PushEvent> {
    serde_json::from_str(text).ok()
}

/// Connect to the push endpoint and forward parsed events into `tx` until the
/// connection closes or the receiver goes away. All transport errors are
/// swallowed at debug level — the caller must never depend on this task for
/// correctness.
pub async fn run_push_listener(url: &str, tx: mpsc::Sender<PushEvent>) {
    let mut stream = match connect_async(url).await {
        Ok((stream, _)) => stream,
        Err(err) => {
            debug!("push channel unavailable at {url}: {err}");
            return;
        }
    };

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!("push channel closed: {err}");
                return;
            }
        };
        let WsMessage::Text(text) = frame else {
            continue;
        };
        if let Some(event) = parse_push_frame(text.as_str()) {
            if tx.send(event).await.is_err() {
                return;
            }
        }
    }
}
