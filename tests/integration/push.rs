use axum::extract::ws::{Message as WsFrame, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use wachat::config::{ApiConfig, AuthConfig, SyncConfig};
use wachat::push::{push_url, run_push_listener, PushEvent};
use wachat::types::{Conversation, Direction, Message, Timestamps};
use wachat::{ChatClient, Config};

/// In-process stand-in for the chat backend: JSON endpoints over shared state
/// plus a `/ws` route that fans broadcast frames out to every subscriber.
#[derive(Clone)]
struct TestBackend {
    conversations: Arc<Mutex<Vec<Conversation>>>,
    messages: Arc<Mutex<Vec<Message>>>,
    push_tx: broadcast::Sender<String>,
    connections: Arc<std::sync::atomic::AtomicUsize>,
}

impl TestBackend {
    fn new() -> Self {
        let (push_tx, _) = broadcast::channel(16);
        Self {
            conversations: Arc::new(Mutex::new(Vec::new())),
            messages: Arc::new(Mutex::new(Vec::new())),
            push_tx,
            connections: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    fn set_conversations(&self, list: Vec<Conversation>) {
        *self.conversations.lock().unwrap() = list;
    }

    fn add_message(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    fn push_frame(&self, frame: &str) {
        let _ = self.push_tx.send(frame.to_string());
    }

    fn subscribers(&self) -> usize {
        self.push_tx.receiver_count()
    }

    /// Total connections ever accepted on `/ws`.
    fn connections(&self) -> usize {
        self.connections.load(std::sync::atomic::Ordering::SeqCst)
    }
}

async fn list_conversations(State(backend): State<TestBackend>) -> Json<Vec<Conversation>> {
    Json(backend.conversations.lock().unwrap().clone())
}

async fn list_messages(
    State(backend): State<TestBackend>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Message>> {
    let wa_id = params.get("wa_id").cloned().unwrap_or_default();
    let rows = backend
        .messages
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.wa_id == wa_id)
        .cloned()
        .collect();
    Json(rows)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn ws_handler(State(backend): State<TestBackend>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let rx = backend.push_tx.subscribe();
    backend
        .connections
        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    ws.on_upgrade(move |socket| stream_push(socket, rx))
}

async fn stream_push(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Ok(frame) = frame else { break };
                if socket.send(WsFrame::Text(frame)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

async fn serve(backend: TestBackend) -> String {
    let app = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/messages", get(list_messages))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn convo(wa_id: &str, name: &str) -> Conversation {
    Conversation {
        wa_id: wa_id.to_string(),
        name: Some(name.to_string()),
        last_message_text: None,
        last_message_at: None,
        last_message_direction: None,
        last_message_status: None,
    }
}

fn message(id: &str, wa_id: &str) -> Message {
    Message {
        id: id.to_string(),
        wa_id: wa_id.to_string(),
        name: None,
        direction: Direction::Inbound,
        text: Some("hey".to_string()),
        kind: Some("text".to_string()),
        status: None,
        timestamps: Timestamps {
            whatsapp: 1754300000,
            ..Timestamps::default()
        },
    }
}

fn push_config(base_url: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
        },
        auth: AuthConfig::default(),
        sync: SyncConfig {
            // polling far in the future; only the push channel drives updates
            poll_interval_seconds: 300,
            push_enabled: true,
        },
    }
}

async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn test_listener_forwards_valid_frames_only() {
    let backend = TestBackend::new();
    let base = serve(backend.clone()).await;
    let url = push_url(&base);

    let (tx, mut rx) = mpsc::channel::<PushEvent>(16);
    let listener = tokio::spawn(async move {
        run_push_listener(&url, tx).await;
    });
    wait_until("push subscriber", || backend.subscribers() > 0).await;

    backend.push_frame("definitely not json");
    backend.push_frame(r#"{"type":"insert","message":{"waId":"A"}}"#);

    let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(event.is_insert());
    assert_eq!(event.message.unwrap().wa_id, "A");

    // the malformed frame never surfaced
    assert!(
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .is_err()
    );
    listener.abort();
}

#[tokio::test]
async fn test_insert_for_active_conversation_refreshes_thread() {
    let backend = TestBackend::new();
    backend.set_conversations(vec![convo("A", "Asha")]);
    backend.add_message(message("A-0", "A"));
    let base = serve(backend.clone()).await;

    let client = ChatClient::new(push_config(&base));
    client.start().await;
    assert_eq!(client.state().active_wa_id.as_deref(), Some("A"));
    assert_eq!(client.state().messages.len(), 1);
    wait_until("push subscriber", || backend.subscribers() > 0).await;

    backend.add_message(message("A-1", "A"));
    backend.push_frame(r#"{"type":"insert","message":{"waId":"A"}}"#);

    let probe = client.clone();
    wait_until("thread refresh", move || probe.state().messages.len() == 2).await;
    client.shutdown();
}

#[tokio::test]
async fn test_insert_for_other_conversation_refreshes_list_only() {
    let backend = TestBackend::new();
    backend.set_conversations(vec![convo("A", "Asha"), convo("B", "Ben")]);
    backend.add_message(message("A-0", "A"));
    let base = serve(backend.clone()).await;

    let client = ChatClient::new(push_config(&base));
    client.start().await;
    assert_eq!(client.state().messages.len(), 1);
    wait_until("push subscriber", || backend.subscribers() > 0).await;

    // backend gains a message for A and a new conversation, but the event
    // names B: the list refreshes, the active thread must not
    backend.add_message(message("A-1", "A"));
    backend.add_message(message("B-0", "B"));
    backend.set_conversations(vec![
        convo("A", "Asha"),
        convo("B", "Ben"),
        convo("C", "Chen"),
    ]);
    backend.push_frame(r#"{"type":"insert","message":{"waId":"B"}}"#);

    let probe = client.clone();
    wait_until("list refresh", move || {
        probe.state().conversations.len() == 3
    })
    .await;
    assert_eq!(client.state().messages.len(), 1);

    // a matching event then catches the thread up
    backend.push_frame(r#"{"type":"insert","message":{"waId":"A"}}"#);
    let probe = client.clone();
    wait_until("thread refresh", move || probe.state().messages.len() == 2).await;

    client.shutdown();
}

#[tokio::test]
async fn test_non_insert_events_are_ignored() {
    let backend = TestBackend::new();
    backend.set_conversations(vec![convo("A", "Asha")]);
    let base = serve(backend.clone()).await;

    let client = ChatClient::new(push_config(&base));
    client.start().await;
    wait_until("push subscriber", || backend.subscribers() > 0).await;

    backend.set_conversations(vec![convo("A", "Asha"), convo("B", "Ben")]);
    backend.push_frame(r#"{"type":"presence"}"#);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(client.state().conversations.len(), 1);

    backend.push_frame(r#"{"type":"insert","message":{"waId":"B"}}"#);
    let probe = client.clone();
    wait_until("list refresh", move || {
        probe.state().conversations.len() == 2
    })
    .await;

    client.shutdown();
}

#[tokio::test]
async fn test_switching_conversation_cycles_connection() {
    let backend = TestBackend::new();
    backend.set_conversations(vec![convo("A", "Asha"), convo("B", "Ben")]);
    backend.add_message(message("A-0", "A"));
    backend.add_message(message("B-0", "B"));
    let base = serve(backend.clone()).await;

    let client = ChatClient::new(push_config(&base));
    client.start().await;
    wait_until("push subscriber", || backend.subscribers() > 0).await;

    client.select_conversation("B").await;
    // the switch must open a second connection, and the fresh one still
    // delivers events
    wait_until("second push connection", || backend.connections() >= 2).await;

    backend.add_message(message("B-1", "B"));
    backend.push_frame(r#"{"type":"insert","message":{"waId":"B"}}"#);
    let probe = client.clone();
    wait_until("thread refresh", move || probe.state().messages.len() == 2).await;

    client.shutdown();
}

#[tokio::test]
async fn test_push_disabled_never_connects() {
    let backend = TestBackend::new();
    backend.set_conversations(vec![convo("A", "Asha")]);
    let base = serve(backend.clone()).await;

    let mut config = push_config(&base);
    config.sync.push_enabled = false;
    let client = ChatClient::new(config);
    client.start().await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.subscribers(), 0);

    client.shutdown();
}

#[tokio::test]
async fn test_client_survives_missing_push_endpoint() {
    // HTTP works, /ws does not: the push channel is optional by contract
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/conversations"))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(json!([{"waId": "A", "name": "Asha"}])),
        )
        .mount(&server)
        .await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/messages"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = ChatClient::new(push_config(&server.uri()));
    client.start().await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let state = client.state();
    assert_eq!(state.active_wa_id.as_deref(), Some("A"));
    assert_eq!(state.conversations.len(), 1);

    client.shutdown();
}
