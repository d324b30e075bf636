pub mod api;
pub mod config;
pub mod push;
pub mod send;
pub mod store;
pub mod sync;
pub mod timeline;
pub mod types;

pub use config::Config;
pub use send::SendOutcome;
pub use store::{ViewController, ViewState};

use crate::api::{ChatApi, HttpChatApi};
use crate::push::PushEvent;
use crate::send::SendPipeline;
use crate::sync::SyncEngine;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Default)]
struct ClientTasks {
    poll: Option<JoinHandle<()>>,
    push_listener: Option<JoinHandle<()>>,
    push_consumer: Option<JoinHandle<()>>,
}

/// Fully wired chat client: the view controller, the sync engine, the send
/// pipeline, and the background tasks (poll loop and push channel). Clone is
/// cheap; all clones share the same state and task registry.
#[derive(Clone)]
pub struct ChatClient {
    config: Config,
    view: Arc<ViewController>,
    sync: SyncEngine,
    send: SendPipeline,
    tasks: Arc<Mutex<ClientTasks>>,
}

impl ChatClient {
    pub fn new(config: Config) -> Self {
        let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(
            &config.api.base_url,
            config.auth.token.clone(),
        ));
        Self::with_api(config, api)
    }

    /// Wire the client around a custom [`ChatApi`] implementation.
    pub fn with_api(config: Config, api: Arc<dyn ChatApi>) -> Self {
        let view = Arc::new(ViewController::new());
        let sync = SyncEngine::new(api.clone(), view.clone());
        let send = SendPipeline::new(api, view.clone(), sync.clone());
        Self {
            config,
            view,
            sync,
            send,
            tasks: Arc::new(Mutex::new(ClientTasks::default())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn view(&self) -> &Arc<ViewController> {
        &self.view
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    /// Snapshot for renderers.
    pub fn state(&self) -> ViewState {
        self.view.snapshot()
    }

    /// Initial non-silent conversation load (which may auto-select the first
    /// conversation and fetch its thread), then the background refresh loops.
    pub async fn start(&self) {
        self.sync.load_conversations(false).await;
        self.spawn_poll();
        self.spawn_push();
    }

    pub async fn select_conversation(&self, wa_id: &str) {
        if self.sync.select_conversation(wa_id).await {
            // one push connection per active conversation; cycle it on switch
            self.spawn_push();
        }
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        self.send.send(text).await
    }

    pub async fn send_draft(&self) -> SendOutcome {
        self.send.send_draft().await
    }

    pub fn set_draft(&self, text: &str) {
        self.view.set_draft(text);
    }

    /// Stop the poll loop and the push channel. Idempotent.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        for handle in [
            tasks.poll.take(),
            tasks.push_listener.take(),
            tasks.push_consumer.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    fn tasks(&self) -> MutexGuard<'_, ClientTasks> {
        self.tasks.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn spawn_poll(&self) {
        let engine = self.sync.clone();
        let period = Duration::from_secs(self.config.sync.poll_interval_seconds.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first interval tick completes immediately; the initial load
            // already happened, so skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.tick().await;
            }
        });
        if let Some(old) = self.tasks().poll.replace(handle) {
            old.abort();
        }
    }

    fn spawn_push(&self) {
        if !self.config.sync.push_enabled {
            return;
        }
        let url = push::push_url(&self.config.api.base_url);
        let (tx, mut rx) = mpsc::channel::<PushEvent>(100);
        let listener = tokio::spawn(async move {
            push::run_push_listener(&url, tx).await;
        });
        let engine = self.sync.clone();
        let consumer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.handle_push(event).await;
            }
        });

        let mut tasks = self.tasks();
        if let Some(old) = tasks.push_listener.replace(listener) {
            old.abort();
        }
        if let Some(old) = tasks.push_consumer.replace(consumer) {
            old.abort();
        }
    }
}
