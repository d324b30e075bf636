use crate::api::ChatApi;
use crate::push::PushEvent;
use crate::store::ViewController;
use std::sync::Arc;
use tracing::{debug, warn};

/// Orchestrates the three producers that feed the view: the initial load, the
/// poll tick, and push-driven refreshes. Every fetch is an idempotent
/// full-replace, so overlapping refreshes for the same conversation settle
/// last-write-wins without coordination.
#[derive(Clone)]
pub struct SyncEngine {
    api: Arc<dyn ChatApi>,
    view: Arc<ViewController>,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn ChatApi>, view: Arc<ViewController>) -> Self {
        Self { api, view }
    }

    pub fn view(&self) -> &Arc<ViewController> {
        &self.view
    }

    /// Fetch the full conversation list and replace the snapshot. A non-silent
    /// failure empties the list (fail closed: a broken fetch must not leave
    /// stale data in front of a waiting user); a silent failure is swallowed
    /// so a transient poll error does not flicker existing content away.
    pub async fn load_conversations(&self, silent: bool) {
        self.view.begin_conversations_load(silent);
        let result = self.api.list_conversations().await;
        self.view.finish_conversations_load(silent);
        match result {
            Ok(list) => {
                if let Some((wa_id, gen)) = self.view.replace_conversations(list) {
                    self.load_messages_with_gen(&wa_id, false, gen).await;
                }
            }
            Err(err) if silent => {
                debug!("background conversation refresh failed: {err}");
            }
            Err(err) => {
                warn!("conversation fetch failed: {err}");
                self.view.clear_conversations();
            }
        }
    }

    /// Fetch the thread for `wa_id`. No-op on an empty id.
    pub async fn load_messages(&self, wa_id: &str, silent: bool) {
        if wa_id.is_empty() {
            return;
        }
        let gen = self.view.thread_gen();
        self.load_messages_with_gen(wa_id, silent, gen).await;
    }

    // The generation pins the fetch to the thread that was active when it was
    // triggered; the controller discards the result if the user switched away
    // in the meantime.
    async fn load_messages_with_gen(&self, wa_id: &str, silent: bool, gen: u64) {
        self.view.begin_messages_load(silent);
        match self.api.list_messages(wa_id).await {
            Ok(messages) => {
                if !self.view.apply_messages(gen, messages, silent) {
                    debug!("discarded stale thread fetch for {wa_id}");
                }
            }
            Err(err) if silent => {
                debug!("background thread refresh for {wa_id} failed: {err}");
            }
            Err(err) => {
                warn!("thread fetch for {wa_id} failed: {err}");
                self.view.fail_messages(gen, false);
            }
        }
    }

    /// Switch the active conversation and load its thread. Returns false when
    /// `wa_id` was already active, in which case nothing is fetched.
    pub async fn select_conversation(&self, wa_id: &str) -> bool {
        match self.view.select(wa_id) {
            Some(gen) => {
                self.load_messages_with_gen(wa_id, false, gen).await;
                true
            }
            None => false,
        }
    }

    /// One poll pass: silent refresh of the list, then of the active thread.
    pub async fn tick(&self) {
        self.load_conversations(true).await;
        if let Some(wa_id) = self.view.active_wa_id() {
            self.load_messages(&wa_id, true).await;
        }
    }

    /// React to a push event. Only insertions matter: they trigger a silent
    /// list refresh, plus a silent thread refresh when the inserted message
    /// belongs to the active conversation.
    pub async fn handle_push(&self, event: PushEvent) {
        if !event.is_insert() {
            return;
        }
        self.load_conversations(true).await;
        let Some(active) = self.view.active_wa_id() else {
            return;
        };
        let for_active = event
            .message
            .as_ref()
            .map(|m| m.wa_id == active)
            .unwrap_or(false);
        if for_active {
            self.load_messages(&active, true).await;
        }
    }
}
