use crate::types::{Conversation, Message};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Per-session view state. Never persisted; renderers consume clones via
/// [`ViewController::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub conversations: Vec<Conversation>,
    pub active_wa_id: Option<String>,
    pub messages: Vec<Message>,
    pub draft: String,
    pub sending: bool,
    pub conversations_loading: bool,
    pub messages_loading: bool,
}

impl ViewState {
    pub fn active_conversation(&self) -> Option<&Conversation> {
        let active = self.active_wa_id.as_deref()?;
        self.conversations.iter().find(|c| c.wa_id == active)
    }
}

/// Single writer over [`ViewState`]. Every producer — initial load, poll tick,
/// push refresh, send pipeline — mutates through these methods; nothing hands
/// out a reference into the locked state.
///
/// The thread generation counter is bumped whenever the active conversation
/// changes. Message fetches capture the generation at start and their results
/// are applied only while it is still current, so a late response for a
/// previously active conversation is discarded instead of clobbering the new
/// thread.
pub struct ViewController {
    state: Mutex<ViewState>,
    thread_gen: AtomicU64,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ViewState::default()),
            thread_gen: AtomicU64::new(0),
        }
    }

    // A poisoned lock only means a writer panicked mid-update; the state is
    // still structurally valid, so take it as-is.
    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn snapshot(&self) -> ViewState {
        self.state().clone()
    }

    pub fn active_wa_id(&self) -> Option<String> {
        self.state().active_wa_id.clone()
    }

    pub fn thread_gen(&self) -> u64 {
        self.thread_gen.load(Ordering::SeqCst)
    }

    fn bump_thread_gen(&self) -> u64 {
        self.thread_gen.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Wholesale snapshot replace of the conversation list. If nothing was
    /// active and the list is non-empty, the first entry becomes active — a
    /// one-time default; an existing selection is never overridden. Returns
    /// the newly selected id and its thread generation so the caller can
    /// fetch that thread.
    pub fn replace_conversations(&self, list: Vec<Conversation>) -> Option<(String, u64)> {
        let mut state = self.state();
        state.conversations = list;
        if state.active_wa_id.is_some() {
            return None;
        }
        let wa_id = state.conversations.first()?.wa_id.clone();
        state.active_wa_id = Some(wa_id.clone());
        state.messages.clear();
        Some((wa_id, self.bump_thread_gen()))
    }

    pub fn clear_conversations(&self) {
        self.state().conversations.clear();
    }

    pub fn begin_conversations_load(&self, silent: bool) {
        if !silent {
            self.state().conversations_loading = true;
        }
    }

    pub fn finish_conversations_load(&self, silent: bool) {
        if !silent {
            self.state().conversations_loading = false;
        }
    }

    /// Switch the active conversation. Returns the new thread generation, or
    /// `None` when `wa_id` is already active (no refetch in that case).
    pub fn select(&self, wa_id: &str) -> Option<u64> {
        let mut state = self.state();
        if state.active_wa_id.as_deref() == Some(wa_id) {
            return None;
        }
        state.active_wa_id = Some(wa_id.to_string());
        state.messages.clear();
        state.messages_loading = false;
        Some(self.bump_thread_gen())
    }

    pub fn begin_messages_load(&self, silent: bool) {
        if !silent {
            self.state().messages_loading = true;
        }
    }

    /// Apply a fetched thread. Discarded (returns false) when `gen` is no
    /// longer the current thread generation. Only a non-silent fetch touches
    /// the loading flag; a silent refresh must never flicker the skeleton.
    pub fn apply_messages(&self, gen: u64, messages: Vec<Message>, silent: bool) -> bool {
        let mut state = self.state();
        if gen != self.thread_gen.load(Ordering::SeqCst) {
            return false;
        }
        state.messages = messages;
        if !silent {
            state.messages_loading = false;
        }
        true
    }

    /// Failure path of a thread fetch. Stale generations are ignored
    /// entirely; a silent failure preserves the current thread; a non-silent
    /// one empties it (fail closed) and drops the skeleton.
    pub fn fail_messages(&self, gen: u64, silent: bool) {
        let mut state = self.state();
        if gen != self.thread_gen.load(Ordering::SeqCst) {
            return;
        }
        if !silent {
            state.messages.clear();
            state.messages_loading = false;
        }
    }

    pub fn append_message(&self, message: Message) {
        self.state().messages.push(message);
    }

    /// Replace a message by identity, preserving its position. Returns false
    /// when no message with `id` is present (e.g. rolled back meanwhile).
    pub fn replace_message(&self, id: &str, replacement: Message) -> bool {
        let mut state = self.state();
        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(slot) => {
                *slot = replacement;
                true
            }
            None => false,
        }
    }

    pub fn remove_message(&self, id: &str) -> bool {
        let mut state = self.state();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        state.messages.len() != before
    }

    pub fn set_draft(&self, draft: &str) {
        self.state().draft = draft.to_string();
    }

    pub fn take_draft(&self) -> String {
        std::mem::take(&mut self.state().draft)
    }

    pub fn set_sending(&self, sending: bool) {
        self.state().sending = sending;
    }
}
