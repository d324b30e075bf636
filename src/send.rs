use crate::api::ChatApi;
use crate::store::ViewController;
use crate::sync::SyncEngine;
use crate::types::{Direction, Message, MessageStatus, NewMessage, Timestamps, LOCAL_ID_PREFIX};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Preconditions failed; nothing was appended and no request was issued.
    Rejected,
    /// The server confirmed the message and the placeholder was swapped for
    /// the authoritative record.
    Confirmed,
    /// The request failed and the placeholder was removed again.
    RolledBack,
}

pub fn local_message_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4().simple())
}

fn placeholder_message(wa_id: &str, text: &str, now: i64) -> Message {
    Message {
        id: local_message_id(),
        wa_id: wa_id.to_string(),
        name: None,
        direction: Direction::Outbound,
        text: Some(text.to_string()),
        kind: Some("text".to_string()),
        status: Some(MessageStatus::Sent),
        timestamps: Timestamps {
            whatsapp: now,
            sent: Some(now),
            delivered: None,
            read: None,
        },
    }
}

/// Optimistic send: append a placeholder immediately, submit, then reconcile
/// the server record in place or roll the placeholder back. Reconciliation is
/// keyed on the generated local id, never on position, so overlapping sends
/// cannot touch each other's entries.
#[derive(Clone)]
pub struct SendPipeline {
    api: Arc<dyn ChatApi>,
    view: Arc<ViewController>,
    sync: SyncEngine,
}

impl SendPipeline {
    pub fn new(api: Arc<dyn ChatApi>, view: Arc<ViewController>, sync: SyncEngine) -> Self {
        Self { api, view, sync }
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Rejected;
        }
        let Some(wa_id) = self.view.active_wa_id() else {
            return SendOutcome::Rejected;
        };

        let placeholder = placeholder_message(&wa_id, text, Utc::now().timestamp());
        let local_id = placeholder.id.clone();
        self.view.append_message(placeholder);
        self.view.set_draft("");
        self.view.set_sending(true);

        let draft = NewMessage {
            wa_id,
            text: text.to_string(),
        };
        let outcome = match self.api.send_message(&draft).await {
            Ok(saved) => {
                self.view.replace_message(&local_id, saved);
                // surface the new lastMessageText/lastMessageAt right away
                self.sync.load_conversations(false).await;
                SendOutcome::Confirmed
            }
            Err(err) => {
                warn!("send to {} failed, rolling back: {err}", draft.wa_id);
                self.view.remove_message(&local_id);
                SendOutcome::RolledBack
            }
        };
        self.view.set_sending(false);
        outcome
    }

    /// Send whatever is currently in the draft field. The draft is only
    /// cleared once the send passes its preconditions.
    pub async fn send_draft(&self) -> SendOutcome {
        let draft = self.view.snapshot().draft;
        self.send(&draft).await
    }
}
