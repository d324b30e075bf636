use serde::{Deserialize, Serialize};

pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Delivery state of an outbound message. Inbound messages carry no status,
/// modeled as `None` at the field level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// Epoch-second timestamps. `whatsapp` is the authoritative display time; the
/// receipt timestamps stay explicit nulls on the wire until they arrive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub whatsapp: i64,
    #[serde(default)]
    pub sent: Option<i64>,
    #[serde(default)]
    pub delivered: Option<i64>,
    #[serde(default)]
    pub read: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "waId")]
    pub wa_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub direction: Direction,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
    pub timestamps: Timestamps,
}

impl Message {
    /// True for an optimistic placeholder not yet confirmed by the server.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub wa_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_message_text: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<i64>,
    #[serde(default)]
    pub last_message_direction: Option<Direction>,
    #[serde(default)]
    pub last_message_status: Option<MessageStatus>,
}

impl Conversation {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.wa_id)
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub wa_id: String,
    pub text: String,
}
