use std::time::{SystemTime, UNIX_EPOCH};

use {
    serde::{Deserialize, Serialize},
    switchyard_common::{ChatType, SendPolicy},
};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Per-session metadata consulted at dispatch time.
///
/// The session-store collaborator owns persistence; this core reads
/// fields off the entry it is given and writes back only delivery
/// bookkeeping (`last_channel` / `last_to`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Per-session delivery override. Always beats configured rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_policy: Option<SendPolicy>,
    /// Channel the session was created on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<ChatType>,
    /// Channel that most recently delivered for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_channel: Option<String>,
    /// Address the most recent delivery went to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_to: Option<String>,
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,
}

impl SessionEntry {
    /// Fresh entry stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        let now = now_ms();
        Self { created_at_ms: now, updated_at_ms: now, ..Self::default() }
    }

    /// Records a completed delivery and bumps `updated_at_ms`.
    pub fn record_delivery(&mut self, channel: impl Into<String>, to: impl Into<String>) {
        self.last_channel = Some(channel.into());
        self.last_to = Some(to.into());
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at_ms = now_ms();
    }
}
