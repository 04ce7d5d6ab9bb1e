use serde::{Deserialize, Serialize};

/// Kind of conversational target within a channel account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    Dm,
    Group,
    Channel,
    Thread,
}

impl PeerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
            Self::Channel => "channel",
            Self::Thread => "thread",
        }
    }

    /// Chat type this peer kind implies for send-policy checks. Threads take
    /// the shape of whatever they hang off, so they map to `None`.
    #[must_use]
    pub fn chat_type(self) -> Option<ChatType> {
        match self {
            Self::Dm => Some(ChatType::Direct),
            Self::Group => Some(ChatType::Group),
            Self::Channel => Some(ChatType::Channel),
            Self::Thread => None,
        }
    }
}

/// Identifies a conversational target (a DM partner, a group, a channel, a
/// thread) within one channel account. Compared by `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerLocator {
    pub kind: PeerKind,
    pub id: String,
}

impl PeerLocator {
    #[must_use]
    pub fn new(kind: PeerKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Conversation shape as seen by send-policy rules. `"dm"` is accepted as an
/// alias for `direct` anywhere a chat type is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[serde(alias = "dm")]
    Direct,
    Group,
    Channel,
}

impl ChatType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }

    /// Parse a chat type from free-form input (trimmed, case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "dm" | "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            "channel" => Some(Self::Channel),
            _ => None,
        }
    }
}

/// How DM session keys are scoped for an agent.
///
/// `main` collapses every DM into one shared session; the other scopes fold
/// progressively more of `(channel, account, peer)` into the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DmScope {
    #[default]
    Main,
    PerPeer,
    PerChannelPeer,
    PerAccountChannelPeer,
}

impl DmScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::PerPeer => "per-peer",
            Self::PerChannelPeer => "per-channel-peer",
            Self::PerAccountChannelPeer => "per-account-channel-peer",
        }
    }
}

/// Outcome of a send-policy decision, and the value of a per-session override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendPolicy {
    #[default]
    Allow,
    Deny,
}

impl SendPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    /// Parse a policy from free-form input (trimmed, case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

/// What an overflow queue does with the incoming item once it is at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Reject the incoming item; the queue is unchanged.
    New,
    /// Evict the oldest queued items to make room.
    Old,
    /// Evict the oldest items and keep a one-line summary of each.
    #[default]
    Summarize,
}

impl DropPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Old => "old",
            Self::Summarize => "summarize",
        }
    }
}
