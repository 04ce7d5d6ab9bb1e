//! Deterministic session-key construction.
//!
//! Session keys are the join point between routing, session storage, and the
//! dispatch inboxes: the same event must always land on the same key, so every
//! builder here normalizes its inputs before assembling segments. Keys are
//! colon-separated, lowercase, and always start with `agent:<agentId>:` except
//! for group history keys, which are channel-scoped.

use std::collections::HashMap;

use switchyard_common::{DmScope, PeerKind, PeerLocator};

/// Fallback agent id when none is configured or an id normalizes to nothing.
pub const DEFAULT_AGENT_ID: &str = "main";
/// Fallback account id for channels that do not distinguish accounts.
pub const DEFAULT_ACCOUNT_ID: &str = "default";
/// Name of the per-agent main session segment.
pub const DEFAULT_MAIN_KEY: &str = "main";

const MAX_ID_LEN: usize = 64;
const UNKNOWN_SEGMENT: &str = "unknown";

/// Normalizes the main-session segment name. Unlike agent and account ids the
/// main key is only trimmed and lowercased, never sanitized.
#[must_use]
pub fn normalize_main_key(raw: Option<&str>) -> String {
    let key = raw.unwrap_or_default().trim().to_lowercase();
    if key.is_empty() {
        DEFAULT_MAIN_KEY.to_string()
    } else {
        key
    }
}

/// Normalizes an agent id to `[a-z0-9][a-z0-9_-]*`, capped at 64 characters.
/// Ids that normalize to nothing become [`DEFAULT_AGENT_ID`].
#[must_use]
pub fn normalize_agent_id(raw: Option<&str>) -> String {
    normalize_id(raw, DEFAULT_AGENT_ID)
}

/// Normalizes an account id with the same rules as [`normalize_agent_id`],
/// falling back to [`DEFAULT_ACCOUNT_ID`].
#[must_use]
pub fn normalize_account_id(raw: Option<&str>) -> String {
    normalize_id(raw, DEFAULT_ACCOUNT_ID)
}

fn normalize_id(raw: Option<&str>, default: &str) -> String {
    let trimmed = raw.unwrap_or_default().trim().to_lowercase();
    if trimmed.is_empty() {
        return default.to_string();
    }
    if is_well_formed_id(&trimmed) {
        return trimmed.chars().take(MAX_ID_LEN).collect();
    }
    // Collapse each run of invalid characters to a single dash, then strip
    // dashes the collapse left at the edges.
    let mut collapsed = String::with_capacity(trimmed.len());
    let mut run_pending = false;
    for c in trimmed.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            collapsed.push(c);
            run_pending = false;
        } else if !run_pending {
            collapsed.push('-');
            run_pending = true;
        }
    }
    let stripped = collapsed.trim_matches('-');
    if stripped.is_empty() {
        default.to_string()
    } else {
        stripped.chars().take(MAX_ID_LEN).collect()
    }
}

fn is_well_formed_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

pub(crate) fn normalize_segment(raw: &str) -> String {
    let segment = raw.trim().to_lowercase();
    if segment.is_empty() {
        UNKNOWN_SEGMENT.to_string()
    } else {
        segment
    }
}

/// The main session key for an agent: `agent:<agentId>:<mainKey>`.
#[must_use]
pub fn agent_main_session_key(agent_id: &str, main_key: Option<&str>) -> String {
    format!(
        "agent:{}:{}",
        normalize_agent_id(Some(agent_id)),
        normalize_main_key(main_key)
    )
}

/// Inputs for [`build_session_key`]. `Default` gives empty ids, no peer, and
/// the `main` DM scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKeyParams<'a> {
    pub agent_id: &'a str,
    pub channel: &'a str,
    pub account_id: &'a str,
    pub peer: Option<&'a PeerLocator>,
    pub dm_scope: DmScope,
    /// Canonical name -> aliases, from session config.
    pub identity_links: Option<&'a HashMap<String, Vec<String>>>,
    pub main_key: Option<&'a str>,
}

/// Builds the session key for an inbound event.
///
/// Without a peer the key is the agent main session key. DMs are scoped per
/// [`DmScope`]; groups and broadcast channels always key on
/// `agent:<agentId>:<channel>:<kind>:<peerId>`. Peer ids covered by an
/// identity link are folded into their canonical name so one human maps to
/// one session across channels.
#[must_use]
pub fn build_session_key(params: &SessionKeyParams<'_>) -> String {
    let Some(peer) = params.peer else {
        return agent_main_session_key(params.agent_id, params.main_key);
    };

    let agent_id = normalize_agent_id(Some(params.agent_id));
    let channel = normalize_segment(params.channel);
    let peer_id = resolve_peer_segment(&peer.id, &channel, params.identity_links);

    match peer.kind {
        PeerKind::Dm => match params.dm_scope {
            DmScope::Main => agent_main_session_key(&agent_id, params.main_key),
            DmScope::PerPeer => format!("agent:{agent_id}:dm:{peer_id}"),
            DmScope::PerChannelPeer => format!("agent:{agent_id}:{channel}:dm:{peer_id}"),
            DmScope::PerAccountChannelPeer => {
                let account_id = normalize_account_id(Some(params.account_id));
                format!("agent:{agent_id}:{channel}:{account_id}:dm:{peer_id}")
            },
        },
        kind => format!("agent:{agent_id}:{channel}:{}:{peer_id}", kind.as_str()),
    }
}

fn resolve_peer_segment(
    raw_peer_id: &str,
    channel: &str,
    identity_links: Option<&HashMap<String, Vec<String>>>,
) -> String {
    let peer_id = raw_peer_id.trim().to_lowercase();
    if peer_id.is_empty() {
        return UNKNOWN_SEGMENT.to_string();
    }
    match lookup_identity_link(&peer_id, channel, identity_links) {
        Some(canonical) => canonical,
        None => peer_id,
    }
}

/// Finds the canonical identity whose alias list covers a peer. Aliases are
/// either bare peer ids or `channel:peerId`; both are matched
/// case-insensitively. Canonical names are scanned in sorted order so the
/// result is stable even when aliases overlap.
fn lookup_identity_link(
    peer_id: &str,
    channel: &str,
    identity_links: Option<&HashMap<String, Vec<String>>>,
) -> Option<String> {
    let links = identity_links?;
    if links.is_empty() {
        return None;
    }
    let scoped = format!("{channel}:{peer_id}");
    let mut canonicals: Vec<&String> = links.keys().collect();
    canonicals.sort();
    for canonical in canonicals {
        let aliases = &links[canonical];
        let hit = aliases.iter().any(|alias| {
            let alias = alias.trim().to_lowercase();
            alias == peer_id || alias == scoped
        });
        if hit {
            return Some(canonical.trim().to_lowercase());
        }
    }
    None
}

/// Key for shared group history: `<channel>:<accountId>:<kind>:<peerId>`.
/// Unlike session keys this is agent-independent, so agents routed into the
/// same group read the same transcript.
#[must_use]
pub fn group_history_key(channel: &str, account_id: &str, kind: PeerKind, peer_id: &str) -> String {
    let channel = normalize_segment(channel);
    let account_id = normalize_account_id(Some(account_id));
    let peer_id = normalize_segment(peer_id);
    format!("{channel}:{account_id}:{}:{peer_id}", kind.as_str())
}

/// Inputs for [`thread_session_keys`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadKeyParams<'a> {
    pub base_session_key: &'a str,
    pub thread_id: Option<&'a str>,
    /// Session key of the surrounding conversation, carried through untouched.
    pub parent_session_key: Option<&'a str>,
    /// `Some(false)` keeps threads in the base session.
    pub use_suffix: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadKeys {
    pub session_key: String,
    pub parent_session_key: Option<String>,
}

/// Derives the session key for a threaded reply: `<base>:thread:<threadId>`
/// when a thread id is present and suffixing is not disabled, the base key
/// otherwise.
#[must_use]
pub fn thread_session_keys(params: &ThreadKeyParams<'_>) -> ThreadKeys {
    let thread_id = params.thread_id.unwrap_or_default().trim().to_lowercase();
    let session_key = if thread_id.is_empty() || params.use_suffix == Some(false) {
        params.base_session_key.to_string()
    } else {
        format!("{}:thread:{thread_id}", params.base_session_key)
    };
    ThreadKeys {
        session_key,
        parent_session_key: params.parent_session_key.map(str::to_string),
    }
}

/// Strips the `agent:<agentId>:` prefix for protocol clients, which address
/// sessions relative to their agent. Keys without the prefix pass through;
/// empty input is `None`.
#[must_use]
pub fn to_request_session_key(raw: Option<&str>) -> Option<String> {
    let trimmed = raw.unwrap_or_default().trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("agent:")
        && let Some((_, tail)) = rest.split_once(':')
        && !tail.is_empty()
    {
        return Some(tail.to_string());
    }
    Some(trimmed.to_string())
}

/// Expands a client-relative key back to a store key. Empty input and the
/// main-key aliases map to the agent main session; keys already carrying an
/// `agent:` prefix pass through.
#[must_use]
pub fn to_store_session_key(agent_id: &str, request_key: Option<&str>, main_key: Option<&str>) -> String {
    let request = request_key.unwrap_or_default().trim();
    if request.is_empty()
        || request == normalize_main_key(main_key)
        || request == DEFAULT_MAIN_KEY
    {
        return agent_main_session_key(agent_id, main_key);
    }
    if request.starts_with("agent:") {
        return request.to_string();
    }
    format!("agent:{}:{request}", normalize_agent_id(Some(agent_id)))
}

/// Extracts the agent id from a store key, falling back to
/// [`DEFAULT_AGENT_ID`] for keys that do not carry one.
#[must_use]
pub fn agent_id_from_session_key(key: Option<&str>) -> String {
    let trimmed = key.unwrap_or_default().trim();
    let mut parts = trimmed.split(':');
    if let (Some("agent"), Some(agent), Some(_)) = (parts.next(), parts.next(), parts.next()) {
        return normalize_agent_id(Some(agent));
    }
    DEFAULT_AGENT_ID.to_string()
}
