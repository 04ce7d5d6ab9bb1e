//! Parsed configuration structures for the dispatch core.
//!
//! Everything here arrives already parsed from whatever outer layer owns
//! config files; this crate never reads files or environment variables.
use std::collections::HashMap;

use {
    serde::{Deserialize, Serialize},
    switchyard_common::{ChatType, DmScope, DropPolicy, PeerLocator, SendPolicy},
};

/// Root configuration for the dispatch core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    pub agents: AgentsConfig,
    /// Ordered binding list; priority is decided by qualifier specificity,
    /// not list position.
    pub bindings: Vec<AgentBinding>,
    pub session: SessionConfig,
    /// Absent means unconfigured: every send resolves to allow.
    pub send_policy: Option<SendPolicyConfig>,
    pub lanes: LanesConfig,
    pub retry: RetryConfig,
    pub queue: QueueConfig,
}

/// Configured agents. The first list entry is the default agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub list: Vec<AgentEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentEntry {
    pub id: String,
    pub name: Option<String>,
}

/// Maps channel/account/peer/group criteria to an agent id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentBinding {
    pub agent_id: String,
    #[serde(rename = "match")]
    pub criteria: BindingMatch,
}

/// Binding criteria. `account_id` accepts the wildcard `"*"`; an absent
/// account is treated the same as the wildcard except for account-level
/// bindings, which require an exact id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingMatch {
    pub channel: String,
    pub account_id: Option<String>,
    pub peer: Option<PeerLocator>,
    pub guild_id: Option<String>,
    pub team_id: Option<String>,
}

/// Session-key scoping options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How DM session keys are scoped. Defaults to `main`.
    pub dm_scope: DmScope,
    /// Name of the agent main session segment. Defaults to "main".
    pub main_key: Option<String>,
    /// Canonical name -> aliases. An alias is a bare peer id or
    /// `channel:peerId`; matching peers are folded into the canonical name
    /// when keys are built.
    pub identity_links: HashMap<String, Vec<String>>,
}

/// Ordered allow/deny rules gating outbound delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendPolicyConfig {
    /// Applied when no rule matches. Defaults to allow.
    pub default: SendPolicy,
    /// Evaluated in order; the first rule whose criteria all match wins,
    /// whatever its action.
    pub rules: Vec<SendPolicyRule>,
}

impl Default for SendPolicyConfig {
    fn default() -> Self {
        Self {
            default: SendPolicy::Allow,
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendPolicyRule {
    pub action: SendPolicy,
    #[serde(default, rename = "match")]
    pub criteria: RuleMatch,
}

/// Rule criteria; omitted fields match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleMatch {
    pub channel: Option<String>,
    pub chat_type: Option<ChatType>,
    /// Case-insensitive prefix test against the session key.
    pub key_prefix: Option<String>,
}

impl RuleMatch {
    /// True when no criterion is set, i.e. the rule matches every send.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.channel.is_none() && self.chat_type.is_none() && self.key_prefix.is_none()
    }
}

/// Lane scheduler options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanesConfig {
    /// Concurrency ceiling for lanes without an explicit entry. Defaults to 1
    /// (strict FIFO).
    pub default_concurrency: usize,
    /// Per-lane concurrency ceilings, keyed by lane name.
    pub concurrency: HashMap<String, usize>,
    /// Emit a wait warning when a task stays queued longer than this.
    /// No warning when absent.
    pub warn_after_ms: Option<u64>,
}

impl Default for LanesConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 1,
            concurrency: HashMap::new(),
            warn_after_ms: None,
        }
    }
}

/// Raw retry overrides. Values are normalized by the retry executor before
/// use (invalid values fall back to defaults rather than failing), so they
/// are kept as loose floats here.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: Option<f64>,
    pub min_delay_ms: Option<f64>,
    pub max_delay_ms: Option<f64>,
    pub jitter: Option<f64>,
}

/// Per-session inbound queue options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued items. 0 means unbounded.
    pub cap: usize,
    pub drop_policy: DropPolicy,
    /// Maximum retained summary lines under the summarize policy.
    /// Defaults to 10.
    pub summary_limit: usize,
    /// Quiet period before a queued burst is collected. 0 disables the wait.
    pub debounce_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cap: 0,
            drop_policy: DropPolicy::Summarize,
            summary_limit: 10,
            debounce_ms: 0,
        }
    }
}
