//! Binding cascade resolution.
//!
//! Every inbound event resolves to exactly one agent. Bindings are matched
//! most-specific-first regardless of their order in config; ties within a
//! level go to the earliest binding in the list.

use {
    switchyard_common::PeerLocator,
    switchyard_config::{AgentBinding, BindingMatch, SwitchyardConfig},
    tracing::{debug, warn},
};

use crate::session_key::{
    DEFAULT_ACCOUNT_ID, DEFAULT_AGENT_ID, SessionKeyParams, agent_main_session_key,
    build_session_key, normalize_agent_id, normalize_segment,
};

/// Which cascade level produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Peer,
    ParentPeer,
    Guild,
    Team,
    Account,
    Channel,
    Default,
}

impl MatchedBy {
    /// Stable name used in logs and diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Peer => "binding.peer",
            Self::ParentPeer => "binding.peer.parent",
            Self::Guild => "binding.guild",
            Self::Team => "binding.team",
            Self::Account => "binding.account",
            Self::Channel => "binding.channel",
            Self::Default => "default",
        }
    }
}

/// Inbound event fields the resolver looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteQuery<'a> {
    pub channel: &'a str,
    pub account_id: &'a str,
    pub peer: Option<&'a PeerLocator>,
    /// Enclosing conversation for threaded events, e.g. the group a thread
    /// hangs off.
    pub parent_peer: Option<&'a PeerLocator>,
    pub guild_id: Option<&'a str>,
    pub team_id: Option<&'a str>,
}

/// A routing decision. `channel` is normalized lowercase; `account_id` keeps
/// its original case so downstream lookups against channel APIs still work.
/// The event peer is carried through so delivery code can address the reply
/// without re-threading the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub agent_id: String,
    pub channel: String,
    pub account_id: String,
    pub peer: Option<PeerLocator>,
    pub session_key: String,
    pub main_session_key: String,
    pub matched_by: MatchedBy,
}

/// Resolves an inbound event to an agent and its session keys.
///
/// Total: malformed bindings are skipped and an empty config routes to the
/// default agent, so this never fails.
#[must_use]
pub fn resolve_route(cfg: &SwitchyardConfig, query: &RouteQuery<'_>) -> ResolvedRoute {
    let channel = normalize_segment(query.channel);
    let account_id = {
        let trimmed = query.account_id.trim();
        if trimmed.is_empty() {
            DEFAULT_ACCOUNT_ID.to_string()
        } else {
            trimmed.to_string()
        }
    };

    let (agent_id, matched_by) = match find_binding(&cfg.bindings, &channel, &account_id, query) {
        Some((binding, matched_by)) => {
            let bound = binding.agent_id.trim();
            let list = &cfg.agents.list;
            if list.is_empty() || list.iter().any(|a| a.id.trim().eq_ignore_ascii_case(bound)) {
                (normalize_agent_id(Some(bound)), matched_by)
            } else {
                warn!(
                    bound_agent = bound,
                    matched_by = matched_by.as_str(),
                    "binding names an unconfigured agent; routing to default"
                );
                #[cfg(feature = "metrics")]
                switchyard_metrics::counter!(switchyard_metrics::routing::UNKNOWN_AGENT_TOTAL)
                    .increment(1);
                (default_agent_id(cfg), matched_by)
            }
        },
        None => (default_agent_id(cfg), MatchedBy::Default),
    };

    let main_key = cfg.session.main_key.as_deref();
    let session_key = build_session_key(&SessionKeyParams {
        agent_id: &agent_id,
        channel: query.channel,
        account_id: query.account_id,
        peer: query.peer,
        dm_scope: cfg.session.dm_scope,
        identity_links: Some(&cfg.session.identity_links),
        main_key,
    });
    let main_session_key = agent_main_session_key(&agent_id, main_key);

    debug!(
        channel = %channel,
        account_id = %account_id,
        agent_id = %agent_id,
        session_key = %session_key,
        matched_by = matched_by.as_str(),
        "route resolved"
    );
    #[cfg(feature = "metrics")]
    {
        switchyard_metrics::counter!(
            switchyard_metrics::routing::RESOLUTIONS_TOTAL,
            switchyard_metrics::labels::BINDING_LEVEL => matched_by.as_str()
        )
        .increment(1);
        if matched_by == MatchedBy::Default {
            switchyard_metrics::counter!(switchyard_metrics::routing::DEFAULT_FALLBACKS_TOTAL)
                .increment(1);
        }
    }

    ResolvedRoute {
        agent_id,
        channel,
        account_id,
        peer: query.peer.cloned(),
        session_key,
        main_session_key,
        matched_by,
    }
}

fn default_agent_id(cfg: &SwitchyardConfig) -> String {
    cfg.agents.list.first().map_or_else(
        || DEFAULT_AGENT_ID.to_string(),
        |agent| normalize_agent_id(Some(&agent.id)),
    )
}

// Bindings without an agent id cannot route anywhere; skip them everywhere.
fn usable(bindings: &[AgentBinding]) -> impl Iterator<Item = &AgentBinding> {
    bindings.iter().filter(|b| !b.agent_id.trim().is_empty())
}

fn find_binding<'a>(
    bindings: &'a [AgentBinding],
    channel: &str,
    account_id: &str,
    query: &RouteQuery<'_>,
) -> Option<(&'a AgentBinding, MatchedBy)> {
    if let Some(peer) = query.peer
        && let Some(binding) = usable(bindings).find(|b| {
            scope_matches(&b.criteria, channel, account_id)
                && b.criteria.peer.as_ref().is_some_and(|bound| peer_matches(bound, peer))
        })
    {
        return Some((binding, MatchedBy::Peer));
    }
    if let Some(parent) = query.parent_peer
        && let Some(binding) = usable(bindings).find(|b| {
            scope_matches(&b.criteria, channel, account_id)
                && b.criteria.peer.as_ref().is_some_and(|bound| peer_matches(bound, parent))
        })
    {
        return Some((binding, MatchedBy::ParentPeer));
    }
    if let Some(guild_id) = non_empty(query.guild_id)
        && let Some(binding) = usable(bindings).find(|b| {
            scope_matches(&b.criteria, channel, account_id)
                && b.criteria.guild_id.as_deref().is_some_and(|bound| segment_eq(bound, guild_id))
        })
    {
        return Some((binding, MatchedBy::Guild));
    }
    if let Some(team_id) = non_empty(query.team_id)
        && let Some(binding) = usable(bindings).find(|b| {
            scope_matches(&b.criteria, channel, account_id)
                && b.criteria.team_id.as_deref().is_some_and(|bound| segment_eq(bound, team_id))
        })
    {
        return Some((binding, MatchedBy::Team));
    }
    // Account level requires an exact account id; the wildcard demotes a
    // binding to channel level.
    if let Some(binding) = usable(bindings).find(|b| {
        is_plain(&b.criteria)
            && channel_matches(&b.criteria, channel)
            && b.criteria
                .account_id
                .as_deref()
                .map(str::trim)
                .is_some_and(|bound| {
                    !bound.is_empty() && bound != "*" && bound.eq_ignore_ascii_case(account_id)
                })
    }) {
        return Some((binding, MatchedBy::Account));
    }
    if let Some(binding) = usable(bindings).find(|b| {
        is_plain(&b.criteria) && channel_matches(&b.criteria, channel) && wildcard_account(&b.criteria)
    }) {
        return Some((binding, MatchedBy::Channel));
    }
    None
}

fn channel_matches(criteria: &BindingMatch, channel: &str) -> bool {
    criteria.channel.trim().eq_ignore_ascii_case(channel)
}

fn account_matches(criteria: &BindingMatch, account_id: &str) -> bool {
    match criteria.account_id.as_deref().map(str::trim) {
        None | Some("" | "*") => true,
        Some(bound) => bound.eq_ignore_ascii_case(account_id),
    }
}

fn scope_matches(criteria: &BindingMatch, channel: &str, account_id: &str) -> bool {
    channel_matches(criteria, channel) && account_matches(criteria, account_id)
}

fn wildcard_account(criteria: &BindingMatch) -> bool {
    matches!(criteria.account_id.as_deref().map(str::trim), None | Some("" | "*"))
}

/// True when the binding carries no peer, guild, or team qualifier.
fn is_plain(criteria: &BindingMatch) -> bool {
    criteria.peer.is_none() && criteria.guild_id.is_none() && criteria.team_id.is_none()
}

fn peer_matches(bound: &PeerLocator, event: &PeerLocator) -> bool {
    bound.kind == event.kind && bound.id.trim().eq_ignore_ascii_case(event.id.trim())
}

fn segment_eq(bound: &str, event: &str) -> bool {
    bound.trim().eq_ignore_ascii_case(event)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
