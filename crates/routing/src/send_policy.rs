//! Outbound send gating.
//!
//! Before the dispatcher hands a reply to a channel it asks the send policy
//! whether delivery is allowed. A per-session override (set by an operator,
//! e.g. to silence one conversation) beats the configured rules; rules are
//! evaluated in config order and the first full match wins.

use {
    switchyard_common::{ChatType, SendPolicy},
    switchyard_config::{RuleMatch, SendPolicyConfig},
    switchyard_sessions::SessionEntry,
    tracing::debug,
};

/// Delivery context for one policy decision. Fields left `None` are derived
/// from the session entry and session key where possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendPolicyQuery<'a> {
    pub channel: Option<&'a str>,
    pub chat_type: Option<ChatType>,
    pub session_key: Option<&'a str>,
}

/// Decides whether a send may go out.
///
/// Precedence: session-entry override, then the first matching rule, then the
/// policy default. With no policy configured at all every send is allowed.
#[must_use]
pub fn resolve_send_policy(
    cfg: Option<&SendPolicyConfig>,
    entry: Option<&SessionEntry>,
    query: &SendPolicyQuery<'_>,
) -> SendPolicy {
    #[cfg(feature = "metrics")]
    switchyard_metrics::counter!(switchyard_metrics::send_policy::EVALUATIONS_TOTAL).increment(1);

    let decision = if let Some(policy) = entry.and_then(|e| e.send_policy) {
        #[cfg(feature = "metrics")]
        switchyard_metrics::counter!(switchyard_metrics::send_policy::OVERRIDES_TOTAL).increment(1);
        policy
    } else if let Some(cfg) = cfg {
        evaluate_rules(cfg, entry, query)
    } else {
        SendPolicy::Allow
    };

    if decision == SendPolicy::Deny {
        debug!(
            session_key = query.session_key.unwrap_or_default(),
            "send denied by policy"
        );
        #[cfg(feature = "metrics")]
        switchyard_metrics::counter!(switchyard_metrics::send_policy::DENIED_TOTAL).increment(1);
    }
    decision
}

fn evaluate_rules(
    cfg: &SendPolicyConfig,
    entry: Option<&SessionEntry>,
    query: &SendPolicyQuery<'_>,
) -> SendPolicy {
    let session_key = non_empty(query.session_key);
    let channel = effective_channel(query.channel, entry, session_key);
    let chat_type = effective_chat_type(query.chat_type, entry, session_key);

    for rule in &cfg.rules {
        if rule_matches(&rule.criteria, channel.as_deref(), chat_type, session_key) {
            return rule.action;
        }
    }
    cfg.default
}

/// Channel precedence: explicit query, session entry, session key, then the
/// channel of the last delivery.
fn effective_channel(
    param: Option<&str>,
    entry: Option<&SessionEntry>,
    session_key: Option<&str>,
) -> Option<String> {
    non_empty_lower(param)
        .or_else(|| entry.and_then(|e| non_empty_lower(e.channel.as_deref())))
        .or_else(|| session_key.and_then(channel_from_key))
        .or_else(|| entry.and_then(|e| non_empty_lower(e.last_channel.as_deref())))
}

fn effective_chat_type(
    param: Option<ChatType>,
    entry: Option<&SessionEntry>,
    session_key: Option<&str>,
) -> Option<ChatType> {
    param
        .or_else(|| entry.and_then(|e| e.chat_type))
        .or_else(|| session_key.and_then(chat_type_from_key))
}

// Only keys shaped like <channel>:<chatType>:<id> carry a channel; shorter
// keys (e.g. the bare main key) do not.
fn channel_from_key(key: &str) -> Option<String> {
    let parts: Vec<&str> = key.split(':').filter(|s| !s.is_empty()).collect();
    if parts.len() < 3 {
        return None;
    }
    non_empty_lower(parts.first().copied())
}

fn chat_type_from_key(key: &str) -> Option<ChatType> {
    let lower = key.to_lowercase();
    if lower.contains(":dm:") {
        return Some(ChatType::Direct);
    }
    if lower.contains(":group:") {
        return Some(ChatType::Group);
    }
    if lower.contains(":channel:") {
        return Some(ChatType::Channel);
    }
    let parts: Vec<&str> = lower.split(':').collect();
    if parts.len() < 3 {
        return None;
    }
    match parts.last().copied().unwrap_or_default() {
        "dm" => Some(ChatType::Direct),
        "group" => Some(ChatType::Group),
        "channel" => Some(ChatType::Channel),
        _ => None,
    }
}

fn rule_matches(
    criteria: &RuleMatch,
    channel: Option<&str>,
    chat_type: Option<ChatType>,
    session_key: Option<&str>,
) -> bool {
    if let Some(rule_channel) = non_empty_lower(criteria.channel.as_deref())
        && channel != Some(rule_channel.as_str())
    {
        return false;
    }
    if let Some(rule_chat) = criteria.chat_type
        && chat_type != Some(rule_chat)
    {
        return false;
    }
    if let Some(prefix) = non_empty(criteria.key_prefix.as_deref()) {
        let Some(key) = session_key else {
            return false;
        };
        if !key.to_lowercase().starts_with(&prefix.to_lowercase()) {
            return false;
        }
    }
    true
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn non_empty_lower(raw: Option<&str>) -> Option<String> {
    non_empty(raw).map(str::to_lowercase)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, switchyard_config::SendPolicyRule};

    fn policy(default: SendPolicy, rules: Vec<SendPolicyRule>) -> SendPolicyConfig {
        SendPolicyConfig { default, rules }
    }

    fn rule(action: SendPolicy, criteria: RuleMatch) -> SendPolicyRule {
        SendPolicyRule { action, criteria }
    }

    fn channel_rule(action: SendPolicy, channel: &str) -> SendPolicyRule {
        rule(action, RuleMatch {
            channel: Some(channel.to_string()),
            ..RuleMatch::default()
        })
    }

    #[test]
    fn test_allows_when_unconfigured() {
        let decision = resolve_send_policy(None, None, &SendPolicyQuery::default());
        assert_eq!(decision, SendPolicy::Allow);
    }

    #[test]
    fn test_empty_rules_fall_through_to_default() {
        let deny_all = policy(SendPolicy::Deny, Vec::new());
        let decision = resolve_send_policy(Some(&deny_all), None, &SendPolicyQuery {
            channel: Some("discord"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(decision, SendPolicy::Deny);
    }

    #[test]
    fn test_entry_override_beats_rules() {
        let deny_all = policy(SendPolicy::Deny, Vec::new());
        let mut entry = SessionEntry::new();
        entry.send_policy = Some(SendPolicy::Allow);
        let decision = resolve_send_policy(Some(&deny_all), Some(&entry), &SendPolicyQuery::default());
        assert_eq!(decision, SendPolicy::Allow);

        entry.send_policy = Some(SendPolicy::Deny);
        let decision = resolve_send_policy(None, Some(&entry), &SendPolicyQuery::default());
        assert_eq!(decision, SendPolicy::Deny);
    }

    #[test]
    fn test_channel_rule_matches_case_insensitively() {
        let cfg = policy(SendPolicy::Allow, vec![channel_rule(SendPolicy::Deny, " Discord ")]);
        let denied = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            channel: Some("DISCORD"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(denied, SendPolicy::Deny);

        let allowed = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            channel: Some("telegram"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(allowed, SendPolicy::Allow);
    }

    #[test]
    fn test_chat_type_rule() {
        let cfg = policy(SendPolicy::Allow, vec![rule(SendPolicy::Deny, RuleMatch {
            chat_type: Some(ChatType::Group),
            ..RuleMatch::default()
        })]);
        let denied = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            chat_type: Some(ChatType::Group),
            ..SendPolicyQuery::default()
        });
        assert_eq!(denied, SendPolicy::Deny);

        let allowed = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            chat_type: Some(ChatType::Direct),
            ..SendPolicyQuery::default()
        });
        assert_eq!(allowed, SendPolicy::Allow);
    }

    #[test]
    fn test_key_prefix_rule() {
        let cfg = policy(SendPolicy::Allow, vec![rule(SendPolicy::Deny, RuleMatch {
            key_prefix: Some("Agent:Main:Discord".to_string()),
            ..RuleMatch::default()
        })]);
        let denied = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            session_key: Some("agent:main:discord:group:room1"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(denied, SendPolicy::Deny);

        let allowed = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            session_key: Some("agent:main:slack:group:room1"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(allowed, SendPolicy::Allow);
    }

    #[test]
    fn test_key_prefix_rule_needs_a_session_key() {
        let cfg = policy(SendPolicy::Allow, vec![rule(SendPolicy::Deny, RuleMatch {
            key_prefix: Some("agent:".to_string()),
            ..RuleMatch::default()
        })]);
        let decision = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            channel: Some("discord"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(decision, SendPolicy::Allow);
    }

    #[test]
    fn test_all_criteria_must_hold() {
        let cfg = policy(SendPolicy::Allow, vec![rule(SendPolicy::Deny, RuleMatch {
            channel: Some("discord".to_string()),
            chat_type: Some(ChatType::Group),
            ..RuleMatch::default()
        })]);
        let partial = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            channel: Some("discord"),
            chat_type: Some(ChatType::Direct),
            ..SendPolicyQuery::default()
        });
        assert_eq!(partial, SendPolicy::Allow);

        let full = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            channel: Some("discord"),
            chat_type: Some(ChatType::Group),
            ..SendPolicyQuery::default()
        });
        assert_eq!(full, SendPolicy::Deny);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let allow_first = policy(SendPolicy::Deny, vec![
            channel_rule(SendPolicy::Allow, "discord"),
            channel_rule(SendPolicy::Deny, "discord"),
        ]);
        let query = SendPolicyQuery {
            channel: Some("discord"),
            ..SendPolicyQuery::default()
        };
        assert_eq!(resolve_send_policy(Some(&allow_first), None, &query), SendPolicy::Allow);

        let deny_first = policy(SendPolicy::Allow, vec![
            channel_rule(SendPolicy::Deny, "discord"),
            channel_rule(SendPolicy::Allow, "discord"),
        ]);
        assert_eq!(resolve_send_policy(Some(&deny_first), None, &query), SendPolicy::Deny);
    }

    #[test]
    fn test_channel_derived_from_session_key() {
        let cfg = policy(SendPolicy::Allow, vec![channel_rule(SendPolicy::Deny, "discord")]);
        let denied = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            session_key: Some("discord:group:room1"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(denied, SendPolicy::Deny);

        // A bare key has no channel segment to match on.
        let allowed = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            session_key: Some("main"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(allowed, SendPolicy::Allow);
    }

    #[test]
    fn test_chat_type_derived_from_session_key() {
        let cfg = policy(SendPolicy::Allow, vec![rule(SendPolicy::Deny, RuleMatch {
            chat_type: Some(ChatType::Direct),
            ..RuleMatch::default()
        })]);
        let embedded = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            session_key: Some("agent:main:discord:dm:user1"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(embedded, SendPolicy::Deny);

        let trailing = resolve_send_policy(Some(&cfg), None, &SendPolicyQuery {
            session_key: Some("telegram:user123:dm"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(trailing, SendPolicy::Deny);
    }

    #[test]
    fn test_entry_fields_feed_derivation() {
        let cfg = policy(SendPolicy::Allow, vec![channel_rule(SendPolicy::Deny, "telegram")]);
        let mut entry = SessionEntry::new();
        entry.channel = Some("Telegram".to_string());
        // The entry channel beats the channel embedded in the key.
        let decision = resolve_send_policy(Some(&cfg), Some(&entry), &SendPolicyQuery {
            session_key: Some("discord:group:room1"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(decision, SendPolicy::Deny);

        // An explicit query channel beats the entry.
        let decision = resolve_send_policy(Some(&cfg), Some(&entry), &SendPolicyQuery {
            channel: Some("discord"),
            ..SendPolicyQuery::default()
        });
        assert_eq!(decision, SendPolicy::Allow);
    }

    #[test]
    fn test_unmatched_rules_fall_back_to_deny_default() {
        let cfg = policy(SendPolicy::Deny, vec![channel_rule(SendPolicy::Allow, "discord")]);
        let mut entry = SessionEntry::new();
        entry.channel = Some("slack".to_string());
        let decision = resolve_send_policy(Some(&cfg), Some(&entry), &SendPolicyQuery::default());
        assert_eq!(decision, SendPolicy::Deny);
    }

    #[test]
    fn test_last_channel_is_the_final_fallback() {
        let cfg = policy(SendPolicy::Allow, vec![channel_rule(SendPolicy::Deny, "whatsapp")]);
        let mut entry = SessionEntry::new();
        entry.record_delivery("whatsapp", "peer1");
        let decision = resolve_send_policy(Some(&cfg), Some(&entry), &SendPolicyQuery::default());
        assert_eq!(decision, SendPolicy::Deny);
    }

    #[test]
    fn test_entry_chat_type_used_when_query_omits_it() {
        let cfg = policy(SendPolicy::Allow, vec![rule(SendPolicy::Deny, RuleMatch {
            chat_type: Some(ChatType::Group),
            ..RuleMatch::default()
        })]);
        let mut entry = SessionEntry::new();
        entry.chat_type = Some(ChatType::Group);
        let decision = resolve_send_policy(Some(&cfg), Some(&entry), &SendPolicyQuery::default());
        assert_eq!(decision, SendPolicy::Deny);
    }
}
