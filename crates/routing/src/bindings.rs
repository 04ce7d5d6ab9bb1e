//! Queries over the binding list.
//!
//! Channel plugins use these to discover which accounts are bound on a
//! channel, e.g. to pick the account an outbound send should go through when
//! the caller did not name one.

use std::collections::HashMap;

use switchyard_config::AgentBinding;

use crate::session_key::{DEFAULT_ACCOUNT_ID, DEFAULT_AGENT_ID};

/// Concrete account ids bound on a channel, sorted and deduplicated. The
/// wildcard does not name an account and is skipped.
#[must_use]
pub fn list_bound_account_ids(bindings: &[AgentBinding], channel: &str) -> Vec<String> {
    let channel = channel.trim().to_lowercase();
    let mut ids: Vec<String> = bindings
        .iter()
        .filter(|b| b.criteria.channel.trim().to_lowercase() == channel)
        .filter_map(|b| b.criteria.account_id.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != "*")
        .map(str::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// The first concrete account bound to the default agent on a channel, if
/// any. Used to keep replies from the default agent on the account that
/// received the conversation.
#[must_use]
pub fn default_agent_bound_account_id(bindings: &[AgentBinding], channel: &str) -> Option<String> {
    let channel = channel.trim().to_lowercase();
    bindings
        .iter()
        .filter(|b| b.agent_id.trim().eq_ignore_ascii_case(DEFAULT_AGENT_ID))
        .filter(|b| b.criteria.channel.trim().to_lowercase() == channel)
        .filter_map(|b| b.criteria.account_id.as_deref())
        .map(str::trim)
        .find(|id| !id.is_empty() && *id != "*")
        .map(str::to_string)
}

/// Full channel -> agent -> accounts map, for status surfaces. Channel names
/// are lowercased; agent ids and accounts keep their configured spelling, and
/// the wildcard is kept so a status view can show it. Accounts stay in
/// binding order.
#[must_use]
pub fn channel_account_bindings(
    bindings: &[AgentBinding],
) -> HashMap<String, HashMap<String, Vec<String>>> {
    let mut map: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
    for binding in bindings {
        let channel = binding.criteria.channel.trim().to_lowercase();
        if channel.is_empty() {
            continue;
        }
        let agent_id = binding.agent_id.trim();
        if agent_id.is_empty() {
            continue;
        }
        let Some(account_id) = binding
            .criteria
            .account_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            continue;
        };
        let accounts = map
            .entry(channel)
            .or_default()
            .entry(agent_id.to_string())
            .or_default();
        if !accounts.iter().any(|existing| existing == account_id) {
            accounts.push(account_id.to_string());
        }
    }
    map
}

/// The account outbound sends should use on a channel: the first bound
/// account, then the caller's default, then [`DEFAULT_ACCOUNT_ID`].
#[must_use]
pub fn preferred_account_id(
    bindings: &[AgentBinding],
    channel: &str,
    default_account_id: Option<&str>,
) -> String {
    list_bound_account_ids(bindings, channel)
        .into_iter()
        .next()
        .or_else(|| {
            default_account_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string())
}
