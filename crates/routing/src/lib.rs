//! Route inbound events to agents and gate outbound delivery.
//!
//! Binding cascade (precedence):
//! 1. Peer binding (exact peer match)
//! 2. Parent-peer binding (thread inside a bound peer)
//! 3. Guild binding (Discord guild ID)
//! 4. Team binding (Slack/Teams team ID)
//! 5. Account binding (channel + exact account)
//! 6. Channel binding (channel + wildcard account)
//! 7. Default agent (first configured agent, else `main`)

pub mod bindings;
pub mod resolve;
pub mod send_policy;
pub mod session_key;

pub use {
    bindings::{
        channel_account_bindings, default_agent_bound_account_id, list_bound_account_ids,
        preferred_account_id,
    },
    resolve::{MatchedBy, ResolvedRoute, RouteQuery, resolve_route},
    send_policy::{SendPolicyQuery, resolve_send_policy},
    session_key::{
        DEFAULT_ACCOUNT_ID, DEFAULT_AGENT_ID, DEFAULT_MAIN_KEY, SessionKeyParams, ThreadKeyParams,
        ThreadKeys, agent_id_from_session_key, agent_main_session_key, build_session_key,
        group_history_key, normalize_account_id, normalize_agent_id, normalize_main_key,
        thread_session_keys, to_request_session_key, to_store_session_key,
    },
};
