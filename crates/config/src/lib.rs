//! Parsed configuration structures and semantic validation.
//!
//! This crate owns the config types every engine consumes (bindings, session
//! scoping, send-policy rules, lane and queue options, retry overrides). It
//! never touches files or the environment; whatever outer layer loads config
//! hands the parsed structures in.

pub mod schema;
pub mod validate;

pub use {
    schema::{
        AgentBinding, AgentEntry, AgentsConfig, BindingMatch, LanesConfig, QueueConfig,
        RetryConfig, RuleMatch, SendPolicyConfig, SendPolicyRule, SessionConfig, SwitchyardConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
