//! Semantic validation for parsed configuration.
//!
//! The dispatch core never rejects a config outright; every engine normalizes
//! or falls back at runtime. Validation exists so the outer layer can surface
//! the spots where that will happen before any event is routed.

use std::collections::{HashMap, HashSet};

use crate::schema::SwitchyardConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "agents", "binding", "send-policy", "lanes", "queue",
    /// "retry", "session"
    pub category: &'static str,
    /// Dotted path, e.g. "bindings[2].match.peer"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a parsed configuration. Never mutates, never fails.
#[must_use]
pub fn validate(config: &SwitchyardConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    check_agents(config, &mut diagnostics);
    check_bindings(config, &mut diagnostics);
    check_send_policy(config, &mut diagnostics);
    check_lanes(config, &mut diagnostics);
    check_queue(config, &mut diagnostics);
    check_retry(config, &mut diagnostics);
    check_session(config, &mut diagnostics);

    ValidationResult { diagnostics }
}

fn check_agents(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for (idx, agent) in config.agents.list.iter().enumerate() {
        if agent.id.trim().is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "agents",
                path: format!("agents.list[{idx}].id"),
                message: "agent has an empty id".into(),
            });
            continue;
        }
        if !seen.insert(agent.id.trim().to_lowercase()) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "agents",
                path: format!("agents.list[{idx}].id"),
                message: format!("duplicate agent id \"{}\"", agent.id),
            });
        }
    }
}

fn check_bindings(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    let known_agents: HashSet<String> = config
        .agents
        .list
        .iter()
        .map(|a| a.id.trim().to_lowercase())
        .collect();

    let mut seen_criteria: Vec<String> = Vec::new();

    for (idx, binding) in config.bindings.iter().enumerate() {
        if binding.agent_id.trim().is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "binding",
                path: format!("bindings[{idx}].agent_id"),
                message: "binding has no agent_id".into(),
            });
        } else if !known_agents.is_empty()
            && !known_agents.contains(&binding.agent_id.trim().to_lowercase())
        {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "binding",
                path: format!("bindings[{idx}].agent_id"),
                message: format!(
                    "binding references unknown agent \"{}\"; it will fall back to the default agent",
                    binding.agent_id
                ),
            });
        }

        if binding.criteria.channel.trim().is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "binding",
                path: format!("bindings[{idx}].match.channel"),
                message: "binding has no channel and can only match events without one".into(),
            });
        }

        if let Some(ref peer) = binding.criteria.peer
            && peer.id.trim().is_empty()
        {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "binding",
                path: format!("bindings[{idx}].match.peer"),
                message: "peer qualifier has an empty id".into(),
            });
        }

        // Exact duplicates: the later one never fires.
        let fingerprint = format!(
            "{}|{:?}|{:?}|{:?}|{:?}",
            binding.criteria.channel.trim().to_lowercase(),
            binding.criteria.account_id,
            binding.criteria.peer,
            binding.criteria.guild_id,
            binding.criteria.team_id,
        );
        if seen_criteria.contains(&fingerprint) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "binding",
                path: format!("bindings[{idx}]"),
                message: "binding duplicates an earlier one and will never fire".into(),
            });
        }
        seen_criteria.push(fingerprint);
    }
}

fn check_send_policy(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    let Some(ref policy) = config.send_policy else {
        return;
    };

    for (idx, rule) in policy.rules.iter().enumerate() {
        let is_last = idx + 1 == policy.rules.len();
        if rule.criteria.is_catch_all() && !is_last {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "send-policy",
                path: format!("send_policy.rules[{idx}]"),
                message: "rule matches everything; later rules are unreachable".into(),
            });
        }
        if let Some(ref prefix) = rule.criteria.key_prefix
            && prefix.trim().is_empty()
        {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "send-policy",
                path: format!("send_policy.rules[{idx}].match.key_prefix"),
                message: "empty key_prefix matches every session key".into(),
            });
        }
    }
}

fn check_lanes(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    for (lane, limit) in &config.lanes.concurrency {
        if lane.trim().is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "lanes",
                path: "lanes.concurrency".into(),
                message: "empty lane name maps to the main lane".into(),
            });
        }
        if *limit == 0 {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "lanes",
                path: format!("lanes.concurrency.{lane}"),
                message: "concurrency 0 is clamped to 1 at runtime".into(),
            });
        }
    }

    if config.lanes.default_concurrency == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "lanes",
            path: "lanes.default_concurrency".into(),
            message: "concurrency 0 is clamped to 1 at runtime".into(),
        });
    }

    if config.lanes.warn_after_ms == Some(0) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "lanes",
            path: "lanes.warn_after_ms".into(),
            message: "warn_after_ms 0 fires a wait warning for every queued task".into(),
        });
    }
}

fn check_queue(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.queue.cap == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "queue",
            path: "queue.cap".into(),
            message: "cap 0 means the inbound queue is unbounded".into(),
        });
    }

    if config.queue.summary_limit == 0
        && config.queue.drop_policy == switchyard_common::DropPolicy::Summarize
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "queue",
            path: "queue.summary_limit".into(),
            message: "summary_limit 0 discards every overflow summary line".into(),
        });
    }
}

fn check_retry(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    let retry = &config.retry;

    if let Some(attempts) = retry.attempts
        && (!attempts.is_finite() || attempts < 1.0)
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "retry",
            path: "retry.attempts".into(),
            message: format!("attempts {attempts} normalizes to the default (3)"),
        });
    }

    if let Some(min) = retry.min_delay_ms
        && (!min.is_finite() || min < 0.0)
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "retry",
            path: "retry.min_delay_ms".into(),
            message: format!("min_delay_ms {min} normalizes to the default (300)"),
        });
    }

    if let Some(max) = retry.max_delay_ms {
        if !max.is_finite() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "retry",
                path: "retry.max_delay_ms".into(),
                message: "max_delay_ms normalizes to the default (30000)".into(),
            });
        } else if let Some(min) = retry.min_delay_ms
            && min.is_finite()
            && max < min
        {
            diagnostics.push(Diagnostic {
                severity: Severity::Info,
                category: "retry",
                path: "retry.max_delay_ms".into(),
                message: "max_delay_ms is below min_delay_ms and will be raised to it".into(),
            });
        }
    }

    if let Some(jitter) = retry.jitter
        && (!jitter.is_finite() || !(0.0..=1.0).contains(&jitter))
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "retry",
            path: "retry.jitter".into(),
            message: format!("jitter {jitter} is clamped into [0, 1]"),
        });
    }
}

fn check_session(config: &SwitchyardConfig, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(ref main_key) = config.session.main_key
        && main_key.trim().is_empty()
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "session",
            path: "session.main_key".into(),
            message: "empty main_key falls back to \"main\"".into(),
        });
    }

    // An alias claimed by two canonical names resolves to whichever map
    // iteration hits first; flag it.
    let mut alias_owner: HashMap<String, &str> = HashMap::new();
    for (canonical, aliases) in &config.session.identity_links {
        for alias in aliases {
            let normalized = alias.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            if let Some(prior) = alias_owner.get(normalized.as_str()) {
                if *prior != canonical.as_str() {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        category: "session",
                        path: format!("session.identity_links.{canonical}"),
                        message: format!(
                            "alias \"{alias}\" is also linked to \"{prior}\"; resolution is ambiguous"
                        ),
                    });
                }
            } else {
                alias_owner.insert(normalized, canonical.as_str());
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
