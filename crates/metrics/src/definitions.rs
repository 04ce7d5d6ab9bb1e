//! Metric name and label definitions.
//!
//! Every metric name the switchyard crates emit lives here so dashboards and
//! alerts have one place to look.

/// Route resolution metrics
pub mod routing {
    /// Total route resolutions performed
    pub const RESOLUTIONS_TOTAL: &str = "switchyard_routing_resolutions_total";
    /// Resolutions that fell through to the default agent
    pub const DEFAULT_FALLBACKS_TOTAL: &str = "switchyard_routing_default_fallbacks_total";
    /// Resolutions where the bound agent was missing from the agent list
    pub const UNKNOWN_AGENT_TOTAL: &str = "switchyard_routing_unknown_agent_total";
}

/// Send policy metrics
pub mod send_policy {
    /// Total policy evaluations
    pub const EVALUATIONS_TOTAL: &str = "switchyard_send_policy_evaluations_total";
    /// Evaluations denied (by override, rule, or default)
    pub const DENIED_TOTAL: &str = "switchyard_send_policy_denied_total";
    /// Evaluations short-circuited by a session entry override
    pub const OVERRIDES_TOTAL: &str = "switchyard_send_policy_overrides_total";
}

/// Lane scheduler metrics
pub mod lanes {
    /// Total tasks enqueued
    pub const TASKS_ENQUEUED_TOTAL: &str = "switchyard_lane_tasks_enqueued_total";
    /// Total tasks completed (success or failure)
    pub const TASKS_COMPLETED_TOTAL: &str = "switchyard_lane_tasks_completed_total";
    /// Task failures
    pub const TASK_ERRORS_TOTAL: &str = "switchyard_lane_task_errors_total";
    /// Tasks cancelled while still queued
    pub const TASKS_CANCELLED_TOTAL: &str = "switchyard_lane_tasks_cancelled_total";
    /// Queued tasks that exceeded their wait warning threshold
    pub const WAIT_EXCEEDED_TOTAL: &str = "switchyard_lane_wait_exceeded_total";
    /// Time spent in queued state before admission, in seconds
    pub const QUEUE_WAIT_SECONDS: &str = "switchyard_lane_queue_wait_seconds";
    /// Currently queued tasks across all lanes
    pub const QUEUED: &str = "switchyard_lane_tasks_queued";
    /// Currently active tasks across all lanes
    pub const ACTIVE: &str = "switchyard_lane_tasks_active";
}

/// Retry executor metrics
pub mod retry {
    /// Total operations wrapped in retry
    pub const OPERATIONS_TOTAL: &str = "switchyard_retry_operations_total";
    /// Individual retry attempts after a failure
    pub const ATTEMPTS_TOTAL: &str = "switchyard_retry_attempts_total";
    /// Operations that exhausted every attempt
    pub const EXHAUSTED_TOTAL: &str = "switchyard_retry_exhausted_total";
    /// Delay slept between attempts, in seconds
    pub const BACKOFF_SECONDS: &str = "switchyard_retry_backoff_seconds";
}

/// Overflow queue metrics
pub mod queue {
    /// Items admitted into a queue
    pub const ITEMS_ADMITTED_TOTAL: &str = "switchyard_queue_items_admitted_total";
    /// Items rejected under the "new" drop policy
    pub const ITEMS_REJECTED_TOTAL: &str = "switchyard_queue_items_rejected_total";
    /// Items evicted under the "old" and "summarize" drop policies
    pub const ITEMS_DROPPED_TOTAL: &str = "switchyard_queue_items_dropped_total";
    /// Overflow notices rendered
    pub const OVERFLOW_NOTICES_TOTAL: &str = "switchyard_queue_overflow_notices_total";
}

/// Common label keys
pub mod labels {
    pub const AGENT: &str = "agent";
    pub const CHANNEL: &str = "channel";
    pub const ACCOUNT_ID: &str = "account_id";
    pub const LANE: &str = "lane";
    pub const BINDING_LEVEL: &str = "binding_level";
    pub const ACTION: &str = "action";
    pub const DROP_POLICY: &str = "drop_policy";
}
