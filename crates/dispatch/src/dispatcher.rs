//! End-to-end dispatch composition.

use std::{future::Future, sync::Arc};

use tracing::debug;

use {
    switchyard_common::SendPolicy,
    switchyard_config::SwitchyardConfig,
    switchyard_lanes::{EnqueueOptions, LaneScheduler},
    switchyard_retry::{RetryOptions, RetryPolicy, resolve_retry_policy, retry},
    switchyard_routing::{ResolvedRoute, SendPolicyQuery, resolve_route, resolve_send_policy},
    switchyard_sessions::{SessionEntry, SessionStore},
};

use crate::{
    error::{Error, Result},
    event::InboundEvent,
    inbox::{CollectedBatch, SessionInboxes},
};

/// Lane name for a route: `<channel>:<accountId>`.
///
/// All deliveries for one account on one channel share a lane, so they keep
/// their arrival order.
#[must_use]
pub fn delivery_lane(route: &ResolvedRoute) -> String {
    format!("{}:{}", route.channel, route.account_id)
}

/// Composition root: routes inbound events, gates outbound sends, and
/// schedules the work in between.
///
/// Owns the parsed config, the lane scheduler, the session store handle, the
/// normalized retry policy, and the per-session inboxes. Wrap it in an `Arc`
/// to share with task bodies.
pub struct Dispatcher {
    cfg: SwitchyardConfig,
    scheduler: LaneScheduler,
    store: Arc<dyn SessionStore>,
    retry_policy: RetryPolicy,
    inboxes: SessionInboxes,
}

impl Dispatcher {
    #[must_use]
    pub fn new(cfg: SwitchyardConfig, store: Arc<dyn SessionStore>) -> Self {
        let scheduler = LaneScheduler::new(&cfg.lanes);
        let retry_policy = resolve_retry_policy(None, Some(&cfg.retry));
        let inboxes = SessionInboxes::new(cfg.queue.clone());
        Self { cfg, scheduler, store, retry_policy, inboxes }
    }

    #[must_use]
    pub fn config(&self) -> &SwitchyardConfig {
        &self.cfg
    }

    #[must_use]
    pub fn scheduler(&self) -> &LaneScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    #[must_use]
    pub fn inboxes(&self) -> &SessionInboxes {
        &self.inboxes
    }

    /// Resolves which agent and session an event belongs to.
    #[must_use]
    pub fn route(&self, event: &InboundEvent) -> ResolvedRoute {
        resolve_route(&self.cfg, &event.route_query())
    }

    /// Whether output may be delivered on the routed session.
    pub async fn may_send(&self, route: &ResolvedRoute) -> Result<bool> {
        let entry = self.store.get(&route.session_key).await?;
        let decision = resolve_send_policy(
            self.cfg.send_policy.as_ref(),
            entry.as_ref(),
            &SendPolicyQuery {
                channel: Some(&route.channel),
                chat_type: route.peer.as_ref().and_then(|peer| peer.kind.chat_type()),
                session_key: Some(&route.session_key),
            },
        );
        Ok(decision == SendPolicy::Allow)
    }

    /// Routes an event and queues `task` on its delivery lane.
    ///
    /// The task receives the resolved route; its outcome comes back through
    /// the returned future once the lane has run it. Per-lane concurrency
    /// follows the lanes config.
    pub fn submit<T, F, Fut>(
        &self,
        event: &InboundEvent,
        task: F,
    ) -> impl Future<Output = Result<T>> + Send + use<T, F, Fut>
    where
        T: Send + 'static,
        F: FnOnce(ResolvedRoute) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let route = self.route(event);
        let lane = delivery_lane(&route);
        debug!(
            event = %event.id,
            agent = %route.agent_id,
            lane = %lane,
            matched_by = route.matched_by.as_str(),
            "submitting event"
        );
        let pending = self.scheduler.enqueue(&lane, EnqueueOptions::default(), move || task(route));
        async move { pending.await.map_err(Error::from) }
    }

    /// Runs `operation` under the dispatcher's retry policy.
    pub async fn with_retry<T, F, Fut>(
        &self,
        options: &RetryOptions,
        operation: F,
    ) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        retry(&self.retry_policy, options, operation).await
    }

    /// Routes an event and buffers it on its session inbox.
    ///
    /// Returns the route and whether the inbox accepted the event.
    pub fn buffer_event(&self, event: InboundEvent) -> (ResolvedRoute, bool) {
        let route = self.route(&event);
        let accepted = self.inboxes.admit(&route.session_key, event);
        if !accepted {
            debug!(session = %route.session_key, "inbox full; event rejected");
        }
        (route, accepted)
    }

    /// Drains a session inbox once it has been quiet for its debounce window.
    pub async fn collect(&self, session_key: &str) -> CollectedBatch {
        self.inboxes.collect(session_key).await
    }

    /// Records a completed delivery on the session entry.
    ///
    /// Creates the entry if the session has none yet; the session's home
    /// channel is set on first write and left alone afterwards.
    pub async fn record_delivery(&self, route: &ResolvedRoute, to: &str) -> Result<()> {
        let mut entry =
            self.store.get(&route.session_key).await?.unwrap_or_else(SessionEntry::new);
        if entry.channel.is_none() {
            entry.channel = Some(route.channel.clone());
        }
        entry.record_delivery(route.channel.clone(), to);
        self.store.put(&route.session_key, entry).await?;
        Ok(())
    }
}
