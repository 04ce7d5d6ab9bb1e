//! Normalized inbound events.

use {
    switchyard_common::PeerLocator, switchyard_routing::RouteQuery, switchyard_sessions::now_ms,
    uuid::Uuid,
};

/// Fresh unique event id.
#[must_use]
pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// One inbound message as handed over by a channel adapter.
///
/// Only the fields the dispatch core reads are modeled; adapters keep their
/// raw payloads to themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEvent {
    /// Unique id, assigned at construction.
    pub id: String,
    /// Channel that produced the event, e.g. `telegram`.
    pub channel: String,
    /// Account the event arrived on; empty means the channel default.
    pub account_id: String,
    pub peer: Option<PeerLocator>,
    /// Enclosing conversation for threaded events.
    pub parent_peer: Option<PeerLocator>,
    pub guild_id: Option<String>,
    pub team_id: Option<String>,
    /// Sender display name, when the adapter knows it.
    pub sender: Option<String>,
    pub text: String,
    pub received_at_ms: u64,
}

impl InboundEvent {
    /// Event with a fresh id, stamped with the current time.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        account_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            channel: channel.into(),
            account_id: account_id.into(),
            text: text.into(),
            received_at_ms: now_ms(),
            ..Self::default()
        }
    }

    /// Borrowed view the route resolver consumes.
    #[must_use]
    pub fn route_query(&self) -> RouteQuery<'_> {
        RouteQuery {
            channel: &self.channel,
            account_id: &self.account_id,
            peer: self.peer.as_ref(),
            parent_peer: self.parent_peer.as_ref(),
            guild_id: self.guild_id.as_deref(),
            team_id: self.team_id.as_deref(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, switchyard_common::PeerKind};

    #[test]
    fn test_new_events_get_distinct_ids() {
        let a = InboundEvent::new("telegram", "default", "hello");
        let b = InboundEvent::new("telegram", "default", "hello");
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert!(a.received_at_ms > 0);
    }

    #[test]
    fn test_route_query_borrows_every_qualifier() {
        let event = InboundEvent {
            peer: Some(PeerLocator::new(PeerKind::Group, "room1")),
            guild_id: Some("guild1".into()),
            ..InboundEvent::new("discord", "bot1", "hi")
        };
        let query = event.route_query();
        assert_eq!(query.channel, "discord");
        assert_eq!(query.account_id, "bot1");
        assert_eq!(query.peer.unwrap().id, "room1");
        assert_eq!(query.guild_id, Some("guild1"));
        assert_eq!(query.team_id, None);
    }
}
