//! End-to-end dispatch: route, gate, schedule.
//!
//! Composes the routing cascade, the send-policy engine, the lane scheduler,
//! the session store contract and per-session inboxes into one surface.
//! Channel adapters hand in [`InboundEvent`]s and get back routing decisions,
//! delivery verdicts and scheduled task results.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod inbox;

pub use {
    dispatcher::{Dispatcher, delivery_lane},
    error::{Context, Error, Result},
    event::{InboundEvent, new_event_id},
    inbox::{CollectedBatch, SessionInboxes},
};
