//! Session entries and the store contract.
//!
//! A session entry carries the per-conversation metadata the dispatch
//! core reads at delivery time (send-policy override, channel, chat
//! type, last delivery hop). Persistence lives behind [`SessionStore`];
//! [`InMemorySessionStore`] covers tests and single-node use.

pub mod entry;
pub mod error;
pub mod store;

pub use {
    entry::{SessionEntry, now_ms},
    error::{Context, Error, Result},
    store::{InMemorySessionStore, SessionStore},
};
