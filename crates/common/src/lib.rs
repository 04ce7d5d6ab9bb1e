//! Shared value types and error plumbing used across all switchyard crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result, SwitchyardError},
    types::{ChatType, DmScope, DropPolicy, PeerKind, PeerLocator, SendPolicy},
};
