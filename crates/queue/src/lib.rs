//! Capacity-bounded buffering for per-session inbound bursts.
//!
//! An [`OverflowQueue`] accepts items until its cap, then sheds load per
//! its drop policy: reject the newcomer, evict the oldest, or evict and
//! fold the evicted items into a one-shot summary notice. Companion
//! helpers shape the summaries and assemble drained batches into a
//! single prompt.

pub mod collect;
pub mod state;
pub mod text;

pub use {
    collect::{ChannelScope, build_collect_prompt, has_cross_channel_items},
    state::{NoticeStyle, OverflowQueue, debounce_wait},
    text::{DEFAULT_ELIDE_LIMIT, DEFAULT_SUMMARY_LINE_LIMIT, elide, summary_line},
};
