//! Prompt assembly for drained queue items.
//!
//! When a burst of buffered items is handed to an agent as one combined
//! prompt, the header carries the overflow summary (if any) and each
//! item renders as its own block.

/// Channel affinity of one queued item, as seen by
/// [`has_cross_channel_items`].
#[derive(Debug, Clone, Default)]
pub struct ChannelScope {
    /// Grouping key, typically the channel id. `None` counts as its own
    /// distinct group.
    pub key: Option<String>,
    /// Set when the item is already known to span channels.
    pub cross: bool,
}

/// Joins a title, an optional summary and rendered items into one prompt.
///
/// The summary attaches to the title line; item blocks are separated by
/// blank lines. `render_item` receives each item with its zero-based
/// position.
pub fn build_collect_prompt<T, F>(
    title: &str,
    summary: Option<&str>,
    items: &[T],
    render_item: F,
) -> String
where
    F: Fn(&T, usize) -> String,
{
    let header = match summary {
        Some(summary) if !summary.is_empty() => format!("{title}\n{summary}"),
        _ => title.to_string(),
    };
    let mut blocks = Vec::with_capacity(items.len() + 1);
    blocks.push(header);
    for (index, item) in items.iter().enumerate() {
        blocks.push(render_item(item, index));
    }
    blocks.join("\n\n")
}

/// Whether the batch mixes conversational origins.
///
/// True when any item is flagged cross-channel, or when the items map to
/// more than one grouping key.
pub fn has_cross_channel_items<T, F>(items: &[T], classify: F) -> bool
where
    F: Fn(&T) -> ChannelScope,
{
    let mut first_key: Option<Option<String>> = None;
    for item in items {
        let scope = classify(item);
        if scope.cross {
            return true;
        }
        match &first_key {
            None => first_key = Some(scope.key),
            Some(seen) => {
                if *seen != scope.key {
                    return true;
                }
            },
        }
    }
    false
}
