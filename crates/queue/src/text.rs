//! Text shaping for queue summaries.

/// Default character budget for [`elide`].
pub const DEFAULT_ELIDE_LIMIT: usize = 140;
/// Default character budget for [`summary_line`].
pub const DEFAULT_SUMMARY_LINE_LIMIT: usize = 160;

/// Truncates `text` to at most `limit` characters, ellipsis included.
///
/// Trailing whitespace is stripped before measuring. A cut landing
/// mid-word backs up to the previous word boundary; text without any
/// boundary is cut hard. Lengths count Unicode scalar values, so a
/// multi-byte character never splits. A limit of zero leaves only the
/// ellipsis.
#[must_use]
pub fn elide(text: &str, limit: usize) -> String {
    let trimmed = text.trim_end();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= limit {
        return trimmed.to_string();
    }
    if limit == 0 {
        return "…".to_string();
    }
    let keep = limit - 1;
    let cut_end = if chars[keep].is_whitespace() {
        keep
    } else {
        match chars[..keep].iter().rposition(|c| c.is_whitespace()) {
            Some(space) if space > 0 => space,
            _ => keep,
        }
    };
    let mut out: String = chars[..cut_end].iter().collect();
    let kept = out.trim_end().len();
    out.truncate(kept);
    out.push('…');
    out
}

/// Flattens `text` into a single whitespace-normalized line, elided to `limit`.
#[must_use]
pub fn summary_line(text: &str, limit: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    elide(&collapsed, limit)
}
