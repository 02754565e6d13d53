/// Default length of a result snippet, in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 160;

/// Share of the snippet window placed before the match.
const LEAD_FRACTION: usize = 3;

/// Extract roughly `max_chars` characters of context around the byte
/// `offset` in `text`.
///
/// The window starts about a third of its length before the offset.
/// Whitespace runs are collapsed to single spaces and `...` marks a cut on
/// either side. Returns `None` for blank text.
///
/// # Examples
///
/// ```
/// use docsift::text_util::extract_snippet;
///
/// let text = "intro\n\nthe needle sits here";
/// let offset = text.find("needle").unwrap();
/// let snippet = extract_snippet(text, offset, 160).unwrap();
/// assert_eq!(snippet, "intro the needle sits here");
/// ```
pub fn extract_snippet(
    text: &str,
    offset: usize,
    max_chars: usize,
) -> Option<String> {
    if text.trim().is_empty() || max_chars == 0 {
        return None;
    }

    let offset = floor_char_boundary(text, offset);
    let lead = max_chars / LEAD_FRACTION;

    let start = text[..offset]
        .char_indices()
        .rev()
        .take(lead)
        .last()
        .map_or(offset, |(i, _)| i);
    let end = text[start..]
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(i, _)| start + i);

    let body = text[start..end].split_whitespace().collect::<Vec<_>>();
    if body.is_empty() {
        return None;
    }

    let mut snippet = String::new();
    if !text[..start].trim().is_empty() {
        snippet.push_str("...");
    }
    snippet.push_str(&body.join(" "));
    if !text[end..].trim().is_empty() {
        snippet.push_str("...");
    }
    Some(snippet)
}

/// 1-indexed line number containing the byte `offset`.
pub fn line_number_at(text: &str, offset: usize) -> usize {
    let offset = floor_char_boundary(text, offset);
    text[..offset].matches('\n').count() + 1
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
