//! Character-safe text helpers.

/// Count of Unicode scalar values in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Keep at most `max_chars` characters, appending `...` when something was cut
/// and `ellipsis` is set.
pub fn sub(text: &str, max_chars: usize, ellipsis: bool) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_index, _)) => {
            let mut cut = text[..byte_index].to_string();
            if ellipsis {
                cut.push_str("...");
            }
            cut
        }
    }
}
