//! Fixed-window text chunking for document indexing.

/// Split `text` into windows of `size` characters that overlap by `overlap`.
///
/// Windows advance by `size - overlap` characters; the last window ends at the
/// end of the text. `overlap` must be smaller than `size` (checked by config
/// validation); a degenerate step is clamped to one character.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
