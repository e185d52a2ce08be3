//! Text chunking with configurable size and overlap.

/// A slice of a document ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub position: u32,
    pub start: usize,
    pub text: String,
}

/// Split `text` into overlapping chunks of at most `chunk_size` bytes.
///
/// Boundaries are moved to the nearest char boundary. A trailing fragment
/// shorter than a tenth of `chunk_size` is dropped when it is not the only
/// chunk.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    let chunk_size = chunk_size.max(1);
    let step = if chunk_size > overlap {
        chunk_size - overlap
    } else {
        chunk_size
    };

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // chunk_size smaller than one char
            end = start + 1;
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
        }

        let slice = &text[start..end];
        if slice.len() < chunk_size / 10 && !chunks.is_empty() {
            break;
        }

        let trimmed = slice.trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                position: chunks.len() as u32,
                start,
                text: trimmed.to_string(),
            });
        }

        if end == text.len() {
            break;
        }

        let mut next = start + step;
        while next < text.len() && !text.is_char_boundary(next) {
            next += 1;
        }
        start = next;
    }

    tracing::debug!(
        chunks = chunks.len(),
        chunk_size,
        overlap,
        "Chunked text"
    );
    chunks
}
