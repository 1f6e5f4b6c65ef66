//! Framing and chunking for delivering a `send` message through tmux's
//! paste-buffer mechanism (`set-buffer` / `paste-buffer`) instead of
//! `send-keys`, so a message lands in the target pane atomically rather than
//! being typed character by character. The multiplexer adapter in
//! `af-supervisor` drives `set-buffer`/`paste-buffer`; this module only
//! owns the wire shape: sender framing and the 64KiB chunk cap.

/// tmux buffers are effectively unbounded, but a single giant paste can wedge
/// a pane waiting on a shell's line-edit buffer. Splitting into chunks of
/// this size keeps a bad send from hanging the whole pane.
pub const MAX_CHUNK_BYTES: usize = 64 * 1024;

/// Wraps `body` with a `[<sender>]` header line when the message came from
/// another terminal (broadcast / relay), or leaves it bare for an operator's
/// own typed message.
pub fn frame_message(sender: Option<&str>, body: &str) -> String {
    match sender {
        Some(sender) => format!("[{sender}]\n{body}\n"),
        None => format!("{body}\n"),
    }
}

/// Splits `data` into chunks no larger than `max_bytes`, breaking only at
/// UTF-8 character boundaries so no chunk ends mid-codepoint.
pub fn chunk(data: &str, max_bytes: usize) -> Vec<String> {
    if data.len() <= max_bytes {
        return vec![data.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < data.len() {
        let mut end = (start + max_bytes).min(data.len());
        while end > start && !data.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // a single char longer than max_bytes (impossible for max_bytes
            // >= 4, but guard against a pathological max_bytes anyway)
            end = data[start..].chars().next().map_or(data.len(), |c| start + c.len_utf8());
        }
        chunks.push(data[start..end].to_string());
        start = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_with_sender_adds_header() {
        let framed = frame_message(Some("builder-0001"), "hello");
        assert_eq!(framed, "[builder-0001]\nhello\n");
    }

    #[test]
    fn frame_without_sender_is_bare() {
        assert_eq!(frame_message(None, "hello"), "hello\n");
    }

    #[test]
    fn chunk_short_message_is_single_chunk() {
        let chunks = chunk("hello", MAX_CHUNK_BYTES);
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn chunk_splits_long_message() {
        let data = "a".repeat(150_000);
        let chunks = chunk(&data, MAX_CHUNK_BYTES);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= MAX_CHUNK_BYTES));
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn chunk_does_not_split_multibyte_chars() {
        let data = "é".repeat(40_000); // 2 bytes each, 80_000 bytes total
        let chunks = chunk(&data, MAX_CHUNK_BYTES);
        for c in &chunks {
            assert!(c.is_char_boundary(c.len()));
            assert!(std::str::from_utf8(c.as_bytes()).is_ok());
        }
        assert_eq!(chunks.concat(), data);
    }
}
