//! Bounded body accumulator with an exact truncation marker
//!
//! Captured bytes are kept up to `max` bytes. Everything past that is counted
//! but not stored, and the rendered text ends with
//! `"\n... [truncated N bytes]"` where `N` is the exact overflow.
//!
//! An accumulator is only created while the capture gate is open; closed-gate
//! calls never allocate one.

/// Render the truncation marker for `dropped` bytes
pub fn truncation_marker(dropped: u64) -> String {
    format!("\n... [truncated {} bytes]", dropped)
}

/// Truncate an already-complete text against `max` bytes
///
/// Used for bodies that arrive in one piece. Streaming bodies go through
/// [`BodyCapture`].
pub fn truncate_text(text: &str, max: usize) -> String {
    let mut capture = BodyCapture::new(max);
    capture.push(text.as_bytes());
    capture.render()
}

/// Bounded accumulator for request writes or response chunks
#[derive(Debug, Clone)]
pub struct BodyCapture {
    retained: Vec<u8>,
    max: usize,
    dropped: u64,
}

impl BodyCapture {
    pub fn new(max: usize) -> Self {
        Self {
            retained: Vec::new(),
            max,
            dropped: 0,
        }
    }

    /// Append a chunk, keeping at most `max` bytes overall
    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.max.saturating_sub(self.retained.len());
        let take = room.min(chunk.len());
        self.retained.extend_from_slice(&chunk[..take]);
        self.dropped += (chunk.len() - take) as u64;
    }

    /// Bytes stored so far
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Bytes seen, stored or not
    pub fn total_len(&self) -> u64 {
        self.retained.len() as u64 + self.dropped
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Text form of the captured body
    ///
    /// Valid UTF-8 is kept as is. A multi-byte character cut at the limit is
    /// replaced with U+FFFD. Anything else that is not text degrades to a
    /// `<binary body: N bytes>` placeholder.
    pub fn render(&self) -> String {
        let mut text = match std::str::from_utf8(&self.retained) {
            Ok(s) => s.to_owned(),
            Err(e) if e.error_len().is_none() => String::from_utf8_lossy(&self.retained).into_owned(),
            Err(_) => return format!("<binary body: {} bytes>", self.total_len()),
        };
        if self.dropped > 0 {
            text.push_str(&truncation_marker(self.dropped));
        }
        text
    }
}
