//! Incremental Server-Sent Events decoder for the consuming side.
//!
//! Bytes arrive in arbitrary chunks; a frame is complete at a blank line.
//! Only the `data`, `event` and `id` fields are kept. Comment lines
//! (keep-alives) are skipped.
//!
//! ```text
//! data: {"type":"start","totalSources":2}
//!
//! : keep-alive
//!
//! data: {"type":"complete","completedSources":2}
//! ```

/// One decoded SSE frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// The `id:` field, if present.
    pub id: Option<String>,
}

/// Stateful decoder fed with raw body chunks.
///
/// Buffers bytes rather than text so a multi-byte character split across
/// two chunks decodes correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: Option<PendingFrame>,
}

#[derive(Debug, Default)]
struct PendingFrame {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(frame) = self.line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let text = String::from_utf8_lossy(&rest);
            let text = text.trim_end_matches('\r');
            if let Some(frame) = self.line(text) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        let pending = self.pending.get_or_insert_with(PendingFrame::default);
        match field {
            "data" => pending.data.push(value.to_owned()),
            "event" => pending.event = Some(value.to_owned()),
            "id" => pending.id = Some(value.to_owned()),
            _ => {}
        }
        None
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        let pending = self.pending.take()?;
        if pending.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: pending.event,
            data: pending.data.join("\n"),
            id: pending.id,
        })
    }
}
