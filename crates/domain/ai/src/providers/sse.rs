/// Accumulates raw bytes from a streamed HTTP body and yields complete
/// `data: ...` line payloads, buffering partial lines across network reads
/// (a single TCP read need not align with an SSE line boundary).
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `bytes` into the buffer and drains every complete line, returning
    /// the payload of each `data:` line (prefix and surrounding whitespace
    /// stripped). Non-`data:` lines (e.g. `event:`, blank keep-alives) are
    /// dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(payload) = line.strip_prefix("data:") {
                let payload = payload.trim();
                if !payload.is_empty() {
                    payloads.push(payload.to_string());
                }
            }
        }
        payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_payload_split_across_two_feeds() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.feed(b"data: {\"a\":").is_empty());
        let payloads = buf.feed(b"1}\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut buf = SseLineBuffer::new();
        let payloads = buf.feed(b"event: ping\ndata: {\"ok\":true}\n\n");
        assert_eq!(payloads, vec!["{\"ok\":true}".to_string()]);
    }

    #[test]
    fn recognizes_done_sentinel() {
        let mut buf = SseLineBuffer::new();
        let payloads = buf.feed(b"data: [DONE]\n");
        assert_eq!(payloads, vec!["[DONE]".to_string()]);
    }
}
