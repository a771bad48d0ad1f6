//! Server-sent-events framing for streamed model responses.

/// Parse a single SSE line.
/// SSE format: `event: <type>\ndata: <json>\n\n`
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event:") {
        Some(SseParsed::Event(event_type.trim_start().to_string()))
    } else {
        line.strip_prefix("data:")
            .map(|data| SseParsed::Data(data.trim_start().to_string()))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

/// Accumulates raw bytes from the HTTP body and hands out complete lines.
///
/// Network chunks split lines (and UTF-8 sequences) arbitrarily; the
/// incomplete tail is kept until the next `push`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line completed by them, trimmed,
    /// skipping blank lines.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the body ends (a final line without `\n`).
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_and_event_lines() {
        assert_eq!(
            parse_sse_line("data: {\"a\":1}"),
            Some(SseParsed::Data("{\"a\":1}".to_string()))
        );
        assert_eq!(
            parse_sse_line("data:{}"),
            Some(SseParsed::Data("{}".to_string()))
        );
        assert_eq!(
            parse_sse_line("event: ping"),
            Some(SseParsed::Event("ping".to_string()))
        );
        assert_eq!(parse_sse_line(": keep-alive"), None);
    }

    #[test]
    fn keeps_partial_lines_across_pushes() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"te").is_empty());
        let lines = buf.push(b"xt\":1}\r\n\r\ndata: 2\n");
        assert_eq!(lines, vec!["data: {\"text\":1}", "data: 2"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn split_utf8_sequence_is_reassembled() {
        let bytes = "data: é\n".as_bytes();
        let mut buf = LineBuffer::new();
        assert!(buf.push(&bytes[..7]).is_empty());
        assert_eq!(buf.push(&bytes[7..]), vec!["data: é"]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: last");
        assert_eq!(buf.finish().as_deref(), Some("data: last"));
    }
}
