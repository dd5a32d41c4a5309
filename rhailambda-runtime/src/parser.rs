//! Streaming decoder for the `invocation/next` response
//!
//! The transport hands over raw header lines and body chunks one at a time.
//! Header lines become context entries, body chunks are concatenated into the
//! payload. Both callbacks always report everything as consumed.

use rhailambda_core::{Context, Payload};

/// Decode one raw header line (`Key: Value\r\n`) into `context`
///
/// Lines without a colon, such as the status line, are dropped. The value is
/// stored byte for byte. Returns the number of bytes consumed, which is always
/// the full line.
pub fn parse_header_line(line: &[u8], context: &mut Context) -> usize {
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return line.len();
    };

    let key = String::from_utf8_lossy(&line[..colon]);

    // Skip ": " after the key and the CRLF terminator
    let start = colon + 2;
    let end = line.len().saturating_sub(2);
    let value = if start < end { &line[start..end] } else { &[][..] };

    context.insert(key, value);
    line.len()
}

/// Append one body chunk to `payload`, returns the bytes consumed
pub fn append_body_chunk(chunk: &[u8], payload: &mut Payload) -> usize {
    payload.append(chunk);
    chunk.len()
}

/// Render a parsed header back into the raw line form
///
/// The transport hands names over lower-cased; they are written back in
/// canonical `Title-Case` (`Lambda-Runtime-Aws-Request-Id`).
pub fn render_header_line(name: &str, value: &[u8]) -> Vec<u8> {
    let mut line = Vec::with_capacity(name.len() + value.len() + 4);
    let mut upper = true;
    for c in name.bytes() {
        line.push(if upper {
            c.to_ascii_uppercase()
        } else {
            c.to_ascii_lowercase()
        });
        upper = c == b'-';
    }
    line.extend_from_slice(b": ");
    line.extend_from_slice(value);
    line.extend_from_slice(b"\r\n");
    line
}

/// Fresh context and payload for one invocation, fed by transport callbacks
#[derive(Debug, Default)]
pub struct InvocationSink {
    context: Context,
    payload: Payload,
}

impl InvocationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_header(&mut self, line: &[u8]) -> usize {
        parse_header_line(line, &mut self.context)
    }

    pub fn on_body(&mut self, chunk: &[u8]) -> usize {
        append_body_chunk(chunk, &mut self.payload)
    }

    pub fn finish(self) -> (Context, Payload) {
        (self.context, self.payload)
    }
}
