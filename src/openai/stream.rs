//! Decoding of streamed completion responses into display text.
//!
//! The server sends newline delimited records, each optionally
//! prefixed with `data:`, and ends the stream with a `[DONE]`
//! sentinel:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//! data: {"choices":[{"delta":{"content":"!"}}]}
//! data: [DONE]
//! ```
use serde::Deserialize;

pub const DONE_SENTINEL: &str = "[DONE]";
const DATA_MARKER: &str = "data:";

#[derive(Debug, Default, Deserialize)]
struct Fragment {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Fragment>,
    #[serde(default)]
    message: Option<Fragment>,
}

/// A single completion record, either a streamed chunk or a complete
/// non-streamed response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Record {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl Record {
    /// The incremental token if present, otherwise the full message
    /// content.
    pub(crate) fn into_text(self) -> Option<String> {
        let choice = self.choices.into_iter().next()?;
        choice
            .delta
            .and_then(|d| d.content)
            .or_else(|| choice.message.and_then(|m| m.content))
    }
}

/// Returns the text to append to the in-progress assistant message
/// for one chunk of the response body.
///
/// Lines that fail to parse contribute nothing. This is expected for
/// fragments cut at a chunk boundary and never aborts the rest of
/// the chunk.
pub fn decode_chunk(chunk: &str) -> String {
    let mut out = String::new();

    for line in chunk.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let data = line.strip_prefix(DATA_MARKER).unwrap_or(line).trim_start();
        if data.is_empty() || data == DONE_SENTINEL {
            continue;
        }

        match serde_json::from_str::<Record>(data) {
            Ok(record) => {
                if let Some(token) = record.into_text() {
                    out.push_str(&token);
                }
            }
            Err(e) => {
                tracing::debug!("Skipping unparseable stream line {}: {}", data, e);
            }
        }
    }

    out
}

/// Text decoding layer in front of [`decode_chunk`].
///
/// Buffers incomplete UTF-8 sequences and the trailing partial line
/// so that records split across network chunks are decoded once they
/// are complete.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    bytes: Vec<u8>,
    line: String,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes from the transport and returns the delta for
    /// every line completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> String {
        self.bytes.extend_from_slice(chunk);
        let text = self.take_valid_utf8();
        self.line.push_str(&text);

        match self.line.rfind('\n') {
            Some(idx) => {
                let rest = self.line.split_off(idx + 1);
                let complete = std::mem::replace(&mut self.line, rest);
                decode_chunk(&complete)
            }
            None => String::new(),
        }
    }

    /// Flushes whatever is left once the stream is exhausted.
    pub fn finish(&mut self) -> String {
        if !self.bytes.is_empty() {
            let rest = String::from_utf8_lossy(&self.bytes).into_owned();
            self.bytes.clear();
            self.line.push_str(&rest);
        }
        let remaining = std::mem::take(&mut self.line);
        decode_chunk(&remaining)
    }

    fn take_valid_utf8(&mut self) -> String {
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.bytes) {
                Ok(s) => {
                    out.push_str(s);
                    self.bytes.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.bytes[..valid]).unwrap_or_default());
                    match e.error_len() {
                        // Incomplete sequence at the end, wait for more bytes
                        None => {
                            self.bytes.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.bytes.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}
