use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::error::{Result, TransportError};

/// Line delimiter used on the wire in both directions.
pub const DELIMITER: u8 = b'\n';

/// Default maximum line length: 1 MiB.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

/// Encode one line into the wire format (`text` followed by `\n`).
pub fn encode_line(text: &str, dst: &mut BytesMut) {
    dst.reserve(text.len() + 1);
    dst.put_slice(text.as_bytes());
    dst.put_u8(DELIMITER);
}

/// Decode one line from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete line yet.
/// On success, consumes the line and its delimiter from the buffer; the
/// returned bytes have `\n` (and a preceding `\r`, if any) stripped.
pub fn decode_line(src: &mut BytesMut, max_len: usize) -> Result<Option<BytesMut>> {
    let Some(pos) = src.iter().position(|b| *b == DELIMITER) else {
        if src.len() > max_len {
            return Err(TransportError::LineTooLong {
                len: src.len(),
                max: max_len,
            });
        }
        return Ok(None);
    };

    if pos > max_len {
        return Err(TransportError::LineTooLong {
            len: pos,
            max: max_len,
        });
    }

    let mut line = src.split_to(pos + 1);
    line.truncate(pos);
    if line.last() == Some(&b'\r') {
        line.truncate(pos - 1);
    }
    Ok(Some(line))
}

/// Convert raw line bytes to text, replacing invalid UTF-8 sequences.
pub fn line_to_string(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

/// Configuration for line reading.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Maximum line length in bytes. Default: 1 MiB.
    pub max_line_len: usize,
    /// How long `read_line` waits for a complete line. `None` blocks forever.
    pub read_timeout: Option<Duration>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE,
            read_timeout: None,
        }
    }
}
