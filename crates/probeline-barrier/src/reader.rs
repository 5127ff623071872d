use probeline_transport::{LineTransport, ReadLine};
use tracing::{debug, trace};

use crate::config::BarrierConfig;
use crate::error::{BarrierError, Result};
use crate::segment::Segment;

/// Reads complete response segments from any [`LineTransport`].
///
/// Each [`drain`](BarrierReader::drain) writes the probe and consumes lines
/// up to and including the peer's sentinel reply. Callers always get a
/// complete segment or an error, never a partial one.
pub struct BarrierReader<T> {
    inner: T,
    config: BarrierConfig,
}

impl<T: LineTransport> BarrierReader<T> {
    /// Create a barrier reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, BarrierConfig::default())
    }

    /// Create a barrier reader with explicit configuration.
    pub fn with_config(inner: T, config: BarrierConfig) -> Self {
        Self { inner, config }
    }

    /// Collect everything the peer emits before answering a fresh probe (blocking).
    ///
    /// Returns `Err(BarrierError::StreamEnded)` when the peer closes its output
    /// first, and `Err(BarrierError::Timeout)` when a read times out.
    pub fn drain(&mut self) -> Result<Segment> {
        self.inner.write_line(&self.config.probe)?;

        let mut segment = Segment::new();
        loop {
            match self.inner.read_line()? {
                ReadLine::Line(line) => {
                    if self.config.is_sentinel(&line) {
                        debug!(lines = segment.len(), "segment complete");
                        return Ok(segment);
                    }
                    if self.config.is_content(&line) {
                        segment.push(line);
                    } else {
                        trace!(line = %line, "dropping non-content line");
                    }
                }
                ReadLine::EndOfStream => {
                    debug!(pending = segment.len(), "stream ended mid-drain");
                    return Err(BarrierError::StreamEnded {
                        pending_lines: segment.len(),
                    });
                }
            }
        }
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current barrier configuration.
    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }
}
