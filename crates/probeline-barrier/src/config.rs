/// Probe command that asks the peer to emit the sentinel.
pub const DEFAULT_PROBE: &str = "ping";

/// Sentinel line the peer answers the probe with.
pub const DEFAULT_SENTINEL: &str = "ok";

/// Controls how a drain recognizes its terminator and which lines it keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierConfig {
    /// Command written to trigger the sentinel. Default: `ping`.
    pub probe: String,
    /// Sentinel text. Both sides are trimmed before comparing. Default: `ok`.
    pub sentinel: String,
    /// Lines dropped from every segment, compared after trimming
    /// (e.g. a startup banner the peer prints once).
    pub ignored_lines: Vec<String>,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            probe: DEFAULT_PROBE.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            ignored_lines: Vec::new(),
        }
    }
}

impl BarrierConfig {
    /// Add a line to drop from segments.
    pub fn ignore_line(mut self, line: impl Into<String>) -> Self {
        self.ignored_lines.push(line.into());
        self
    }

    /// Returns true if `line` is the sentinel.
    pub fn is_sentinel(&self, line: &str) -> bool {
        line.trim() == self.sentinel.trim()
    }

    /// Returns true if `line` belongs in a segment.
    ///
    /// Blank lines and ignored lines carry no response content.
    pub fn is_content(&self, line: &str) -> bool {
        let trimmed = line.trim();
        !trimmed.is_empty()
            && !self
                .ignored_lines
                .iter()
                .any(|ignored| ignored.trim() == trimmed)
    }
}
