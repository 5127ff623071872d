use std::fmt;

/// Marker placed between retained lines when a segment is rendered as text.
pub const LINE_BOUNDARY: &str = "\n";

/// The lines a peer emitted between two sentinels, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    lines: Vec<String>,
}

impl Segment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Retained lines in arrival order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the peer produced no content.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines joined by [`LINE_BOUNDARY`], without a leading or trailing marker.
    pub fn text(&self) -> String {
        self.lines.join(LINE_BOUNDARY)
    }

    /// Consume the segment and return its lines.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<Vec<String>> for Segment {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}
