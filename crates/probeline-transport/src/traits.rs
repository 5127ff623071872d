use crate::error::Result;

/// Outcome of a single blocking line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    /// A complete line with its trailing delimiter stripped. May be empty.
    Line(String),
    /// The peer closed its output before another complete line arrived.
    EndOfStream,
}

impl ReadLine {
    /// The line text, or `None` at end of stream.
    pub fn as_line(&self) -> Option<&str> {
        match self {
            ReadLine::Line(line) => Some(line),
            ReadLine::EndOfStream => None,
        }
    }
}

/// A line-oriented duplex connection to exactly one peer.
///
/// This is the seam every higher layer is written against. Implementations
/// must preserve ordering: lines are read in the order the peer wrote them,
/// and lines written here reach the peer in call order.
pub trait LineTransport {
    /// Send `text` followed by the line delimiter.
    ///
    /// Returns once the bytes have left local buffering; the peer may not
    /// have processed them yet.
    fn write_line(&mut self, text: &str) -> Result<()>;

    /// Block until a complete line, end of stream, or the read timeout.
    fn read_line(&mut self) -> Result<ReadLine>;

    /// Release the connection. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl<T: LineTransport + ?Sized> LineTransport for &mut T {
    fn write_line(&mut self, text: &str) -> Result<()> {
        (**self).write_line(text)
    }

    fn read_line(&mut self) -> Result<ReadLine> {
        (**self).read_line()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn write_line(&mut self, text: &str) -> Result<()> {
        (**self).write_line(text)
    }

    fn read_line(&mut self) -> Result<ReadLine> {
        (**self).read_line()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
