//! Error types for ncparse

use std::fmt;
use thiserror::Error;

/// Position in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }

    /// Resolve a byte offset into `source` to a line/column position.
    ///
    /// Columns count characters, not bytes. Offsets past the end clamp to the
    /// end of the source.
    pub fn locate(source: &str, offset: usize) -> Self {
        Locator::new(source).pos(offset)
    }
}

/// Resolves many byte offsets of one source to positions.
///
/// Keeps a cursor at the last resolved offset, so offsets requested in
/// increasing order cost one pass over the source in total. A request
/// before the cursor restarts from the start of its line.
#[derive(Clone, Debug)]
pub(crate) struct Locator<'a> {
    source: &'a str,
    cursor: Pos,
    line_starts: Option<Vec<usize>>,
}

impl<'a> Locator<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: Pos::new(0, 1, 1),
            line_starts: None,
        }
    }

    pub(crate) fn pos(&mut self, offset: usize) -> Pos {
        let offset = offset.min(self.source.len());
        if offset < self.cursor.offset {
            self.rewind(offset);
        }

        let Pos {
            offset: from,
            mut line,
            mut col,
        } = self.cursor;
        let mut reached = from;
        for (idx, ch) in self.source.get(from..).unwrap_or_default().char_indices() {
            if from + idx >= offset {
                break;
            }
            if ch == '\n' {
                line = line.saturating_add(1);
                col = 1;
            } else {
                col = col.saturating_add(1);
            }
            reached = from + idx + ch.len_utf8();
        }
        self.cursor = Pos::new(reached, line, col);
        Pos::new(offset, line, col)
    }

    pub(crate) fn span(&mut self, start: usize, end: usize) -> Span {
        let start = self.pos(start);
        Span::new(start, self.pos(end))
    }

    /// Moves the cursor to the start of the line holding `offset`
    fn rewind(&mut self, offset: usize) {
        let source = self.source;
        let starts = self.line_starts.get_or_insert_with(|| {
            std::iter::once(0)
                .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
                .collect()
        });
        let line = starts.partition_point(|&start| start <= offset);
        let start = starts
            .get(line.saturating_sub(1))
            .copied()
            .unwrap_or_default();
        self.cursor = Pos::new(start, u32::try_from(line).unwrap_or(u32::MAX), 1);
    }
}

/// Span representing a range in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }

    /// Span covering `start..end` byte offsets of `source`
    pub fn locate(source: &str, start: usize, end: usize) -> Self {
        Locator::new(source).span(start, end)
    }
}

/// Error kind for detailed categorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening tag with no matching closing tag
    UnclosedTag { name: String },
    /// `<` that does not start a recognisable tag
    MalformedTag,
    /// Non-whitespace content after the root element
    TrailingContent,
    /// `<?xml` declaration without its `?>` terminator
    UnterminatedPrologue,
    MaxDepthExceeded { max: u16 },
    MaxSizeExceeded { max: usize },
    /// Parsed value is not an `ApiResponse` envelope
    NotAnEnvelope,
    /// Envelope reported `Status="ERROR"`
    ApiError { messages: Vec<String> },
    /// Response belongs to a different command than the one issued
    CommandMismatch { expected: String, found: String },
    MissingField { field: String },
    Io(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnclosedTag { name } => write!(f, "unclosed tag <{name}>"),
            Self::MalformedTag => write!(f, "malformed tag"),
            Self::TrailingContent => write!(f, "trailing content after root element"),
            Self::UnterminatedPrologue => write!(f, "unterminated declaration"),
            Self::MaxDepthExceeded { max } => write!(f, "max depth exceeded: {max}"),
            Self::MaxSizeExceeded { max } => write!(f, "max size exceeded: {max}"),
            Self::NotAnEnvelope => write!(f, "response is not an ApiResponse envelope"),
            Self::ApiError { messages } => {
                if messages.is_empty() {
                    write!(f, "api returned an error status")
                } else {
                    write!(f, "api error: {}", messages.join("; "))
                }
            }
            Self::CommandMismatch { expected, found } => {
                write!(f, "expected response for {expected}, found {found}")
            }
            Self::MissingField { field } => write!(f, "missing field: {field}"),
            Self::Io(message) => write!(f, "io error: {message}"),
        }
    }
}

/// Main error type for ncparse
#[derive(Error, Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
        }
    }

    pub fn with_message(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Error that has no meaningful source position
    pub fn unlocated(kind: ErrorKind) -> Self {
        Self::new(kind, Span::empty())
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create error at specific position
    pub fn at(kind: ErrorKind, offset: usize, line: u32, col: u32) -> Self {
        let pos = Pos::new(offset, line, col);
        Self::new(kind, Span::new(pos, pos))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span == Span::empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "error at {}: {}", self.span.start, self.message)
        }
    }
}

/// Result type alias for ncparse
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        let pos = Pos::new(42, 10, 5);
        assert_eq!(pos.to_string(), "42:10:5");
    }

    #[test]
    fn test_pos_locate() {
        let source = "<a>\n  <b>";
        assert_eq!(Pos::locate(source, 0), Pos::new(0, 1, 1));
        assert_eq!(Pos::locate(source, 6), Pos::new(6, 2, 3));
        assert_eq!(Pos::locate(source, 999), Pos::new(source.len(), 2, 6));
    }

    #[test]
    fn test_locator_matches_one_shot_positions() {
        let source = "<a>\n  <b>caf\u{e9}\n</b>\n</a>";
        let mut locator = Locator::new(source);
        let offsets = [0, 3, 6, 13, 12, 2, 16, source.len(), 4];
        for offset in offsets {
            assert_eq!(locator.pos(offset), Pos::locate(source, offset));
        }
        assert_eq!(locator.pos(6), Pos::new(6, 2, 3));
        assert_eq!(locator.pos(1), Pos::new(1, 1, 2));
    }

    #[test]
    fn test_error_creation() {
        let err = Error::at(ErrorKind::MalformedTag, 0, 1, 1);
        assert_eq!(err.kind(), &ErrorKind::MalformedTag);
    }

    #[test]
    fn test_error_display() {
        let err = Error::at(
            ErrorKind::UnclosedTag {
                name: "Errors".to_string(),
            },
            10,
            2,
            5,
        );
        let display = err.to_string();
        assert!(display.contains("error at 10:2:5"));
        assert!(display.contains("unclosed tag <Errors>"));
    }

    #[test]
    fn test_unlocated_display_has_no_position() {
        let err = Error::unlocated(ErrorKind::ApiError {
            messages: vec!["1011102: Parameter APIKey is missing".to_string()],
        });
        assert_eq!(
            err.to_string(),
            "api error: 1011102: Parameter APIKey is missing"
        );
    }
}
