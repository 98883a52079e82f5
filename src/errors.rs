//! Diagnostics: source positions, the error taxonomy of the compiler, and the message sink.
//!
//! Errors fall into three families:
//!   - configuration errors are misuse of the session protocol; they are returned immediately and never recorded.
//!   - compilation errors (`Parse`, `Context`, `Compilation`) come from bad SQL; they are recorded, and
//!     compilation either continues or stops depending on `throw_on_error`.
//!   - internal errors are recorded and then always returned.

use std::io::Write;

use crate::source::SourceFileContents;

/// A 1-based line and column in the session's accumulated source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub const INVALID: SourcePosition = SourcePosition { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        SourcePosition { line, column }
    }

    pub fn is_valid(&self) -> bool {
        self.line > 0 && self.column > 0
    }

    /// Translates a position relative to a fragment that starts at `base` into a position in the whole text.
    pub fn offset_by(&self, base: SourcePosition) -> SourcePosition {
        if self.line <= 1 {
            SourcePosition::new(base.line, base.column + self.column - 1)
        } else {
            SourcePosition::new(base.line + self.line - 1, self.column)
        }
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An inclusive range of source positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub struct SourcePositionRange {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourcePositionRange {
    pub const INVALID: SourcePositionRange = SourcePositionRange {
        start: SourcePosition::INVALID,
        end: SourcePosition::INVALID,
    };

    pub fn new(start: SourcePosition, end: SourcePosition) -> Self {
        SourcePositionRange { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_valid() && self.end.is_valid()
    }
}

impl std::fmt::Display for SourcePositionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A failure tied to a statement of the compiled program.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilerError {
    #[error("{message}")]
    Parse {
        range: SourcePositionRange,
        message: String,
    },
    /// Name resolution and typing failures.
    #[error("{message}")]
    Context {
        range: SourcePositionRange,
        message: String,
    },
    #[error("{message}")]
    Compilation {
        range: SourcePositionRange,
        message: String,
    },
    #[error("{message}")]
    Internal {
        range: SourcePositionRange,
        message: String,
    },
}

impl CompilerError {
    pub fn range(&self) -> SourcePositionRange {
        match self {
            CompilerError::Parse { range, .. }
            | CompilerError::Context { range, .. }
            | CompilerError::Compilation { range, .. }
            | CompilerError::Internal { range, .. } => *range,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CompilerError::Parse { message, .. }
            | CompilerError::Context { message, .. }
            | CompilerError::Compilation { message, .. }
            | CompilerError::Internal { message, .. } => message,
        }
    }

    /// Short category string shown in diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            CompilerError::Parse { .. } => "Syntax error",
            CompilerError::Context { .. } => "Error in SQL statement",
            CompilerError::Compilation { .. } => "Compilation error",
            CompilerError::Internal { .. } => "Internal error",
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CompilerError::Internal { .. })
    }
}

/// Errors surfaced by the public compiler API.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Error during compilation: {0}")]
    Compilation(String),
    #[error("Internal compiler error: {0}")]
    Internal(CompilerError),
    #[error("Error reading input: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CompilerMessage {
    pub range: SourcePositionRange,
    pub warning: bool,
    pub category: String,
    pub message: String,
}

impl CompilerMessage {
    pub fn error(range: SourcePositionRange, category: &str, message: impl Into<String>) -> Self {
        CompilerMessage {
            range,
            warning: false,
            category: category.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(range: SourcePositionRange, category: &str, message: impl Into<String>) -> Self {
        CompilerMessage {
            range,
            warning: true,
            category: category.to_string(),
            message: message.into(),
        }
    }

    fn show(&self, sources: &SourceFileContents, w: &mut dyn Write) -> std::io::Result<()> {
        let file = sources.source_name();
        let kind = if self.warning { "warning" } else { "error" };
        writeln!(
            w,
            "{}:{}: {}: {}: {}",
            file, self.range.start, kind, self.category, self.message
        )?;
        if self.range.is_valid() {
            for line in sources.fragment(self.range).lines() {
                writeln!(w, "    {}", line)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.warning { "warning" } else { "error" };
        write!(
            f,
            "{}: {}: {}: {}",
            self.range.start, kind, self.category, self.message
        )
    }
}

/// Append-only list of the diagnostics of a session.
#[derive(Debug, Clone, Default)]
pub struct CompilerMessages {
    messages: Vec<CompilerMessage>,
    exit_code: i32,
}

impl CompilerMessages {
    pub fn new() -> Self {
        CompilerMessages::default()
    }

    pub fn report(&mut self, message: CompilerMessage) {
        if !message.warning {
            self.exit_code = 1;
        }
        self.messages.push(message);
    }

    pub fn report_error(&mut self, error: &CompilerError) {
        self.report(CompilerMessage::error(
            error.range(),
            error.category(),
            error.message(),
        ));
    }

    /// Nonzero iff any error (not warning) has been recorded.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| m.warning)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompilerMessage> {
        self.messages.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &CompilerMessage> {
        self.messages.iter().filter(|m| !m.warning)
    }

    /// Prints every message, each followed by the source text it points at.
    pub fn show(&self, sources: &SourceFileContents, w: &mut dyn Write) -> std::io::Result<()> {
        for message in &self.messages {
            message.show(sources, w)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for CompilerMessages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for message in &self.messages {
            writeln!(f, "{}", message)?;
        }
        Ok(())
    }
}

#[test]
fn test_offset_by() {
    let base = SourcePosition::new(3, 5);
    assert_eq!(SourcePosition::new(1, 1).offset_by(base), SourcePosition::new(3, 5));
    assert_eq!(SourcePosition::new(1, 4).offset_by(base), SourcePosition::new(3, 8));
    assert_eq!(SourcePosition::new(2, 4).offset_by(base), SourcePosition::new(4, 4));
}

#[test]
fn test_exit_code_ignores_warnings() {
    let mut messages = CompilerMessages::new();
    messages.report(CompilerMessage::warning(
        SourcePositionRange::INVALID,
        "Warning",
        "nothing deleted",
    ));
    assert_eq!(messages.exit_code(), 0);
    assert!(messages.has_warnings());
    messages.report_error(&CompilerError::Context {
        range: SourcePositionRange::INVALID,
        message: "Object 'x' not found".to_string(),
    });
    assert_eq!(messages.exit_code(), 1);
    assert_eq!(messages.errors().count(), 1);
}
