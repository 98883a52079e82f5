//! Tracks where the SQL program comes from and keeps its text for diagnostics.

use std::io::Read;

use crate::errors::{SourcePosition, SourcePositionRange};

/// Where does the compiled program come from?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// No data source set yet.
    None,
    /// Data received from stdin.
    Stdin,
    /// Data read from a file.  The entire file is read upfront, and then compiled.
    File,
    /// Data received through API calls (`compile_statement(s)`).
    Api,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::None => "none".fmt(f),
            InputSource::Stdin => "stdin".fmt(f),
            InputSource::File => "file".fmt(f),
            InputSource::Api => "API".fmt(f),
        }
    }
}

/// The text of the whole program seen so far.
///
/// Text received through the API is appended, each call starting on a fresh line, so that
/// every recorded range can be mapped back to the text it covers.
#[derive(Debug, Clone, Default)]
pub struct SourceFileContents {
    file_name: Option<String>,
    text: String,
}

impl SourceFileContents {
    pub fn new() -> Self {
        SourceFileContents::default()
    }

    /// Reads the entire input.  The reader is consumed and dropped before returning.
    pub fn set_entire_input(
        &mut self,
        file_name: Option<&str>,
        mut contents: impl Read,
    ) -> std::io::Result<()> {
        let mut text = String::new();
        contents.read_to_string(&mut text)?;
        self.file_name = file_name.map(String::from);
        self.text = text;
        Ok(())
    }

    /// Appends `code` and returns the position where it starts.
    pub fn append(&mut self, code: &str) -> SourcePosition {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        let line = self.text.matches('\n').count() + 1;
        self.text.push_str(code);
        SourcePosition::new(line, 1)
    }

    pub fn whole_program(&self) -> &str {
        &self.text
    }

    pub fn source_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("(no input file)")
    }

    /// The text covered by an inclusive range, or the empty string if the range is invalid.
    pub fn fragment(&self, range: SourcePositionRange) -> String {
        if !range.is_valid() || range.end < range.start {
            return String::new();
        }
        let mut result = String::new();
        for (index, line) in self.text.lines().enumerate() {
            let lineno = index + 1;
            if lineno < range.start.line {
                continue;
            }
            if lineno > range.end.line {
                break;
            }
            let first = if lineno == range.start.line {
                range.start.column - 1
            } else {
                0
            };
            let last = if lineno == range.end.line {
                range.end.column
            } else {
                usize::MAX
            };
            if lineno > range.start.line {
                result.push('\n');
            }
            result.extend(line.chars().skip(first).take(last.saturating_sub(first)));
        }
        result
    }
}

#[test]
fn test_append_starts_on_new_line() {
    let mut sources = SourceFileContents::new();
    assert_eq!(sources.append("CREATE TABLE t(x INT);"), SourcePosition::new(1, 1));
    assert_eq!(sources.append("CREATE VIEW v AS SELECT x FROM t;"), SourcePosition::new(2, 1));
    assert_eq!(
        sources.whole_program(),
        "CREATE TABLE t(x INT);\nCREATE VIEW v AS SELECT x FROM t;"
    );
}

#[test]
fn test_fragment() {
    let mut sources = SourceFileContents::new();
    sources.append("CREATE TABLE t(x INT);\nINSERT INTO t\nVALUES (1);");
    let range = SourcePositionRange::new(SourcePosition::new(1, 8), SourcePosition::new(1, 12));
    assert_eq!(sources.fragment(range), "TABLE");
    let range = SourcePositionRange::new(SourcePosition::new(2, 1), SourcePosition::new(3, 10));
    assert_eq!(sources.fragment(range), "INSERT INTO t\nVALUES (1)");
    assert_eq!(sources.fragment(SourcePositionRange::INVALID), "");
}

#[test]
fn test_set_entire_input() {
    let mut sources = SourceFileContents::new();
    sources
        .set_entire_input(Some("prog.sql"), "CREATE TABLE t(x INT);".as_bytes())
        .expect("Should have read input.");
    assert_eq!(sources.source_name(), "prog.sql");
    assert_eq!(sources.whole_program(), "CREATE TABLE t(x INT);");
}
