//! Expect/response scripts.
//!
//! A script is two line-oriented files walked in lockstep:
//! - expectation file: each line is `null` or a regular expression
//! - response file: each line is the text to send, with `\n` and `\"` escapes
//!
//! Both files are parsed once into an ordered list of [`ScriptLine`]s with
//! patterns compiled up front.
//!
//! Each response line's own line ending is dropped: a file line `PONG\n`
//! is sent as `PONG` plus one newline, never two. Write `\n` wherever a
//! newline should go out on the wire.
//!
//! Patterns are matched against the raw bytes of a client message, with
//! `.` matching any byte (newlines and non-UTF-8 included) and `$` only at
//! the end of the message.

use bytes::Bytes;
use regex::bytes::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};

/// Expectation line that sends its response without reading from the client.
pub const UNCONDITIONAL: &str = "null";

/// What must happen before a response is sent.
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Send immediately.
    Unconditional,
    /// Send once a client message matches.
    Pattern(Regex),
}

impl Expectation {
    /// Parse one expectation line (terminator already removed).
    pub fn parse(line: &str) -> Result<Self, regex::Error> {
        if line == UNCONDITIONAL {
            Ok(Expectation::Unconditional)
        } else {
            RegexBuilder::new(line)
                .dot_matches_new_line(true)
                .unicode(false)
                .build()
                .map(Expectation::Pattern)
        }
    }

    /// Check a client message against this expectation.
    pub fn matches(&self, message: &[u8]) -> bool {
        match self {
            Expectation::Unconditional => true,
            Expectation::Pattern(re) => re.is_match(message),
        }
    }
}

/// One expectation paired with its decoded response.
#[derive(Debug, Clone)]
pub struct ScriptLine {
    pub expectation: Expectation,
    pub response: Bytes,
}

/// An ordered, immutable expect/response script.
#[derive(Debug, Clone, Default)]
pub struct Script {
    lines: Vec<ScriptLine>,
}

impl Script {
    /// Read and parse both script files.
    pub fn load(expect_path: &Path, response_path: &Path) -> Result<Self, ScriptError> {
        let expect = read(expect_path)?;
        let response = read(response_path)?;
        Self::parse(&expect, &response)
    }

    /// Parse script contents already in memory.
    pub fn parse(expect: &str, response: &str) -> Result<Self, ScriptError> {
        let expect_lines: Vec<&str> = expect.lines().collect();
        let response_lines: Vec<&str> = response.lines().collect();

        if expect_lines.len() != response_lines.len() {
            return Err(ScriptError::LineCountMismatch {
                expect: expect_lines.len(),
                response: response_lines.len(),
            });
        }

        let lines = expect_lines
            .into_iter()
            .zip(response_lines)
            .enumerate()
            .map(|(i, (pattern, response))| -> Result<ScriptLine, ScriptError> {
                let expectation =
                    Expectation::parse(pattern).map_err(|source| ScriptError::InvalidPattern {
                        line: i + 1,
                        pattern: pattern.to_string(),
                        source,
                    })?;
                Ok(ScriptLine {
                    expectation,
                    response: Bytes::from(decode_escapes(response)),
                })
            })
            .collect::<Result<Vec<_>, ScriptError>>()?;

        Ok(Script { lines })
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn read(path: &Path) -> Result<String, ScriptError> {
    std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand `\n` to a newline and `\"` to a quote. Anything else is literal.
pub fn decode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                    continue;
                }
                Some('"') => {
                    out.push('"');
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }

    out
}

/// Script loading errors
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Cannot open file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("expectation file has {expect} lines but response file has {response}")]
    LineCountMismatch { expect: usize, response: usize },
    #[error("invalid pattern on line {line} ({pattern:?}): {source}")]
    InvalidPattern {
        line: usize,
        pattern: String,
        source: regex::Error,
    },
}
