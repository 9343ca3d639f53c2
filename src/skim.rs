//! Skimming resource ids out of piped command output.
//!
//! Listing commands print one resource per line with the id in the first
//! column, optionally preceded by `#` header lines meant for humans. The
//! next command in the pipe reads those ids back with [`extract`], which
//! drops the headers, keeps the first field of every other line and puts
//! any ids given on the command line in front.

use std::io::{self, BufRead, IsTerminal};

use tracing::trace;

use crate::error::SkimError;

/// Marker that starts a header line.
pub const COMMENT_MARKER: char = '#';

/// Classification of a single input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Starts with `#`. Display only.
    Comment,
    /// Anything else. `None` when the line is blank.
    Data(Option<&'a str>),
}

impl<'a> Line<'a> {
    pub fn classify(line: &'a str) -> Self {
        if line.starts_with(COMMENT_MARKER) {
            Line::Comment
        } else {
            Line::Data(line.split_whitespace().next())
        }
    }

    /// The token this line contributes, if any.
    pub fn token(self) -> Option<&'a str> {
        match self {
            Line::Comment => None,
            Line::Data(token) => token,
        }
    }
}

/// Iterator over the first-column tokens of a line stream, in input order.
pub struct Tokens<R> {
    lines: io::Lines<R>,
}

impl<R: BufRead> Iterator for Tokens<R> {
    type Item = Result<String, SkimError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(SkimError::Read(e))),
            };
            if let Some(token) = Line::classify(&line).token() {
                trace!(target: "skimrun::skim", token, "skimmed");
                return Some(Ok(token.to_string()));
            }
        }
    }
}

/// Stream the tokens of `reader` lazily.
pub fn tokens<R: BufRead>(reader: R) -> Tokens<R> {
    Tokens {
        lines: reader.lines(),
    }
}

/// Build the normalized argument string: explicit args first, then one token
/// per data line of `input`, joined by single spaces.
///
/// `input` is `None` when nothing is piped in. Explicit args are split on
/// whitespace too, so the result is safe to re-split.
pub fn extract<R, S>(input: Option<R>, explicit: &[S]) -> Result<String, SkimError>
where
    R: BufRead,
    S: AsRef<str>,
{
    Ok(extract_words(input, explicit)?.join(" "))
}

/// Same as [`extract`] but keeps the words apart.
pub fn extract_words<R, S>(input: Option<R>, explicit: &[S]) -> Result<Vec<String>, SkimError>
where
    R: BufRead,
    S: AsRef<str>,
{
    let mut words: Vec<String> = explicit
        .iter()
        .flat_map(|arg| arg.as_ref().split_whitespace())
        .map(str::to_string)
        .collect();

    if let Some(reader) = input {
        for token in tokens(reader) {
            words.push(token?);
        }
    }

    Ok(words)
}

/// The process stdin, or `None` when it is a terminal and nothing is piped.
pub fn piped_stdin() -> Option<io::StdinLock<'static>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        None
    } else {
        Some(stdin.lock())
    }
}
