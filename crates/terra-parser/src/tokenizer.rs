// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whitespace-delimited token parsing using nom combinators
//!
//! DEM and polygon files are flat streams of numbers and words separated by
//! arbitrary whitespace. `#` starts a comment running to the end of the line.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace1, not_line_ending},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded},
    IResult, Parser,
};

// ============================================================================
// Parsing Primitives
// ============================================================================

/// Parse whitespace (including comments)
pub(crate) fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(char('#'), not_line_ending)),
        ))),
    )
    .parse(input)
}

/// Parse a floating point number
pub(crate) fn number(input: &str) -> IResult<&str, f64> {
    let recognized: IResult<&str, &str> = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
    ))
    .parse(input);
    let (rest, num_str) = recognized?;

    // Use lexical-core for fast parsing
    match lexical_core::parse::<f64>(num_str.as_bytes()) {
        Ok(f) => Ok((rest, f)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

/// Parse an unsigned integer
pub(crate) fn count(input: &str) -> IResult<&str, usize> {
    let digits: IResult<&str, &str> = take_while1(|c: char| c.is_ascii_digit()).parse(input);
    let (rest, digits) = digits?;
    match lexical_core::parse::<usize>(digits.as_bytes()) {
        Ok(n) => Ok((rest, n)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// Parse a bare word (anything up to the next whitespace)
pub(crate) fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace()).parse(input)
}

// ============================================================================
// Cursor
// ============================================================================

/// Sequential reader over a token stream
///
/// Every `next_*` call skips leading whitespace and comments first.
pub(crate) struct Cursor<'a> {
    input: &'a str,
    consumed: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self { input, consumed: 0 }
    }

    /// Number of tokens read so far
    pub(crate) fn consumed(&self) -> usize {
        self.consumed
    }

    /// True once only whitespace and comments remain
    pub(crate) fn at_end(&mut self) -> bool {
        if let Ok((rest, ())) = ws(self.input) {
            self.input = rest;
        }
        self.input.is_empty()
    }

    pub(crate) fn next_number(&mut self) -> Option<f64> {
        self.advance(|i| preceded(ws, number).parse(i))
    }

    pub(crate) fn next_count(&mut self) -> Option<usize> {
        self.advance(|i| preceded(ws, count).parse(i))
    }

    pub(crate) fn next_word(&mut self) -> Option<&'a str> {
        self.advance(|i| preceded(ws, word).parse(i))
    }

    fn advance<T>(&mut self, f: impl FnOnce(&'a str) -> IResult<&'a str, T>) -> Option<T> {
        let (rest, value) = f(self.input).ok()?;
        self.input = rest;
        self.consumed += 1;
        Some(value)
    }
}
