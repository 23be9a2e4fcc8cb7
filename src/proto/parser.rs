// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, digit1, line_ending, not_line_ending, space0, space1},
    combinator::{map_res, opt},
    multi::many0,
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};

use std::fmt;

/// Status line of a caster response.
///
/// NTRIP casters answer either with an HTTP status line (`HTTP/1.1 200 OK`) or, for NTRIP v1
/// clients, with `ICY 200 OK` or `SOURCETABLE 200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Protocol, e.g., `HTTP/1.1` or `ICY`.
    pub version: String,

    /// Status code.
    pub code: u16,

    /// Reason phrase, may be empty.
    pub reason: String,
}

impl StatusLine {
    // Non-public method returning `IResult` so it can be composed with the header parser.
    fn parse_inner(input: &str) -> IResult<&str, Self> {
        let (rest, (version, _, code, reason)) = tuple((
            take_till1(|c: char| c.is_whitespace()),
            space1,
            map_res(digit1, |code: &str| code.parse::<u16>()),
            opt(preceded(space1, not_line_ending)),
        ))(input)?;

        Ok((
            rest,
            StatusLine {
                version: version.to_string(),
                code,
                reason: reason.unwrap_or_default().trim_end().to_string(),
            },
        ))
    }

    /// Attempt to parse `input` into [`StatusLine`].
    ///
    /// `input` may contain more lines after the status line.
    pub fn parse(input: &str) -> Option<Self> {
        Some(Self::parse_inner(input).ok()?.1)
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason.is_empty() {
            true => write!(f, "{}", self.code),
            false => write!(f, "{} {}", self.code, self.reason),
        }
    }
}

/// Parsed response header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeaders {
    /// Status line.
    pub status: StatusLine,

    /// Header fields in the order they were received.
    pub fields: Vec<(String, String)>,
}

impl ResponseHeaders {
    fn parse_inner(input: &str) -> IResult<&str, Self> {
        let (rest, (status, fields, _)) = tuple((
            terminated(StatusLine::parse_inner, line_ending),
            many0(parse_header_field),
            opt(line_ending),
        ))(input)?;

        Ok((
            rest,
            ResponseHeaders {
                status,
                fields: fields
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value.trim_end().to_string()))
                    .collect(),
            },
        ))
    }

    /// Attempt to parse `input` into [`ResponseHeaders`].
    pub fn parse(input: &str) -> Option<Self> {
        Some(Self::parse_inner(input).ok()?.1)
    }

    /// Get value of header field `name`.
    ///
    /// Field names are compared case-insensitively and the first match is returned.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn parse_header_field(input: &str) -> IResult<&str, (&str, &str)> {
    terminated(
        separated_pair(parse_name, tuple((char(':'), space0)), not_line_ending),
        line_ending,
    )(input)
}

fn parse_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ':' && !c.is_whitespace())(input)
}
