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

use crate::proto::parser::StatusLine;

use std::fmt;

/// `ntrip-stream` error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client options can't be used.
    #[error("invalid client options: {0}")]
    InvalidOptions(&'static str),

    /// Failed to establish a connection to the caster.
    #[error("failed to connect to caster: `{0}`")]
    Connect(std::io::Error),

    /// Failed to send the request to the caster.
    #[error("failed to send request: `{0}`")]
    Request(std::io::Error),

    /// Failed to read the response headers.
    #[error("failed to read response headers: `{0}`")]
    Response(std::io::Error),

    /// Protocol error.
    #[error("protocol error: `{0}`")]
    Protocol(ProtocolError),

    /// Failed to read correction data after the handshake.
    #[error("failed to read correction data: `{0}`")]
    Stream(std::io::Error),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Invalid state for an operation.
    InvalidState,

    /// Connection was closed before the response headers were terminated.
    TruncatedResponse,

    /// Response headers exceeded [`MAX_HEADER_SIZE`](crate::MAX_HEADER_SIZE).
    HeadersTooLarge,

    /// Caster didn't accept the request.
    ///
    /// Contains the status line of the response if it could be parsed.
    Rejected(Option<StatusLine>),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState => write!(f, "invalid state"),
            Self::TruncatedResponse => write!(f, "connection closed before end of headers"),
            Self::HeadersTooLarge => write!(f, "response headers too large"),
            Self::Rejected(Some(status)) => write!(f, "request rejected by caster: {status}"),
            Self::Rejected(None) => write!(f, "request rejected by caster: no status line"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(value: ProtocolError) -> Self {
        Error::Protocol(value)
    }
}
