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

use crate::{
    error::ProtocolError,
    options::{ClientOptions, NTRIP_VERSION, SUCCESS_STATUS},
    proto::parser::StatusLine,
};

use base64::{engine::general_purpose, Engine as _};

/// Logging target for the file.
const LOG_TARGET: &str = "ntrip_stream::proto::handshake";

/// Line which terminates the response headers.
const END_OF_HEADERS: &str = "\r\n";

/// Value printed in place of the Basic authentication credentials.
const REDACTED: &str = "<redacted>";

/// Maximum size of the response headers, in bytes.
///
/// I/O drivers must not read a single header line longer than `MAX_HEADER_SIZE + 1` bytes.
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Encode `username` and `password` into Basic authentication credentials.
pub fn credentials(username: &str, password: &str) -> String {
    general_purpose::STANDARD.encode(format!("{username}:{password}"))
}

/// Format the request sent for `options`, with the authorization value replaced.
///
/// Identical to the request sent to the caster otherwise, which makes it safe to log or print.
pub fn redacted_request(options: &ClientOptions) -> String {
    format_request(options, REDACTED)
}

fn format_request(options: &ClientOptions, authorization: &str) -> String {
    format!(
        "GET /{} HTTP/1.1\r\n\
        User-Agent: {}\r\n\
        Connection: close\r\n\
        Authorization: Basic {authorization}\r\n\
        Ntrip-Version: {NTRIP_VERSION}\r\n\
        \r\n",
        options.mount_point, options.user_agent,
    )
}

#[derive(Debug, PartialEq, Eq)]
enum HandshakeState {
    /// Request hasn't been sent yet.
    Uninitialized,

    /// Request has been sent and response headers are being read.
    Handshaking {
        /// Header lines received so far, including their line endings.
        headers: String,
    },

    /// Caster accepted the request and correction data is being streamed.
    Streaming,

    /// Handshake state has been poisoned.
    Poisoned,
}

pub struct HandshakeController {
    /// Client options.
    options: ClientOptions,

    /// Handshake state.
    state: HandshakeState,
}

impl HandshakeController {
    /// Create new [`HandshakeController`] from `options`.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            state: HandshakeState::Uninitialized,
        }
    }

    /// Create the request for the configured mount point.
    pub fn request(&mut self) -> Result<Vec<u8>, ProtocolError> {
        match std::mem::replace(&mut self.state, HandshakeState::Poisoned) {
            HandshakeState::Uninitialized => {
                let request = format_request(
                    &self.options,
                    &credentials(&self.options.username, &self.options.password),
                );

                tracing::debug!(
                    target: LOG_TARGET,
                    username = %self.options.username,
                    request = %redacted_request(&self.options),
                    "send request to caster",
                );
                self.state = HandshakeState::Handshaking {
                    headers: String::new(),
                };

                Ok(request.into_bytes())
            }
            state => {
                tracing::warn!(
                    target: LOG_TARGET,
                    ?state,
                    "cannot create request, invalid state",
                );

                debug_assert!(false);
                Err(ProtocolError::InvalidState)
            }
        }
    }

    /// Handle response header line.
    ///
    /// `line` must include its line ending. Returns the complete header block once the line
    /// terminating the headers has been received and the caster has accepted the request.
    pub fn handle_line(&mut self, line: &str) -> Result<Option<String>, ProtocolError> {
        match std::mem::replace(&mut self.state, HandshakeState::Poisoned) {
            HandshakeState::Handshaking { mut headers } => {
                headers.push_str(line);

                if headers.len() > MAX_HEADER_SIZE {
                    tracing::debug!(
                        target: LOG_TARGET,
                        received = headers.len(),
                        "response headers too large",
                    );
                    return Err(ProtocolError::HeadersTooLarge);
                }

                if line != END_OF_HEADERS {
                    self.state = HandshakeState::Handshaking { headers };
                    return Ok(None);
                }

                if !headers.contains(SUCCESS_STATUS) {
                    let status = StatusLine::parse(&headers);

                    tracing::debug!(
                        target: LOG_TARGET,
                        ?status,
                        "caster rejected request",
                    );
                    return Err(ProtocolError::Rejected(status));
                }

                tracing::trace!(
                    target: LOG_TARGET,
                    mount_point = %self.options.mount_point,
                    "handshake done, start streaming",
                );
                self.state = HandshakeState::Streaming;

                Ok(Some(headers))
            }
            state => {
                tracing::warn!(
                    target: LOG_TARGET,
                    ?state,
                    "cannot handle response, invalid state",
                );

                debug_assert!(false);
                Err(ProtocolError::InvalidState)
            }
        }
    }

    /// Handle end of stream while reading the response headers.
    pub fn handle_eof(&mut self) -> ProtocolError {
        match std::mem::replace(&mut self.state, HandshakeState::Poisoned) {
            HandshakeState::Handshaking { headers } => {
                tracing::debug!(
                    target: LOG_TARGET,
                    received = headers.len(),
                    "connection closed before end of headers",
                );

                ProtocolError::TruncatedResponse
            }
            state => {
                tracing::warn!(
                    target: LOG_TARGET,
                    ?state,
                    "cannot handle end of stream, invalid state",
                );

                ProtocolError::InvalidState
            }
        }
    }

    /// Has the caster accepted the request.
    pub fn is_streaming(&self) -> bool {
        self.state == HandshakeState::Streaming
    }
}
