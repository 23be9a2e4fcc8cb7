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

use crate::error::Error;

use std::{fmt, time::Duration};

/// Default TCP port of an NTRIP caster.
pub const DEFAULT_CASTER_PORT: u16 = 2101;

/// Value of the `Ntrip-Version` header sent to the caster.
pub const NTRIP_VERSION: &str = "Ntrip/2.0";

/// Substring which must be present in the response headers for the handshake to succeed.
pub const SUCCESS_STATUS: &str = "HTTP/1.1 200 OK";

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "NTRIP A2A Client/2.0";

/// Default size of the buffer used to read correction data.
const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default delay between two reads of correction data.
const DEFAULT_READ_INTERVAL: Duration = Duration::from_secs(1);

/// Client options.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Address of the caster, as `host:port`.
    ///
    /// Defaults to `127.0.0.1:2101`.
    pub caster_address: String,

    /// Mount point.
    ///
    /// Name of the correction stream requested from the caster, without the leading slash.
    ///
    /// Defaults to an empty string.
    pub mount_point: String,

    /// Username used for Basic authentication.
    ///
    /// Defaults to an empty string.
    pub username: String,

    /// Password used for Basic authentication.
    ///
    /// Defaults to an empty string.
    pub password: String,

    /// Value of the `User-Agent` header.
    ///
    /// Defaults to `NTRIP A2A Client/2.0`.
    pub user_agent: String,

    /// Size of the buffer correction data is read into.
    ///
    /// Defaults to `1024`.
    pub read_buffer_size: usize,

    /// How long to sleep after each successful read of correction data.
    ///
    /// Defaults to one second.
    pub read_interval: Duration,

    /// How long to wait for data from the caster before the read fails.
    ///
    /// Applies to every read made after the connection has been established. `None` waits
    /// indefinitely.
    ///
    /// Defaults to `None`.
    pub read_timeout: Option<Duration>,
}

impl ClientOptions {
    /// Create new [`ClientOptions`] for `mount_point` at `caster_address`.
    ///
    /// Options not specified are set to their default values.
    pub fn new(
        caster_address: impl Into<String>,
        mount_point: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            caster_address: caster_address.into(),
            mount_point: mount_point.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Check that the options can be used to read correction data.
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.read_buffer_size == 0 {
            return Err(Error::InvalidOptions("read buffer size must be non-zero"));
        }

        if self.read_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::InvalidOptions("read timeout must be non-zero"));
        }

        Ok(())
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            caster_address: format!("127.0.0.1:{DEFAULT_CASTER_PORT}"),
            mount_point: String::new(),
            username: String::new(),
            password: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_interval: DEFAULT_READ_INTERVAL,
            read_timeout: None,
        }
    }
}

// password is never printed
impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("caster_address", &self.caster_address)
            .field("mount_point", &self.mount_point)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("read_interval", &self.read_interval)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}
