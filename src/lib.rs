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

//! Minimal NTRIP client.
//!
//! Connects to an NTRIP caster, requests a mount point with Basic authentication and, once the
//! caster has accepted the request, streams the raw correction data (usually RTCM3) to the caller.
//! The correction data itself is not decoded.
//!
//! The crate provides an asynchronous client (`tokio`, enabled by default, or `smol`) and a
//! blocking client (`sync`). The feature flags are mutually exclusive and whichever is enabled
//! exports its [`Stream`] from the crate root.

#[cfg(all(feature = "sync", any(feature = "tokio", feature = "smol")))]
compile_error!("feature \"sync\" and an async runtime feature cannot be enabled at the same time");

#[cfg(all(feature = "tokio", feature = "smol"))]
compile_error!("feature \"tokio\" and feature \"smol\" cannot be enabled at the same time");

mod error;
mod options;
mod proto;

pub use error::{Error, ProtocolError};
pub use options::{ClientOptions, DEFAULT_CASTER_PORT, NTRIP_VERSION, SUCCESS_STATUS};
pub use proto::{
    handshake::{credentials, redacted_request, MAX_HEADER_SIZE},
    parser::{ResponseHeaders, StatusLine},
};

#[cfg(any(feature = "tokio", feature = "smol"))]
mod asynchronous;

#[cfg(all(any(feature = "tokio", feature = "smol"), not(feature = "sync")))]
pub use asynchronous::stream::{ShutdownHandle, Stream};

#[cfg(feature = "sync")]
mod synchronous;

#[cfg(all(feature = "sync", not(any(feature = "tokio", feature = "smol"))))]
pub use synchronous::stream::{ShutdownHandle, Stream};

/// Result type of the crate.
pub type Result<T> = core::result::Result<T, error::Error>;
