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

#![cfg(any(feature = "tokio", feature = "smol"))]

use futures::FutureExt;

use std::{future::Future, io, time::Duration};

/// Sleep for `duration` using the enabled runtime.
async fn sleep(duration: Duration) {
    #[cfg(feature = "tokio")]
    tokio::time::sleep(duration).await;

    #[cfg(feature = "smol")]
    {
        smol::Timer::after(duration).await;
    }
}

/// Wait for `future` for at most `duration`.
///
/// Returns an error of kind [`io::ErrorKind::TimedOut`] if `future` didn't complete in time.
async fn timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    let Some(duration) = duration else {
        return future.await;
    };

    futures::select! {
        result = future.fuse() => result,
        _ = sleep(duration).fuse() => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "no data received from caster",
        )),
    }
}

pub mod stream;
