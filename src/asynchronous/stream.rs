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

use crate::{
    asynchronous::{sleep, timeout},
    error::Error,
    options::ClientOptions,
    proto::{
        handshake::{HandshakeController, MAX_HEADER_SIZE},
        parser::ResponseHeaders,
    },
};

use futures::{channel::mpsc, FutureExt, StreamExt};

#[cfg(feature = "tokio")]
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};

#[cfg(feature = "smol")]
use smol::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

/// Logging target for the file.
const LOG_TARGET: &str = "ntrip_stream::asynchronous::stream";

/// Handle which stops [`Stream::run()`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ShutdownHandle {
    /// Stop the stream.
    ///
    /// [`Stream::run()`] returns `Ok(())` the next time it reads or sleeps, including when it's
    /// called after the shutdown has been requested.
    pub fn shutdown(&self) {
        let _ = self.tx.unbounded_send(());
    }
}

/// Correction data stream of a mount point.
pub struct Stream<S = TcpStream> {
    /// Connection to the caster.
    ///
    /// Data buffered by the reader while the headers were read is returned before anything else
    /// is read from the connection.
    stream: BufReader<S>,

    /// Response headers.
    headers: String,

    /// Client options.
    options: ClientOptions,

    /// TX channel given to shutdown handles.
    shutdown_tx: mpsc::UnboundedSender<()>,

    /// RX channel for shutdown requests.
    shutdown_rx: mpsc::UnboundedReceiver<()>,
}

impl Stream<TcpStream> {
    /// Connect to the caster and request the mount point specified in `options`.
    ///
    /// Returns after the caster has accepted the request.
    pub async fn connect(options: ClientOptions) -> crate::Result<Self> {
        options.validate()?;

        let stream =
            TcpStream::connect(options.caster_address.as_str()).await.map_err(Error::Connect)?;

        tracing::debug!(
            target: LOG_TARGET,
            caster = %options.caster_address,
            "connected to caster",
        );

        Self::handshake(stream, options).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Stream<S> {
    /// Request the mount point specified in `options` over an established connection.
    pub async fn handshake(stream: S, options: ClientOptions) -> crate::Result<Self> {
        options.validate()?;

        let mut controller = HandshakeController::new(options.clone());
        let mut stream = BufReader::new(stream);

        // send request to caster
        let command = controller.request()?;
        stream.get_mut().write_all(&command).await.map_err(Error::Request)?;
        stream.get_mut().flush().await.map_err(Error::Request)?;

        // read response headers until the empty line
        let headers = loop {
            let mut line = Vec::new();
            let mut reader = AsyncReadExt::take(&mut stream, MAX_HEADER_SIZE as u64 + 1);

            match timeout(options.read_timeout, reader.read_until(b'\n', &mut line))
                .await
                .map_err(Error::Response)?
            {
                0 => return Err(Error::Protocol(controller.handle_eof())),
                _ => {
                    if let Some(headers) =
                        controller.handle_line(&String::from_utf8_lossy(&line))?
                    {
                        break headers;
                    }
                }
            }
        };
        debug_assert!(controller.is_streaming());

        match ResponseHeaders::parse(&headers) {
            Some(response) => tracing::debug!(
                target: LOG_TARGET,
                mount_point = %options.mount_point,
                status = %response.status,
                fields = ?response.fields,
                "caster accepted request",
            ),
            None => tracing::debug!(
                target: LOG_TARGET,
                mount_point = %options.mount_point,
                %headers,
                "caster accepted request",
            ),
        }

        let (shutdown_tx, shutdown_rx) = mpsc::unbounded();

        Ok(Self {
            stream,
            headers,
            options,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get response headers received from the caster, including the terminating empty line.
    pub fn headers(&self) -> &str {
        &self.headers
    }

    /// Get parsed response headers.
    ///
    /// Returns `None` if the caster sent a non-standard status line.
    pub fn response_headers(&self) -> Option<ResponseHeaders> {
        ResponseHeaders::parse(&self.headers)
    }

    /// Get client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Get handle which can be used to stop [`Stream::run()`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Read one chunk of correction data into `buffer`.
    ///
    /// Connection closed by the caster and [`ClientOptions::read_timeout`] expiring are reported
    /// as errors.
    pub async fn read_chunk(&mut self, buffer: &mut [u8]) -> crate::Result<usize> {
        read_chunk(&mut self.stream, buffer, self.options.read_timeout).await
    }

    /// Read correction data until the connection fails or the stream is shut down.
    ///
    /// Each chunk is passed to `sink` and the next read is made after
    /// [`ClientOptions::read_interval`] has passed. Returns `Ok(())` only if the stream was shut
    /// down using a [`ShutdownHandle`].
    pub async fn run<F>(&mut self, mut sink: F) -> crate::Result<()>
    where
        F: FnMut(&[u8]),
    {
        let mut buffer = vec![0u8; self.options.read_buffer_size];

        loop {
            let nread = futures::select! {
                _ = self.shutdown_rx.next() => {
                    tracing::debug!(target: LOG_TARGET, "stream shut down");
                    return Ok(());
                }
                result = read_chunk(
                    &mut self.stream,
                    &mut buffer,
                    self.options.read_timeout,
                ).fuse() => match result {
                    Ok(nread) => nread,
                    Err(error) => {
                        tracing::debug!(
                            target: LOG_TARGET,
                            mount_point = %self.options.mount_point,
                            ?error,
                            "failed to read correction data",
                        );
                        return Err(error);
                    }
                },
            };

            sink(&buffer[..nread]);

            futures::select! {
                _ = self.shutdown_rx.next() => {
                    tracing::debug!(target: LOG_TARGET, "stream shut down");
                    return Ok(());
                }
                _ = sleep(self.options.read_interval).fuse() => {}
            }
        }
    }
}

async fn read_chunk<S: AsyncRead + Unpin>(
    stream: &mut BufReader<S>,
    buffer: &mut [u8],
    read_timeout: Option<Duration>,
) -> crate::Result<usize> {
    match timeout(read_timeout, stream.read(buffer)).await {
        Ok(0) if !buffer.is_empty() => Err(Error::Stream(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by caster",
        ))),
        Ok(nread) => {
            tracing::trace!(target: LOG_TARGET, ?nread, "read correction data");
            Ok(nread)
        }
        Err(error) => Err(Error::Stream(error)),
    }
}

#[cfg(feature = "tokio")]
impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for Stream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

#[cfg(feature = "smol")]
impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for Stream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}
