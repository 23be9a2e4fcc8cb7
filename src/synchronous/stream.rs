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

#![cfg(all(feature = "sync", not(any(feature = "tokio", feature = "smol"))))]

use crate::{
    error::Error,
    options::ClientOptions,
    proto::{
        handshake::{HandshakeController, MAX_HEADER_SIZE},
        parser::ResponseHeaders,
    },
};

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    net::{Shutdown, TcpStream},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc, Weak,
    },
    time::Duration,
};

/// Logging target for the file.
const LOG_TARGET: &str = "ntrip_stream::synchronous::stream";

/// Handle which stops [`Stream::run()`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    /// TX channel for shutdown requests.
    tx: mpsc::Sender<()>,

    /// Socket of the stream, if it was created with [`Stream::connect()`].
    ///
    /// Doesn't keep the connection open after [`Stream`] has been dropped.
    socket: Option<Weak<TcpStream>>,
}

impl ShutdownHandle {
    /// Stop the stream.
    ///
    /// If the stream was created with [`Stream::connect()`], the socket is shut down which
    /// unblocks a pending read. Otherwise [`Stream::run()`] returns after the pending read has
    /// completed.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());

        if let Some(socket) = self.socket.as_ref().and_then(Weak::upgrade) {
            if let Err(error) = socket.shutdown(Shutdown::Both) {
                tracing::debug!(target: LOG_TARGET, ?error, "failed to shut down socket");
            }
        }
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

    /// Socket given to shutdown handles.
    socket: Option<Arc<TcpStream>>,

    /// TX channel given to shutdown handles.
    shutdown_tx: mpsc::Sender<()>,

    /// RX channel for shutdown requests.
    shutdown_rx: mpsc::Receiver<()>,
}

impl Stream<TcpStream> {
    /// Connect to the caster and request the mount point specified in `options`.
    ///
    /// Returns after the caster has accepted the request.
    pub fn connect(options: ClientOptions) -> crate::Result<Self> {
        options.validate()?;

        let stream =
            TcpStream::connect(options.caster_address.as_str()).map_err(Error::Connect)?;
        stream.set_read_timeout(options.read_timeout).map_err(Error::Connect)?;
        let socket = stream.try_clone().map_err(Error::Connect)?;

        tracing::debug!(
            target: LOG_TARGET,
            caster = %options.caster_address,
            "connected to caster",
        );

        let mut stream = Self::handshake(stream, options)?;
        stream.socket = Some(Arc::new(socket));

        Ok(stream)
    }
}

impl<S: Read + Write> Stream<S> {
    /// Request the mount point specified in `options` over an established connection.
    ///
    /// [`ClientOptions::read_timeout`] is only applied by [`Stream::connect()`], a custom
    /// transport must configure its own read timeout.
    pub fn handshake(stream: S, options: ClientOptions) -> crate::Result<Self> {
        options.validate()?;

        let mut controller = HandshakeController::new(options.clone());
        let mut stream = BufReader::new(stream);

        // send request to caster
        let command = controller.request()?;
        stream.get_mut().write_all(&command).map_err(Error::Request)?;
        stream.get_mut().flush().map_err(Error::Request)?;

        // read response headers until the empty line
        let headers = loop {
            let mut line = Vec::new();

            let mut reader = Read::take(&mut stream, MAX_HEADER_SIZE as u64 + 1);

            match reader
                .read_until(b'\n', &mut line)
                .map_err(|error| Error::Response(timed_out(error, options.read_timeout)))?
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

        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        Ok(Self {
            stream,
            headers,
            options,
            socket: None,
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
            socket: self.socket.as_ref().map(Arc::downgrade),
        }
    }

    /// Read one chunk of correction data into `buffer`.
    ///
    /// Connection closed by the caster and [`ClientOptions::read_timeout`] expiring are reported
    /// as errors.
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> crate::Result<usize> {
        match self.stream.read(buffer) {
            Ok(0) if !buffer.is_empty() => Err(Error::Stream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by caster",
            ))),
            Ok(nread) => {
                tracing::trace!(target: LOG_TARGET, ?nread, "read correction data");
                Ok(nread)
            }
            Err(error) => Err(Error::Stream(timed_out(error, self.options.read_timeout))),
        }
    }

    /// Read correction data until the connection fails or the stream is shut down.
    ///
    /// Each chunk is passed to `sink` and the next read is made after
    /// [`ClientOptions::read_interval`] has passed. Returns `Ok(())` only if the stream was shut
    /// down using a [`ShutdownHandle`].
    pub fn run<F>(&mut self, mut sink: F) -> crate::Result<()>
    where
        F: FnMut(&[u8]),
    {
        let mut buffer = vec![0u8; self.options.read_buffer_size];

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                tracing::debug!(target: LOG_TARGET, "stream shut down");
                return Ok(());
            }

            let nread = match self.read_chunk(&mut buffer) {
                Ok(nread) => nread,
                // read was interrupted by `ShutdownHandle::shutdown()`
                Err(_) if self.shutdown_rx.try_recv().is_ok() => {
                    tracing::debug!(target: LOG_TARGET, "stream shut down");
                    return Ok(());
                }
                Err(error) => {
                    tracing::debug!(
                        target: LOG_TARGET,
                        mount_point = %self.options.mount_point,
                        ?error,
                        "failed to read correction data",
                    );
                    return Err(error);
                }
            };

            sink(&buffer[..nread]);

            match self.shutdown_rx.recv_timeout(self.options.read_interval) {
                Ok(()) => {
                    tracing::debug!(target: LOG_TARGET, "stream shut down");
                    return Ok(());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => unreachable!("stream owns a sender"),
            }
        }
    }
}

/// Report an expired read timeout as [`io::ErrorKind::TimedOut`].
///
/// Depending on the platform, a read on a socket with a read timeout fails with either
/// [`io::ErrorKind::WouldBlock`] or [`io::ErrorKind::TimedOut`].
fn timed_out(error: io::Error, read_timeout: Option<Duration>) -> io::Error {
    match (error.kind(), read_timeout) {
        (io::ErrorKind::WouldBlock, Some(_)) => {
            io::Error::new(io::ErrorKind::TimedOut, "no data received from caster")
        }
        _ => error,
    }
}

impl<S: Read> Read for Stream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

#[cfg(all(test, feature = "sync"))]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use std::{
        io::Cursor,
        net::TcpListener,
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Instant,
    };

    fn options(caster_address: &str) -> ClientOptions {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        ClientOptions {
            read_interval: Duration::ZERO,
            ..ClientOptions::new(caster_address, "MNT", "user", "pass")
        }
    }

    /// In-memory caster which answers with `response` and then either closes the connection or
    /// fails every read.
    struct MockCaster {
        response: Cursor<Vec<u8>>,
        request: Vec<u8>,
        reset: bool,
        failed_reads: Arc<AtomicUsize>,
    }

    impl MockCaster {
        fn new(response: &[u8]) -> Self {
            Self {
                response: Cursor::new(response.to_vec()),
                request: Vec::new(),
                reset: false,
                failed_reads: Default::default(),
            }
        }
    }

    impl Read for MockCaster {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.response.read(buf)? {
                0 if self.reset => {
                    self.failed_reads.fetch_add(1, Ordering::SeqCst);
                    Err(io::Error::from(io::ErrorKind::ConnectionReset))
                }
                nread => Ok(nread),
            }
        }
    }

    impl Write for MockCaster {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.request.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_until_caster_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let caster = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut stream = BufReader::new(stream);
            let mut request = String::new();

            loop {
                let mut line = String::new();
                stream.read_line(&mut line).unwrap();
                request.push_str(&line);

                if line == "\r\n" {
                    break;
                }
            }

            stream.get_mut().write_all(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();
            stream.get_mut().write_all(&[0x01, 0x02, 0x03]).unwrap();

            request
        });

        let mut stream = Stream::connect(options(&address)).unwrap();
        assert_eq!(stream.headers(), "HTTP/1.1 200 OK\r\n\r\n");

        let mut chunks = Vec::new();
        match stream.run(|chunk| chunks.push(chunk.to_vec())) {
            Err(Error::Stream(error)) => assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof),
            result => panic!("invalid result: {result:?}"),
        }
        assert_eq!(chunks, vec![vec![0x01, 0x02, 0x03]]);

        let request = caster.join().unwrap();
        assert!(request.starts_with("GET /MNT HTTP/1.1\r\n"));
        assert!(request.contains("Authorization: Basic dXNlcjpwYXNz\r\n"));
        assert!(request.ends_with("Ntrip-Version: Ntrip/2.0\r\n\r\n"));
    }

    #[test]
    fn caster_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        match Stream::connect(options(&address)) {
            Err(Error::Connect(_)) => {}
            Err(error) => panic!("invalid error: {error:?}"),
            Ok(_) => panic!("connected to closed listener"),
        }
    }

    #[test]
    fn request_rejected() {
        let caster = MockCaster::new(b"HTTP/1.1 401 Unauthorized\r\n\r\n");

        match Stream::handshake(caster, options("127.0.0.1:2101")) {
            Err(Error::Protocol(ProtocolError::Rejected(Some(status)))) => {
                assert_eq!(status.code, 401);
            }
            Err(error) => panic!("invalid error: {error:?}"),
            Ok(_) => panic!("handshake succeeded"),
        }
    }

    #[test]
    fn request_is_written_before_headers_are_read() {
        let caster = MockCaster::new(b"HTTP/1.1 200 OK\r\n\r\n");
        let stream = Stream::handshake(caster, options("127.0.0.1:2101")).unwrap();

        assert_eq!(
            std::str::from_utf8(&stream.stream.get_ref().request).unwrap(),
            "GET /MNT HTTP/1.1\r\n\
            User-Agent: NTRIP A2A Client/2.0\r\n\
            Connection: close\r\n\
            Authorization: Basic dXNlcjpwYXNz\r\n\
            Ntrip-Version: Ntrip/2.0\r\n\
            \r\n"
        );
    }

    #[test]
    fn truncated_headers() {
        let caster = MockCaster::new(b"HTTP/1.1 200 OK\r\nServer: X\r\n");

        match Stream::handshake(caster, options("127.0.0.1:2101")) {
            Err(Error::Protocol(ProtocolError::TruncatedResponse)) => {}
            Err(error) => panic!("invalid error: {error:?}"),
            Ok(_) => panic!("handshake succeeded"),
        }
    }

    #[test]
    fn data_sent_with_headers_is_not_lost() {
        let caster = MockCaster::new(b"HTTP/1.1 200 OK\r\nServer: X\r\n\r\n\x01\x02\x03");
        let mut stream = Stream::handshake(caster, options("127.0.0.1:2101")).unwrap();

        assert_eq!(stream.response_headers().unwrap().get("server"), Some("X"));

        let mut buffer = vec![0u8; 1024];
        assert_eq!(stream.read_chunk(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], &[0x01, 0x02, 0x03]);

        match stream.read_chunk(&mut buffer) {
            Err(Error::Stream(error)) => assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof),
            result => panic!("invalid result: {result:?}"),
        }
    }

    #[test]
    fn read_error_stops_stream() {
        let mut caster = MockCaster::new(b"HTTP/1.1 200 OK\r\n\r\nrtcm");
        caster.reset = true;
        let failed_reads = Arc::clone(&caster.failed_reads);

        let mut stream = Stream::handshake(caster, options("127.0.0.1:2101")).unwrap();
        let mut received = Vec::new();

        match stream.run(|chunk| received.extend_from_slice(chunk)) {
            Err(Error::Stream(error)) => assert_eq!(error.kind(), io::ErrorKind::ConnectionReset),
            result => panic!("invalid result: {result:?}"),
        }

        assert_eq!(received, b"rtcm");
        assert_eq!(failed_reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_blocked_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let caster = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut stream = BufReader::new(stream);

            loop {
                let mut line = String::new();
                stream.read_line(&mut line).unwrap();

                if line == "\r\n" {
                    break;
                }
            }

            stream.get_mut().write_all(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();

            // keep the connection open until the client has shut down
            let _ = done_rx.recv();
        });

        let mut stream = Stream::connect(options(&address)).unwrap();
        let handle = stream.shutdown_handle();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.shutdown();
        });

        assert!(stream.run(|_| {}).is_ok());

        done_tx.send(()).unwrap();
        caster.join().unwrap();
    }

    #[test]
    fn shutdown_while_sleeping() {
        let caster = MockCaster::new(b"HTTP/1.1 200 OK\r\n\r\nrtcm");
        let mut stream = Stream::handshake(
            caster,
            ClientOptions {
                read_interval: Duration::from_secs(3600),
                ..options("127.0.0.1:2101")
            },
        )
        .unwrap();
        let handle = stream.shutdown_handle();
        let mut received = Vec::new();

        let result = stream.run(|chunk| {
            received.extend_from_slice(chunk);
            handle.shutdown();
        });

        assert!(result.is_ok());
        assert_eq!(received, b"rtcm");
    }

    #[test]
    fn read_stream_directly() {
        let caster = MockCaster::new(b"HTTP/1.1 200 OK\r\n\r\ncorrection data");
        let mut stream = Stream::handshake(caster, options("127.0.0.1:2101")).unwrap();

        let mut data = Vec::new();
        stream.read_to_end(&mut data).unwrap();

        assert_eq!(data, b"correction data");
    }

    /// Accept one client, read its request and answer with `response`.
    ///
    /// Returns the connection once `done` has been signaled or closed.
    fn spawn_caster(
        listener: TcpListener,
        response: &'static [u8],
        done: mpsc::Receiver<()>,
    ) -> thread::JoinHandle<TcpStream> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut stream = BufReader::new(stream);

            loop {
                let mut line = String::new();
                stream.read_line(&mut line).unwrap();

                if line == "\r\n" {
                    break;
                }
            }

            stream.get_mut().write_all(response).unwrap();
            let _ = done.recv();

            stream.into_inner()
        })
    }

    #[test]
    fn dropped_stream_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (done_tx, done_rx) = mpsc::channel();
        let caster = spawn_caster(listener, b"HTTP/1.1 200 OK\r\n\r\n", done_rx);

        let stream = Stream::connect(options(&address)).unwrap();
        let handle = stream.shutdown_handle();
        drop(stream);

        done_tx.send(()).unwrap();
        let mut caster = caster.join().unwrap();
        caster.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        // client closed the connection even though a shutdown handle is alive
        let mut buffer = [0u8; 16];
        assert_eq!(caster.read(&mut buffer).unwrap(), 0);

        // no-op once the stream is gone
        handle.shutdown();
    }

    #[test]
    fn empty_read_buffer_rejected() {
        let caster = MockCaster::new(b"HTTP/1.1 200 OK\r\n\r\n");
        let options = ClientOptions {
            read_buffer_size: 0,
            ..options("127.0.0.1:2101")
        };

        match Stream::handshake(caster, options.clone()) {
            Err(Error::InvalidOptions(_)) => {}
            Err(error) => panic!("invalid error: {error:?}"),
            Ok(_) => panic!("handshake succeeded"),
        }

        match Stream::connect(options) {
            Err(Error::InvalidOptions(_)) => {}
            Err(error) => panic!("invalid error: {error:?}"),
            Ok(_) => panic!("connected with invalid options"),
        }
    }

    #[test]
    fn silent_caster_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (done_tx, done_rx) = mpsc::channel();
        let caster = spawn_caster(listener, b"HTTP/1.1 200 OK\r\n\r\nrtcm", done_rx);

        let mut stream = Stream::connect(ClientOptions {
            read_timeout: Some(Duration::from_millis(100)),
            ..options(&address)
        })
        .unwrap();
        let mut received = Vec::new();
        let started = Instant::now();

        match stream.run(|chunk| received.extend_from_slice(chunk)) {
            Err(Error::Stream(error)) => assert_eq!(error.kind(), io::ErrorKind::TimedOut),
            result => panic!("invalid result: {result:?}"),
        }
        assert_eq!(received, b"rtcm");
        assert!(started.elapsed() >= Duration::from_millis(100));

        done_tx.send(()).unwrap();
        caster.join().unwrap();
    }

    #[test]
    fn header_line_without_terminator() {
        let mut response = b"HTTP/1.1 200 OK\r\nX-Padding: ".to_vec();
        response.extend(std::iter::repeat(b'a').take(MAX_HEADER_SIZE));

        let caster = MockCaster::new(&response);

        match Stream::handshake(caster, options("127.0.0.1:2101")) {
            Err(Error::Protocol(ProtocolError::HeadersTooLarge)) => {}
            Err(error) => panic!("invalid error: {error:?}"),
            Ok(_) => panic!("handshake succeeded"),
        }
    }
}
