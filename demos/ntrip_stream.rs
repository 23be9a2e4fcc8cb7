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

//! Stream correction data of a mount point and print it to stdout.
//!
//! ```text
//! RUST_LOG=ntrip_stream=debug cargo run --example ntrip_stream -- \
//!     --caster caster.example.com:2101 --mount-point MNT --username user --password pass
//! ```

use clap::Parser;
use ntrip_stream::ClientOptions;
use tracing_subscriber::{prelude::*, EnvFilter};

use std::{process::ExitCode, time::Duration};

#[derive(Debug, Parser)]
#[command(version, about = "Stream correction data from an NTRIP caster", long_about = None)]
struct Args {
    /// Address of the caster, as `host:port`.
    #[arg(short, long, default_value = "127.0.0.1:2101")]
    caster: String,

    /// Mount point.
    #[arg(short, long)]
    mount_point: String,

    /// Username.
    #[arg(short, long, default_value = "")]
    username: String,

    /// Password.
    #[arg(short, long, default_value = "")]
    password: String,

    /// Value of the `User-Agent` header.
    #[arg(long)]
    user_agent: Option<String>,

    /// Size of the read buffer in bytes.
    #[arg(long, default_value_t = 1024)]
    buffer_size: usize,

    /// Delay between reads in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Fail if the caster sends nothing for this many seconds.
    #[arg(long)]
    read_timeout_secs: Option<u64>,
}

impl Args {
    fn into_options(self) -> ClientOptions {
        let mut options =
            ClientOptions::new(self.caster, self.mount_point, self.username, self.password);

        if let Some(user_agent) = self.user_agent {
            options.user_agent = user_agent;
        }
        options.read_buffer_size = self.buffer_size;
        options.read_interval = Duration::from_millis(self.interval_ms);
        options.read_timeout = self.read_timeout_secs.map(Duration::from_secs);

        options
    }
}

fn init_logger() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();
}

fn print_request(options: &ClientOptions) {
    println!(
        "Requesting from {}:\n{}",
        options.caster_address,
        ntrip_stream::redacted_request(options),
    );
}

fn print_chunk(chunk: &[u8]) {
    println!("{}", String::from_utf8_lossy(chunk));
}

#[cfg(feature = "tokio")]
#[tokio::main]
async fn main() -> ExitCode {
    use ntrip_stream::Stream;

    init_logger();

    let options = Args::parse().into_options();
    print_request(&options);

    let mut stream = match Stream::connect(options).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%error, "handshake with caster failed");
            return ExitCode::FAILURE;
        }
    };

    println!("Response headers:\n{}", stream.headers());

    let handle = stream.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.shutdown();
        }
    });

    match stream.run(print_chunk).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "correction stream failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "smol")]
fn main() -> ExitCode {
    use ntrip_stream::Stream;

    init_logger();

    let options = Args::parse().into_options();
    print_request(&options);

    smol::block_on(async move {
        let mut stream = match Stream::connect(options).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(%error, "handshake with caster failed");
                return ExitCode::FAILURE;
            }
        };

        println!("Response headers:\n{}", stream.headers());

        match stream.run(print_chunk).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                tracing::error!(%error, "correction stream failed");
                ExitCode::FAILURE
            }
        }
    })
}

#[cfg(all(feature = "sync", not(any(feature = "tokio", feature = "smol"))))]
fn main() -> ExitCode {
    use ntrip_stream::Stream;

    init_logger();

    let options = Args::parse().into_options();
    print_request(&options);

    let mut stream = match Stream::connect(options) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%error, "handshake with caster failed");
            return ExitCode::FAILURE;
        }
    };

    println!("Response headers:\n{}", stream.headers());

    match stream.run(print_chunk) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "correction stream failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(any(feature = "tokio", feature = "smol", feature = "sync")))]
fn main() {
    eprintln!("enable one of the `tokio`, `smol` or `sync` features");
}
