//! Module about tcp channel. See [TcpStream].
//! This module provides functions to connect the Requester and the Evaluator over TCP.

use anyhow::{bail, Context, Result};
use scuttlebutt::SyncChannel;
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::sleep;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Role tags exchanged right after connecting, so that two Requesters (or two Evaluators) never
/// end up paired by accident.
const REQUESTER_TAG: u8 = 0x52;
const EVALUATOR_TAG: u8 = 0x45;

/// TCP channel.
pub type TcpChannel = SyncChannel<BufReader<TcpStream>, BufWriter<TcpStream>>;

fn into_channel(stream: TcpStream) -> Result<TcpChannel> {
    stream
        .set_nodelay(true)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    let ss = stream
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    Ok(SyncChannel::new(BufReader::new(ss), BufWriter::new(stream)))
}

fn handshake(stream: &mut TcpStream, mine: u8, expected: u8) -> Result<()> {
    stream
        .write_all(&[mine])
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    let mut buf = [0u8; 1];
    stream
        .read_exact(&mut buf)
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    if buf[0] != expected {
        bail!(
            "unexpected peer role tag {:#04x} (expected {:#04x}) @{}:{}",
            buf[0],
            expected,
            file!(),
            line!()
        );
    }
    Ok(())
}

/// Requester side: listen on `127.0.0.1:port` and accept the Evaluator.
pub fn create_tcp_channel_for_requester(port: u16) -> Result<TcpChannel> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .with_context(|| format!("addr={} @{}:{}", addr, file!(), line!()))?;

    let (mut stream, _) = listener
        .accept()
        .with_context(|| format!("addr={} @{}:{}", addr, file!(), line!()))?;
    handshake(&mut stream, REQUESTER_TAG, EVALUATOR_TAG)?;

    into_channel(stream)
}

/// Evaluator side: connect to the Requester on `127.0.0.1:port`, retrying until [TIMEOUT].
pub fn create_tcp_channel_for_evaluator(port: u16) -> Result<TcpChannel> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let start = Instant::now();

    let mut stream = loop {
        match TcpStream::connect_timeout(&addr, TIMEOUT) {
            Ok(s) => break s,
            Err(e) if start.elapsed() < TIMEOUT => {
                tracing::debug!(%addr, error = %e, "requester not listening yet");
                sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("addr={} @{}:{}", addr, file!(), line!()))
            }
        }
    };
    handshake(&mut stream, EVALUATOR_TAG, REQUESTER_TAG)?;

    into_channel(stream)
}

/// Create a connected pair of tcp channels on `port`. See [TcpStream].
///
/// Return `(requester_channel, evaluator_channel)`.
pub fn create_tcp_channel_pair(port: u16) -> Result<(TcpChannel, TcpChannel)> {
    let requester_handle = std::thread::spawn(move || create_tcp_channel_for_requester(port));

    let evaluator_channel = create_tcp_channel_for_evaluator(port)?;

    let requester_channel = match requester_handle.join() {
        Ok(r) => r?,
        Err(_) => bail!("requester listener thread panicked @{}:{}", file!(), line!()),
    };

    Ok((requester_channel, evaluator_channel))
}
