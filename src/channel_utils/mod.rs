//! Transports between the Requester and the Evaluator.
//!
//! Any [AbstractChannel] works. This module provides framing helpers for the online messages,
//! a traffic-counting wrapper ([MeteredChannel]) and constructors for connected channel pairs over
//! unix sockets, TCP and crossbeam.

use crate::error::PoolError;
use anyhow::{bail, Context, Result};
use scuttlebutt::AbstractChannel;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub mod sync_channel;
pub mod sync_channel_by_cb;
pub mod tcp_channel;

/// Write `v` as a length-prefixed little-endian `u32` array and flush.
pub fn write_vec_u32<C>(channel: &mut C, v: &[u32]) -> Result<usize>
where
    C: AbstractChannel,
{
    let bytes = v.iter().flat_map(|x| x.to_le_bytes()).collect::<Vec<_>>();

    let len = bytes.len();

    channel
        .write_usize(len)
        .map_err(PoolError::transport("write_vec_u32"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    channel
        .write_bytes(&bytes)
        .map_err(PoolError::transport("write_vec_u32"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    channel
        .flush()
        .map_err(PoolError::transport("write_vec_u32"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(len)
}

/// Read an array written by [write_vec_u32]. The peer's length prefix must announce exactly
/// `expected` entries; nothing is allocated otherwise.
pub fn read_vec_u32<C>(channel: &mut C, expected: usize) -> Result<Vec<u32>>
where
    C: AbstractChannel,
{
    let bytes_len = channel
        .read_usize()
        .map_err(PoolError::transport("read_vec_u32"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    if expected.checked_mul(4) != Some(bytes_len) {
        bail!(PoolError::MalformedMessage(format!(
            "u32 array of {} bytes, {} entries expected",
            bytes_len, expected
        )));
    }

    let mut res = vec![0u8; bytes_len];

    channel
        .read_bytes(&mut res)
        .map_err(PoolError::transport("read_vec_u32"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    let res = res
        .chunks_exact(4)
        .map(|x| u32::from_le_bytes([x[0], x[1], x[2], x[3]]))
        .collect::<Vec<_>>();

    Ok(res)
}

/// Write a bit vector packed eight bits per byte (lsb first), prefixed by its bit length.
pub fn write_bits<C>(channel: &mut C, bits: &[bool]) -> Result<()>
where
    C: AbstractChannel,
{
    let mut packed = vec![0u8; (bits.len() + 7) / 8];
    for (i, _) in bits.iter().enumerate().filter(|(_, &b)| b) {
        packed[i / 8] |= 1 << (i % 8);
    }

    channel
        .write_usize(bits.len())
        .map_err(PoolError::transport("write_bits"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    channel
        .write_bytes(&packed)
        .map_err(PoolError::transport("write_bits"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    channel
        .flush()
        .map_err(PoolError::transport("write_bits"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok(())
}

/// Read a bit vector of `expected` bits written by [write_bits].
pub fn read_bits<C>(channel: &mut C, expected: usize) -> Result<Vec<bool>>
where
    C: AbstractChannel,
{
    let len = channel
        .read_usize()
        .map_err(PoolError::transport("read_bits"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    if len != expected {
        bail!(PoolError::MalformedMessage(format!(
            "bit vector of {} bits, {} expected",
            len, expected
        )));
    }

    let mut packed = vec![0u8; (len + 7) / 8];
    channel
        .read_bytes(&mut packed)
        .map_err(PoolError::transport("read_bits"))
        .with_context(|| format!("@{}:{}", file!(), line!()))?;

    Ok((0..len).map(|i| (packed[i / 8] >> (i % 8)) & 1 == 1).collect())
}

/// Channel wrapper counting the bytes that go through it.
///
/// Counters are shared between clones, so a clone handed to a sub-protocol is accounted for as well.
pub struct MeteredChannel<C: AbstractChannel> {
    inner: C,
    sent: Arc<AtomicUsize>,
    received: Arc<AtomicUsize>,
}

/// Snapshot of a [MeteredChannel]'s counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Traffic {
    /// Bytes written.
    pub bytes_sent: usize,
    /// Bytes read.
    pub bytes_received: usize,
}

impl Traffic {
    /// Traffic accumulated since `earlier`.
    pub fn since(&self, earlier: Traffic) -> Traffic {
        Traffic {
            bytes_sent: self.bytes_sent - earlier.bytes_sent,
            bytes_received: self.bytes_received - earlier.bytes_received,
        }
    }
}

impl<C: AbstractChannel> MeteredChannel<C> {
    /// Wrap `inner` with zeroed counters.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            sent: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bytes written so far.
    pub fn bytes_sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    /// Bytes read so far.
    pub fn bytes_received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    /// Both counters at once.
    pub fn traffic(&self) -> Traffic {
        Traffic {
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
        }
    }
}

impl<C: AbstractChannel> AbstractChannel for MeteredChannel<C> {
    #[inline(always)]
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.inner.write_bytes(bytes)?;
        self.sent.fetch_add(bytes.len(), Ordering::Relaxed);
        Ok(())
    }

    #[inline(always)]
    fn read_bytes(&mut self, bytes: &mut [u8]) -> std::io::Result<()> {
        self.inner.read_bytes(bytes)?;
        self.received.fetch_add(bytes.len(), Ordering::Relaxed);
        Ok(())
    }

    #[inline(always)]
    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            sent: self.sent.clone(),
            received: self.received.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use scuttlebutt::{AesRng, Channel};
    use std::io::{BufReader, BufWriter};
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_write_read_vec_u32() {
        let mut rng = AesRng::new();

        let v = (0..10).map(|_| rng.gen::<u32>()).collect::<Vec<_>>();
        let w = v.clone();
        let bits = (0..13).map(|_| rng.gen::<bool>()).collect::<Vec<_>>();
        let bits2 = bits.clone();

        let (sender, receiver) = UnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || {
            let mut channel = Channel::new(
                BufReader::new(sender.try_clone().unwrap()),
                BufWriter::new(sender),
            );

            channel.write_bytes(b"hello").unwrap();
            channel.flush().unwrap();

            let len = write_vec_u32(&mut channel, &w).unwrap();
            assert_eq!(len, 40);
            write_bits(&mut channel, &bits2).unwrap();
        });

        let mut channel = Channel::new(
            BufReader::new(receiver.try_clone().unwrap()),
            BufWriter::new(receiver),
        );

        let mut buf = [0u8; 5];
        channel.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        let res = read_vec_u32(&mut channel, 10).unwrap();
        let res_bits = read_bits(&mut channel, 13).unwrap();

        handle.join().unwrap();

        assert_eq!(v, res);
        assert_eq!(bits, res_bits);
    }

    #[test]
    fn test_metered_channel() {
        let (left, right) = sync_channel::create_unix_channel_pair().unwrap();

        let handle = std::thread::spawn(move || {
            let mut channel = MeteredChannel::new(right);
            let v = read_vec_u32(&mut channel, 3).unwrap();
            assert_eq!(v, vec![1, 2, 3]);
            channel.write_bool(true).unwrap();
            channel.flush().unwrap();
            channel.traffic()
        });

        let mut channel = MeteredChannel::new(left);
        let before = channel.traffic();
        write_vec_u32(&mut channel, &[1, 2, 3]).unwrap();
        let mut clone = AbstractChannel::clone(&channel);
        assert!(clone.read_bool().unwrap());

        let peer = handle.join().unwrap();

        let mine = channel.traffic().since(before);
        assert_eq!(mine.bytes_sent, 8 + 12);
        assert_eq!(mine.bytes_received, 1);
        assert_eq!(peer.bytes_received, mine.bytes_sent);
        assert_eq!(peer.bytes_sent, mine.bytes_received);
    }

    #[test]
    fn test_rejects_unexpected_length() {
        let (mut left, mut right) = sync_channel::create_unix_channel_pair().unwrap();

        let handle = std::thread::spawn(move || {
            // announce a huge array; the reader must refuse before reading the body
            left.write_usize(usize::MAX - 3).unwrap();
            left.flush().unwrap();
            write_bits(&mut left, &[true; 9]).unwrap();
        });

        for err in [
            read_vec_u32(&mut right, 4).unwrap_err(),
            read_bits(&mut right, 8).unwrap_err(),
        ] {
            assert!(matches!(
                err.downcast_ref::<PoolError>(),
                Some(PoolError::MalformedMessage(_))
            ));
        }
        handle.join().unwrap();
    }
}
