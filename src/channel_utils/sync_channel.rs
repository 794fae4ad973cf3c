//! Module about unix domain socket channel. See [UnixStream].
//! This module provides a function to create a connected pair of unix domain socket channels.

use anyhow::{Context, Result};
use scuttlebutt::SyncChannel;
use std::{
    io::{BufReader, BufWriter},
    os::unix::net::UnixStream,
};

/// Unix domain socket channel.
pub type UnixChannel = SyncChannel<BufReader<UnixStream>, BufWriter<UnixStream>>;

/// Create a connected pair of unix domain socket channels. See [UnixStream].
///
/// The first channel is meant for the Requester and the second one for the Evaluator, though the
/// pair is symmetric.
pub fn create_unix_channel_pair() -> Result<(UnixChannel, UnixChannel)> {
    let (s, r) = UnixStream::pair().with_context(|| format!("@{}:{}", file!(), line!()))?;
    let rs = s
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    let rr = r
        .try_clone()
        .with_context(|| format!("@{}:{}", file!(), line!()))?;
    let left = SyncChannel::new(BufReader::new(rs), BufWriter::new(s));
    let right = SyncChannel::new(BufReader::new(rr), BufWriter::new(r));

    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scuttlebutt::AbstractChannel;

    #[test]
    fn test_pair() {
        let (mut left, mut right) = create_unix_channel_pair().unwrap();

        let handle = std::thread::spawn(move || {
            let m = right.read_usize().unwrap();
            assert_eq!(m, 1);
            right.write_usize(0).unwrap();
            right.flush().unwrap();
        });

        left.write_usize(1).unwrap();
        left.flush().unwrap();
        assert_eq!(left.read_usize().unwrap(), 0);

        handle.join().unwrap();
    }
}
