//! Module about native channel of Rust. See [crossbeam].
//! This module provides a function to create a connected pair of in-process channels.

use scuttlebutt::SyncChannel;
pub mod crossbeam_wrapper;
use crossbeam_wrapper::cbch_pair;
pub use crossbeam_wrapper::{CrossbeamReceiver, CrossbeamSender};

/// In-process channel.
pub type CrossbeamChannel = SyncChannel<CrossbeamReceiver, CrossbeamSender>;

/// Create a connected pair of crossbeam channels.
pub fn create_crossbeam_channel_pair() -> (CrossbeamChannel, CrossbeamChannel) {
    let (sr, rl) = cbch_pair();
    let (sl, rr) = cbch_pair();
    let left = SyncChannel::new(rl, sl);
    let right = SyncChannel::new(rr, sr);

    (left, right)
}
