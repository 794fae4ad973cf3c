//! CLI (CommandLine Interface) utilities for the Pool OPRF demo.
//!
//! Here, you can know the options for the protocol through enum types and structs.
//! See other modules for the actual implementation of the protocol or details of what options mean.

use crate::channel_utils::sync_channel::create_unix_channel_pair;
use crate::channel_utils::sync_channel_by_cb::{
    create_crossbeam_channel_pair, CrossbeamReceiver, CrossbeamSender,
};
use crate::channel_utils::tcp_channel::create_tcp_channel_pair;
use crate::ot::{
    DigitShareForEvaluator, DigitShareForRequester, KkrtDigitReceiver, KkrtDigitSender,
    NaorPinkasDigitReceiver, NaorPinkasDigitSender,
};
use crate::params::{DeltaRule, PairPoolMode, PoolParams};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ocelot::oprf::{KkrtReceiver, KkrtSender};
use ocelot::ot::{AlszReceiver as OtReceiver, AlszSender as OtSender};
use rand::{CryptoRng, Rng};
use scuttlebutt::{AbstractChannel, Block, SyncChannel};
use std::fmt::Display;
use std::net::TcpStream;
use std::{
    io::{BufReader, BufWriter},
    os::unix::net::UnixStream,
};

/// How to fill the pair pool. More details: [pool::pair](crate::pool::pair).
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum PairType {
    /// `n * tau` random OTs.
    Direct,
    /// `n` random OTs expanded by a PRG into `kappa` rounds.
    Amplified,
}

impl Display for PairType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairType::Direct => write!(f, "direct"),
            PairType::Amplified => write!(f, "amplified"),
        }
    }
}

impl From<PairType> for PairPoolMode {
    fn from(t: PairType) -> Self {
        match t {
            PairType::Direct => PairPoolMode::Direct,
            PairType::Amplified => PairPoolMode::Amplified,
        }
    }
}

/// How to fill the digit pool. More details: [ot](crate::ot).
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum DigitType {
    /// KKRT one-out-of-N OPRF. See [KkrtDigitSender] or [KkrtDigitReceiver].
    Kkrt,
    /// `lg(delta)` one-out-of-two OTs per round. See [NaorPinkasDigitSender] or [NaorPinkasDigitReceiver].
    NaorPinkas,
}

impl Display for DigitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigitType::Kkrt => write!(f, "kkrt"),
            DigitType::NaorPinkas => write!(f, "naor-pinkas"),
        }
    }
}

/// Channel types. Channels are used to communicate between parties. More details: [channel_utils](crate::channel_utils).
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum ChannelType {
    /// Unix domain socket. See [UnixStream].
    Unix,
    /// TCP socket. See [TcpStream].
    Tcp,
    /// Native channel of Rust. See [CrossbeamReceiver] and [CrossbeamSender].
    CrossBeam,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Unix => write!(f, "unix"),
            ChannelType::Tcp => write!(f, "tcp"),
            ChannelType::CrossBeam => write!(f, "cross-beam"),
        }
    }
}

/// Validation policy for `delta`. See [DeltaRule].
#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum DeltaRuleType {
    /// Structural checks only.
    Unchecked,
    /// `lg(delta) = 7 - lg(lg(p))`, as in the reference parameter sets.
    Reference,
}

impl Display for DeltaRuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaRuleType::Unchecked => write!(f, "unchecked"),
            DeltaRuleType::Reference => write!(f, "reference"),
        }
    }
}

/// Arguments for the Pool OPRF demo.
/// This struct implements [clap::Parser] to make that this binary has CommandLine Arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, next_line_help = true)]
pub struct PoolArgs {
    /// Query dimension.
    #[arg(short = 'n', long, default_value_t = 482)]
    pub n: usize,

    /// Large modulus (power of two, at most 2^16).
    #[arg(short = 'q', long, default_value_t = 1 << 12)]
    pub q: u64,

    /// Output modulus (power of two).
    #[arg(short = 'p', long, default_value_t = 1 << 8)]
    pub p: u64,

    /// Rounding granularity (power of two).
    #[arg(short = 'd', long, default_value_t = 1 << 4)]
    pub delta: u64,

    /// Pool capacity, i.e. number of queries the pool answers.
    #[arg(short = 't', long, default_value_t = 1 << 10)]
    pub tau: usize,

    /// Derived rounds per base slot when the pair pool is amplified.
    #[arg(short = 'k', long, default_value_t = 6144)]
    pub kappa: usize,

    /// Statistical security parameter, at most 40 with the ocelot backends.
    #[arg(short = 's', long = "statsec", default_value_t = 40)]
    pub statistical_security: usize,

    /// Pair pool construction.
    #[arg(long = "pair", default_value_t = PairType::Direct)]
    pub pair_type: PairType,

    /// Digit pool construction.
    #[arg(long = "digit", default_value_t = DigitType::Kkrt)]
    pub digit_type: DigitType,

    /// Validation policy for delta.
    #[arg(long = "delta-rule", default_value_t = DeltaRuleType::Reference)]
    pub delta_rule: DeltaRuleType,

    /// Channel Types.
    #[arg(short = 'c', long = "channel", default_value_t = ChannelType::Unix)]
    pub channel_type: ChannelType,

    /// Port number for TCP channel.
    ///
    /// Both parties run in this process and meet on 127.0.0.1.
    #[arg(long = "port", default_value_t = 10000)]
    pub port: u16,

    /// Number of online evaluations to run.
    #[arg(short = 'r', long, default_value_t = 16)]
    pub rounds: usize,
}

impl PoolArgs {
    /// Validated pool parameters.
    pub fn params(&self) -> Result<PoolParams> {
        let delta_rule = match self.delta_rule {
            DeltaRuleType::Unchecked => DeltaRule::Unchecked,
            DeltaRuleType::Reference => DeltaRule::Reference { budget: 7 },
        };
        PoolParams::builder()
            .n(self.n)
            .q(self.q)
            .p(self.p)
            .delta(self.delta)
            .tau(self.tau)
            .kappa(self.kappa)
            .statistical_security(self.statistical_security)
            .pair_mode(self.pair_type.into())
            .delta_rule(delta_rule)
            .build()
            .with_context(|| format!("@{}:{}", file!(), line!()))
    }
}

/// Enum type to handle multiple channel types on runtime.
pub enum ChannelUnion {
    /// Unix domain socket. See [UnixStream].
    Unix(SyncChannel<BufReader<UnixStream>, BufWriter<UnixStream>>),
    /// TCP socket. See [TcpStream].
    Tcp(SyncChannel<BufReader<TcpStream>, BufWriter<TcpStream>>),
    /// Native channel of Rust. See [CrossbeamReceiver] and [CrossbeamSender].
    CrossBeam(SyncChannel<CrossbeamReceiver, CrossbeamSender>),
}

use ChannelUnion::*;

impl AbstractChannel for ChannelUnion {
    #[inline(always)]
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Unix(c) => c.write_bytes(bytes),
            Tcp(c) => c.write_bytes(bytes),
            CrossBeam(c) => c.write_bytes(bytes),
        }
    }

    #[inline(always)]
    fn read_bytes(&mut self, bytes: &mut [u8]) -> std::io::Result<()> {
        match self {
            Unix(c) => c.read_bytes(bytes),
            Tcp(c) => c.read_bytes(bytes),
            CrossBeam(c) => c.read_bytes(bytes),
        }
    }

    #[inline(always)]
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Unix(c) => c.flush(),
            Tcp(c) => c.flush(),
            CrossBeam(c) => c.flush(),
        }
    }

    #[inline(always)]
    fn clone(&self) -> Self {
        match self {
            Unix(c) => Unix(c.clone()),
            Tcp(c) => Tcp(c.clone()),
            CrossBeam(c) => CrossBeam(c.clone()),
        }
    }
}

/// Create a connected channel pair `(requester, evaluator)`. Runtime utility.
pub fn create_channel_pair(type_: ChannelType, port: u16) -> Result<(ChannelUnion, ChannelUnion)> {
    match type_ {
        ChannelType::Unix => {
            let (r, e) = create_unix_channel_pair()?;
            Ok((Unix(r), Unix(e)))
        }
        ChannelType::Tcp => {
            let (r, e) = create_tcp_channel_pair(port)?;
            Ok((Tcp(r), Tcp(e)))
        }
        ChannelType::CrossBeam => {
            let (r, e) = create_crossbeam_channel_pair();
            Ok((CrossBeam(r), CrossBeam(e)))
        }
    }
}

/// Enum type to handle multiple digit share types for the Evaluator on runtime.
pub enum DigitShareForEvaluatorUnion {
    /// See [KkrtDigitSender].
    Kkrt(KkrtDigitSender<KkrtSender>),
    /// See [NaorPinkasDigitSender].
    NaorPinkas(NaorPinkasDigitSender<OtSender>),
}

/// Enum type to handle multiple digit share types for the Requester on runtime.
pub enum DigitShareForRequesterUnion {
    /// See [KkrtDigitReceiver].
    Kkrt(KkrtDigitReceiver<KkrtReceiver>),
    /// See [NaorPinkasDigitReceiver].
    NaorPinkas(NaorPinkasDigitReceiver<OtReceiver>),
}

impl DigitShareForEvaluator for DigitShareForEvaluatorUnion {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        count: usize,
        delta: usize,
    ) -> Result<Vec<Vec<Block>>> {
        match self {
            DigitShareForEvaluatorUnion::Kkrt(d) => d.receive(channel, rng, count, delta),
            DigitShareForEvaluatorUnion::NaorPinkas(d) => d.receive(channel, rng, count, delta),
        }
    }
}

impl DigitShareForRequester for DigitShareForRequesterUnion {
    fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
        digits: &[u32],
        delta: usize,
    ) -> Result<Vec<Block>> {
        match self {
            DigitShareForRequesterUnion::Kkrt(d) => d.receive(channel, rng, digits, delta),
            DigitShareForRequesterUnion::NaorPinkas(d) => d.receive(channel, rng, digits, delta),
        }
    }
}

/// Create digit shares `(evaluator, requester)` for the protocol. Runtime utility.
pub fn create_digit_shares(
    digit_type: DigitType,
) -> (DigitShareForEvaluatorUnion, DigitShareForRequesterUnion) {
    match digit_type {
        DigitType::Kkrt => (
            DigitShareForEvaluatorUnion::Kkrt(KkrtDigitSender::new()),
            DigitShareForRequesterUnion::Kkrt(KkrtDigitReceiver::new()),
        ),
        DigitType::NaorPinkas => (
            DigitShareForEvaluatorUnion::NaorPinkas(NaorPinkasDigitSender::new()),
            DigitShareForRequesterUnion::NaorPinkas(NaorPinkasDigitReceiver::new()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_reference() {
        let args = PoolArgs::parse_from(["pool_oprf"]);
        let params = args.params().unwrap();
        let reference = PoolParams::reference().unwrap();
        assert_eq!(params.n(), reference.n());
        assert_eq!(params.q(), reference.q());
        assert_eq!(params.p(), reference.p());
        assert_eq!(params.delta(), reference.delta());
        assert_eq!(params.kappa(), reference.kappa());
        assert_eq!(params.tau(), 1 << 10);
    }

    #[test]
    fn test_parse() {
        let args = PoolArgs::parse_from([
            "pool_oprf",
            "-n",
            "8",
            "-q",
            "256",
            "-p",
            "4",
            "-d",
            "4",
            "--pair",
            "amplified",
            "--digit",
            "naor-pinkas",
            "--delta-rule",
            "unchecked",
            "-c",
            "cross-beam",
        ]);
        assert!(matches!(args.digit_type, DigitType::NaorPinkas));
        assert!(matches!(args.channel_type, ChannelType::CrossBeam));
        let params = args.params().unwrap();
        assert_eq!(params.pair_mode(), PairPoolMode::Amplified);
        assert_eq!(params.pair_rounds(), 6144);
    }

    #[test]
    fn test_rejects_reference_violation() {
        // lg(lg 4) = 1, reference rule wants lg(delta) = 6
        let args = PoolArgs::parse_from(["pool_oprf", "-n", "8", "-p", "4", "-d", "4"]);
        assert!(args.params().is_err());
    }
}
