//! Online phase: Request, BlindEval, Finalize.
//!
//! One evaluation consumes the pool slot `ctr` of both parties:
//!
//! 1. The [Requester] expands its query seeds into $`a \in \mathbb{Z}_q^n`$ and sends a
//!    [RequestMessage] $`(e_0, e_1, \bar\beta)`$ in which, for each coordinate, the branch selected by
//!    $`sk_i`$ carries $`sk_i a_i + c_i`$ under the pads of the pair pool.
//! 2. The [Evaluator] strips its pads, selects with $`sk`$, sums, and answers with a
//!    [BlindEvalMessage] holding $`\delta`$ candidate outputs masked by its digit pool table.
//! 3. The Requester picks the candidate matching its own mask sum $`c`$, removes $`R_c`$ and the
//!    carry of $`c`$, and obtains $`z = \lfloor \sum_{sk_i = 1} a_i / \delta \rfloor \bmod p`$.
//!
//! The arithmetic is local and infallible; only message validation and slot accounting can fail.

use crate::channel_utils::{read_vec_u32, write_vec_u32};
use crate::error::PoolError;
use crate::hash_utils::random_oracle;
use crate::params::PoolParams;
use crate::setup::SecretKey;
use anyhow::{bail, Context, Result};
use scuttlebutt::AbstractChannel;

pub mod counter;
pub use counter::{ConsumedSlots, RoundCounter, RoundTicket};
pub mod evaluator;
pub use evaluator::Evaluator;
pub mod requester;
pub use requester::{Requested, Requester};

/// Requester to Evaluator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestMessage {
    /// Slot of this round.
    pub ctr: usize,
    /// Branch selected by $`sk_i = 0`$.
    pub e0: Vec<u32>,
    /// Branch selected by $`sk_i = 1`$.
    pub e1: Vec<u32>,
    /// $`\bar\beta = (c \bmod \delta) - \beta \bmod \delta`$.
    pub beta_bar: u32,
}

/// Evaluator to Requester.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlindEvalMessage {
    /// Slot of this round.
    pub ctr: usize,
    /// One candidate output per digit $`k \in [0, \delta)`$.
    pub y: Vec<u32>,
}

fn check_range(name: &str, v: &[u32], len: usize, bound: u64) -> Result<()> {
    if v.len() != len {
        bail!(PoolError::MalformedMessage(format!(
            "{} has {} entries, {} expected",
            name,
            v.len(),
            len
        )));
    }
    if let Some(x) = v.iter().find(|&&x| u64::from(x) >= bound) {
        bail!(PoolError::MalformedMessage(format!(
            "{} entry {} out of [0, {})",
            name, x, bound
        )));
    }
    Ok(())
}

impl RequestMessage {
    /// Check the shape against `params`.
    pub fn validate(&self, params: &PoolParams) -> Result<()> {
        let q = params.q().value();
        check_range("e0", &self.e0, params.n(), q)?;
        check_range("e1", &self.e1, params.n(), q)?;
        check_range("beta_bar", &[self.beta_bar], 1, params.delta().value())
    }

    /// Send to the peer.
    pub fn write_to<C: AbstractChannel>(&self, channel: &mut C) -> Result<()> {
        channel
            .write_usize(self.ctr)
            .map_err(PoolError::transport("request"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        channel
            .write_u32(self.beta_bar)
            .map_err(PoolError::transport("request"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        write_vec_u32(channel, &self.e0).with_context(|| format!("@{}:{}", file!(), line!()))?;
        write_vec_u32(channel, &self.e1).with_context(|| format!("@{}:{}", file!(), line!()))?;
        Ok(())
    }

    /// Receive from the peer and validate against `params`.
    pub fn read_from<C: AbstractChannel>(channel: &mut C, params: &PoolParams) -> Result<Self> {
        let ctr = channel
            .read_usize()
            .map_err(PoolError::transport("request"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let beta_bar = channel
            .read_u32()
            .map_err(PoolError::transport("request"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let e0 = read_vec_u32(channel, params.n())
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let e1 = read_vec_u32(channel, params.n())
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let msg = Self {
            ctr,
            e0,
            e1,
            beta_bar,
        };
        msg.validate(params)?;
        Ok(msg)
    }
}

impl BlindEvalMessage {
    /// Check the shape against `params`.
    pub fn validate(&self, params: &PoolParams) -> Result<()> {
        check_range("y", &self.y, params.delta_len(), params.p().value())
    }

    /// Send to the peer.
    pub fn write_to<C: AbstractChannel>(&self, channel: &mut C) -> Result<()> {
        channel
            .write_usize(self.ctr)
            .map_err(PoolError::transport("blind eval"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        write_vec_u32(channel, &self.y).with_context(|| format!("@{}:{}", file!(), line!()))?;
        Ok(())
    }

    /// Receive from the peer and validate against `params`.
    pub fn read_from<C: AbstractChannel>(channel: &mut C, params: &PoolParams) -> Result<Self> {
        let ctr = channel
            .read_usize()
            .map_err(PoolError::transport("blind eval"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let y = read_vec_u32(channel, params.delta_len())
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let msg = Self { ctr, y };
        msg.validate(params)?;
        Ok(msg)
    }
}

/// Query vector $`a = H(t, x) \in \mathbb{Z}_q^n`$ of the seeds `(t, x)`.
pub fn expand_query(params: &PoolParams, t: u64, x: u64) -> Vec<u32> {
    random_oracle(t, x, params.n(), params.q())
}

/// $`\lfloor \sum_{sk_i = 1} a_i / \delta \rfloor \bmod p`$ computed in the clear.
pub fn plaintext_eval(params: &PoolParams, sk: &SecretKey, a: &[u32]) -> u32 {
    let sum = sk
        .bits()
        .iter()
        .zip(a.iter())
        .filter(|(&s, _)| s)
        .map(|(_, &x)| u64::from(x))
        .sum::<u64>();
    params.p().reduce((sum >> params.delta().lg()) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_utils::sync_channel::create_unix_channel_pair;

    fn params() -> PoolParams {
        PoolParams::builder()
            .n(4)
            .q(16)
            .p(4)
            .delta(4)
            .tau(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_plaintext_eval() {
        let params = params();
        let sk = SecretKey::from_bits(vec![true, false, true, false]);
        assert_eq!(plaintext_eval(&params, &sk, &[3, 9, 12, 5]), 3);

        let sk = SecretKey::from_bits(vec![true; 4]);
        // 29 / 4 = 7, mod 4 = 3
        assert_eq!(plaintext_eval(&params, &sk, &[3, 9, 12, 5]), 3);
        let sk = SecretKey::from_bits(vec![false; 4]);
        assert_eq!(plaintext_eval(&params, &sk, &[3, 9, 12, 5]), 0);
    }

    #[test]
    fn test_messages_over_channel() {
        let params = params();
        let request = RequestMessage {
            ctr: 1,
            e0: vec![0; 4],
            e1: vec![15, 2, 0, 7],
            beta_bar: 3,
        };
        let reply = BlindEvalMessage {
            ctr: 1,
            y: vec![0, 1, 2, 3],
        };

        let (mut ch1, mut ch2) = create_unix_channel_pair().unwrap();
        let (r, y) = (request.clone(), reply.clone());
        let handle = std::thread::spawn(move || {
            r.write_to(&mut ch1).unwrap();
            BlindEvalMessage::read_from(&mut ch1, &params).unwrap()
        });

        assert_eq!(RequestMessage::read_from(&mut ch2, &params).unwrap(), request);
        y.write_to(&mut ch2).unwrap();
        assert_eq!(handle.join().unwrap(), reply);
    }

    #[test]
    fn test_malformed_messages() {
        let params = params();
        let short = RequestMessage {
            ctr: 0,
            e0: vec![0; 3],
            e1: vec![0; 4],
            beta_bar: 0,
        };
        let wide = RequestMessage {
            e0: vec![0; 4],
            e1: vec![0, 16, 0, 0],
            ..short.clone()
        };
        let beta = RequestMessage {
            e0: vec![0; 4],
            beta_bar: 4,
            ..short.clone()
        };
        let reply = BlindEvalMessage {
            ctr: 0,
            y: vec![0, 1, 4, 0],
        };

        for err in [
            short.validate(&params).unwrap_err(),
            wide.validate(&params).unwrap_err(),
            beta.validate(&params).unwrap_err(),
            reply.validate(&params).unwrap_err(),
        ] {
            assert!(matches!(
                err.downcast_ref::<PoolError>(),
                Some(PoolError::MalformedMessage(_))
            ));
        }
    }
}
