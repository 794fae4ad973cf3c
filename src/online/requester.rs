use super::counter::{RoundCounter, RoundTicket};
use super::{expand_query, BlindEvalMessage, RequestMessage};
use crate::error::PoolError;
use crate::params::PoolParams;
use crate::pool::RequesterPool;
use crate::setup::BlindingVector;
use anyhow::{bail, Context, Result};
use scuttlebutt::AbstractChannel;

/// Requester of the online phase. Owns its pool half and the published blinding vector.
///
/// Rounds may run concurrently from several threads; slot allocation goes through one
/// [RoundCounter].
#[derive(Debug)]
pub struct Requester {
    params: PoolParams,
    pool: RequesterPool,
    blinding: BlindingVector,
    counter: RoundCounter,
}

/// A round between Request and Finalize.
///
/// Dropping it before [message](Requested::message) was ever called returns the slot to the
/// counter. Once the message has been handed out the slot stays consumed whatever happens next:
/// a second request under the same pads would reveal the difference of the two queries.
#[derive(Debug)]
pub struct Requested {
    params: PoolParams,
    ticket: RoundTicket,
    message: RequestMessage,
    c_sum: u32,
    rc: u32,
}

impl Requester {
    /// Online Requester over `pool`, with $`\bar b`$ received from the Evaluator's setup.
    pub fn new(pool: RequesterPool, blinding: BlindingVector) -> Result<Self> {
        let params = *pool.params();
        if blinding.len() != params.n() {
            bail!(PoolError::MalformedMessage(format!(
                "blinding vector of {} bits, n = {}",
                blinding.len(),
                params.n()
            )));
        }
        Ok(Self {
            params,
            pool,
            blinding,
            counter: RoundCounter::new(params.tau()),
        })
    }

    /// Parameters of the pool.
    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    /// The slot allocator.
    pub fn counter(&self) -> &RoundCounter {
        &self.counter
    }

    /// Request step on query seeds `(t, x)`.
    pub fn request(&self, t: u64, x: u64) -> Result<Requested> {
        let a = expand_query(&self.params, t, x);
        self.request_with_query(&a)
    }

    /// Request step on an already expanded query $`a \in \mathbb{Z}_q^n`$.
    pub fn request_with_query(&self, a: &[u32]) -> Result<Requested> {
        let n = self.params.n();
        let q = self.params.q();
        let delta = self.params.delta();

        if a.len() != n || a.iter().any(|&x| q.reduce(x) != x) {
            bail!(PoolError::invalid(
                "query",
                format!("expected {} coordinates in [0, {})", n, q.value()),
            ));
        }

        let ticket = self
            .counter
            .allocate()
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        let ctr = ticket.ctr();

        let pads = self.pool.pairs().pads(ctr)?;
        let (beta, rc) = self.pool.digits().slot(ctr)?;

        let e0 = vec![0u32; n];
        let mut e1 = Vec::with_capacity(n);
        let mut c_sum = 0u32;
        for ((&ai, pad), &bb) in a.iter().zip(pads.iter()).zip(self.blinding.bits().iter()) {
            let bb = bb as usize;
            let c = q.sub(0, pad[bb]);
            e1.push(q.add(q.add(ai, c), pad[1 - bb]));
            c_sum = q.add(c_sum, c);
        }

        let beta_bar = delta.sub(delta.reduce(c_sum), beta);

        tracing::debug!(ctr, "request prepared");

        Ok(Requested {
            params: self.params,
            ticket,
            message: RequestMessage {
                ctr,
                e0,
                e1,
                beta_bar,
            },
            c_sum,
            rc,
        })
    }

    /// One full round over `channel`: Request, send, receive, Finalize.
    pub fn evaluate<C: AbstractChannel>(&self, channel: &mut C, t: u64, x: u64) -> Result<u32> {
        let mut requested = self.request(t, x)?;

        requested
            .message()?
            .write_to(channel)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        let reply = BlindEvalMessage::read_from(channel, &self.params)
            .with_context(|| format!("@{}:{}", file!(), line!()))?;

        requested.finalize(&reply)
    }
}

impl Requested {
    /// Slot of this round.
    pub fn ctr(&self) -> usize {
        self.ticket.ctr()
    }

    /// The message for the Evaluator. From here on the slot is consumed.
    pub fn message(&mut self) -> Result<&RequestMessage> {
        self.ticket.commit()?;
        Ok(&self.message)
    }

    /// Finalize step on the Evaluator's answer.
    pub fn finalize(mut self, reply: &BlindEvalMessage) -> Result<u32> {
        self.ticket.commit()?;

        let ctr = self.ticket.ctr();
        if reply.ctr != ctr {
            bail!(PoolError::MalformedMessage(format!(
                "answer for slot {} in round {}",
                reply.ctr, ctr
            )));
        }
        reply.validate(&self.params)?;

        let p = self.params.p();
        let delta = self.params.delta();
        let lg_delta = delta.lg();

        let c_low = delta.reduce(self.c_sum);
        let y = reply.y[c_low as usize];
        let carry = (self.c_sum - c_low) >> lg_delta;
        let z = p.sub(p.sub(y, self.rc), carry);

        tracing::debug!(ctr, "round finalized");

        Ok(z)
    }
}
