//! Slot allocation on both sides of the online phase.
//!
//! [RoundCounter] is the Requester's single allocation point. A [RoundTicket] holds one slot until
//! it is committed; dropping an uncommitted ticket returns the slot, and returned slots are handed
//! out again before fresh ones. [ConsumedSlots] is the Evaluator's ledger of answered slots.

use crate::error::PoolError;
use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct CounterState {
    tau: usize,
    next: usize,
    released: BTreeSet<usize>,
    committed: usize,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    match m.lock() {
        Ok(g) => Ok(g),
        Err(_) => bail!(PoolError::InternalInconsistency(
            "slot ledger lock poisoned".to_string()
        )),
    }
}

/// Shared round counter over `[0, tau)`. Clones share state.
#[derive(Clone, Debug)]
pub struct RoundCounter {
    state: Arc<Mutex<CounterState>>,
}

impl RoundCounter {
    /// Fresh counter for a pool of `tau` rounds.
    pub fn new(tau: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CounterState {
                tau,
                next: 0,
                released: BTreeSet::new(),
                committed: 0,
            })),
        }
    }

    /// Reserve a slot. Fails with [PoolError::PoolExhausted] once every slot is taken.
    pub fn allocate(&self) -> Result<RoundTicket> {
        let mut state = lock(&self.state)?;

        let ctr = if let Some(ctr) = state.released.pop_first() {
            ctr
        } else if state.next < state.tau {
            state.next += 1;
            state.next - 1
        } else {
            bail!(PoolError::PoolExhausted { tau: state.tau });
        };

        Ok(RoundTicket {
            ctr,
            state: self.state.clone(),
            committed: false,
        })
    }

    /// Slots neither committed nor currently reserved.
    pub fn remaining(&self) -> Result<usize> {
        let state = lock(&self.state)?;
        Ok(state.tau - state.next + state.released.len())
    }

    /// Slots committed so far.
    pub fn committed(&self) -> Result<usize> {
        Ok(lock(&self.state)?.committed)
    }
}

/// One reserved slot.
#[derive(Debug)]
pub struct RoundTicket {
    ctr: usize,
    state: Arc<Mutex<CounterState>>,
    committed: bool,
}

impl RoundTicket {
    /// The reserved round counter.
    pub fn ctr(&self) -> usize {
        self.ctr
    }

    /// Mark the slot as used for good. Idempotent.
    pub fn commit(&mut self) -> Result<()> {
        if !self.committed {
            lock(&self.state)?.committed += 1;
            self.committed = true;
        }
        Ok(())
    }

    /// Whether [commit](Self::commit) has run.
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Drop for RoundTicket {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.released.insert(self.ctr);
            tracing::debug!(ctr = self.ctr, "slot released");
        }
    }
}

/// The Evaluator's record of answered slots.
#[derive(Debug)]
pub struct ConsumedSlots {
    used: Mutex<Vec<bool>>,
}

impl ConsumedSlots {
    /// Empty ledger for `tau` rounds.
    pub fn new(tau: usize) -> Self {
        Self {
            used: Mutex::new(vec![false; tau]),
        }
    }

    /// Record `ctr`. Rejects counters outside the pool and counters seen before.
    pub fn consume(&self, ctr: usize) -> Result<()> {
        let mut used = lock(&self.used)?;
        let tau = used.len();
        match used.get_mut(ctr) {
            None => bail!(PoolError::PoolExhausted { tau }),
            Some(true) => bail!(PoolError::SlotConsumed { ctr }),
            Some(slot) => {
                *slot = true;
                Ok(())
            }
        }
    }

    /// Number of answered slots.
    pub fn count(&self) -> Result<usize> {
        Ok(lock(&self.used)?.iter().filter(|&&u| u).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn kind(err: &anyhow::Error) -> Option<&PoolError> {
        err.downcast_ref::<PoolError>()
    }

    #[test]
    fn test_sequential_allocation() {
        let counter = RoundCounter::new(3);
        let mut seen = vec![];
        for _ in 0..3 {
            let mut t = counter.allocate().unwrap();
            seen.push(t.ctr());
            t.commit().unwrap();
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(counter.committed().unwrap(), 3);
        assert_eq!(counter.remaining().unwrap(), 0);

        let err = counter.allocate().unwrap_err();
        assert!(matches!(kind(&err), Some(PoolError::PoolExhausted { tau: 3 })));
    }

    #[test]
    fn test_release_on_drop() {
        let counter = RoundCounter::new(4);
        let a = counter.allocate().unwrap();
        let mut b = counter.allocate().unwrap();
        assert_eq!((a.ctr(), b.ctr()), (0, 1));
        b.commit().unwrap();
        assert!(b.is_committed() && !a.is_committed());
        drop(a);
        drop(b);

        assert_eq!(counter.remaining().unwrap(), 3);
        // released slot first
        assert_eq!(counter.allocate().unwrap().ctr(), 0);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let counter = RoundCounter::new(1000);
        let handles = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    let mut mine = vec![];
                    while let Ok(mut t) = counter.allocate() {
                        t.commit().unwrap();
                        mine.push(t.ctr());
                    }
                    mine
                })
            })
            .collect::<Vec<_>>();

        let all = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        let unique = all.iter().copied().collect::<HashSet<_>>();
        assert_eq!(all.len(), 1000);
        assert_eq!(unique.len(), 1000);
    }

    #[test]
    fn test_consumed_slots() {
        let ledger = ConsumedSlots::new(2);
        ledger.consume(1).unwrap();

        let err = ledger.consume(1).unwrap_err();
        assert!(matches!(kind(&err), Some(PoolError::SlotConsumed { ctr: 1 })));

        let err = ledger.consume(2).unwrap_err();
        assert!(matches!(kind(&err), Some(PoolError::PoolExhausted { tau: 2 })));

        ledger.consume(0).unwrap();
        assert_eq!(ledger.count().unwrap(), 2);
    }
}
