//! Error taxonomy of the Pool OPRF.
//!
//! Every fallible function of this crate returns [anyhow::Result]. When the failure belongs to one
//! of the categories below, the underlying error is a [PoolError] and can be recovered with
//! `err.downcast_ref::<PoolError>()` even after `with_context` layers were added.

use thiserror::Error;

/// Boxed error carried as the source of a transport failure.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors of pool construction and of the online phase.
///
/// A round that would use a slot it may not use fails with one of two variants:
/// [PoolError::PoolExhausted] when `ctr` is outside the pool, [PoolError::SlotConsumed] when the
/// slot was already answered. Both are reuse refusals; [PoolError::refuses_slot] matches either.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Socket or OT failure while an interactive exchange was running.
    /// The pool under construction must be discarded and rebuilt from scratch.
    #[error("transport failure during {stage}")]
    Transport {
        /// Which exchange was running.
        stage: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxedError,
    },

    /// Every slot of the pool has been handed out.
    #[error("pool exhausted: all {tau} slots are consumed, preprocessing must be run again")]
    PoolExhausted {
        /// Capacity of the pool.
        tau: usize,
    },

    /// A slot was presented a second time.
    #[error("slot {ctr} has already been consumed")]
    SlotConsumed {
        /// Round counter of the slot.
        ctr: usize,
    },

    /// Rejected configuration value.
    #[error("invalid parameter `{name}`: {reason}")]
    ParameterInvalid {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// An OT correctness relation does not hold. Fatal.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// A protocol message does not have the shape the parameters require.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl PoolError {
    /// Adapter for `map_err` that tags a failure with the exchange it interrupted.
    pub fn transport<E>(stage: &'static str) -> impl FnOnce(E) -> PoolError
    where
        E: Into<BoxedError>,
    {
        move |e| PoolError::Transport {
            stage,
            source: e.into(),
        }
    }

    /// True for the two ways a slot can be refused: exhausted pool or consumed slot.
    pub fn refuses_slot(&self) -> bool {
        matches!(
            self,
            PoolError::PoolExhausted { .. } | PoolError::SlotConsumed { .. }
        )
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> PoolError {
        PoolError::ParameterInvalid {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use std::io::{Error as IoError, ErrorKind};

    fn failing() -> Result<()> {
        Err(IoError::new(ErrorKind::BrokenPipe, "peer gone"))
            .map_err(PoolError::transport("digit pool batch"))
            .with_context(|| format!("@{}:{}", file!(), line!()))?;
        Ok(())
    }

    #[test]
    fn test_downcast_through_context() {
        let err = failing().unwrap_err();
        match err.downcast_ref::<PoolError>() {
            Some(PoolError::Transport { stage, .. }) => assert_eq!(*stage, "digit pool batch"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slot_refusals() {
        assert!(PoolError::PoolExhausted { tau: 4 }.refuses_slot());
        assert!(PoolError::SlotConsumed { ctr: 2 }.refuses_slot());
        assert!(!PoolError::MalformedMessage("short".to_string()).refuses_slot());
        assert!(!PoolError::InternalInconsistency("R != S[b]".to_string()).refuses_slot());
    }

    #[test]
    fn test_messages() {
        let e = PoolError::PoolExhausted { tau: 8 };
        assert!(e.to_string().contains("8"));

        let e = PoolError::invalid("q", "not a power of two");
        assert_eq!(e.to_string(), "invalid parameter `q`: not a power of two");
    }
}
