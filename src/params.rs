//! Pool parameters.
//!
//! Parameters are fixed when a pool is constructed and never change afterwards. They are given as plain
//! values (as a configuration layer or [clap](crate::cli_utils::PoolArgs) would provide them) and
//! validated by [PoolParamsBuilder::build] before any preprocessing starts.

use crate::arith::Modulus;
use crate::error::PoolError;
use anyhow::{bail, Result};

/// How the pair pool is filled. More details: [pool::pair](crate::pool::pair).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairPoolMode {
    /// `n * tau` fresh random OTs.
    Direct,
    /// `n` base random OTs, each expanded into `kappa` derived slots by a PRG.
    Amplified,
}

/// Parameter-selection policy relating $`\delta`$ to $`p`$.
///
/// This is not a structural requirement of the protocol; it only encodes how the reference parameter
/// sets were chosen for their statistical security target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaRule {
    /// Accept any $`\delta`$ satisfying the structural checks.
    Unchecked,
    /// Require `lg_delta == budget - lg(lg_p)`. The reference sets use `budget = 7`.
    Reference {
        /// Bit budget shared by $`\delta`$ and $`\lg p`$.
        budget: u32,
    },
}

/// Largest statistical security the OT backends provide. The KKRT 1-of-N OPRF in ocelot uses a
/// fixed 512-column pseudorandom code sized for 40 bits; larger values cannot be honoured.
pub const MAX_STATISTICAL_SECURITY: usize = 40;

/// Validated parameters of one pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolParams {
    n: usize,
    q: Modulus,
    p: Modulus,
    delta: Modulus,
    tau: usize,
    kappa: usize,
    statistical_security: usize,
    pair_mode: PairPoolMode,
}

impl PoolParams {
    /// Start describing a parameter set.
    pub fn builder() -> PoolParamsBuilder {
        PoolParamsBuilder::default()
    }

    /// Reference parameter set (n = 482, q = 2^12, p = 2^8, delta = 2^4, tau = 2^16, kappa = 6144).
    pub fn reference() -> Result<Self> {
        Self::builder()
            .n(482)
            .q(1 << 12)
            .p(1 << 8)
            .delta(1 << 4)
            .tau(1 << 16)
            .kappa(6144)
            .statistical_security(40)
            .delta_rule(DeltaRule::Reference { budget: 7 })
            .build()
    }

    /// Query dimension.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Large modulus of the inner product.
    pub fn q(&self) -> Modulus {
        self.q
    }

    /// Output modulus.
    pub fn p(&self) -> Modulus {
        self.p
    }

    /// Rounding granularity, also the domain of the digit pool.
    pub fn delta(&self) -> Modulus {
        self.delta
    }

    /// `delta` as a table length.
    pub fn delta_len(&self) -> usize {
        1usize << self.delta.lg()
    }

    /// Number of queries the pool can answer.
    pub fn tau(&self) -> usize {
        self.tau
    }

    /// Derived rounds per base slot in [PairPoolMode::Amplified].
    pub fn kappa(&self) -> usize {
        self.kappa
    }

    /// Statistical security parameter, at most [MAX_STATISTICAL_SECURITY].
    pub fn statistical_security(&self) -> usize {
        self.statistical_security
    }

    /// How the pair pool is filled.
    pub fn pair_mode(&self) -> PairPoolMode {
        self.pair_mode
    }

    /// Number of rounds the pair pool holds once built.
    pub fn pair_rounds(&self) -> usize {
        match self.pair_mode {
            PairPoolMode::Direct => self.tau,
            PairPoolMode::Amplified => self.kappa,
        }
    }
}

/// Builder for [PoolParams]. Moduli are given as values (`q = 4096`), not exponents.
#[derive(Clone, Debug)]
pub struct PoolParamsBuilder {
    n: usize,
    q: u64,
    p: u64,
    delta: u64,
    tau: usize,
    kappa: Option<usize>,
    statistical_security: usize,
    pair_mode: PairPoolMode,
    delta_rule: DeltaRule,
}

impl Default for PoolParamsBuilder {
    fn default() -> Self {
        Self {
            n: 0,
            q: 0,
            p: 0,
            delta: 0,
            tau: 0,
            kappa: None,
            statistical_security: 40,
            pair_mode: PairPoolMode::Direct,
            delta_rule: DeltaRule::Unchecked,
        }
    }
}

macro_rules! setter {
    ($name:ident, $t:ty) => {
        #[doc = concat!("Set `", stringify!($name), "`.")]
        pub fn $name(mut self, v: $t) -> Self {
            self.$name = v;
            self
        }
    };
}

impl PoolParamsBuilder {
    setter!(n, usize);
    setter!(q, u64);
    setter!(p, u64);
    setter!(delta, u64);
    setter!(tau, usize);
    setter!(statistical_security, usize);
    setter!(pair_mode, PairPoolMode);
    setter!(delta_rule, DeltaRule);

    /// Set `kappa`. Defaults to `tau` when never set.
    pub fn kappa(mut self, v: usize) -> Self {
        self.kappa = Some(v);
        self
    }

    /// Validate and freeze the parameters.
    pub fn build(self) -> Result<PoolParams> {
        if self.n == 0 {
            bail!(PoolError::invalid("n", "must be positive"));
        }
        if self.tau == 0 {
            bail!(PoolError::invalid("tau", "must be positive"));
        }
        if self.statistical_security == 0 {
            bail!(PoolError::invalid(
                "statistical_security",
                "must be positive",
            ));
        }
        if self.statistical_security > MAX_STATISTICAL_SECURITY {
            bail!(PoolError::invalid(
                "statistical_security",
                format!(
                    "{} bits requested, the OT backends provide {}",
                    self.statistical_security, MAX_STATISTICAL_SECURITY
                ),
            ));
        }

        let lg_q = lg_of("q", self.q)?;
        let lg_p = lg_of("p", self.p)?;
        let lg_delta = lg_of("delta", self.delta)?;

        // the random oracle yields two bytes per coordinate
        if lg_q > 16 {
            bail!(PoolError::invalid(
                "q",
                format!("q = 2^{} exceeds 2^16", lg_q),
            ));
        }
        if lg_p + lg_delta > lg_q {
            bail!(PoolError::invalid(
                "delta",
                format!(
                    "p * delta = 2^{} must divide q = 2^{}",
                    lg_p + lg_delta,
                    lg_q
                ),
            ));
        }

        if let DeltaRule::Reference { budget } = self.delta_rule {
            if !self.p.is_power_of_two() || !(lg_p as u64).is_power_of_two() {
                bail!(PoolError::invalid(
                    "p",
                    format!("lg(p) = {} must be a power of two under the reference rule", lg_p),
                ));
            }
            let lg_lg_p = (lg_p as u64).trailing_zeros();
            if budget < lg_lg_p || lg_delta != budget - lg_lg_p {
                bail!(PoolError::invalid(
                    "delta",
                    format!(
                        "reference rule requires lg(delta) = {} - lg(lg(p)), got lg(delta) = {}",
                        budget, lg_delta
                    ),
                ));
            }
        }

        let kappa = self.kappa.unwrap_or(self.tau);
        if kappa == 0 {
            bail!(PoolError::invalid("kappa", "must be positive"));
        }
        if self.pair_mode == PairPoolMode::Amplified && kappa < self.tau {
            bail!(PoolError::invalid(
                "kappa",
                format!("amplified pool yields {} rounds but tau = {}", kappa, self.tau),
            ));
        }

        Ok(PoolParams {
            n: self.n,
            q: Modulus::from_lg(lg_q),
            p: Modulus::from_lg(lg_p),
            delta: Modulus::from_lg(lg_delta),
            tau: self.tau,
            kappa,
            statistical_security: self.statistical_security,
            pair_mode: self.pair_mode,
        })
    }
}

fn lg_of(name: &'static str, v: u64) -> Result<u32> {
    if !v.is_power_of_two() {
        bail!(PoolError::invalid(
            name,
            format!("{} is not a power of two", v),
        ));
    }
    let lg = v.trailing_zeros();
    if lg > Modulus::MAX_LG {
        bail!(PoolError::invalid(
            name,
            format!("2^{} exceeds 2^{}", lg, Modulus::MAX_LG),
        ));
    }
    Ok(lg)
}
