//! Host environment shared by a fit.
//!
//! The host owns the ambient generator. Anything that needs randomness
//! without an explicit seed (the reservoir pass, columns configured without
//! a seed) derives its own child generator from it, so nothing shares a
//! mutable generator with anything else.

use scirs2_core::random::{thread_rng, Rng};

use crate::rng::TauswortheHybrid;

/// Ambient state for fitting transforms.
#[derive(Debug, Clone)]
pub struct HostEnv {
    rng: TauswortheHybrid,
    seed: Option<u32>,
}

impl HostEnv {
    /// Create a host seeded from `seed`, or from process entropy if `None`.
    pub fn new(seed: Option<u32>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::from_entropy(),
        }
    }

    /// Create a deterministic host.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            rng: TauswortheHybrid::from_seed(seed),
            seed: Some(seed),
        }
    }

    /// Create a host seeded from the thread-local entropy source.
    pub fn from_entropy() -> Self {
        let mut rng = thread_rng();
        let seed: u32 = rng.random();
        Self {
            rng: TauswortheHybrid::from_seed(seed),
            seed: None,
        }
    }

    /// The explicit seed this host was created with, if any.
    pub fn seed(&self) -> Option<u32> {
        self.seed
    }

    /// Derive an independent generator from the host generator.
    pub fn derive_rng(&mut self) -> TauswortheHybrid {
        self.rng.derive_child()
    }
}

impl Default for HostEnv {
    fn default() -> Self {
        Self::from_entropy()
    }
}
