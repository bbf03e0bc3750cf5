//! Warm-up, thinning and batch emission for a batch of lockstep chains.
//!
//! All `z` chains of a walk share one [`ChainSchedule`]: they warm up, thin and emit together.
//! Only their trajectories differ.

use crate::error::{ConfigurationError, Result};

/// What the scheduler decided after one inner iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Still discarding warm-up windows.
    Warming,
    /// Inside a thinning window after warm-up.
    Burning,
    /// A thinning window closed; store the positions into output slot `slot` (0-based).
    Emit { slot: usize },
    /// All batches have been emitted.
    Done,
}

/// Counters `{t, burned, warm}` of one walk invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSchedule {
    /// 1-based index of the next batch to emit.
    t: usize,
    burned: usize,
    warm: usize,
    thinning: usize,
    total: usize,
    initial_warm: usize,
}

impl ChainSchedule {
    /// Schedule for `total` batches after `warm` warm-up windows of `thinning` steps each.
    pub fn new(total: usize, warm: usize, thinning: usize) -> Result<Self> {
        if thinning == 0 {
            return Err(ConfigurationError::ZeroThinning.into());
        }
        Ok(Self {
            t: 1,
            burned: 0,
            warm,
            thinning,
            total,
            initial_warm: warm,
        })
    }

    pub fn is_done(&self) -> bool {
        self.t > self.total
    }

    pub fn phase(&self) -> Phase {
        if self.is_done() {
            Phase::Done
        } else if self.warm > 0 {
            Phase::Warming
        } else {
            Phase::Burning
        }
    }

    /// Accounts for one inner iteration and reports what to do with the new positions.
    pub fn advance(&mut self) -> Phase {
        if self.is_done() {
            return Phase::Done;
        }
        self.burned += 1;
        if self.burned < self.thinning {
            return self.phase();
        }
        self.burned = 0;
        if self.warm > 0 {
            self.warm -= 1;
            return Phase::Warming;
        }
        let slot = self.t - 1;
        self.t += 1;
        Phase::Emit { slot }
    }

    /// Inner iterations a complete run takes: `(warm + total) · thinning`.
    pub fn total_iterations(&self) -> usize {
        (self.initial_warm + self.total) * self.thinning
    }

    pub fn t(&self) -> usize {
        self.t
    }

    pub fn burned(&self) -> usize {
        self.burned
    }

    pub fn warm(&self) -> usize {
        self.warm
    }

    pub fn thinning(&self) -> usize {
        self.thinning
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
