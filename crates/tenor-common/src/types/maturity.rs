//! Maturity dates and the pool lifecycle
//!
//! Maturities are unix timestamps aligned to [`INTERVAL_SECONDS`]. A pool moves
//! through `NOT_READY -> VALID -> MATURED` as time passes and never goes back:
//! - NOT_READY: further out than the configured number of open maturities
//! - VALID: current time strictly before maturity
//! - MATURED: current time at or after maturity

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::INTERVAL_SECONDS;

/// Lifecycle state of a maturity pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolState {
    NotReady,
    Valid,
    Matured,
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolState::NotReady => write!(f, "NOT_READY"),
            PoolState::Valid => write!(f, "VALID"),
            PoolState::Matured => write!(f, "MATURED"),
        }
    }
}

/// Interval-aligned maturity timestamp (unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Maturity(u64);

impl Maturity {
    /// Validate a raw timestamp as a pool id
    pub fn new(timestamp: u64) -> Result<Self> {
        if timestamp == 0 || timestamp % INTERVAL_SECONDS != 0 {
            return Err(LedgerError::InvalidPoolId(timestamp));
        }
        Ok(Self(timestamp))
    }

    /// First maturity strictly after `now`
    pub fn next_after(now: u64) -> Self {
        Self(now - now % INTERVAL_SECONDS + INTERVAL_SECONDS)
    }

    /// The maturity `count` intervals after this one
    pub fn plus_intervals(self, count: u64) -> Self {
        Self(self.0 + count * INTERVAL_SECONDS)
    }

    #[inline]
    pub fn timestamp(self) -> u64 {
        self.0
    }

    /// Lifecycle state at `now` given how many future maturities are open
    pub fn state(self, now: u64, max_future_pools: u32) -> PoolState {
        if now >= self.0 {
            return PoolState::Matured;
        }
        let horizon = now - now % INTERVAL_SECONDS + u64::from(max_future_pools) * INTERVAL_SECONDS;
        if self.0 > horizon {
            PoolState::NotReady
        } else {
            PoolState::Valid
        }
    }

    /// Fail with `UnmatchedPoolState` unless the pool is in `expected`
    pub fn ensure_state(self, now: u64, max_future_pools: u32, expected: PoolState) -> Result<()> {
        let actual = self.state(now, max_future_pools);
        if actual != expected {
            return Err(LedgerError::UnmatchedPoolState { actual, expected });
        }
        Ok(())
    }

    /// Seconds elapsed since maturity, zero while the pool is still running
    pub fn seconds_past(self, now: u64) -> u64 {
        now.saturating_sub(self.0)
    }
}

impl TryFrom<u64> for Maturity {
    type Error = LedgerError;

    fn try_from(timestamp: u64) -> Result<Self> {
        Self::new(timestamp)
    }
}

impl From<Maturity> for u64 {
    fn from(maturity: Maturity) -> u64 {
        maturity.0
    }
}

impl std::fmt::Display for Maturity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
