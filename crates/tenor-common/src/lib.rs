//! # Tenor Common
//!
//! Shared types, errors, and fixed-point math for the Tenor fixed-rate lending engine.
//!
//! ## Core Types
//!
//! - [`AccountId`]/[`MarketId`]: identifiers for accounts and listed markets
//! - [`Maturity`]: interval-aligned maturity date of a fixed-rate pool
//! - [`PoolState`]: `NOT_READY -> VALID -> MATURED` lifecycle of a maturity pool
//! - [`Receipt`]: outcome of a committed settlement operation
//!
//! ## Math
//!
//! - [`math`]: 18-digit fixed-point helpers that truncate toward zero

pub mod error;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{LedgerError, Result};
pub use types::{
    ids::{AccountId, MarketId},
    maturity::{Maturity, PoolState},
    receipt::{OperationKind, Receipt},
};

/// Tenor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Spacing between consecutive maturities, in seconds (one week)
pub const INTERVAL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Seconds in a (non-leap) year, used to scale yearly rates
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Default number of maturities open for deposits and borrows at any time
pub const DEFAULT_MAX_FUTURE_POOLS: u32 = 12;
