//! # Tenor Ledger
//!
//! Fixed-rate, fixed-term lending engine: maturity pools, a shared smart pool,
//! a parametric interest rate curve, and the settlement engine tying them
//! together.
//!
//! ## Pricing
//!
//! ```text
//! U    = borrowed / (mpSupplied + spAvailable)
//! R(U) = A / (Umax - U) + B
//! fee  = amount * R(U) * (maturity - now) / SECONDS_PER_YEAR
//! ```
//!
//! ## Funding
//!
//! Maturity pools lend their own supply first; any shortfall is funded by the
//! smart pool and recorded as `debt_to_smart_pool`, which deposits and
//! repayments pay back before anything else.

pub mod access;
pub mod asset;
pub mod auditor;
pub mod clock;
pub mod engine;
pub mod market;
pub mod maturity_pool;
pub mod oracle;
pub mod rate_model;
pub mod service;
pub mod smart_pool;

pub use access::{AccessControl, Role};
pub use asset::{TokenLedger, UnderlyingAsset};
pub use auditor::{AccountLiquidity, Auditor};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{AccountSnapshot, SettlementEngine};
pub use market::{Market, MarketConfig};
pub use maturity_pool::{BorrowPosition, MaturityPool, SupplyPosition};
pub use oracle::{PriceOracle, StaticPriceOracle};
pub use rate_model::{CurveParameters, InterestRateModel, ParametersVersion};
pub use service::{LedgerHandle, LedgerService};
pub use smart_pool::SmartPool;
