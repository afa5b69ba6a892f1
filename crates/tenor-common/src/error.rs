//! Error types for the Tenor ledger
//!
//! Every failure aborts the whole operation. Callers branch on the variant,
//! so each cause gets its own kind instead of a generic failure.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::maturity::PoolState;

/// Result type alias using LedgerError
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Unified error type for ledger operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    // Pool lifecycle errors
    #[error("Invalid pool id: maturity {0} is not aligned to the pool interval")]
    InvalidPoolId(u64),

    #[error("Unmatched pool state: pool is {actual}, operation requires {expected}")]
    UnmatchedPoolState {
        actual: PoolState,
        expected: PoolState,
    },

    // Liquidity errors
    #[error("Insufficient liquidity: account collateral does not cover its debt")]
    InsufficientLiquidity,

    #[error("Insufficient shortfall: account is not undercollateralized")]
    InsufficientShortfall,

    #[error("Insufficient protocol liquidity to cover the operation")]
    InsufficientProtocolLiquidity,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    // Pricing errors
    #[error("Invalid time difference: target {target} is not after {from}")]
    InvalidTimeDifference { target: u64, from: u64 },

    #[error("Too much slippage: {actual} breaches limit {limit}")]
    TooMuchSlippage { actual: Decimal, limit: Decimal },

    // Repayment errors
    #[error("Received {received} exceeds the {owed} owed")]
    TooMuchRepayTransfer { received: Decimal, owed: Decimal },

    #[error("Repay amount {amount} exceeds the {owed} owed")]
    TooMuchRepay { amount: Decimal, owed: Decimal },

    #[error("Nothing to repay")]
    RepayZero,

    #[error("Liquidation repay {amount} exceeds close limit {max}")]
    TooMuchLiquidation { amount: Decimal, max: Decimal },

    #[error("Accounts cannot liquidate themselves")]
    SelfLiquidation,

    // Market errors
    #[error("Invalid borrow cap settings: {0}")]
    InvalidSetBorrowCap(String),

    #[error("Market borrow cap reached: {borrowed} > {cap}")]
    MarketBorrowCapReached { borrowed: Decimal, cap: Decimal },

    #[error("Market not listed: {0}")]
    MarketNotListed(String),

    #[error("Market already listed: {0}")]
    MarketAlreadyListed(String),

    #[error("Cannot exit market {0} while holding debt in it")]
    ExitMarketWithDebt(String),

    // Parameter errors
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Access denied for {0}")]
    AccessControlDenied(String),

    // Collaborator errors
    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Price unavailable for {0}")]
    PriceUnavailable(String),

    #[error("Fixed-point arithmetic overflow")]
    MathOverflow,

    #[error("Ledger service unavailable")]
    ServiceUnavailable,
}

impl LedgerError {
    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidPoolId(_) => "InvalidPoolId",
            LedgerError::UnmatchedPoolState { .. } => "UnmatchedPoolState",
            LedgerError::InsufficientLiquidity => "InsufficientLiquidity",
            LedgerError::InsufficientShortfall => "InsufficientShortfall",
            LedgerError::InsufficientProtocolLiquidity => "InsufficientProtocolLiquidity",
            LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
            LedgerError::InvalidTimeDifference { .. } => "InvalidTimeDifference",
            LedgerError::TooMuchSlippage { .. } => "TooMuchSlippage",
            LedgerError::TooMuchRepayTransfer { .. } => "TooMuchRepayTransfer",
            LedgerError::TooMuchRepay { .. } => "TooMuchRepay",
            LedgerError::RepayZero => "RepayZero",
            LedgerError::TooMuchLiquidation { .. } => "TooMuchLiquidation",
            LedgerError::SelfLiquidation => "SelfLiquidation",
            LedgerError::InvalidSetBorrowCap(_) => "InvalidSetBorrowCap",
            LedgerError::MarketBorrowCapReached { .. } => "MarketBorrowCapReached",
            LedgerError::MarketNotListed(_) => "MarketNotListed",
            LedgerError::MarketAlreadyListed(_) => "MarketAlreadyListed",
            LedgerError::ExitMarketWithDebt(_) => "ExitMarketWithDebt",
            LedgerError::InvalidParameters(_) => "InvalidParameters",
            LedgerError::InvalidAmount => "InvalidAmount",
            LedgerError::AccessControlDenied(_) => "AccessControlDenied",
            LedgerError::Transfer(_) => "Transfer",
            LedgerError::PriceUnavailable(_) => "PriceUnavailable",
            LedgerError::MathOverflow => "MathOverflow",
            LedgerError::ServiceUnavailable => "ServiceUnavailable",
        }
    }
}
