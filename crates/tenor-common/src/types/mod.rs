//! Core data types for the Tenor ledger

pub mod ids;
pub mod maturity;
pub mod receipt;
