//! Listed markets
//!
//! A market binds one underlying asset to its rate model, smart pool, and
//! maturity pools, along with the risk parameters the auditor reads.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tenor_common::{
    math::add, LedgerError, MarketId, Maturity, PoolState, Result, DEFAULT_MAX_FUTURE_POOLS,
};
use tracing::debug;

use crate::asset::UnderlyingAsset;
use crate::maturity_pool::MaturityPoolLedger;
use crate::rate_model::{CurveParameters, InterestRateModel};
use crate::smart_pool::SmartPool;

/// Parameters a market is listed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Fraction of supplied value counted as collateral
    pub collateral_factor: Decimal,
    pub curve: CurveParameters,
    pub smart_pool_fee_rate: Decimal,
    /// Multiplier applied to deposits when sharing unassigned earnings
    pub distribution_weighter: Decimal,
    /// Number of future maturities open at any time
    pub max_future_pools: u32,
    /// Ceiling on total borrows across maturities (zero: unlimited)
    pub borrow_cap: Decimal,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            collateral_factor: dec!(0.8),
            curve: CurveParameters::default(),
            smart_pool_fee_rate: dec!(0.1),
            distribution_weighter: Decimal::ONE,
            max_future_pools: DEFAULT_MAX_FUTURE_POOLS,
            borrow_cap: Decimal::ZERO,
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<()> {
        if self.collateral_factor < Decimal::ZERO || self.collateral_factor > Decimal::ONE {
            return Err(LedgerError::InvalidParameters(format!(
                "collateral factor {} must lie in [0, 1]",
                self.collateral_factor
            )));
        }
        validate_weighter(self.distribution_weighter)?;
        if self.max_future_pools == 0 {
            return Err(LedgerError::InvalidParameters(
                "at least one future maturity must be open".to_string(),
            ));
        }
        if self.borrow_cap < Decimal::ZERO {
            return Err(LedgerError::InvalidSetBorrowCap(format!(
                "negative cap {}",
                self.borrow_cap
            )));
        }
        self.curve.validate()
    }
}

pub(crate) fn validate_weighter(weighter: Decimal) -> Result<()> {
    if weighter <= Decimal::ZERO {
        return Err(LedgerError::InvalidParameters(format!(
            "distribution weighter {} must be positive",
            weighter
        )));
    }
    Ok(())
}

/// State of one listed market
#[derive(Debug, Clone)]
pub struct Market {
    pub id: MarketId,
    pub asset: Box<dyn UnderlyingAsset>,
    pub rate_model: InterestRateModel,
    pub smart_pool: SmartPool,
    pub pools: MaturityPoolLedger,
    pub collateral_factor: Decimal,
    pub distribution_weighter: Decimal,
    pub max_future_pools: u32,
    pub borrow_cap: Decimal,
}

impl Market {
    pub fn new(id: MarketId, asset: Box<dyn UnderlyingAsset>, config: MarketConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id,
            asset,
            rate_model: InterestRateModel::new(config.curve, config.smart_pool_fee_rate)?,
            smart_pool: SmartPool::new(),
            pools: MaturityPoolLedger::new(),
            collateral_factor: config.collateral_factor,
            distribution_weighter: config.distribution_weighter,
            max_future_pools: config.max_future_pools,
            borrow_cap: config.borrow_cap,
        })
    }

    pub fn pool_state(&self, maturity: Maturity, now: u64) -> PoolState {
        maturity.state(now, self.max_future_pools)
    }

    pub fn ensure_pool_state(&self, maturity: Maturity, now: u64, expected: PoolState) -> Result<()> {
        maturity.ensure_state(now, self.max_future_pools, expected)
    }

    /// Stream the earnings of `maturity` into the smart pool up to `now`
    pub fn accrue(&mut self, maturity: Maturity, now: u64) -> Result<Decimal> {
        let released = self.pools.pool_mut(maturity, now).accrue_earnings(maturity, now)?;
        if !released.is_zero() {
            self.smart_pool.add_earnings(released)?;
            debug!(market = %self.id, %maturity, %released, "earnings accrued");
        }
        Ok(released)
    }

    /// Accrue every open maturity so the smart pool share price is current
    pub fn accrue_all(&mut self, now: u64) -> Result<Decimal> {
        let maturities: Vec<Maturity> = self.pools.pools().map(|(m, _)| *m).collect();
        let mut released = Decimal::ZERO;
        for maturity in maturities {
            released = add(released, self.accrue(maturity, now)?)?;
        }
        Ok(released)
    }

    /// Fail with `MarketBorrowCapReached` once total borrows pass the cap
    pub fn ensure_below_borrow_cap(&self) -> Result<()> {
        if self.borrow_cap.is_zero() {
            return Ok(());
        }
        let borrowed = self.pools.total_borrowed()?;
        if borrowed > self.borrow_cap {
            return Err(LedgerError::MarketBorrowCapReached {
                borrowed,
                cap: self.borrow_cap,
            });
        }
        Ok(())
    }

    /// Smart pool lending matches maturity pool debt and every pool is funded
    pub fn is_consistent(&self) -> bool {
        self.pools
            .total_debt_to_smart_pool()
            .map_or(false, |debt| debt == self.smart_pool.borrowed)
            && self.smart_pool.borrowed <= self.smart_pool.total_supplied
            && self.pools.pools().all(|(_, pool)| pool.is_balanced())
    }
}
