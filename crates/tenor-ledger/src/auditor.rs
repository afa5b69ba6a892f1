//! Collateral and liquidity auditor
//!
//! Values every market an account has entered:
//!
//! ```text
//! collateral = sum((smart pool balance + maturity supplies) * price * collateral factor)
//! debt       = sum((maturity borrows + penalties) * price)
//! ```
//!
//! Borrows and withdrawals must leave `debt <= collateral`; liquidations
//! require `debt > collateral`.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tenor_common::{
    math::{add, mul_div_down, mul_down, sub_floor},
    AccountId, LedgerError, MarketId, Result,
};
use tracing::{debug, warn};

use crate::market::Market;
use crate::oracle::PriceOracle;

/// Valued position of an account across its entered markets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountLiquidity {
    /// Collateral value after collateral factors
    pub collateral: Decimal,
    /// Debt value including penalties
    pub debt: Decimal,
}

impl AccountLiquidity {
    pub fn shortfall(&self) -> Decimal {
        sub_floor(self.debt, self.collateral)
    }

    pub fn is_solvent(&self) -> bool {
        self.debt <= self.collateral
    }
}

/// Collateral to take from a liquidated account
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seizure {
    /// Total collateral taken, incentive included
    pub seized: Decimal,
    /// Part of `seized` kept by the protocol
    pub protocol_fee: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Auditor {
    entered: BTreeMap<AccountId, BTreeSet<MarketId>>,
    /// Collateral multiplier paid to liquidators, at least one
    liquidation_incentive: Decimal,
    /// Share of seized collateral retained by the protocol
    liquidation_fee: Decimal,
    /// Largest fraction of a debt position one liquidation may repay
    close_factor: Decimal,
}

impl Default for Auditor {
    fn default() -> Self {
        Self {
            entered: BTreeMap::new(),
            liquidation_incentive: dec!(1.09),
            liquidation_fee: dec!(0.01),
            close_factor: dec!(0.5),
        }
    }
}

impl Auditor {
    pub fn new(liquidation_incentive: Decimal, liquidation_fee: Decimal, close_factor: Decimal) -> Result<Self> {
        let mut auditor = Self::default();
        auditor.set_liquidation_incentive(liquidation_incentive)?;
        auditor.set_liquidation_fee(liquidation_fee)?;
        if close_factor <= Decimal::ZERO || close_factor > Decimal::ONE {
            return Err(LedgerError::InvalidParameters(format!(
                "close factor {} must lie in (0, 1]",
                close_factor
            )));
        }
        auditor.close_factor = close_factor;
        Ok(auditor)
    }

    pub fn liquidation_incentive(&self) -> Decimal {
        self.liquidation_incentive
    }

    pub fn liquidation_fee(&self) -> Decimal {
        self.liquidation_fee
    }

    pub fn close_factor(&self) -> Decimal {
        self.close_factor
    }

    pub fn set_liquidation_incentive(&mut self, incentive: Decimal) -> Result<()> {
        if incentive < Decimal::ONE {
            return Err(LedgerError::InvalidParameters(format!(
                "liquidation incentive {} must be at least 1",
                incentive
            )));
        }
        self.liquidation_incentive = incentive;
        Ok(())
    }

    pub fn set_liquidation_fee(&mut self, fee: Decimal) -> Result<()> {
        if fee < Decimal::ZERO || fee >= Decimal::ONE {
            return Err(LedgerError::InvalidParameters(format!(
                "liquidation fee {} must lie in [0, 1)",
                fee
            )));
        }
        self.liquidation_fee = fee;
        Ok(())
    }

    /// Start counting `market` for `account`; returns false if already entered
    pub fn enter_market(&mut self, account: &AccountId, market: &MarketId) -> bool {
        self.entered
            .entry(account.clone())
            .or_default()
            .insert(market.clone())
    }

    /// Stop counting `market` for `account`; returns false if it was not entered
    pub fn exit_market(&mut self, account: &AccountId, market: &MarketId) -> bool {
        let Some(markets) = self.entered.get_mut(account) else {
            return false;
        };
        let removed = markets.remove(market);
        if markets.is_empty() {
            self.entered.remove(account);
        }
        removed
    }

    pub fn has_entered(&self, account: &AccountId, market: &MarketId) -> bool {
        self.entered
            .get(account)
            .map_or(false, |markets| markets.contains(market))
    }

    pub fn entered_markets(&self, account: &AccountId) -> Vec<MarketId> {
        self.entered
            .get(account)
            .map(|markets| markets.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Value `account`'s collateral and debt at `now`
    pub fn account_liquidity(
        &self,
        account: &AccountId,
        markets: &BTreeMap<MarketId, Market>,
        oracle: &dyn PriceOracle,
        now: u64,
    ) -> Result<AccountLiquidity> {
        let mut liquidity = AccountLiquidity::default();
        let Some(entered) = self.entered.get(account) else {
            return Ok(liquidity);
        };

        for id in entered {
            let market = markets
                .get(id)
                .ok_or_else(|| LedgerError::MarketNotListed(id.to_string()))?;

            let supplied = add(
                market.smart_pool.balance_of(account)?,
                market.pools.account_supplied(account, None)?,
            )?;
            let owed = market
                .pools
                .account_owed(account, None, now, market.rate_model.penalty_rate())?;
            if supplied.is_zero() && owed.is_zero() {
                continue;
            }

            let price = oracle.price_of(id)?;
            let value = mul_down(supplied, price)?;
            liquidity.collateral =
                add(liquidity.collateral, mul_down(value, market.collateral_factor)?)?;
            liquidity.debt = add(liquidity.debt, mul_down(owed, price)?)?;
        }

        debug!(
            %account,
            collateral = %liquidity.collateral,
            debt = %liquidity.debt,
            "account liquidity"
        );
        Ok(liquidity)
    }

    /// Fail with `InsufficientLiquidity` when debt exceeds collateral
    pub fn ensure_solvent(
        &self,
        account: &AccountId,
        markets: &BTreeMap<MarketId, Market>,
        oracle: &dyn PriceOracle,
        now: u64,
    ) -> Result<()> {
        let liquidity = self.account_liquidity(account, markets, oracle, now)?;
        if !liquidity.is_solvent() {
            warn!(%account, shortfall = %liquidity.shortfall(), "insufficient collateral");
            return Err(LedgerError::InsufficientLiquidity);
        }
        Ok(())
    }

    /// Fail with `InsufficientShortfall` unless debt exceeds collateral
    pub fn ensure_shortfall(
        &self,
        account: &AccountId,
        markets: &BTreeMap<MarketId, Market>,
        oracle: &dyn PriceOracle,
        now: u64,
    ) -> Result<AccountLiquidity> {
        let liquidity = self.account_liquidity(account, markets, oracle, now)?;
        if liquidity.is_solvent() {
            return Err(LedgerError::InsufficientShortfall);
        }
        Ok(liquidity)
    }

    /// Largest repayment one liquidation may make against `owed`
    pub fn max_liquidation(&self, owed: Decimal) -> Result<Decimal> {
        mul_down(owed, self.close_factor)
    }

    /// Collateral seized for repaying `repaid` of debt priced at `debt_price`
    pub fn seizure(&self, repaid: Decimal, debt_price: Decimal, collateral_price: Decimal) -> Result<Seizure> {
        let value = mul_down(repaid, self.liquidation_incentive)?;
        let seized = mul_div_down(value, debt_price, collateral_price)?;
        let protocol_fee = mul_down(seized, self.liquidation_fee)?;
        Ok(Seizure { seized, protocol_fee })
    }
}
