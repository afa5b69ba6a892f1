//! Underlying asset transfer interface
//!
//! The engine never assumes a transfer delivers the requested amount: inbound
//! credits are measured from the vault balance before and after the call, so
//! fee-on-transfer tokens are accounted for what actually arrived.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tenor_common::{
    math::{add, mul_down},
    AccountId, LedgerError, Result,
};

/// Token contract moved by the engine
///
/// Implementations must be cloneable into a box so settlement can run against
/// a scratch copy of every balance and commit all-or-nothing.
pub trait UnderlyingAsset: Send + Sync + std::fmt::Debug {
    fn symbol(&self) -> &str;

    fn balance_of(&self, holder: &AccountId) -> Decimal;

    /// Move `amount` from `from` to `to`
    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<()>;

    fn box_clone(&self) -> Box<dyn UnderlyingAsset>;
}

impl Clone for Box<dyn UnderlyingAsset> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Pull `amount` from `from` into `vault`, returning what the vault received
pub fn pull(
    asset: &mut dyn UnderlyingAsset,
    from: &AccountId,
    vault: &AccountId,
    amount: Decimal,
) -> Result<Decimal> {
    let before = asset.balance_of(vault);
    asset.transfer(from, vault, amount)?;
    let received = asset.balance_of(vault) - before;
    if received <= Decimal::ZERO {
        return Err(LedgerError::Transfer(format!(
            "{} transfer from {} delivered nothing",
            asset.symbol(),
            from
        )));
    }
    Ok(received)
}

/// In-memory token balances, optionally charging a fee on every transfer
#[derive(Debug, Clone)]
pub struct TokenLedger {
    symbol: String,
    balances: BTreeMap<AccountId, Decimal>,
    /// Fraction of each transfer burned in transit
    transfer_fee: Decimal,
}

impl TokenLedger {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            balances: BTreeMap::new(),
            transfer_fee: Decimal::ZERO,
        }
    }

    /// Token that burns `fee` of every transfer
    pub fn with_transfer_fee(mut self, fee: Decimal) -> Self {
        self.transfer_fee = fee;
        self
    }

    /// Credit `amount` out of thin air
    pub fn mint(&mut self, holder: &AccountId, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let balance = add(self.balance_of(holder), amount)?;
        self.balances.insert(holder.clone(), balance);
        Ok(())
    }

    pub fn with_balance(mut self, holder: &AccountId, amount: Decimal) -> Result<Self> {
        self.mint(holder, amount)?;
        Ok(self)
    }
}

impl UnderlyingAsset for TokenLedger {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn balance_of(&self, holder: &AccountId) -> Decimal {
        self.balances.get(holder).copied().unwrap_or(Decimal::ZERO)
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::Transfer(format!(
                "{} balance of {} is {}, {} required",
                self.symbol, from, available, amount
            )));
        }

        let received = amount - mul_down(amount, self.transfer_fee)?;
        let credited = if from == to {
            available - amount + received
        } else {
            add(self.balance_of(to), received)?
        };
        self.balances.insert(from.clone(), available - amount);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn UnderlyingAsset> {
        Box::new(self.clone())
    }
}
