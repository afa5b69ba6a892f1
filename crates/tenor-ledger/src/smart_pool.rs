//! Smart pool ledger
//!
//! Open-ended liquidity with no maturity. Depositors hold shares; earnings
//! (streamed borrow fees, debt replacement fees, penalties, liquidation fees)
//! raise `total_supplied` and therefore the value of every share. The pool
//! lends to maturity pools that run short; `borrowed` is the sum of their
//! `debt_to_smart_pool` and never exceeds `total_supplied`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenor_common::{
    math::{add, mul_div_down, mul_div_up, sub_floor},
    AccountId, LedgerError, Result,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmartPool {
    /// Deposits plus accrued earnings
    pub total_supplied: Decimal,
    /// Lent out to maturity pools
    pub borrowed: Decimal,
    pub total_shares: Decimal,
    shares: BTreeMap<AccountId, Decimal>,
}

impl SmartPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liquidity not lent to maturity pools
    pub fn available(&self) -> Decimal {
        sub_floor(self.total_supplied, self.borrowed)
    }

    pub fn shares_of(&self, account: &AccountId) -> Decimal {
        self.shares.get(account).copied().unwrap_or(Decimal::ZERO)
    }

    /// Underlying value of `account`'s shares
    pub fn balance_of(&self, account: &AccountId) -> Result<Decimal> {
        let shares = self.shares_of(account);
        if shares.is_zero() || self.total_shares.is_zero() {
            return Ok(Decimal::ZERO);
        }
        mul_div_down(shares, self.total_supplied, self.total_shares)
    }

    /// Credit a deposit, returning the shares minted
    pub fn deposit(&mut self, account: &AccountId, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let minted = if self.total_shares.is_zero() || self.total_supplied.is_zero() {
            amount
        } else {
            mul_div_down(amount, self.total_shares, self.total_supplied)?
        };
        if minted.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let total_supplied = add(self.total_supplied, amount)?;
        let total_shares = add(self.total_shares, minted)?;
        let held = add(self.shares_of(account), minted)?;

        self.total_supplied = total_supplied;
        self.total_shares = total_shares;
        self.shares.insert(account.clone(), held);
        Ok(minted)
    }

    /// Debit a withdrawal, returning the shares burned.
    ///
    /// Fails with `InsufficientProtocolLiquidity` when the remaining supply
    /// would no longer cover what maturity pools owe.
    pub fn withdraw(&mut self, account: &AccountId, amount: Decimal) -> Result<Decimal> {
        self.burn(account, amount, amount)
    }

    /// Take `amount` of `account`'s balance for a liquidation.
    ///
    /// `retained` of it stays in the pool as earnings for remaining holders;
    /// the rest leaves the pool. Returns the shares burned.
    pub fn seize(&mut self, account: &AccountId, amount: Decimal, retained: Decimal) -> Result<Decimal> {
        if retained > amount {
            return Err(LedgerError::InvalidAmount);
        }
        self.burn(account, amount, amount - retained)
    }

    fn burn(&mut self, account: &AccountId, amount: Decimal, outflow: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let balance = self.balance_of(account)?;
        if amount > balance {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }
        if self.total_supplied - outflow < self.borrowed {
            return Err(LedgerError::InsufficientProtocolLiquidity);
        }

        let held = self.shares_of(account);
        let burned = mul_div_up(amount, self.total_shares, self.total_supplied)?.min(held);

        self.total_supplied -= outflow;
        self.total_shares -= burned;
        let remaining = held - burned;
        if remaining.is_zero() {
            self.shares.remove(account);
        } else {
            self.shares.insert(account.clone(), remaining);
        }
        Ok(burned)
    }

    /// Lend to a maturity pool
    pub fn lend(&mut self, amount: Decimal) -> Result<()> {
        let borrowed = add(self.borrowed, amount)?;
        if borrowed > self.total_supplied {
            return Err(LedgerError::InsufficientProtocolLiquidity);
        }
        self.borrowed = borrowed;
        Ok(())
    }

    /// Debt paid back by a maturity pool
    pub fn repaid(&mut self, amount: Decimal) {
        self.borrowed = sub_floor(self.borrowed, amount);
    }

    pub fn add_earnings(&mut self, amount: Decimal) -> Result<()> {
        self.total_supplied = add(self.total_supplied, amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_shares_track_earnings() {
        let mut pool = SmartPool::new();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");

        assert_eq!(pool.deposit(&alice, dec!(100)).unwrap(), dec!(100));
        pool.add_earnings(dec!(10)).unwrap();
        assert_eq!(pool.balance_of(&alice).unwrap(), dec!(110));

        // Bob buys in at the higher share price
        assert_eq!(pool.deposit(&bob, dec!(55)).unwrap(), dec!(50));
        assert_eq!(pool.balance_of(&bob).unwrap(), dec!(55));
    }

    #[test]
    fn test_withdraw_respects_lent_funds() {
        let mut pool = SmartPool::new();
        let alice = AccountId::from("alice");
        pool.deposit(&alice, dec!(100)).unwrap();
        pool.lend(dec!(70)).unwrap();

        assert_eq!(
            pool.withdraw(&alice, dec!(40)),
            Err(LedgerError::InsufficientProtocolLiquidity)
        );
        pool.withdraw(&alice, dec!(30)).unwrap();
        assert_eq!(pool.balance_of(&alice).unwrap(), dec!(70));
        assert!(pool.borrowed <= pool.total_supplied);
    }

    #[test]
    fn test_lend_bounded_by_supply() {
        let mut pool = SmartPool::new();
        pool.deposit(&AccountId::from("alice"), dec!(10)).unwrap();
        assert_eq!(pool.lend(dec!(11)), Err(LedgerError::InsufficientProtocolLiquidity));
        pool.lend(dec!(10)).unwrap();
        pool.repaid(dec!(4));
        assert_eq!(pool.available(), dec!(4));
    }

    #[test]
    fn test_withdraw_more_than_balance() {
        let mut pool = SmartPool::new();
        let alice = AccountId::from("alice");
        pool.deposit(&alice, dec!(10)).unwrap();
        assert!(matches!(
            pool.withdraw(&alice, dec!(11)),
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_seize_retains_fee_for_holders() {
        let mut pool = SmartPool::new();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        pool.deposit(&alice, dec!(100)).unwrap();
        pool.deposit(&bob, dec!(100)).unwrap();

        pool.seize(&alice, dec!(50), dec!(10)).unwrap();
        assert_eq!(pool.total_supplied, dec!(160));
        assert_eq!(pool.balance_of(&alice).unwrap(), dec!(53.333333333333333333));
        assert_eq!(pool.balance_of(&bob).unwrap(), dec!(106.666666666666666666));
    }

    #[test]
    fn test_deposit_past_range_leaves_pool_untouched() {
        let mut pool = SmartPool::new();
        let alice = AccountId::from("alice");
        pool.deposit(&alice, dec!(1)).unwrap();

        assert_eq!(pool.deposit(&alice, Decimal::MAX), Err(LedgerError::MathOverflow));
        assert_eq!(pool.add_earnings(Decimal::MAX), Err(LedgerError::MathOverflow));
        assert_eq!(pool.total_supplied, dec!(1));
        assert_eq!(pool.shares_of(&alice), dec!(1));
    }
}
