//! Maturity pool ledger
//!
//! One [`MaturityPool`] per maturity date plus the per-account supply and
//! borrow positions held in it. Pools are opened lazily on first access and
//! are never removed, so matured balances stay available for settlement.
//!
//! Funding identity kept by every mutation:
//! - `borrowed <= supplied + debt_to_smart_pool`
//! - `debt_to_smart_pool <= borrowed`
//!
//! Borrows beyond pool-local supply are funded by the smart pool; deposits and
//! repayments pay that debt back first.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenor_common::{
    math::{add, mul_div_down, mul_down, sub_floor, sum},
    AccountId, LedgerError, Maturity, Result,
};

/// Aggregate state of one maturity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaturityPool {
    /// Principal plus fees owed by borrowers
    pub borrowed: Decimal,
    /// Principal plus fees owed to depositors
    pub supplied: Decimal,
    /// Amount funded by the smart pool
    pub debt_to_smart_pool: Decimal,
    /// Borrow fees not yet streamed to the smart pool or granted to depositors
    pub earnings_unassigned: Decimal,
    /// Timestamp up to which earnings were streamed
    pub last_accrual: u64,
}

impl MaturityPool {
    pub fn opened_at(now: u64) -> Self {
        Self {
            last_accrual: now,
            ..Self::default()
        }
    }

    /// Idle pool-local liquidity
    pub fn available(&self) -> Decimal {
        sub_floor(self.supplied, self.borrowed)
    }

    /// Record funds entering the pool (deposit principal plus yield).
    ///
    /// Returns the smart pool debt paid back.
    pub fn add_money(&mut self, amount: Decimal) -> Result<Decimal> {
        let debt_reduction = self.debt_to_smart_pool.min(amount);
        self.supplied = add(self.supplied, amount)?;
        self.debt_to_smart_pool -= debt_reduction;
        Ok(debt_reduction)
    }

    /// Record a new borrow obligation.
    ///
    /// Any shortfall versus pool-local funding is drawn from the smart pool,
    /// bounded by `sp_available`. Returns the smart pool debt added.
    pub fn take_money(&mut self, amount: Decimal, sp_available: Decimal) -> Result<Decimal> {
        let new_borrowed = add(self.borrowed, amount)?;
        let funded = add(self.supplied, self.debt_to_smart_pool)?;
        let debt_addition = sub_floor(new_borrowed, funded);
        if debt_addition > sp_available {
            return Err(LedgerError::InsufficientProtocolLiquidity);
        }
        self.borrowed = new_borrowed;
        self.debt_to_smart_pool = add(self.debt_to_smart_pool, debt_addition)?;
        Ok(debt_addition)
    }

    /// Record repaid principal and commission.
    ///
    /// The smart pool is paid back before the pool-local side. Returns the
    /// smart pool debt paid back.
    pub fn repay_money(&mut self, amount: Decimal) -> Decimal {
        let debt_reduction = self.debt_to_smart_pool.min(amount);
        self.borrowed = sub_floor(self.borrowed, amount);
        self.debt_to_smart_pool -= debt_reduction;
        debt_reduction
    }

    /// Record a depositor withdrawing after maturity.
    ///
    /// Funds still lent out must then be carried by the smart pool; fails with
    /// `InsufficientProtocolLiquidity` when it cannot. Returns the smart pool
    /// debt added.
    pub fn withdraw_money(&mut self, amount: Decimal, sp_available: Decimal) -> Result<Decimal> {
        let new_supplied = sub_floor(self.supplied, amount);
        let debt_addition = sub_floor(self.borrowed, add(new_supplied, self.debt_to_smart_pool)?);
        if debt_addition > sp_available {
            return Err(LedgerError::InsufficientProtocolLiquidity);
        }
        self.supplied = new_supplied;
        self.debt_to_smart_pool = add(self.debt_to_smart_pool, debt_addition)?;
        Ok(debt_addition)
    }

    pub fn add_fee(&mut self, fee: Decimal) -> Result<()> {
        self.earnings_unassigned = add(self.earnings_unassigned, fee)?;
        Ok(())
    }

    /// Take earnings out of the unassigned bucket (granted to a depositor)
    pub fn remove_earnings(&mut self, amount: Decimal) -> Result<()> {
        if amount > self.earnings_unassigned {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: self.earnings_unassigned,
            });
        }
        self.earnings_unassigned -= amount;
        Ok(())
    }

    /// Stream unassigned earnings linearly until maturity.
    ///
    /// Returns the earnings released to the smart pool since the last accrual;
    /// at or after maturity everything left is released.
    pub fn accrue_earnings(&mut self, maturity: Maturity, now: u64) -> Result<Decimal> {
        let maturity_ts = maturity.timestamp();
        let released = if now >= maturity_ts {
            self.last_accrual = maturity_ts.max(self.last_accrual);
            std::mem::take(&mut self.earnings_unassigned)
        } else if now > self.last_accrual {
            let elapsed = Decimal::from(now - self.last_accrual);
            let remaining = Decimal::from(maturity_ts - self.last_accrual);
            let released = mul_div_down(self.earnings_unassigned, elapsed, remaining)?;
            self.earnings_unassigned -= released;
            self.last_accrual = now;
            released
        } else {
            Decimal::ZERO
        };
        Ok(released)
    }

    /// Funding identity holds
    pub fn is_balanced(&self) -> bool {
        self.supplied
            .checked_add(self.debt_to_smart_pool)
            .map_or(true, |funded| self.borrowed <= funded)
            && self.debt_to_smart_pool <= self.borrowed
    }
}

/// A lender's stake in one maturity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyPosition {
    pub principal: Decimal,
    /// Yield locked in at deposit time
    pub commission: Decimal,
}

impl SupplyPosition {
    #[inline]
    pub fn total(&self) -> Decimal {
        self.principal + self.commission
    }

    pub fn is_closed(&self) -> bool {
        self.total().is_zero()
    }

    /// Reduce by `amount`, consuming commission before principal
    pub fn reduce(&mut self, amount: Decimal) -> Result<()> {
        if amount > self.total() {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: self.total(),
            });
        }
        let from_commission = self.commission.min(amount);
        self.commission -= from_commission;
        self.principal -= amount - from_commission;
        Ok(())
    }
}

/// A borrower's obligation in one maturity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowPosition {
    pub principal: Decimal,
    /// Interest locked in at borrow time
    pub commission: Decimal,
    /// When the position was first opened
    pub borrowed_at: u64,
    /// Penalties are settled up to this timestamp
    pub penalty_checkpoint: u64,
    /// Penalty accrued but not yet paid
    pub unpaid_penalty: Decimal,
}

/// How a repayment was split across a borrow position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RepayAllocation {
    pub penalty: Decimal,
    pub principal: Decimal,
    pub commission: Decimal,
}

impl RepayAllocation {
    /// Part of the repayment that reduces pool `borrowed`
    pub fn covered(&self) -> Decimal {
        self.principal + self.commission
    }
}

impl BorrowPosition {
    /// Principal plus commission, excluding penalties
    #[inline]
    pub fn owed(&self) -> Decimal {
        self.principal + self.commission
    }

    pub fn is_closed(&self) -> bool {
        self.owed().is_zero() && self.unpaid_penalty.is_zero()
    }

    /// Penalty due at `now`: `penalty_rate * principal * seconds past maturity`,
    /// counted from the later of maturity and the last checkpoint.
    pub fn penalty_due(&self, maturity: Maturity, now: u64, penalty_rate: Decimal) -> Result<Decimal> {
        let since = maturity.timestamp().max(self.penalty_checkpoint);
        if now <= since || self.principal.is_zero() {
            return Ok(self.unpaid_penalty);
        }
        let per_second = mul_down(penalty_rate, self.principal)?;
        add(self.unpaid_penalty, mul_down(per_second, Decimal::from(now - since))?)
    }

    /// Everything owed at `now`, penalties included
    pub fn total_due(&self, maturity: Maturity, now: u64, penalty_rate: Decimal) -> Result<Decimal> {
        add(self.owed(), self.penalty_due(maturity, now, penalty_rate)?)
    }

    /// Apply `amount` to penalty, then principal, then commission.
    pub fn apply_repayment(
        &mut self,
        amount: Decimal,
        maturity: Maturity,
        now: u64,
        penalty_rate: Decimal,
    ) -> Result<RepayAllocation> {
        let penalty = self.penalty_due(maturity, now, penalty_rate)?;
        let due = add(self.owed(), penalty)?;
        if amount > due {
            return Err(LedgerError::TooMuchRepay { amount, owed: due });
        }

        let to_penalty = penalty.min(amount);
        let rest = amount - to_penalty;
        let to_principal = self.principal.min(rest);
        let to_commission = self.commission.min(rest - to_principal);

        self.unpaid_penalty = penalty - to_penalty;
        self.penalty_checkpoint = self.penalty_checkpoint.max(now);
        self.principal -= to_principal;
        self.commission -= to_commission;

        Ok(RepayAllocation {
            penalty: to_penalty,
            principal: to_principal,
            commission: to_commission,
        })
    }
}

/// All maturity pools of a market and the positions held in them
#[derive(Debug, Clone, Default)]
pub struct MaturityPoolLedger {
    pools: BTreeMap<Maturity, MaturityPool>,
    supplies: BTreeMap<(AccountId, Maturity), SupplyPosition>,
    borrows: BTreeMap<(AccountId, Maturity), BorrowPosition>,
}

impl MaturityPoolLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self, maturity: Maturity) -> Option<&MaturityPool> {
        self.pools.get(&maturity)
    }

    /// Pool for `maturity`, opened on first access
    pub fn pool_mut(&mut self, maturity: Maturity, now: u64) -> &mut MaturityPool {
        self.pools
            .entry(maturity)
            .or_insert_with(|| MaturityPool::opened_at(now))
    }

    pub fn pools(&self) -> impl Iterator<Item = (&Maturity, &MaturityPool)> {
        self.pools.iter()
    }

    pub fn supply_position(&self, account: &AccountId, maturity: Maturity) -> Option<&SupplyPosition> {
        self.supplies.get(&(account.clone(), maturity))
    }

    pub fn supply_position_mut(&mut self, account: &AccountId, maturity: Maturity) -> &mut SupplyPosition {
        self.supplies.entry((account.clone(), maturity)).or_default()
    }

    pub fn borrow_position(&self, account: &AccountId, maturity: Maturity) -> Option<&BorrowPosition> {
        self.borrows.get(&(account.clone(), maturity))
    }

    /// Borrow position for `(account, maturity)`, opened at `now` if absent
    pub fn borrow_position_mut(
        &mut self,
        account: &AccountId,
        maturity: Maturity,
        now: u64,
    ) -> &mut BorrowPosition {
        self.borrows
            .entry((account.clone(), maturity))
            .or_insert_with(|| BorrowPosition {
                borrowed_at: now,
                ..BorrowPosition::default()
            })
    }

    /// Supply held by `account`, in one maturity or across all of them
    pub fn account_supplied(&self, account: &AccountId, maturity: Option<Maturity>) -> Result<Decimal> {
        sum(self
            .supplies
            .iter()
            .filter(|((holder, m), _)| holder == account && maturity.map_or(true, |x| x == *m))
            .map(|(_, position)| position.total()))
    }

    /// Debt owed by `account` including penalties, in one maturity or all
    pub fn account_owed(
        &self,
        account: &AccountId,
        maturity: Option<Maturity>,
        now: u64,
        penalty_rate: Decimal,
    ) -> Result<Decimal> {
        let mut total = Decimal::ZERO;
        for ((holder, m), position) in &self.borrows {
            if holder != account || maturity.map_or(false, |x| x != *m) {
                continue;
            }
            total = add(total, position.total_due(*m, now, penalty_rate)?)?;
        }
        Ok(total)
    }

    /// Whether `account` holds any open borrow position
    pub fn has_debt(&self, account: &AccountId) -> bool {
        self.borrows
            .iter()
            .any(|((holder, _), position)| holder == account && !position.is_closed())
    }

    /// Sum of `borrowed` across all maturities
    pub fn total_borrowed(&self) -> Result<Decimal> {
        sum(self.pools.values().map(|pool| pool.borrowed))
    }

    /// Sum of `debt_to_smart_pool` across all maturities
    pub fn total_debt_to_smart_pool(&self) -> Result<Decimal> {
        sum(self.pools.values().map(|pool| pool.debt_to_smart_pool))
    }
}
