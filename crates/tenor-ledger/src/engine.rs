//! Settlement engine
//!
//! Orchestrates deposits, borrows, repayments, withdrawals, and liquidations
//! across the maturity pools and smart pool of every listed market. Each
//! operation runs against a scratch copy of the whole ledger, token balances
//! included, and is committed only when it succeeds: a failed operation leaves
//! no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenor_common::{
    math::{add, mul_down}, AccountId, LedgerError, MarketId, Maturity, OperationKind, PoolState, Receipt,
    Result,
};
use tracing::{debug, info, instrument, warn};

use crate::access::{AccessControl, Role};
use crate::asset::{pull, UnderlyingAsset};
use crate::auditor::{AccountLiquidity, Auditor};
use crate::clock::Clock;
use crate::market::{validate_weighter, Market, MarketConfig};
use crate::maturity_pool::MaturityPool;
use crate::oracle::PriceOracle;
use crate::rate_model::{CurveParameters, ParametersVersion};
use crate::smart_pool::SmartPool;

/// Supplied and owed balances of an account in one market
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Maturity supplies, plus the smart pool balance when no maturity is given
    pub supplied: Decimal,
    /// Maturity borrows including penalties
    pub borrowed: Decimal,
}

/// Everything committed atomically
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub markets: BTreeMap<MarketId, Market>,
    pub auditor: Auditor,
    pub access: AccessControl,
}

impl LedgerState {
    fn market(&self, id: &MarketId) -> Result<&Market> {
        self.markets
            .get(id)
            .ok_or_else(|| LedgerError::MarketNotListed(id.to_string()))
    }

    fn market_mut(&mut self, id: &MarketId) -> Result<&mut Market> {
        self.markets
            .get_mut(id)
            .ok_or_else(|| LedgerError::MarketNotListed(id.to_string()))
    }

    /// Funding identities hold in every market
    pub fn is_consistent(&self) -> bool {
        self.markets.values().all(Market::is_consistent)
    }
}

/// Collaborators and time of the operation being applied
struct Env<'a> {
    oracle: &'a dyn PriceOracle,
    vault: &'a AccountId,
    now: u64,
}

pub struct SettlementEngine {
    state: LedgerState,
    oracle: Arc<dyn PriceOracle>,
    clock: Arc<dyn Clock>,
    /// Account holding every market's funds
    vault: AccountId,
}

impl SettlementEngine {
    pub fn new(
        admin: AccountId,
        vault: AccountId,
        auditor: Auditor,
        oracle: Arc<dyn PriceOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: LedgerState {
                markets: BTreeMap::new(),
                auditor,
                access: AccessControl::new(admin),
            },
            oracle,
            clock,
            vault,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn vault(&self) -> &AccountId {
        &self.vault
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn market(&self, id: &MarketId) -> Result<&Market> {
        self.state.market(id)
    }

    pub fn markets(&self) -> impl Iterator<Item = &MarketId> {
        self.state.markets.keys()
    }

    /// Run `op` on a scratch copy of the ledger and commit it on success
    fn atomically<T>(&mut self, op: impl FnOnce(&mut LedgerState, &Env<'_>) -> Result<T>) -> Result<T> {
        let env = Env {
            oracle: self.oracle.as_ref(),
            vault: &self.vault,
            now: self.clock.now(),
        };
        let mut scratch = self.state.clone();
        let out = op(&mut scratch, &env)?;
        debug_assert!(scratch.is_consistent(), "funding identity broken");
        self.state = scratch;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    #[instrument(skip(self, asset, config), fields(caller = %caller, market = %id))]
    pub fn list_market(
        &mut self,
        caller: &AccountId,
        id: MarketId,
        asset: Box<dyn UnderlyingAsset>,
        config: MarketConfig,
    ) -> Result<()> {
        self.atomically(|state, _| {
            state.access.ensure_role(caller, Role::Admin)?;
            if state.markets.contains_key(&id) {
                return Err(LedgerError::MarketAlreadyListed(id.to_string()));
            }
            let market = Market::new(id.clone(), asset, config)?;
            info!(market = %id, symbol = market.asset.symbol(), "market listed");
            state.markets.insert(id, market);
            Ok(())
        })
    }

    pub fn grant_role(&mut self, caller: &AccountId, account: AccountId, role: Role) -> Result<()> {
        self.atomically(|state, _| state.access.grant(caller, account, role))
    }

    pub fn revoke_role(&mut self, caller: &AccountId, account: &AccountId, role: Role) -> Result<()> {
        self.atomically(|state, _| state.access.revoke(caller, account, role))
    }

    /// Replace the rate curve of `market`
    #[instrument(skip(self, params), fields(caller = %caller, market = %market))]
    pub fn set_parameters(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        params: CurveParameters,
    ) -> Result<ParametersVersion> {
        self.atomically(|state, env| {
            state.access.ensure_role(caller, Role::ParameterManager)?;
            let model = &mut state.market_mut(market)?.rate_model;
            model.set_parameters(params, env.now)?;
            info!(version = model.version(), "curve parameters updated");
            Ok(model.parameters_version())
        })
    }

    #[instrument(skip(self), fields(caller = %caller, market = %market))]
    pub fn set_penalty_rate(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        penalty_rate: Decimal,
    ) -> Result<ParametersVersion> {
        self.atomically(|state, env| {
            state.access.ensure_role(caller, Role::ParameterManager)?;
            let model = &mut state.market_mut(market)?.rate_model;
            model.set_penalty_rate(penalty_rate, env.now)?;
            info!(version = model.version(), "penalty rate updated");
            Ok(model.parameters_version())
        })
    }

    #[instrument(skip(self), fields(caller = %caller, market = %market))]
    pub fn set_smart_pool_fee_rate(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        fee_rate: Decimal,
    ) -> Result<ParametersVersion> {
        self.atomically(|state, env| {
            state.access.ensure_role(caller, Role::ParameterManager)?;
            let model = &mut state.market_mut(market)?.rate_model;
            model.set_smart_pool_fee_rate(fee_rate, env.now)?;
            info!(version = model.version(), "smart pool fee rate updated");
            Ok(model.parameters_version())
        })
    }

    #[instrument(skip(self), fields(caller = %caller, market = %market))]
    pub fn set_distribution_weighter(
        &mut self,
        caller: &AccountId,
        market: &MarketId,
        weighter: Decimal,
    ) -> Result<()> {
        self.atomically(|state, _| {
            state.access.ensure_role(caller, Role::ParameterManager)?;
            validate_weighter(weighter)?;
            state.market_mut(market)?.distribution_weighter = weighter;
            info!("distribution weighter updated");
            Ok(())
        })
    }

    #[instrument(skip(self), fields(caller = %caller))]
    pub fn set_liquidation_fee(&mut self, caller: &AccountId, fee: Decimal) -> Result<()> {
        self.atomically(|state, _| {
            state.access.ensure_role(caller, Role::ParameterManager)?;
            state.auditor.set_liquidation_fee(fee)?;
            info!("liquidation fee updated");
            Ok(())
        })
    }

    /// Set borrow caps per market; a cap of zero lifts the limit
    #[instrument(skip(self, caps), fields(caller = %caller, count = caps.len()))]
    pub fn set_market_borrow_caps(
        &mut self,
        caller: &AccountId,
        caps: Vec<(MarketId, Decimal)>,
    ) -> Result<()> {
        self.atomically(|state, _| {
            state.access.ensure_role(caller, Role::ParameterManager)?;
            if caps.is_empty() {
                return Err(LedgerError::InvalidSetBorrowCap("no caps given".to_string()));
            }
            for (id, cap) in caps {
                if cap < Decimal::ZERO {
                    return Err(LedgerError::InvalidSetBorrowCap(format!(
                        "negative cap {} for {}",
                        cap, id
                    )));
                }
                state.market_mut(&id)?.borrow_cap = cap;
                info!(market = %id, %cap, "borrow cap updated");
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Market membership
    // ------------------------------------------------------------------

    pub fn enter_markets(&mut self, account: &AccountId, markets: &[MarketId]) -> Result<()> {
        self.atomically(|state, _| {
            for id in markets {
                state.market(id)?;
                if state.auditor.enter_market(account, id) {
                    info!(%account, market = %id, "market entered");
                }
            }
            Ok(())
        })
    }

    /// Stop using `market` as collateral
    ///
    /// Refused while the account owes debt there or when dropping the
    /// collateral would leave it undercollateralized.
    #[instrument(skip(self), fields(account = %account, market = %market))]
    pub fn exit_market(&mut self, account: &AccountId, market: &MarketId) -> Result<()> {
        self.atomically(|state, env| {
            if state.market(market)?.pools.has_debt(account) {
                return Err(LedgerError::ExitMarketWithDebt(market.to_string()));
            }
            if state.auditor.exit_market(account, market) {
                state
                    .auditor
                    .ensure_solvent(account, &state.markets, env.oracle, env.now)?;
                info!("market exited");
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Smart pool
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(market = %market, account = %account))]
    pub fn deposit_to_smart_pool(
        &mut self,
        market: &MarketId,
        account: &AccountId,
        amount: Decimal,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            if amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount);
            }
            let m = state.market_mut(market)?;
            m.accrue_all(env.now)?;
            let received = pull(m.asset.as_mut(), account, env.vault, amount)?;
            let shares = m.smart_pool.deposit(account, received)?;
            info!(%received, %shares, "smart pool deposit");
            Ok(Receipt::new(
                OperationKind::DepositSmartPool,
                market.clone(),
                account.clone(),
                None,
                received,
                Decimal::ZERO,
                env.now,
            ))
        })
    }

    #[instrument(skip(self), fields(market = %market, account = %account))]
    pub fn withdraw_from_smart_pool(
        &mut self,
        market: &MarketId,
        account: &AccountId,
        amount: Decimal,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            let m = state.market_mut(market)?;
            m.accrue_all(env.now)?;
            let shares = m.smart_pool.withdraw(account, amount)?;
            m.asset.transfer(env.vault, account, amount)?;
            state
                .auditor
                .ensure_solvent(account, &state.markets, env.oracle, env.now)?;
            info!(%amount, %shares, "smart pool withdrawal");
            Ok(Receipt::new(
                OperationKind::WithdrawSmartPool,
                market.clone(),
                account.clone(),
                None,
                amount,
                Decimal::ZERO,
                env.now,
            ))
        })
    }

    // ------------------------------------------------------------------
    // Maturity pools
    // ------------------------------------------------------------------

    /// Lend `amount` until `maturity` at a fixed yield.
    ///
    /// The depositor is granted part of the pool's unassigned earnings; the
    /// smart pool keeps its fee out of that grant when it funds the pool.
    /// Fails with `TooMuchSlippage` when principal plus yield falls short of
    /// `min_amount_out`.
    #[instrument(skip(self), fields(market = %market, account = %account, maturity = %maturity))]
    pub fn deposit_to_maturity_pool(
        &mut self,
        market: &MarketId,
        account: &AccountId,
        amount: Decimal,
        maturity: Maturity,
        min_amount_out: Decimal,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            if amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount);
            }
            let m = state.market_mut(market)?;
            m.ensure_pool_state(maturity, env.now, PoolState::Valid)?;

            let received = pull(m.asset.as_mut(), account, env.vault, amount)?;
            m.accrue(maturity, env.now)?;

            let pool = m.pools.pool_mut(maturity, env.now);
            let (earned, sp_fee) = m.rate_model.yield_for_deposit(
                pool.debt_to_smart_pool,
                pool.borrowed,
                pool.earnings_unassigned,
                received,
                m.distribution_weighter,
            )?;
            pool.remove_earnings(add(earned, sp_fee)?)?;

            let credited = add(received, earned)?;
            let debt_repaid = pool.add_money(credited)?;
            m.smart_pool.repaid(debt_repaid);
            m.smart_pool.add_earnings(sp_fee)?;

            let position = m.pools.supply_position_mut(account, maturity);
            position.principal = add(position.principal, received)?;
            position.commission = add(position.commission, earned)?;

            if credited < min_amount_out {
                return Err(LedgerError::TooMuchSlippage {
                    actual: credited,
                    limit: min_amount_out,
                });
            }

            info!(%received, %earned, %sp_fee, %debt_repaid, "maturity pool deposit");
            Ok(Receipt::new(
                OperationKind::DepositMaturityPool,
                market.clone(),
                account.clone(),
                Some(maturity),
                received,
                earned,
                env.now,
            ))
        })
    }

    /// Borrow `amount` until `maturity` at a fixed rate.
    ///
    /// The obligation is `amount` plus the fee priced off the utilization the
    /// borrow itself creates. Fails with `TooMuchSlippage` when it exceeds
    /// `max_amount_out`.
    #[instrument(skip(self), fields(market = %market, account = %account, maturity = %maturity))]
    pub fn borrow_from_maturity_pool(
        &mut self,
        market: &MarketId,
        account: &AccountId,
        amount: Decimal,
        maturity: Maturity,
        max_amount_out: Decimal,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            if amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount);
            }
            let m = state.market_mut(market)?;
            m.ensure_pool_state(maturity, env.now, PoolState::Valid)?;
            m.accrue(maturity, env.now)?;

            let sp_available = m.smart_pool.available();
            let pool = m.pools.pool_mut(maturity, env.now);
            let rate = m.rate_model.rate_to_borrow(
                maturity.timestamp(),
                env.now,
                add(pool.borrowed, amount)?,
                pool.supplied,
                sp_available,
            )?;
            let fee = mul_down(amount, rate)?;
            let owed = add(amount, fee)?;

            let debt_added = pool.take_money(owed, sp_available)?;
            pool.add_fee(fee)?;
            m.smart_pool.lend(debt_added)?;

            let position = m.pools.borrow_position_mut(account, maturity, env.now);
            position.principal = add(position.principal, amount)?;
            position.commission = add(position.commission, fee)?;

            if owed > max_amount_out {
                return Err(LedgerError::TooMuchSlippage {
                    actual: owed,
                    limit: max_amount_out,
                });
            }
            m.ensure_below_borrow_cap()?;

            if state.auditor.enter_market(account, market) {
                debug!("market entered by borrow");
            }
            state
                .auditor
                .ensure_solvent(account, &state.markets, env.oracle, env.now)?;

            state
                .market_mut(market)?
                .asset
                .transfer(env.vault, account, amount)?;

            info!(%amount, %fee, %rate, %debt_added, "maturity pool borrow");
            Ok(Receipt::new(
                OperationKind::BorrowMaturityPool,
                market.clone(),
                account.clone(),
                Some(maturity),
                amount,
                fee,
                env.now,
            ))
        })
    }

    /// Repay `amount` of `account`'s debt in `maturity`, funded by `payer`.
    ///
    /// Payments settle penalties first, then principal, then commission.
    #[instrument(skip(self), fields(market = %market, payer = %payer, account = %account, maturity = %maturity))]
    pub fn repay_to_maturity_pool(
        &mut self,
        market: &MarketId,
        payer: &AccountId,
        account: &AccountId,
        amount: Decimal,
        maturity: Maturity,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            let receipt = repay(state.market_mut(market)?, env, payer, account, amount, maturity)?;
            Ok(receipt)
        })
    }

    /// Withdraw `amount` of a matured supply position
    #[instrument(skip(self), fields(market = %market, account = %account, maturity = %maturity))]
    pub fn withdraw_from_maturity_pool(
        &mut self,
        market: &MarketId,
        account: &AccountId,
        amount: Decimal,
        maturity: Maturity,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            if amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount);
            }
            let m = state.market_mut(market)?;
            m.ensure_pool_state(maturity, env.now, PoolState::Matured)?;
            m.accrue(maturity, env.now)?;

            let held = m.pools.account_supplied(account, Some(maturity))?;
            if held.is_zero() {
                return Err(LedgerError::InsufficientBalance {
                    required: amount,
                    available: held,
                });
            }
            m.pools.supply_position_mut(account, maturity).reduce(amount)?;

            let sp_available = m.smart_pool.available();
            let debt_added = m
                .pools
                .pool_mut(maturity, env.now)
                .withdraw_money(amount, sp_available)?;
            m.smart_pool.lend(debt_added)?;

            state
                .auditor
                .ensure_solvent(account, &state.markets, env.oracle, env.now)?;
            state
                .market_mut(market)?
                .asset
                .transfer(env.vault, account, amount)?;

            info!(%amount, %debt_added, "maturity pool withdrawal");
            Ok(Receipt::new(
                OperationKind::WithdrawMaturityPool,
                market.clone(),
                account.clone(),
                Some(maturity),
                amount,
                Decimal::ZERO,
                env.now,
            ))
        })
    }

    // ------------------------------------------------------------------
    // Liquidation
    // ------------------------------------------------------------------

    /// Repay part of an undercollateralized account's debt and seize its
    /// smart pool collateral in `collateral_market`.
    ///
    /// The repayment is capped by the close factor. Seized collateral is
    /// worth the repaid value times the liquidation incentive; the protocol
    /// fee share of it stays in the collateral smart pool.
    #[instrument(skip(self), fields(liquidator = %liquidator, borrower = %borrower, debt_market = %debt_market, collateral_market = %collateral_market))]
    pub fn liquidate(
        &mut self,
        liquidator: &AccountId,
        borrower: &AccountId,
        debt_market: &MarketId,
        maturity: Maturity,
        repay_amount: Decimal,
        collateral_market: &MarketId,
    ) -> Result<Receipt> {
        self.atomically(|state, env| {
            if liquidator == borrower {
                return Err(LedgerError::SelfLiquidation);
            }
            state.market(collateral_market)?;
            for id in [debt_market, collateral_market] {
                state.market_mut(id)?.accrue_all(env.now)?;
            }
            state
                .auditor
                .ensure_shortfall(borrower, &state.markets, env.oracle, env.now)?;

            let m = state.market(debt_market)?;
            let owed = m
                .pools
                .account_owed(borrower, Some(maturity), env.now, m.rate_model.penalty_rate())?;
            if owed.is_zero() {
                return Err(LedgerError::RepayZero);
            }
            let max = state.auditor.max_liquidation(owed)?;
            if repay_amount > max {
                return Err(LedgerError::TooMuchLiquidation {
                    amount: repay_amount,
                    max,
                });
            }

            let repaid = repay(
                state.market_mut(debt_market)?,
                env,
                liquidator,
                borrower,
                repay_amount,
                maturity,
            )?;

            let seizure = state.auditor.seizure(
                repaid.amount,
                env.oracle.price_of(debt_market)?,
                env.oracle.price_of(collateral_market)?,
            )?;
            let collateral = state.market_mut(collateral_market)?;
            collateral
                .smart_pool
                .seize(borrower, seizure.seized, seizure.protocol_fee)?;
            collateral.asset.transfer(
                env.vault,
                liquidator,
                seizure.seized - seizure.protocol_fee,
            )?;

            warn!(
                repaid = %repaid.amount,
                seized = %seizure.seized,
                protocol_fee = %seizure.protocol_fee,
                "account liquidated"
            );
            Ok(Receipt::new(
                OperationKind::Liquidate,
                debt_market.clone(),
                borrower.clone(),
                Some(maturity),
                repaid.amount,
                seizure.seized,
                env.now,
            ))
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Rate a borrow of `amount` until `maturity` would be charged now
    pub fn rate_to_borrow(&self, market: &MarketId, maturity: Maturity, amount: Decimal) -> Result<Decimal> {
        let m = self.state.market(market)?;
        let now = self.now();
        let pool = m.pools.pool(maturity).cloned().unwrap_or_default();
        m.rate_model.rate_to_borrow(
            maturity.timestamp(),
            now,
            add(pool.borrowed, amount)?,
            pool.supplied,
            m.smart_pool.available(),
        )
    }

    /// `(yield, smart pool fee)` a deposit of `amount` into `maturity` would get now
    pub fn yield_for_deposit(
        &self,
        market: &MarketId,
        maturity: Maturity,
        amount: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        let m = self.state.market(market)?;
        let mut pool = m.pools.pool(maturity).cloned().unwrap_or_default();
        pool.accrue_earnings(maturity, self.now())?;
        m.rate_model.yield_for_deposit(
            pool.debt_to_smart_pool,
            pool.borrowed,
            pool.earnings_unassigned,
            amount,
            m.distribution_weighter,
        )
    }

    /// Supplied and owed balances of `account`, in one maturity or across
    /// the whole market
    pub fn account_snapshot(
        &self,
        market: &MarketId,
        account: &AccountId,
        maturity: Option<Maturity>,
    ) -> Result<AccountSnapshot> {
        let m = self.state.market(market)?;
        let mut supplied = m.pools.account_supplied(account, maturity)?;
        if maturity.is_none() {
            supplied = add(supplied, m.smart_pool.balance_of(account)?)?;
        }
        let borrowed =
            m.pools
                .account_owed(account, maturity, self.now(), m.rate_model.penalty_rate())?;
        Ok(AccountSnapshot { supplied, borrowed })
    }

    /// Outstanding borrows of one maturity
    pub fn total_mp_borrows(&self, market: &MarketId, maturity: Maturity) -> Result<Decimal> {
        let m = self.state.market(market)?;
        Ok(m.pools.pool(maturity).map_or(Decimal::ZERO, |pool| pool.borrowed))
    }

    pub fn account_liquidity(&self, account: &AccountId) -> Result<AccountLiquidity> {
        self.state.auditor.account_liquidity(
            account,
            &self.state.markets,
            self.oracle.as_ref(),
            self.now(),
        )
    }

    pub fn pool(&self, market: &MarketId, maturity: Maturity) -> Result<Option<MaturityPool>> {
        Ok(self.state.market(market)?.pools.pool(maturity).cloned())
    }

    pub fn pool_state(&self, market: &MarketId, maturity: Maturity) -> Result<PoolState> {
        Ok(self.state.market(market)?.pool_state(maturity, self.now()))
    }

    pub fn smart_pool(&self, market: &MarketId) -> Result<SmartPool> {
        Ok(self.state.market(market)?.smart_pool.clone())
    }

    pub fn balance_of(&self, market: &MarketId, holder: &AccountId) -> Result<Decimal> {
        Ok(self.state.market(market)?.asset.balance_of(holder))
    }
}

/// Settle a repayment against one market, funded by `payer`
fn repay(
    m: &mut Market,
    env: &Env<'_>,
    payer: &AccountId,
    account: &AccountId,
    amount: Decimal,
    maturity: Maturity,
) -> Result<Receipt> {
    let penalty_rate = m.rate_model.penalty_rate();
    let due = match m.pools.borrow_position(account, maturity) {
        Some(position) => position.total_due(maturity, env.now, penalty_rate)?,
        None => Decimal::ZERO,
    };
    if amount <= Decimal::ZERO || due.is_zero() {
        return Err(LedgerError::RepayZero);
    }
    if amount > due {
        return Err(LedgerError::TooMuchRepay { amount, owed: due });
    }

    m.accrue(maturity, env.now)?;
    let received = pull(m.asset.as_mut(), payer, env.vault, amount)?;
    if received > due {
        return Err(LedgerError::TooMuchRepayTransfer { received, owed: due });
    }

    let allocation = m
        .pools
        .borrow_position_mut(account, maturity, env.now)
        .apply_repayment(received, maturity, env.now, penalty_rate)?;

    let debt_repaid = m
        .pools
        .pool_mut(maturity, env.now)
        .repay_money(allocation.covered());
    m.smart_pool.repaid(debt_repaid);
    m.smart_pool.add_earnings(allocation.penalty)?;

    info!(
        %received,
        penalty = %allocation.penalty,
        principal = %allocation.principal,
        commission = %allocation.commission,
        %debt_repaid,
        "maturity pool repayment"
    );
    Ok(Receipt::new(
        OperationKind::RepayMaturityPool,
        m.id.clone(),
        account.clone(),
        Some(maturity),
        received,
        allocation.penalty,
        env.now,
    ))
}
