//! Single-writer ledger service
//!
//! [`LedgerService`] owns the [`SettlementEngine`] on a tokio task and applies
//! queued jobs one at a time. [`LedgerHandle`] is the cloneable client side:
//! every settlement, query, and administrative update travels the same queue,
//! so parameter changes land between operations, never inside one.

use rust_decimal::Decimal;
use tenor_common::{AccountId, LedgerError, MarketId, Maturity, Receipt, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::auditor::AccountLiquidity;
use crate::engine::{AccountSnapshot, SettlementEngine};

type Job = Box<dyn FnOnce(&mut SettlementEngine) + Send>;

/// Default capacity of the job queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub struct LedgerService {
    engine: SettlementEngine,
    jobs: mpsc::Receiver<Job>,
}

impl LedgerService {
    /// Move `engine` onto its own task
    pub fn spawn(engine: SettlementEngine, capacity: usize) -> (LedgerHandle, JoinHandle<SettlementEngine>) {
        let (tx, rx) = mpsc::channel(capacity);
        let service = Self { engine, jobs: rx };
        let task = tokio::spawn(service.run());
        (LedgerHandle { jobs: tx }, task)
    }

    /// Apply jobs until every handle is dropped, then hand the engine back
    async fn run(mut self) -> SettlementEngine {
        info!("ledger service started");
        let mut processed: u64 = 0;
        while let Some(job) = self.jobs.recv().await {
            job(&mut self.engine);
            processed += 1;
        }
        info!(processed, "ledger service stopped");
        self.engine
    }
}

#[derive(Clone)]
pub struct LedgerHandle {
    jobs: mpsc::Sender<Job>,
}

impl LedgerHandle {
    /// Run `f` against the engine and wait for its result
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SettlementEngine) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |engine| {
            if reply_tx.send(f(engine)).is_err() {
                debug!("caller went away before the reply");
            }
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| LedgerError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| LedgerError::ServiceUnavailable)
    }

    async fn execute<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SettlementEngine) -> Result<T> + Send + 'static,
    {
        self.call(f).await?
    }

    pub async fn deposit_to_smart_pool(
        &self,
        market: MarketId,
        account: AccountId,
        amount: Decimal,
    ) -> Result<Receipt> {
        self.execute(move |engine| engine.deposit_to_smart_pool(&market, &account, amount))
            .await
    }

    pub async fn withdraw_from_smart_pool(
        &self,
        market: MarketId,
        account: AccountId,
        amount: Decimal,
    ) -> Result<Receipt> {
        self.execute(move |engine| engine.withdraw_from_smart_pool(&market, &account, amount))
            .await
    }

    pub async fn deposit_to_maturity_pool(
        &self,
        market: MarketId,
        account: AccountId,
        amount: Decimal,
        maturity: Maturity,
        min_amount_out: Decimal,
    ) -> Result<Receipt> {
        self.execute(move |engine| {
            engine.deposit_to_maturity_pool(&market, &account, amount, maturity, min_amount_out)
        })
        .await
    }

    pub async fn borrow_from_maturity_pool(
        &self,
        market: MarketId,
        account: AccountId,
        amount: Decimal,
        maturity: Maturity,
        max_amount_out: Decimal,
    ) -> Result<Receipt> {
        self.execute(move |engine| {
            engine.borrow_from_maturity_pool(&market, &account, amount, maturity, max_amount_out)
        })
        .await
    }

    pub async fn repay_to_maturity_pool(
        &self,
        market: MarketId,
        payer: AccountId,
        account: AccountId,
        amount: Decimal,
        maturity: Maturity,
    ) -> Result<Receipt> {
        self.execute(move |engine| {
            engine.repay_to_maturity_pool(&market, &payer, &account, amount, maturity)
        })
        .await
    }

    pub async fn withdraw_from_maturity_pool(
        &self,
        market: MarketId,
        account: AccountId,
        amount: Decimal,
        maturity: Maturity,
    ) -> Result<Receipt> {
        self.execute(move |engine| {
            engine.withdraw_from_maturity_pool(&market, &account, amount, maturity)
        })
        .await
    }

    pub async fn liquidate(
        &self,
        liquidator: AccountId,
        borrower: AccountId,
        debt_market: MarketId,
        maturity: Maturity,
        repay_amount: Decimal,
        collateral_market: MarketId,
    ) -> Result<Receipt> {
        self.execute(move |engine| {
            engine.liquidate(
                &liquidator,
                &borrower,
                &debt_market,
                maturity,
                repay_amount,
                &collateral_market,
            )
        })
        .await
    }

    pub async fn rate_to_borrow(&self, market: MarketId, maturity: Maturity, amount: Decimal) -> Result<Decimal> {
        self.execute(move |engine| engine.rate_to_borrow(&market, maturity, amount))
            .await
    }

    pub async fn yield_for_deposit(
        &self,
        market: MarketId,
        maturity: Maturity,
        amount: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        self.execute(move |engine| engine.yield_for_deposit(&market, maturity, amount))
            .await
    }

    pub async fn account_snapshot(
        &self,
        market: MarketId,
        account: AccountId,
        maturity: Option<Maturity>,
    ) -> Result<AccountSnapshot> {
        self.execute(move |engine| engine.account_snapshot(&market, &account, maturity))
            .await
    }

    pub async fn total_mp_borrows(&self, market: MarketId, maturity: Maturity) -> Result<Decimal> {
        self.execute(move |engine| engine.total_mp_borrows(&market, maturity))
            .await
    }

    pub async fn account_liquidity(&self, account: AccountId) -> Result<AccountLiquidity> {
        self.execute(move |engine| engine.account_liquidity(&account))
            .await
    }
}
