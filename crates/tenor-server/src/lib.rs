//! # Tenor Server
//!
//! REST front end for the Tenor ledger. Requests are forwarded to the
//! single-writer [`LedgerService`](tenor_ledger::LedgerService) through a
//! [`LedgerHandle`](tenor_ledger::LedgerHandle); the server holds no ledger
//! state of its own.

pub mod api;
pub mod config;

use std::sync::Arc;

use anyhow::Result;
use tenor_common::{AccountId, MarketId};
use tenor_ledger::{Auditor, Clock, SettlementEngine, StaticPriceOracle, TokenLedger};
use tracing::info;

use crate::config::TenorConfig;

/// Server version
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a settlement engine with every configured market listed and its
/// starting balances minted
pub fn build_engine(
    config: &TenorConfig,
    oracle: Arc<StaticPriceOracle>,
    clock: Arc<dyn Clock>,
) -> Result<SettlementEngine> {
    let admin = AccountId::new(config.admin.as_str());
    let auditor = Auditor::new(
        config.ledger.liquidation_incentive,
        config.ledger.liquidation_fee,
        config.ledger.close_factor,
    )?;
    let mut engine = SettlementEngine::new(
        admin.clone(),
        AccountId::new(config.vault.as_str()),
        auditor,
        oracle.clone(),
        clock,
    );

    for market in &config.markets {
        let mut token = TokenLedger::new(market.id.as_str()).with_transfer_fee(market.transfer_fee);
        for (holder, amount) in &market.balances {
            token.mint(&AccountId::new(holder.as_str()), *amount)?;
        }
        let id = MarketId::new(market.id.as_str());
        oracle.set_price(id.clone(), market.price);
        engine.list_market(&admin, id, Box::new(token), market.config.clone())?;
        info!(market = %market.id, price = %market.price, holders = market.balances.len(), "market ready");
    }
    Ok(engine)
}
