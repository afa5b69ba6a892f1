//! Price oracle collaborator, consumed only by the auditor

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tenor_common::{LedgerError, MarketId, Result};

/// Source of asset prices in a common unit of account
pub trait PriceOracle: Send + Sync {
    fn price_of(&self, market: &MarketId) -> Result<Decimal>;
}

/// Prices set by hand, for simulations and tests
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: RwLock<HashMap<MarketId, Decimal>>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, market: impl Into<MarketId>, price: Decimal) -> Self {
        self.set_price(market, price);
        self
    }

    pub fn set_price(&self, market: impl Into<MarketId>, price: Decimal) {
        self.prices.write().insert(market.into(), price);
    }
}

impl PriceOracle for StaticPriceOracle {
    fn price_of(&self, market: &MarketId) -> Result<Decimal> {
        match self.prices.read().get(market) {
            Some(price) if *price > Decimal::ZERO => Ok(*price),
            _ => Err(LedgerError::PriceUnavailable(market.to_string())),
        }
    }
}
