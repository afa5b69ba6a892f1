//! Shared fixture: a DAI and an ETH market on a manual clock

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tenor_common::{AccountId, MarketId, Maturity, INTERVAL_SECONDS};
use tenor_ledger::{
    Auditor, ManualClock, MarketConfig, SettlementEngine, StaticPriceOracle, TokenLedger,
};

/// Interval-aligned start time
pub const T0: u64 = INTERVAL_SECONDS * 2800;

pub struct Fixture {
    pub engine: SettlementEngine,
    pub clock: Arc<ManualClock>,
    pub oracle: Arc<StaticPriceOracle>,
    pub maturity: Maturity,
}

pub fn account(name: &str) -> AccountId {
    AccountId::from(name)
}

pub fn dai() -> MarketId {
    MarketId::from("DAI")
}

pub fn eth() -> MarketId {
    MarketId::from("ETH")
}

fn token(symbol: &str, holders: &[(&str, Decimal)]) -> TokenLedger {
    let mut token = TokenLedger::new(symbol);
    for (holder, amount) in holders {
        token.mint(&account(holder), *amount).unwrap();
    }
    token
}

pub fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(T0));
    let oracle = Arc::new(
        StaticPriceOracle::new()
            .with_price("DAI", dec!(1))
            .with_price("ETH", dec!(2000)),
    );
    let mut engine = SettlementEngine::new(
        account("admin"),
        account("vault"),
        Auditor::default(),
        oracle.clone(),
        clock.clone(),
    );

    let dai_token = token(
        "DAI",
        &[
            ("alice", dec!(10000)),
            ("bob", dec!(10000)),
            ("carol", dec!(10000)),
        ],
    );
    let eth_token = token("ETH", &[("alice", dec!(10)), ("bob", dec!(10))]);
    engine
        .list_market(&account("admin"), dai(), Box::new(dai_token), MarketConfig::default())
        .unwrap();
    engine
        .list_market(
            &account("admin"),
            eth(),
            Box::new(eth_token),
            MarketConfig {
                collateral_factor: dec!(0.8),
                ..MarketConfig::default()
            },
        )
        .unwrap();

    Fixture {
        engine,
        clock,
        oracle,
        maturity: Maturity::next_after(T0),
    }
}

impl Fixture {
    /// Post `amount` ETH as collateral for `name`
    pub fn post_eth_collateral(&mut self, name: &str, amount: Decimal) {
        self.engine
            .deposit_to_smart_pool(&eth(), &account(name), amount)
            .unwrap();
        self.engine.enter_markets(&account(name), &[eth()]).unwrap();
    }
}
