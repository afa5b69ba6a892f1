//! Settlement benchmarks
//!
//! - Rate curve evaluation
//! - Deposit yield split
//! - Borrow settlement including the atomic state copy

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tenor_common::{AccountId, MarketId, Maturity, INTERVAL_SECONDS};
use tenor_ledger::{
    Auditor, InterestRateModel, ManualClock, MarketConfig, SettlementEngine, StaticPriceOracle,
    TokenLedger,
};

const T0: u64 = INTERVAL_SECONDS * 2800;

fn bench_rate_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_model");
    let model = InterestRateModel::default();

    group.bench_function("rate_to_borrow", |b| {
        b.iter(|| {
            model.rate_to_borrow(
                black_box(T0 + INTERVAL_SECONDS),
                black_box(T0),
                black_box(dec!(80)),
                black_box(dec!(100)),
                black_box(dec!(0)),
            )
        })
    });

    group.bench_function("yield_for_deposit", |b| {
        b.iter(|| {
            model.yield_for_deposit(
                black_box(dec!(100)),
                black_box(dec!(200)),
                black_box(dec!(100)),
                black_box(dec!(100)),
                black_box(Decimal::ONE),
            )
        })
    });

    group.finish();
}

/// Engine with `accounts` borrowers, each holding ETH collateral and an open
/// DAI borrow in the first maturity
fn engine_with_positions(accounts: usize) -> SettlementEngine {
    let admin = AccountId::from("admin");
    let oracle = Arc::new(
        StaticPriceOracle::new()
            .with_price("DAI", dec!(1))
            .with_price("ETH", dec!(2000)),
    );
    let clock = Arc::new(ManualClock::new(T0));
    let mut engine = SettlementEngine::new(
        admin.clone(),
        AccountId::from("vault"),
        Auditor::default(),
        oracle,
        clock,
    );

    let lender = AccountId::from("lender");
    let mut dai = TokenLedger::new("DAI");
    let mut eth = TokenLedger::new("ETH");
    dai.mint(&lender, dec!(1_000_000_000)).ok();
    let borrowers: Vec<AccountId> = (0..accounts)
        .map(|i| AccountId::new(format!("borrower-{i}")))
        .collect();
    for borrower in &borrowers {
        eth.mint(borrower, dec!(10)).ok();
        dai.mint(borrower, dec!(1_000)).ok();
    }

    let (dai_id, eth_id) = (MarketId::from("DAI"), MarketId::from("ETH"));
    engine
        .list_market(&admin, dai_id.clone(), Box::new(dai), MarketConfig::default())
        .ok();
    engine
        .list_market(&admin, eth_id.clone(), Box::new(eth), MarketConfig::default())
        .ok();

    let maturity = Maturity::next_after(T0);
    engine
        .deposit_to_smart_pool(&dai_id, &lender, dec!(1_000_000_000))
        .ok();
    for borrower in &borrowers {
        engine.deposit_to_smart_pool(&eth_id, borrower, dec!(10)).ok();
        engine.enter_markets(borrower, &[eth_id.clone()]).ok();
        engine
            .borrow_from_maturity_pool(&dai_id, borrower, dec!(100), maturity, dec!(200))
            .ok();
    }
    engine
}

fn bench_settlement(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlement");
    let dai = MarketId::from("DAI");
    let maturity = Maturity::next_after(T0);

    for accounts in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("borrow", accounts), &accounts, |b, &accounts| {
            let mut engine = engine_with_positions(accounts);
            let borrower = AccountId::from("borrower-0");
            b.iter(|| {
                engine
                    .borrow_from_maturity_pool(&dai, &borrower, black_box(dec!(1)), maturity, dec!(2))
                    .ok()
            })
        });

        group.bench_with_input(
            BenchmarkId::new("account_liquidity", accounts),
            &accounts,
            |b, &accounts| {
                let engine = engine_with_positions(accounts);
                let borrower = AccountId::from("borrower-0");
                b.iter(|| engine.account_liquidity(black_box(&borrower)))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_rate_model, bench_settlement);
criterion_main!(benches);
