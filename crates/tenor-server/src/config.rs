//! Tenor server configuration

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenor_ledger::MarketConfig;

/// Tenor service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenorConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// Account granted the admin role at startup
    pub admin: String,
    /// Account holding every market's funds
    pub vault: String,
    /// Ledger service settings
    pub ledger: LedgerSettings,
    /// Markets listed at startup
    pub markets: Vec<MarketSettings>,
}

impl Default for TenorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            admin: "admin".to_string(),
            vault: "vault".to_string(),
            ledger: LedgerSettings::default(),
            markets: vec![
                MarketSettings {
                    id: "DAI".to_string(),
                    price: Decimal::ONE,
                    transfer_fee: Decimal::ZERO,
                    config: MarketConfig::default(),
                    balances: BTreeMap::from([
                        ("alice".to_string(), Decimal::from(10_000)),
                        ("bob".to_string(), Decimal::from(10_000)),
                    ]),
                },
                MarketSettings {
                    id: "ETH".to_string(),
                    price: Decimal::from(2_000),
                    transfer_fee: Decimal::ZERO,
                    config: MarketConfig::default(),
                    balances: BTreeMap::from([
                        ("alice".to_string(), Decimal::from(10)),
                        ("bob".to_string(), Decimal::from(10)),
                    ]),
                },
            ],
        }
    }
}

impl TenorConfig {
    /// Load configuration from `.env`, an optional config file, and
    /// `TENOR__`-separated environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let file = std::env::var("TENOR_CONFIG_FILE").unwrap_or_else(|_| "tenor".to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("TENOR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let mut cfg: TenorConfig = settings.try_deserialize()?;

        // Platform-provided PORT takes priority
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse::<u16>() {
                cfg.port = p;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin.is_empty() || self.vault.is_empty() {
            bail!("admin and vault accounts must be set");
        }
        if self.admin == self.vault {
            bail!("admin and vault must be different accounts");
        }
        if self.ledger.queue_capacity == 0 {
            bail!("ledger.queue_capacity must be positive");
        }

        let mut seen = BTreeSet::new();
        for market in &self.markets {
            if !seen.insert(market.id.as_str()) {
                bail!("market {} is listed twice", market.id);
            }
            if market.price <= Decimal::ZERO {
                bail!("market {} needs a positive price", market.id);
            }
            if market.transfer_fee < Decimal::ZERO || market.transfer_fee >= Decimal::ONE {
                bail!("market {} transfer fee must be in [0, 1)", market.id);
            }
            if market.balances.values().any(|amount| *amount <= Decimal::ZERO) {
                bail!("market {} has a non-positive starting balance", market.id);
            }
            market.config.validate()?;
        }
        Ok(())
    }
}

/// Ledger service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Capacity of the ledger job queue
    pub queue_capacity: usize,
    /// Seized collateral per unit of repaid debt value
    pub liquidation_incentive: Decimal,
    /// Share of seized collateral kept by the protocol
    pub liquidation_fee: Decimal,
    /// Largest fraction of a debt one liquidation may repay
    pub close_factor: Decimal,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: tenor_ledger::service::DEFAULT_QUEUE_CAPACITY,
            liquidation_incentive: Decimal::new(109, 2),
            liquidation_fee: Decimal::new(1, 2),
            close_factor: Decimal::new(5, 1),
        }
    }
}

/// One market listed at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Market id, also the asset symbol
    pub id: String,
    /// Starting oracle price
    pub price: Decimal,
    /// Fraction burned on every transfer of the asset
    #[serde(default)]
    pub transfer_fee: Decimal,
    #[serde(default)]
    pub config: MarketConfig,
    /// Starting token balances by account
    #[serde(default)]
    pub balances: BTreeMap<String, Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = TenorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.markets.len(), 2);
        assert_eq!(cfg.ledger.close_factor, Decimal::new(5, 1));
    }

    #[test]
    fn test_rejects_duplicate_market() {
        let mut cfg = TenorConfig::default();
        let dup = cfg.markets[0].clone();
        cfg.markets.push(dup);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_market_parameters() {
        let mut cfg = TenorConfig::default();
        cfg.markets[0].price = Decimal::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = TenorConfig::default();
        cfg.markets[1].config.collateral_factor = Decimal::TWO;
        assert!(cfg.validate().is_err());

        let mut cfg = TenorConfig::default();
        cfg.ledger.queue_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: TenorConfig = serde_json::from_str(
            r#"{"port": 9000, "ledger": {"queue_capacity": 8}, "markets": [{"id": "USDC", "price": "1"}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.ledger.queue_capacity, 8);
        assert_eq!(cfg.ledger.liquidation_incentive, Decimal::new(109, 2));
        assert_eq!(cfg.markets[0].config, MarketConfig::default());
        assert!(cfg.markets[0].balances.is_empty());
        cfg.validate().unwrap();
    }
}
