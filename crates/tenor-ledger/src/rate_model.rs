//! Interest rate model
//!
//! Prices fixed-rate borrows off the utilization of the liquidity backing a
//! maturity pool:
//!
//! ```text
//! U    = borrowed / (mpSupplied + spAvailable)
//! R(U) = A / (Umax - U) + B
//! rate = R(U) * (maturity - now) / SECONDS_PER_YEAR
//! ```
//!
//! `R` is a hyperbola with its asymptote at `Umax`, so it is strictly increasing
//! and finite on `[0, Umax)` whenever `A > 0`. The coefficients are validated
//! when set and are never recomputed per call.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tenor_common::{
    math::{add, div_down, mul_div_down, mul_down},
    LedgerError, Result, SECONDS_PER_YEAR,
};
use tracing::debug;

/// Curve coefficients plus the late-payment penalty rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    /// Curve numerator `A`
    pub a: Decimal,
    /// Curve offset `B` (may be negative)
    pub b: Decimal,
    /// Utilization asymptote `Umax`
    pub max_utilization: Decimal,
    /// Penalty charged per second on principal owed past maturity
    pub penalty_rate: Decimal,
}

impl CurveParameters {
    /// Build and validate a curve from raw coefficients
    pub fn new(a: Decimal, b: Decimal, max_utilization: Decimal, penalty_rate: Decimal) -> Result<Self> {
        let params = Self {
            a,
            b,
            max_utilization,
            penalty_rate,
        };
        params.validate()?;
        Ok(params)
    }

    /// Solve `A` and `B` from two calibration points.
    ///
    /// The resulting curve satisfies `R(0) = r0` and `R(ub) = rb`.
    pub fn calibrate(
        ub: Decimal,
        max_utilization: Decimal,
        r0: Decimal,
        rb: Decimal,
        penalty_rate: Decimal,
    ) -> Result<Self> {
        if ub <= Decimal::ZERO || ub >= max_utilization {
            return Err(LedgerError::InvalidParameters(format!(
                "calibration utilization {} must lie in (0, {})",
                ub, max_utilization
            )));
        }
        if rb <= r0 {
            return Err(LedgerError::InvalidParameters(format!(
                "calibration rate {} must exceed base rate {}",
                rb, r0
            )));
        }

        let spread = mul_down(max_utilization, max_utilization - ub)?;
        let a = mul_div_down(rb - r0, spread, ub)?;
        let b = r0 - div_down(a, max_utilization)?;
        Self::new(a, b, max_utilization, penalty_rate)
    }

    /// Reject curves that are not strictly increasing and non-negative below `Umax`
    pub fn validate(&self) -> Result<()> {
        if self.max_utilization <= Decimal::ZERO {
            return Err(LedgerError::InvalidParameters(
                "max utilization must be positive".to_string(),
            ));
        }
        if self.a <= Decimal::ZERO {
            return Err(LedgerError::InvalidParameters(
                "curve coefficient A must be positive".to_string(),
            ));
        }
        if self.penalty_rate < Decimal::ZERO {
            return Err(LedgerError::InvalidParameters(
                "penalty rate must not be negative".to_string(),
            ));
        }
        let base = add(div_down(self.a, self.max_utilization)?, self.b)?;
        if base < Decimal::ZERO {
            return Err(LedgerError::InvalidParameters(format!(
                "curve yields a negative rate {} at zero utilization",
                base
            )));
        }
        Ok(())
    }

    /// Yearly rate at utilization `u`
    pub fn yearly_rate(&self, utilization: Decimal) -> Result<Decimal> {
        if utilization < Decimal::ZERO || utilization >= self.max_utilization {
            return Err(LedgerError::InsufficientProtocolLiquidity);
        }
        add(div_down(self.a, self.max_utilization - utilization)?, self.b)
    }
}

impl Default for CurveParameters {
    /// 2% at zero utilization, 14% at 80%, asymptote at 110%, 2% per day late
    fn default() -> Self {
        Self {
            a: dec!(0.0495),
            b: dec!(-0.025),
            max_utilization: dec!(1.1),
            penalty_rate: dec!(0.000000231481481481),
        }
    }
}

/// Boundary at which a market's current rate parameters took effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersVersion {
    pub version: u64,
    pub effective_from: u64,
}

/// Versioned rate configuration of a market
///
/// Updates are applied between operations only; `version` and `effective_from`
/// record the boundary at which the current parameters took effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRateModel {
    params: CurveParameters,
    /// Share of a depositor's earnings kept by the smart pool for replacing its debt
    smart_pool_fee_rate: Decimal,
    version: u64,
    effective_from: u64,
}

impl InterestRateModel {
    pub fn new(params: CurveParameters, smart_pool_fee_rate: Decimal) -> Result<Self> {
        params.validate()?;
        validate_fee_rate(smart_pool_fee_rate)?;
        Ok(Self {
            params,
            smart_pool_fee_rate,
            version: 0,
            effective_from: 0,
        })
    }

    pub fn params(&self) -> &CurveParameters {
        &self.params
    }

    pub fn smart_pool_fee_rate(&self) -> Decimal {
        self.smart_pool_fee_rate
    }

    pub fn penalty_rate(&self) -> Decimal {
        self.params.penalty_rate
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn effective_from(&self) -> u64 {
        self.effective_from
    }

    pub fn parameters_version(&self) -> ParametersVersion {
        ParametersVersion {
            version: self.version,
            effective_from: self.effective_from,
        }
    }

    /// Replace the curve, effective from `now`
    pub fn set_parameters(&mut self, params: CurveParameters, now: u64) -> Result<()> {
        params.validate()?;
        self.params = params;
        self.bump(now);
        Ok(())
    }

    pub fn set_penalty_rate(&mut self, penalty_rate: Decimal, now: u64) -> Result<()> {
        let params = CurveParameters {
            penalty_rate,
            ..self.params
        };
        self.set_parameters(params, now)
    }

    pub fn set_smart_pool_fee_rate(&mut self, fee_rate: Decimal, now: u64) -> Result<()> {
        validate_fee_rate(fee_rate)?;
        self.smart_pool_fee_rate = fee_rate;
        self.bump(now);
        Ok(())
    }

    fn bump(&mut self, now: u64) {
        self.version += 1;
        self.effective_from = now;
        debug!(version = self.version, effective_from = now, "rate model updated");
    }

    /// Rate charged on a borrow taken at `from` and due at `target`.
    ///
    /// `borrowed` is the pool's borrowed amount including the new borrow,
    /// `mp_supplied` the pool-local supply and `sp_available` the idle smart
    /// pool liquidity.
    pub fn rate_to_borrow(
        &self,
        target: u64,
        from: u64,
        borrowed: Decimal,
        mp_supplied: Decimal,
        sp_available: Decimal,
    ) -> Result<Decimal> {
        if target <= from {
            return Err(LedgerError::InvalidTimeDifference { target, from });
        }

        let liquidity = add(mp_supplied, sp_available)?;
        if liquidity <= Decimal::ZERO {
            return Err(LedgerError::InsufficientProtocolLiquidity);
        }

        let utilization = div_down(borrowed, liquidity)?;
        let yearly = self.params.yearly_rate(utilization)?;

        mul_div_down(
            yearly,
            Decimal::from(target - from),
            Decimal::from(SECONDS_PER_YEAR),
        )
    }

    /// Split of a pool's unassigned earnings granted to a new deposit.
    ///
    /// The depositor takes the share of earnings matching the share of the
    /// pool's outstanding borrows its (weighted) deposit funds. When the smart
    /// pool has capital behind the pool it keeps `smart_pool_fee_rate` of that
    /// share as the fee for having its debt replaced.
    ///
    /// Returns `(depositor_yield, smart_pool_fee)`.
    pub fn yield_for_deposit(
        &self,
        sp_supplied: Decimal,
        mp_borrowed: Decimal,
        earnings_unassigned: Decimal,
        amount: Decimal,
        distribution_weighter: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        if earnings_unassigned <= Decimal::ZERO || mp_borrowed <= Decimal::ZERO {
            return Ok((Decimal::ZERO, Decimal::ZERO));
        }

        let weighted = mul_down(amount, distribution_weighter)?;
        let share = if weighted >= mp_borrowed {
            earnings_unassigned
        } else {
            mul_div_down(earnings_unassigned, weighted, mp_borrowed)?
        };

        let sp_fee = if sp_supplied > Decimal::ZERO {
            mul_down(share, self.smart_pool_fee_rate)?
        } else {
            Decimal::ZERO
        };

        Ok((share - sp_fee, sp_fee))
    }
}

impl Default for InterestRateModel {
    fn default() -> Self {
        Self {
            params: CurveParameters::default(),
            smart_pool_fee_rate: dec!(0.1),
            version: 0,
            effective_from: 0,
        }
    }
}

fn validate_fee_rate(fee_rate: Decimal) -> Result<()> {
    if fee_rate < Decimal::ZERO || fee_rate > Decimal::ONE {
        return Err(LedgerError::InvalidParameters(format!(
            "smart pool fee rate {} must lie in [0, 1]",
            fee_rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_curve() -> CurveParameters {
        CurveParameters::new(dec!(0.0495), dec!(-0.025), dec!(1.1), Decimal::ZERO).unwrap()
    }

    #[test]
    fn test_scenario_yearly_rates() {
        let curve = scenario_curve();
        assert_eq!(curve.yearly_rate(dec!(0)).unwrap(), dec!(0.02));
        assert_eq!(curve.yearly_rate(dec!(0.8)).unwrap(), dec!(0.14));
        assert_eq!(curve.yearly_rate(dec!(0.9)).unwrap(), dec!(0.2225));
        assert_eq!(curve.yearly_rate(dec!(1.0)).unwrap(), dec!(0.47));
    }

    #[test]
    fn test_calibration_solves_scenario_coefficients() {
        let curve =
            CurveParameters::calibrate(dec!(0.8), dec!(1.1), dec!(0.02), dec!(0.14), Decimal::ZERO)
                .unwrap();
        assert_eq!(curve.a, dec!(0.0495));
        assert_eq!(curve.b, dec!(-0.025));
    }

    #[test]
    fn test_rejects_malformed_curves() {
        assert!(matches!(
            CurveParameters::new(dec!(0), dec!(0.01), dec!(1.1), Decimal::ZERO),
            Err(LedgerError::InvalidParameters(_))
        ));
        assert!(matches!(
            CurveParameters::new(dec!(0.05), dec!(0.01), dec!(0), Decimal::ZERO),
            Err(LedgerError::InvalidParameters(_))
        ));
        // R(0) = 0.0495 / 1.1 - 0.1 < 0
        assert!(matches!(
            CurveParameters::new(dec!(0.0495), dec!(-0.1), dec!(1.1), Decimal::ZERO),
            Err(LedgerError::InvalidParameters(_))
        ));
        assert!(matches!(
            CurveParameters::new(dec!(0.0495), dec!(-0.025), dec!(1.1), dec!(-1)),
            Err(LedgerError::InvalidParameters(_))
        ));
        assert!(matches!(
            CurveParameters::calibrate(dec!(1.2), dec!(1.1), dec!(0.02), dec!(0.14), Decimal::ZERO),
            Err(LedgerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_utilization_at_or_above_max() {
        let model = InterestRateModel::new(scenario_curve(), dec!(0.1)).unwrap();
        assert_eq!(
            model.rate_to_borrow(100, 0, dec!(110), dec!(100), dec!(0)),
            Err(LedgerError::InsufficientProtocolLiquidity)
        );
        assert_eq!(
            model.rate_to_borrow(100, 0, dec!(1), dec!(0), dec!(0)),
            Err(LedgerError::InsufficientProtocolLiquidity)
        );
    }

    #[test]
    fn test_time_difference() {
        let model = InterestRateModel::new(scenario_curve(), dec!(0.1)).unwrap();
        assert_eq!(
            model.rate_to_borrow(100, 100, dec!(1), dec!(10), dec!(0)),
            Err(LedgerError::InvalidTimeDifference {
                target: 100,
                from: 100
            })
        );
    }

    #[test]
    fn test_rate_scales_with_time() {
        let model = InterestRateModel::new(scenario_curve(), dec!(0.1)).unwrap();
        let full_year = model
            .rate_to_borrow(SECONDS_PER_YEAR, 0, dec!(80), dec!(100), dec!(0))
            .unwrap();
        assert_eq!(full_year, dec!(0.14));

        let half_year = model
            .rate_to_borrow(SECONDS_PER_YEAR / 2, 0, dec!(80), dec!(100), dec!(0))
            .unwrap();
        assert_eq!(half_year, dec!(0.07));
    }

    #[test]
    fn test_yield_for_deposit_scenarios() {
        let model = InterestRateModel::default();
        assert_eq!(
            model
                .yield_for_deposit(dec!(100), dec!(100), dec!(100), dec!(100), dec!(1))
                .unwrap(),
            (dec!(90), dec!(10))
        );
        assert_eq!(
            model
                .yield_for_deposit(dec!(100), dec!(200), dec!(100), dec!(100), dec!(1))
                .unwrap(),
            (dec!(45), dec!(5))
        );
    }

    #[test]
    fn test_yield_for_deposit_zero_cases() {
        let model = InterestRateModel::default();
        let zero = (Decimal::ZERO, Decimal::ZERO);
        assert_eq!(
            model
                .yield_for_deposit(dec!(0), dec!(0), dec!(100), dec!(100), dec!(1))
                .unwrap(),
            zero
        );
        assert_eq!(
            model
                .yield_for_deposit(dec!(100), dec!(100), dec!(0), dec!(100), dec!(1))
                .unwrap(),
            zero
        );
        // Without smart pool capital the depositor keeps the whole share
        assert_eq!(
            model
                .yield_for_deposit(dec!(0), dec!(100), dec!(100), dec!(50), dec!(1))
                .unwrap(),
            (dec!(50), dec!(0))
        );
    }

    #[test]
    fn test_large_earnings_share_never_rounds_up() {
        let model = InterestRateModel::default();
        let (earned, sp_fee) = model
            .yield_for_deposit(dec!(0), dec!(3), dec!(200000000000), dec!(1), dec!(1))
            .unwrap();
        assert_eq!(earned, dec!(66666666666.666666666666666666));
        assert_eq!(sp_fee, Decimal::ZERO);
    }

    #[test]
    fn test_distribution_weighter() {
        let model = InterestRateModel::default();
        let (boosted, _) = model
            .yield_for_deposit(dec!(100), dec!(200), dec!(100), dec!(50), dec!(2))
            .unwrap();
        let (plain, _) = model
            .yield_for_deposit(dec!(100), dec!(200), dec!(100), dec!(50), dec!(1))
            .unwrap();
        assert_eq!(boosted, dec!(45));
        assert_eq!(plain, dec!(22.5));
    }

    #[test]
    fn test_versioned_updates() {
        let mut model = InterestRateModel::default();
        model.set_penalty_rate(dec!(0.000001), 500).unwrap();
        assert_eq!(model.version(), 1);
        assert_eq!(model.effective_from(), 500);
        assert_eq!(model.penalty_rate(), dec!(0.000001));
        assert_eq!(
            model.parameters_version(),
            ParametersVersion {
                version: 1,
                effective_from: 500
            }
        );

        assert!(model.set_smart_pool_fee_rate(dec!(1.5), 600).is_err());
        assert_eq!(model.version(), 1);
    }
}
