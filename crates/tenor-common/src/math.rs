//! Fixed-point helpers
//!
//! All ledger quantities carry 18 fractional digits. Products and quotients are
//! truncated toward zero unless a helper says otherwise.
//!
//! `Decimal` arithmetic rounds its last representable digit, which for large
//! magnitudes is the 18th fractional one, so products and quotients are
//! computed here on the raw mantissas with a 256-bit intermediate and
//! truncated exactly.

use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};

/// Fractional digits kept by every ledger quantity
pub const WAD_DECIMALS: u32 = 18;

/// Largest mantissa a `Decimal` can hold (2^96 - 1)
const MAX_MANTISSA: u128 = (1 << 96) - 1;

/// `a + b`, failing instead of panicking past the `Decimal` range
#[inline]
pub fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or(LedgerError::MathOverflow)
}

/// Checked sum of `values`
pub fn sum<I>(values: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, add)
}

/// `a * b`, truncated
pub fn mul_down(a: Decimal, b: Decimal) -> Result<Decimal> {
    mul_div_down(a, b, Decimal::ONE)
}

/// `a / b`, truncated
pub fn div_down(a: Decimal, b: Decimal) -> Result<Decimal> {
    mul_div_down(a, Decimal::ONE, b)
}

/// `a * b / c`, truncated once at the end
pub fn mul_div_down(a: Decimal, b: Decimal, c: Decimal) -> Result<Decimal> {
    let quotient = Quotient::of(a, b, c)?;
    quotient.with_magnitude(quotient.magnitude)
}

/// `a * b / c`, rounded away from zero.
///
/// Used where rounding must favor the protocol (shares burned on withdrawal).
pub fn mul_div_up(a: Decimal, b: Decimal, c: Decimal) -> Result<Decimal> {
    let quotient = Quotient::of(a, b, c)?;
    let magnitude = if quotient.inexact {
        quotient
            .magnitude
            .checked_add(1)
            .filter(|m| *m <= MAX_MANTISSA)
            .ok_or(LedgerError::MathOverflow)?
    } else {
        quotient.magnitude
    };
    quotient.with_magnitude(magnitude)
}

/// Subtraction that refuses to go below zero
pub fn sub_floor(a: Decimal, b: Decimal) -> Decimal {
    (a - b).max(Decimal::ZERO)
}

/// Truncated `|a * b / c|` at the finest scale up to 18 that fits a mantissa
struct Quotient {
    magnitude: u128,
    scale: u32,
    negative: bool,
    /// A nonzero remainder was dropped
    inexact: bool,
}

impl Quotient {
    fn of(a: Decimal, b: Decimal, c: Decimal) -> Result<Self> {
        if c.is_zero() {
            return Err(LedgerError::MathOverflow);
        }
        let negative = a.is_sign_negative() ^ b.is_sign_negative() ^ c.is_sign_negative();
        let divisor = c.mantissa().unsigned_abs();
        let product = U256::mul(a.mantissa().unsigned_abs(), b.mantissa().unsigned_abs());
        let (quotient, remainder) = product.div_rem(divisor);

        let mut scale = i64::from(a.scale()) + i64::from(b.scale()) - i64::from(c.scale());
        let mut inexact = remainder != 0;
        let wad = i64::from(WAD_DECIMALS);

        let magnitude = if scale > wad || quotient.exceeds(MAX_MANTISSA) {
            // Drop fractional digits until the value fits
            let mut quotient = quotient;
            while scale > wad || (quotient.exceeds(MAX_MANTISSA) && scale > 0) {
                let (next, digit) = quotient.div_rem(10);
                inexact |= digit != 0;
                quotient = next;
                scale -= 1;
            }
            if quotient.exceeds(MAX_MANTISSA) {
                return Err(LedgerError::MathOverflow);
            }
            quotient.lo
        } else {
            // Long division for the remaining fractional digits
            let mut magnitude = quotient.lo;
            let mut remainder = remainder;
            while scale < wad {
                let shifted = remainder * 10;
                let next = magnitude * 10 + shifted / divisor;
                if next > MAX_MANTISSA {
                    break;
                }
                magnitude = next;
                remainder = shifted % divisor;
                scale += 1;
            }
            inexact = remainder != 0;
            magnitude
        };

        if scale < 0 {
            return Err(LedgerError::MathOverflow);
        }
        Ok(Self {
            magnitude,
            scale: scale as u32,
            negative,
            inexact,
        })
    }

    fn with_magnitude(&self, magnitude: u128) -> Result<Decimal> {
        if magnitude == 0 {
            return Ok(Decimal::ZERO);
        }
        let signed = if self.negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Decimal::try_from_i128_with_scale(signed, self.scale)
            .map(|value| value.normalize())
            .map_err(|_| LedgerError::MathOverflow)
    }
}

/// Unsigned 256-bit integer, just wide enough for a product of two mantissas
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct U256 {
    hi: u128,
    lo: u128,
}

impl U256 {
    /// Full product of two values below 2^96
    fn mul(a: u128, b: u128) -> Self {
        const LOW: u128 = u64::MAX as u128;
        let (a1, a0) = (a >> 64, a & LOW);
        let (b1, b0) = (b >> 64, b & LOW);
        let cross = a0 * b1 + a1 * b0;
        let (lo, carry) = (a0 * b0).overflowing_add(cross << 64);
        Self {
            hi: a1 * b1 + (cross >> 64) + u128::from(carry),
            lo,
        }
    }

    fn bit(&self, index: u32) -> u128 {
        if index >= 128 {
            (self.hi >> (index - 128)) & 1
        } else {
            (self.lo >> index) & 1
        }
    }

    fn set_bit(&mut self, index: u32) {
        if index >= 128 {
            self.hi |= 1 << (index - 128);
        } else {
            self.lo |= 1 << index;
        }
    }

    /// Shift-subtract division by a divisor below 2^127
    fn div_rem(self, divisor: u128) -> (Self, u128) {
        let mut quotient = Self::default();
        let mut remainder = 0u128;
        for index in (0..256).rev() {
            remainder = (remainder << 1) | self.bit(index);
            if remainder >= divisor {
                remainder -= divisor;
                quotient.set_bit(index);
            }
        }
        (quotient, remainder)
    }

    fn exceeds(&self, limit: u128) -> bool {
        self.hi != 0 || self.lo > limit
    }
}
