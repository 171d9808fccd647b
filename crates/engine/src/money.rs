use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub},
};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{Currency, arithmetic};

/// Signed money amount represented as integer **minor units**.
///
/// The value is signed:
/// - positive = deposit (credit column)
/// - negative = payment (debit column)
///
/// # Examples
///
/// ```rust
/// use grid_engine::{Currency, Money};
///
/// let amount = Money::new(-5_00);
/// assert_eq!(amount.format_major(Currency::Eur), "-5.00");
/// assert_eq!(amount.abs().format_major(Currency::Eur), "5.00");
/// ```
///
/// Parsing goes through the arithmetic evaluator, so expressions work too:
///
/// ```rust
/// use grid_engine::{Currency, Money};
///
/// assert_eq!(Money::parse_major("10", Currency::Eur).map(Money::minor), Some(1000));
/// assert_eq!(Money::parse_major("2 * 3.25", Currency::Eur).map(Money::minor), Some(650));
/// assert_eq!(Money::parse_major("10,5", Currency::Eur).map(Money::minor), Some(1050));
/// assert!(Money::parse_major("ten", Currency::Eur).is_none());
/// ```
///
/// The operators saturate at the `i64` bounds; use [`Money::checked_add`]
/// when overflow must be observed.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Formats the amount in major units without grouping, e.g. `"-1234.50"`.
    ///
    /// The output always re-parses to the same value with [`Money::parse_major`].
    #[must_use]
    pub fn format_major(self, currency: Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let digits = u32::from(currency.minor_units());
        if digits == 0 {
            return format!("{sign}{abs}");
        }
        let scale = 10u64.pow(digits);
        let major = abs / scale;
        let minor = abs % scale;
        format!("{sign}{major}.{minor:0width$}", width = digits as usize)
    }

    /// Evaluates `text` and converts the result to minor units.
    ///
    /// Extra decimals are rounded half away from zero. Malformed text yields
    /// `None`.
    #[must_use]
    pub fn parse_major(text: &str, currency: Currency) -> Option<Money> {
        let value = arithmetic::evaluate(text)?;
        Self::from_decimal(value, currency)
    }

    /// Parses debit text: the evaluated magnitude, negated.
    ///
    /// Negation happens before the range check, so the debit text of
    /// `i64::MIN` parses back to `i64::MIN`.
    #[must_use]
    pub fn parse_major_negated(text: &str, currency: Currency) -> Option<Money> {
        let value = arithmetic::evaluate(text)?;
        Self::from_decimal(-value, currency)
    }

    /// Formats `|self|` in major units, exact even for `i64::MIN`.
    #[must_use]
    pub fn format_magnitude(self, currency: Currency) -> String {
        let text = self.format_major(currency);
        match text.strip_prefix('-') {
            Some(magnitude) => magnitude.to_string(),
            None => text,
        }
    }

    /// Clamps a wide intermediate sum into range.
    #[must_use]
    pub fn saturating_from_i128(value: i128) -> Money {
        Money(i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX }))
    }

    fn from_decimal(value: Decimal, currency: Currency) -> Option<Money> {
        let scale = Decimal::from(10i64.pow(u32::from(currency.minor_units())));
        value
            .checked_mul(scale)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_major(Currency::default()))
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(self.0.saturating_neg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_major_units() {
        assert_eq!(Money::new(0).format_major(Currency::Eur), "0.00");
        assert_eq!(Money::new(1).format_major(Currency::Eur), "0.01");
        assert_eq!(Money::new(1050).format_major(Currency::Usd), "10.50");
        assert_eq!(Money::new(-123450).format_major(Currency::Eur), "-1234.50");
        assert_eq!(Money::new(1200).format_major(Currency::Jpy), "1200");
    }

    #[test]
    fn parse_rounds_to_minor_units() {
        assert_eq!(Money::parse_major("0.005", Currency::Eur), Some(Money::new(1)));
        assert_eq!(Money::parse_major("-0.005", Currency::Eur), Some(Money::new(-1)));
        assert_eq!(Money::parse_major("10 / 3", Currency::Eur), Some(Money::new(333)));
        assert_eq!(Money::parse_major("1.6", Currency::Jpy), Some(Money::new(2)));
    }

    #[test]
    fn format_then_parse_is_identity() {
        for minor in [0, 1, -1, 99, -100, 123_456, -9_876_543, i64::from(i32::MAX)] {
            let money = Money::new(minor);
            let text = money.format_major(Currency::Eur);
            assert_eq!(Money::parse_major(&text, Currency::Eur), Some(money), "{text}");
        }
    }

    #[test]
    fn extremes_format_and_parse_back() {
        let min = Money::new(i64::MIN);
        assert_eq!(min.format_magnitude(Currency::Eur), "92233720368547758.08");
        assert_eq!(
            Money::parse_major_negated(&min.format_magnitude(Currency::Eur), Currency::Eur),
            Some(min)
        );
        let max = Money::new(i64::MAX);
        assert_eq!(Money::parse_major(&max.format_major(Currency::Eur), Currency::Eur), Some(max));
        assert_eq!(Money::parse_major("92233720368547758.08", Currency::Eur), None);
    }

    #[test]
    fn operators_saturate() {
        let big = Money::new(i64::MAX - 1);
        assert_eq!(big + Money::new(10), Money::new(i64::MAX));
        assert_eq!(Money::new(i64::MIN) - Money::new(1), Money::new(i64::MIN));
        assert_eq!(-Money::new(i64::MIN), Money::new(i64::MAX));
        let mut total = big;
        total += big;
        assert_eq!(total, Money::new(i64::MAX));
        assert_eq!(Money::saturating_from_i128(i128::from(i64::MIN) * 3), Money::new(i64::MIN));
    }
}
