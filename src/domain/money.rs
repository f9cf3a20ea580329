//! Monetary amounts as fixed-point minor-unit integers.
//! All stored amounts are i64 minor units; BigDecimal appears only for
//! FX rates and fee percents, never for stored balances.

use bigdecimal::{BigDecimal, One, Signed, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registered currency codes and their minor-unit exponents.
/// Codes absent from this table are rejected at the boundary.
const CURRENCY_REGISTRY: &[(&str, u32)] = &[
    ("USD", 2),
    ("EUR", 2),
    ("GBP", 2),
    ("CAD", 2),
    ("NGN", 2),
    ("GHS", 2),
    ("KES", 2),
    ("ZAR", 2),
    ("JPY", 0),
    ("UGX", 0),
    ("XOF", 0),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("FX snapshot does not cover conversion from {from} to {to}")]
    SnapshotMismatch { from: String, to: String },

    #[error("Converted amount overflows minor-unit storage")]
    Overflow,
}

/// A validated ISO-4217-style currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, MoneyError> {
        let upper = code.trim().to_ascii_uppercase();
        if CURRENCY_REGISTRY.iter().any(|(c, _)| *c == upper) {
            Ok(Currency(upper))
        } else {
            Err(MoneyError::UnknownCurrency(code.to_string()))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Number of decimal places in the currency's minor unit.
    pub fn minor_unit_exponent(&self) -> u32 {
        CURRENCY_REGISTRY
            .iter()
            .find(|(c, _)| *c == self.0)
            .map(|(_, e)| *e)
            .unwrap_or(2)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A whole number of minor units in a single currency.
/// Negative values are reserved for refunds and adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount_minor: i64, currency: Currency) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub fn is_negative(&self) -> bool {
        self.amount_minor < 0
    }

    /// Ensures `other` carries the same currency before arithmetic.
    pub fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: other.currency.code().to_string(),
            })
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount_minor, self.currency)
    }
}

/// Mid-market rate captured when a transaction is priced.
/// Immutable once attached; never recomputed retroactively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxSnapshot {
    pub transaction_currency: Currency,
    pub base_currency: Currency,
    pub mid_market_rate: BigDecimal,
    pub captured_at: DateTime<Utc>,
}

impl FxSnapshot {
    pub fn capture(
        transaction_currency: Currency,
        base_currency: Currency,
        mid_market_rate: BigDecimal,
    ) -> Self {
        Self {
            transaction_currency,
            base_currency,
            mid_market_rate,
            captured_at: Utc::now(),
        }
    }
}

/// Stores an amount verbatim in minor units together with its FX snapshot.
/// No conversion happens on write; display-time conversion uses `convert`.
pub fn record(
    amount_minor: i64,
    currency: &str,
    base_currency: &str,
    mid_market_rate: BigDecimal,
) -> Result<(Money, FxSnapshot), MoneyError> {
    let currency = Currency::parse(currency)?;
    let base = Currency::parse(base_currency)?;
    let fx = FxSnapshot::capture(currency.clone(), base, mid_market_rate);
    Ok((Money::new(amount_minor, currency), fx))
}

/// Converts using the snapshot's stored rate, rounding half-away-from-zero
/// to the target currency's minor-unit precision.
pub fn convert(money: &Money, target: &Currency, fx: &FxSnapshot) -> Result<Money, MoneyError> {
    if fx.transaction_currency != money.currency || fx.base_currency != *target {
        return Err(MoneyError::SnapshotMismatch {
            from: money.currency.code().to_string(),
            to: target.code().to_string(),
        });
    }

    let src_exp = money.currency.minor_unit_exponent() as i64;
    let tgt_exp = target.minor_unit_exponent() as i64;

    // minor(src) -> major(src) -> major(tgt) -> minor(tgt), all in one
    // BigDecimal expression so no intermediate rounding occurs.
    let mut value = BigDecimal::from(money.amount_minor) * &fx.mid_market_rate;
    let shift = tgt_exp - src_exp;
    value = shift_decimal(value, shift);

    let rounded = round_half_away_from_zero(&value);
    let amount = rounded.to_i64().ok_or(MoneyError::Overflow)?;
    Ok(Money::new(amount, target.clone()))
}

fn shift_decimal(value: BigDecimal, shift: i64) -> BigDecimal {
    match shift.cmp(&0) {
        std::cmp::Ordering::Equal => value,
        std::cmp::Ordering::Greater => value * BigDecimal::from(10_i64.pow(shift as u32)),
        std::cmp::Ordering::Less => value / BigDecimal::from(10_i64.pow((-shift) as u32)),
    }
}

/// Rounds to an integer, half-away-from-zero. `with_scale(0)` truncates
/// toward zero, so the half-unit fraction is checked explicitly.
fn round_half_away_from_zero(value: &BigDecimal) -> BigDecimal {
    let truncated = value.with_scale(0);
    let fraction = value - &truncated;
    if &fraction.abs() * BigDecimal::from(2) >= BigDecimal::one() {
        if value.is_negative() {
            truncated - BigDecimal::one()
        } else {
            truncated + BigDecimal::one()
        }
    } else {
        truncated
    }
}

/// `floor(amount * percent / 100)` on minor units, truncating toward zero.
/// Used for every proportional fee so the platform never overcharges.
pub fn proportional_fee(amount_minor: i64, percent: &BigDecimal) -> i64 {
    let value = BigDecimal::from(amount_minor) * percent / BigDecimal::from(100);
    value.with_scale(0).to_i64().unwrap_or(0)
}

/// `floor(amount * rate)` on minor units, truncating toward zero.
pub fn rated_fee(amount_minor: i64, rate: &BigDecimal) -> i64 {
    let value = BigDecimal::from(amount_minor) * rate;
    value.with_scale(0).to_i64().unwrap_or(0)
}
