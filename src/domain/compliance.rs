//! Jurisdiction compliance fee assessment.
//! Pure and deterministic: identical inputs always produce identical output.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::money::{proportional_fee, rated_fee, Currency, Money};

/// Fee rules for one jurisdiction, loaded from configuration at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionRule {
    /// ISO country code, e.g. "NG".
    pub jurisdiction: String,
    /// Currency the stamp-duty threshold is denominated in.
    pub currency: Currency,
    /// Stamp duty applies only strictly above this amount in minor units.
    pub stamp_duty_threshold_minor: i64,
    /// Flat stamp duty in minor units when the threshold is exceeded.
    pub stamp_duty_flat_minor: i64,
    /// VAT rate applied to the platform commission, e.g. 0.075.
    pub vat_rate: BigDecimal,
}

/// Breakdown attached to a transaction before capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAssessment {
    pub base_price: Money,
    pub platform_commission: Money,
    pub stamp_duty: Money,
    pub vat: Money,
    pub total: Money,
}

/// Assesses compliance fees for a charge in a given jurisdiction.
///
/// Commission and VAT truncate toward zero on minor units; stamp duty is a
/// flat fee gated on a strict threshold comparison. Zero for jurisdictions
/// whose currency does not match the charge currency.
pub fn assess(
    base_price: &Money,
    platform_commission_percent: &BigDecimal,
    rule: &JurisdictionRule,
) -> ComplianceAssessment {
    let currency = base_price.currency.clone();

    let commission = proportional_fee(base_price.amount_minor, platform_commission_percent);
    let stamp_duty = stamp_duty_for(base_price, rule);
    let vat = rated_fee(commission, &rule.vat_rate);

    let total = base_price.amount_minor + commission + stamp_duty + vat;

    ComplianceAssessment {
        base_price: base_price.clone(),
        platform_commission: Money::new(commission, currency.clone()),
        stamp_duty: Money::new(stamp_duty, currency.clone()),
        vat: Money::new(vat, currency.clone()),
        total: Money::new(total, currency),
    }
}

/// Flat stamp duty when the charge currency matches the rule currency and
/// the amount strictly exceeds the threshold. At or below: zero.
fn stamp_duty_for(base_price: &Money, rule: &JurisdictionRule) -> i64 {
    if base_price.currency != rule.currency {
        return 0;
    }
    if base_price.amount_minor > rule.stamp_duty_threshold_minor {
        rule.stamp_duty_flat_minor
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn nigeria() -> JurisdictionRule {
        JurisdictionRule {
            jurisdiction: "NG".to_string(),
            currency: Currency::parse("NGN").unwrap(),
            stamp_duty_threshold_minor: 1_000_000,
            stamp_duty_flat_minor: 5_000,
            vat_rate: BigDecimal::from_str("0.075").unwrap(),
        }
    }

    fn ngn_money(amount: i64) -> Money {
        Money::new(amount, Currency::parse("NGN").unwrap())
    }

    #[test]
    fn test_assessment_worked_example() {
        // ₦15,000 base, 10% commission, NG stamp duty and 7.5% VAT.
        let pct = BigDecimal::from(10);
        let out = assess(&ngn_money(1_500_000), &pct, &nigeria());

        assert_eq!(out.platform_commission.amount_minor, 150_000);
        assert_eq!(out.stamp_duty.amount_minor, 5_000);
        assert_eq!(out.vat.amount_minor, 11_250);
        assert_eq!(out.total.amount_minor, 1_666_250);
    }

    #[test]
    fn test_stamp_duty_threshold_is_strict() {
        let pct = BigDecimal::from(10);
        let at = assess(&ngn_money(1_000_000), &pct, &nigeria());
        assert_eq!(at.stamp_duty.amount_minor, 0);

        let above = assess(&ngn_money(1_000_001), &pct, &nigeria());
        assert_eq!(above.stamp_duty.amount_minor, 5_000);
    }

    #[test]
    fn test_no_stamp_duty_for_other_currency() {
        let pct = BigDecimal::from(10);
        let usd = Money::new(2_000_000, Currency::parse("USD").unwrap());
        let out = assess(&usd, &pct, &nigeria());
        assert_eq!(out.stamp_duty.amount_minor, 0);
    }

    #[test]
    fn test_assessment_is_idempotent() {
        let pct = BigDecimal::from_str("12.5").unwrap();
        let base = ngn_money(2_345_678);
        let first = assess(&base, &pct, &nigeria());
        let second = assess(&base, &pct, &nigeria());
        assert_eq!(first, second);
    }

    #[test]
    fn test_commission_and_vat_truncate() {
        // 999 * 12.5% = 124.875 -> 124; VAT 124 * 0.075 = 9.3 -> 9.
        let pct = BigDecimal::from_str("12.5").unwrap();
        let out = assess(&ngn_money(999), &pct, &nigeria());
        assert_eq!(out.platform_commission.amount_minor, 124);
        assert_eq!(out.vat.amount_minor, 9);
        assert_eq!(out.total.amount_minor, 999 + 124 + 9);
    }
}
