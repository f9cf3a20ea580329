//! Jurisdiction fee rules. Defaults cover the Nigerian corridor (CBN stamp
//! duty, VAT on platform commission); additional jurisdictions are added
//! here, not in the assessment code.

use std::str::FromStr;

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;

use crate::domain::compliance::JurisdictionRule;
use crate::domain::money::Currency;

/// Built-in rules, validated at startup.
pub fn default_rules() -> Result<Vec<JurisdictionRule>> {
    Ok(vec![JurisdictionRule {
        jurisdiction: "NG".to_string(),
        currency: Currency::parse("NGN").context("NGN missing from currency registry")?,
        // ₦50 flat duty on transactions strictly over ₦10,000, in kobo.
        stamp_duty_threshold_minor: 1_000_000,
        stamp_duty_flat_minor: 5_000,
        vat_rate: BigDecimal::from_str("0.075")?,
    }])
}

/// Looks up the rule for a jurisdiction code, case-insensitively.
pub fn rule_for<'a>(
    rules: &'a [JurisdictionRule],
    jurisdiction: &str,
) -> Option<&'a JurisdictionRule> {
    let code = jurisdiction.trim().to_ascii_uppercase();
    rules.iter().find(|r| r.jurisdiction == code)
}

/// Every rule must reference a registered currency and carry a sane VAT
/// rate; violations are configuration errors.
pub fn validate_rules(rules: &[JurisdictionRule]) -> Result<()> {
    for rule in rules {
        if rule.stamp_duty_threshold_minor < 0 || rule.stamp_duty_flat_minor < 0 {
            anyhow::bail!(
                "Jurisdiction {}: stamp duty amounts must be non-negative",
                rule.jurisdiction
            );
        }
        if rule.vat_rate < BigDecimal::from(0) || rule.vat_rate > BigDecimal::from(1) {
            anyhow::bail!(
                "Jurisdiction {}: VAT rate {} must be within 0..=1",
                rule.jurisdiction,
                rule.vat_rate
            );
        }
    }
    Ok(())
}
