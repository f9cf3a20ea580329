//! Split ledger: per-vendor payout math for a multi-vendor charge, and
//! refunds net of non-refundable fees. Minor-unit integer arithmetic only.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::{proportional_fee, Money};
use super::routing::GatewayId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("Gateway {0} has no configured split strategy")]
    UnsupportedGateway(GatewayId),

    #[error("Refund of {requested} minor units exceeds original charge of {charged}")]
    OverRefund { requested: i64, charged: i64 },

    #[error("Line items must share one currency, found {0} and {1}")]
    MixedCurrencies(String, String),

    #[error("Platform fee percent {0} is outside 0..=100")]
    InvalidFeePercent(String),
}

/// One vendor's share of a customer charge. Net/fee split is derived,
/// not stored redundantly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorLineItem {
    pub vendor_id: String,
    pub gross_amount: Money,
    pub platform_fee_percent: BigDecimal,
}

/// Derived payout for one line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPayout {
    pub vendor_id: String,
    pub strategy: SplitStrategy,
    pub payout: Money,
    pub platform_fee: Money,
}

/// How a gateway moves money to sub-merchants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    ConnectTransfer,
    Subaccount,
    AdaptivePayout,
}

/// Split strategy per gateway. Paystack has no sub-merchant transfer
/// support, so splitting through it is a business-rule violation.
pub fn strategy_for(gateway: GatewayId) -> Option<SplitStrategy> {
    match gateway {
        GatewayId::Stripe => Some(SplitStrategy::ConnectTransfer),
        GatewayId::Flutterwave => Some(SplitStrategy::Subaccount),
        GatewayId::Paypal => Some(SplitStrategy::AdaptivePayout),
        GatewayId::Paystack => None,
    }
}

/// Computes per-vendor payouts. The platform fee is floored first and the
/// payout derived by subtraction, so `sum(payout) + sum(fee)` always equals
/// `sum(gross)` exactly.
pub fn split_charge(
    items: &[VendorLineItem],
    gateway: GatewayId,
) -> Result<Vec<VendorPayout>, SplitError> {
    let strategy = strategy_for(gateway).ok_or(SplitError::UnsupportedGateway(gateway))?;

    if let Some(first) = items.first() {
        for item in items {
            if item.gross_amount.currency != first.gross_amount.currency {
                return Err(SplitError::MixedCurrencies(
                    first.gross_amount.currency.code().to_string(),
                    item.gross_amount.currency.code().to_string(),
                ));
            }
        }
    }

    items
        .iter()
        .map(|item| {
            validate_percent(&item.platform_fee_percent)?;
            let currency = item.gross_amount.currency.clone();
            let fee = proportional_fee(item.gross_amount.amount_minor, &item.platform_fee_percent);
            let payout = item.gross_amount.amount_minor - fee;
            Ok(VendorPayout {
                vendor_id: item.vendor_id.clone(),
                strategy,
                payout: Money::new(payout, currency.clone()),
                platform_fee: Money::new(fee, currency),
            })
        })
        .collect()
}

fn validate_percent(percent: &BigDecimal) -> Result<(), SplitError> {
    if *percent < BigDecimal::from(0) || *percent > BigDecimal::from(100) {
        return Err(SplitError::InvalidFeePercent(percent.to_string()));
    }
    Ok(())
}

/// Outcome of a refund request for one charged item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub refunded_amount: Money,
    pub non_refundable_fee: Money,
}

/// Refund net of the non-refundable fee, clamped at zero. Refunding more
/// than was originally charged is rejected outright.
pub fn refund(
    original_charge: &Money,
    refund_amount: &Money,
    non_refundable_fee: &Money,
) -> Result<RefundResult, SplitError> {
    if refund_amount.amount_minor > original_charge.amount_minor {
        return Err(SplitError::OverRefund {
            requested: refund_amount.amount_minor,
            charged: original_charge.amount_minor,
        });
    }

    let net = (refund_amount.amount_minor - non_refundable_fee.amount_minor).max(0);
    Ok(RefundResult {
        refunded_amount: Money::new(net, refund_amount.currency.clone()),
        non_refundable_fee: non_refundable_fee.clone(),
    })
}
