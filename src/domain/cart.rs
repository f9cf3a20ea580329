//! Multi-vendor cart: groups line items per vendor ahead of a split charge,
//! and applies category markup to vendor base prices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::money::{proportional_fee, Money};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Cart requires at least one item")]
    Empty,

    #[error("Cart items must share one currency, found {0} and {1}")]
    MixedCurrencies(String, String),
}

/// Bookable inventory categories sold on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Flight,
    Hotel,
    Car,
    Activity,
    Shuttle,
}

impl ItemType {
    /// Platform markup percent per category.
    pub fn markup_percent(&self) -> i64 {
        match self {
            ItemType::Flight => 8,
            ItemType::Hotel => 12,
            ItemType::Car => 15,
            ItemType::Activity => 20,
            ItemType::Shuttle => 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub vendor_id: String,
    pub item_type: ItemType,
    pub price: Money,
}

/// A grouped cart. Vendor groups live in a BTreeMap so payout ordering is
/// deterministic run to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub cart_id: Uuid,
    pub user_id: String,
    pub vendor_groups: BTreeMap<String, Vec<CartItem>>,
    pub item_count: usize,
    pub total_price: Money,
}

/// Groups items by vendor in one pass and totals the cart.
pub fn create_cart(user_id: &str, items: Vec<CartItem>) -> Result<Cart, CartError> {
    let first = items.first().ok_or(CartError::Empty)?;
    let currency = first.price.currency.clone();

    for item in &items {
        if item.price.currency != currency {
            return Err(CartError::MixedCurrencies(
                currency.code().to_string(),
                item.price.currency.code().to_string(),
            ));
        }
    }

    let item_count = items.len();
    let total: i64 = items.iter().map(|i| i.price.amount_minor).sum();

    let mut vendor_groups: BTreeMap<String, Vec<CartItem>> = BTreeMap::new();
    for item in items {
        vendor_groups
            .entry(item.vendor_id.clone())
            .or_default()
            .push(item);
    }

    Ok(Cart {
        cart_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        vendor_groups,
        item_count,
        total_price: Money::new(total, currency),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupResult {
    pub base_price: Money,
    pub markup: Money,
    pub total_price: Money,
}

/// Applies the category markup to a vendor base price, flooring the markup.
pub fn vendor_markup(base_price: &Money, item_type: ItemType) -> MarkupResult {
    let percent = bigdecimal::BigDecimal::from(item_type.markup_percent());
    let markup = proportional_fee(base_price.amount_minor, &percent);
    let currency = base_price.currency.clone();

    MarkupResult {
        base_price: base_price.clone(),
        markup: Money::new(markup, currency.clone()),
        total_price: Money::new(base_price.amount_minor + markup, currency),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;

    fn usd(amount: i64) -> Money {
        Money::new(amount, Currency::parse("USD").unwrap())
    }

    fn cart_item(vendor: &str, item_type: ItemType, price: i64) -> CartItem {
        CartItem {
            vendor_id: vendor.to_string(),
            item_type,
            price: usd(price),
        }
    }

    #[test]
    fn test_create_cart_groups_by_vendor() {
        let cart = create_cart(
            "user-1",
            vec![
                cart_item("zeta-air", ItemType::Flight, 50_000),
                cart_item("alpha-hotels", ItemType::Hotel, 30_000),
                cart_item("zeta-air", ItemType::Shuttle, 5_000),
            ],
        )
        .unwrap();

        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.total_price.amount_minor, 85_000);
        assert_eq!(cart.vendor_groups.len(), 2);
        assert_eq!(cart.vendor_groups["zeta-air"].len(), 2);

        // BTreeMap keys come back sorted regardless of insertion order.
        let vendors: Vec<&String> = cart.vendor_groups.keys().collect();
        assert_eq!(vendors, vec!["alpha-hotels", "zeta-air"]);
    }

    #[test]
    fn test_create_cart_rejects_empty() {
        assert_eq!(create_cart("user-1", vec![]).unwrap_err(), CartError::Empty);
    }

    #[test]
    fn test_create_cart_rejects_mixed_currencies() {
        let mut other = cart_item("v2", ItemType::Hotel, 100);
        other.price = Money::new(100, Currency::parse("NGN").unwrap());
        let err = create_cart(
            "user-1",
            vec![cart_item("v1", ItemType::Flight, 100), other],
        )
        .unwrap_err();
        assert!(matches!(err, CartError::MixedCurrencies(_, _)));
    }

    #[test]
    fn test_markup_per_category() {
        let result = vendor_markup(&usd(10_000), ItemType::Hotel);
        assert_eq!(result.markup.amount_minor, 1_200);
        assert_eq!(result.total_price.amount_minor, 11_200);

        let result = vendor_markup(&usd(999), ItemType::Flight);
        // 999 * 8% = 79.92, floored.
        assert_eq!(result.markup.amount_minor, 79);
    }
}
