use axum::{response::IntoResponse, Json};
use serde::Deserialize;

use crate::domain::cart::{self, CartItem, ItemType};
use crate::domain::money::{Currency, Money};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct CartItemBody {
    pub vendor_id: String,
    pub item_type: ItemType,
    pub amount_minor: i64,
}

#[derive(Deserialize)]
pub struct CreateCartBody {
    pub user_id: String,
    pub currency: String,
    pub items: Vec<CartItemBody>,
}

/// POST /cart/create: group items by vendor and total the cart.
pub async fn create_cart(
    Json(body): Json<CreateCartBody>,
) -> Result<impl IntoResponse, AppError> {
    let currency = Currency::parse(&body.currency)?;
    let items: Vec<CartItem> = body
        .items
        .into_iter()
        .map(|item| CartItem {
            vendor_id: item.vendor_id,
            item_type: item.item_type,
            price: Money::new(item.amount_minor, currency.clone()),
        })
        .collect();

    let cart = cart::create_cart(&body.user_id, items)?;
    Ok(Json(cart))
}

#[derive(Deserialize)]
pub struct MarkupBody {
    pub amount_minor: i64,
    pub currency: String,
    pub item_type: ItemType,
}

/// POST /cart/markup: apply the category markup to a vendor base price.
pub async fn markup(Json(body): Json<MarkupBody>) -> Result<impl IntoResponse, AppError> {
    let currency = Currency::parse(&body.currency)?;
    let base_price = Money::new(body.amount_minor, currency);

    Ok(Json(cart::vendor_markup(&base_price, body.item_type)))
}
