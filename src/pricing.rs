// src/pricing.rs
//
// Resolves cart lines against the catalog and computes the raw order
// total. Variant prices win over the product price when a variant is
// given.

use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{self, NewOrderItem};
use crate::error::ShopError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product: Uuid,
    #[serde(default)]
    pub variant: Option<Uuid>,
    pub quantity: i32,
}

pub async fn resolve_items(pool: &PgPool, items: &[LineItem]) -> Result<Vec<NewOrderItem>, ShopError> {
    let mut resolved = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity <= 0 {
            return Err(ShopError::validation(format!(
                "invalid quantity for product {}",
                item.product
            )));
        }

        let product_price = db::get_product_price(pool, item.product)
            .await?
            .ok_or_else(|| ShopError::not_found(format!("product not found: {}", item.product)))?;

        let unit_price = match item.variant {
            Some(variant_id) => db::get_variant_price(pool, variant_id)
                .await?
                .ok_or_else(|| ShopError::not_found(format!("variant not found: {variant_id}")))?,
            None => product_price,
        };

        if unit_price < 0 {
            return Err(ShopError::validation("invalid price for product/variant"));
        }

        resolved.push(NewOrderItem {
            product_id: item.product,
            variant_id: item.variant,
            quantity: item.quantity,
            unit_price,
        });
    }

    if resolved.is_empty() {
        return Err(ShopError::validation("no valid products found in cart"));
    }

    Ok(resolved)
}

pub fn raw_amount(items: &[NewOrderItem]) -> i64 {
    items
        .iter()
        .map(|i| i.unit_price * i64::from(i.quantity))
        .sum()
}
