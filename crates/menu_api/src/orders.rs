use chrono::NaiveDate;
use shared::{
    domain::{ItemId, OrderId},
    error::{ApiError, ErrorCode},
    protocol::OrderReceipt,
};
use storage::OrderWithItem;

use crate::{store_error, ApiContext};

#[derive(Debug, Clone)]
pub struct DayOrders {
    pub orders: Vec<OrderWithItem>,
    pub total_spend: f64,
    pub total_calories: f64,
}

/// Records one order line with the item's current price frozen in.
/// Deliberately not idempotent: a repeated tap means a repeated order.
pub async fn place_order(
    ctx: &ApiContext,
    external_id: i64,
    display_name: Option<&str>,
    item_id: ItemId,
    quantity: i64,
) -> Result<OrderReceipt, ApiError> {
    let detail = ctx
        .storage
        .find_item(item_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "item is no longer available"))?;

    let user_id = ctx
        .storage
        .find_or_create_user(external_id, display_name)
        .await
        .map_err(store_error)?;
    let order_id = ctx
        .storage
        .insert_order(user_id, item_id, quantity, detail.item.price)
        .await
        .map_err(store_error)?;

    Ok(OrderReceipt {
        order_id,
        item_name: detail.item.name,
        fixed_price: detail.item.price,
    })
}

pub async fn list_today(
    ctx: &ApiContext,
    external_id: i64,
    day: NaiveDate,
) -> Result<DayOrders, ApiError> {
    let Some(user_id) = ctx
        .storage
        .find_user(external_id)
        .await
        .map_err(store_error)?
    else {
        return Ok(DayOrders {
            orders: Vec::new(),
            total_spend: 0.0,
            total_calories: 0.0,
        });
    };

    let orders = ctx
        .storage
        .list_orders_for_day(user_id, day)
        .await
        .map_err(store_error)?;
    let total_spend = orders.iter().map(|o| o.fixed_price).sum();
    let total_calories = orders
        .iter()
        .map(|o| o.item.as_ref().map(|i| i.calories).unwrap_or(0.0))
        .sum();

    Ok(DayOrders {
        orders,
        total_spend,
        total_calories,
    })
}

/// Unconditional delete by id. Ownership is not checked at this layer;
/// callers only surface delete affordances for the requesting user's
/// own orders.
pub async fn delete_order(ctx: &ApiContext, order_id: OrderId) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .delete_order(order_id)
        .await
        .map_err(store_error)?;
    if !deleted {
        return Err(ApiError::new(ErrorCode::NotFound, "order not found"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/orders_tests.rs"]
mod tests;
