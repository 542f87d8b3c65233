use chrono::{Duration, Utc};
use shared::{
    error::ApiError,
    protocol::{ExportRow, StatsSummary},
};
use storage::OrderHistoryRow;

use crate::{store_error, ApiContext};

const UNKNOWN: &str = "unknown";

/// Totals over a trailing window. `None` days means all time; `None`
/// result means no orders matched, so there is nothing to average.
pub async fn aggregate(
    ctx: &ApiContext,
    external_id: i64,
    window_days: Option<i64>,
) -> Result<Option<StatsSummary>, ApiError> {
    let rows = history(ctx, external_id, window_days).await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let orders = rows.len();
    // Spend is the sum of per-order fixed prices; quantity is not
    // multiplied in. Every shipped flow records quantity 1, so revisit
    // this rule before quantity ever becomes configurable.
    let total_spend: f64 = rows.iter().map(|r| r.fixed_price).sum();
    let total_calories: f64 = rows.iter().map(|r| r.calories.unwrap_or(0.0)).sum();
    let average_spend = (total_spend / orders as f64) as i64;

    Ok(Some(StatsSummary {
        orders,
        total_spend,
        total_calories,
        average_spend,
    }))
}

/// One export row per order in the window, newest first. Broken catalog
/// links degrade to a placeholder instead of failing the export.
pub async fn export_rows(
    ctx: &ApiContext,
    external_id: i64,
    window_days: Option<i64>,
) -> Result<Vec<ExportRow>, ApiError> {
    let rows = history(ctx, external_id, window_days).await?;
    Ok(rows
        .into_iter()
        .map(|row| ExportRow {
            created: row.created,
            restaurant: row.restaurant_name.unwrap_or_else(|| UNKNOWN.to_string()),
            category: row.category_name.unwrap_or_else(|| UNKNOWN.to_string()),
            item: row.item_name.unwrap_or_else(|| UNKNOWN.to_string()),
            price: row.fixed_price,
            calories: row.calories.unwrap_or(0.0),
            proteins: row.proteins.unwrap_or(0.0),
            fats: row.fats.unwrap_or(0.0),
            carbohydrates: row.carbohydrates.unwrap_or(0.0),
        })
        .collect())
}

async fn history(
    ctx: &ApiContext,
    external_id: i64,
    window_days: Option<i64>,
) -> Result<Vec<OrderHistoryRow>, ApiError> {
    let Some(user_id) = ctx
        .storage
        .find_user(external_id)
        .await
        .map_err(store_error)?
    else {
        return Ok(Vec::new());
    };
    let since = window_days.map(|days| Utc::now() - Duration::days(days));
    ctx.storage
        .list_orders_since(user_id, since)
        .await
        .map_err(store_error)
}

#[cfg(test)]
#[path = "tests/stats_tests.rs"]
mod tests;
