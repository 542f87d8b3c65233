use shared::{
    error::{ApiError, ErrorCode},
    protocol::{CatalogLoadSummary, CatalogRow},
};
use storage::MenuRowInsert;

use crate::{store_error, ApiContext};

pub const FALLBACK_GROUP: &str = "Misc";
pub const FALLBACK_CATEGORY: &str = "General";

/// Bulk catalog load: upsert the restaurant, then atomically replace its
/// whole menu tree with the normalized rows.
pub async fn load_catalog(
    ctx: &ApiContext,
    name: &str,
    description: Option<&str>,
    rows: &[CatalogRow],
) -> Result<CatalogLoadSummary, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "restaurant name cannot be empty",
        ));
    }

    let inserts = rows
        .iter()
        .map(normalize_row)
        .collect::<Result<Vec<_>, _>>()?;

    let restaurant_id = ctx
        .storage
        .upsert_restaurant(name, description)
        .await
        .map_err(store_error)?;
    let (groups, categories, items) = ctx
        .storage
        .replace_catalog(restaurant_id, &inserts)
        .await
        .map_err(store_error)?;

    tracing::info!(restaurant = name, groups, categories, items, "catalog replaced");

    Ok(CatalogLoadSummary {
        restaurant_id,
        groups,
        categories,
        items,
    })
}

fn normalize_row(row: &CatalogRow) -> Result<MenuRowInsert, ApiError> {
    let name = row.item_name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "catalog row is missing an item name",
        ));
    }

    Ok(MenuRowInsert {
        group: labelled(&row.group, FALLBACK_GROUP),
        category: labelled(&row.category, FALLBACK_CATEGORY),
        name: name.to_string(),
        composition: row.composition.trim().to_string(),
        weight: row.weight.trim().to_string(),
        calories: non_negative(row.calories),
        proteins: non_negative(row.proteins),
        fats: non_negative(row.fats),
        carbohydrates: non_negative(row.carbohydrates),
        price: non_negative(row.price),
    })
}

fn labelled(raw: &Option<String>, fallback: &str) -> String {
    raw.as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_row(name: &str) -> CatalogRow {
        CatalogRow {
            group: None,
            category: None,
            item_name: name.to_string(),
            composition: String::new(),
            weight: String::new(),
            calories: 0.0,
            proteins: 0.0,
            fats: 0.0,
            carbohydrates: 0.0,
            price: 0.0,
        }
    }

    #[test]
    fn missing_labels_fall_back_to_fixed_names() {
        let normalized = normalize_row(&bare_row("Tea")).expect("row");
        assert_eq!(normalized.group, FALLBACK_GROUP);
        assert_eq!(normalized.category, FALLBACK_CATEGORY);

        let mut blank = bare_row("Tea");
        blank.group = Some("   ".to_string());
        let normalized = normalize_row(&blank).expect("row");
        assert_eq!(normalized.group, FALLBACK_GROUP);
    }

    #[test]
    fn negative_numbers_are_clamped_to_zero() {
        let mut row = bare_row("Tea");
        row.calories = -50.0;
        row.price = -1.0;
        let normalized = normalize_row(&row).expect("row");
        assert_eq!(normalized.calories, 0.0);
        assert_eq!(normalized.price, 0.0);
    }

    #[test]
    fn rows_without_an_item_name_are_rejected() {
        let err = normalize_row(&bare_row("  ")).expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::Validation));
    }
}
