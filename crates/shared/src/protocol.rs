use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{OrderId, RestaurantId};

/// One row of a bulk catalog load, as handed over by the ingestion
/// collaborator. Numeric fields arrive as numbers or as numeric strings
/// (decimal commas included); anything unparseable collapses to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub item_name: String,
    #[serde(default)]
    pub composition: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default, deserialize_with = "flexible_number")]
    pub calories: f64,
    #[serde(default, deserialize_with = "flexible_number")]
    pub proteins: f64,
    #[serde(default, deserialize_with = "flexible_number")]
    pub fats: f64,
    #[serde(default, deserialize_with = "flexible_number")]
    pub carbohydrates: f64,
    #[serde(default, deserialize_with = "flexible_number")]
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn flexible_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrText::Number(value)) if value.is_finite() => value,
        Some(NumberOrText::Text(text)) => {
            text.trim().replace(',', ".").parse().unwrap_or(0.0)
        }
        _ => 0.0,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLoadSummary {
    pub restaurant_id: RestaurantId,
    pub groups: usize,
    pub categories: usize,
    pub items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub token: String,
}

/// What the chat adapter should put on screen: a text block, optional
/// button rows whose payloads are encoded tokens, and optionally a
/// document to fetch and forward. `ephemeral` marks alert-style notices
/// that should not replace the current view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Vec<Button>>,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

impl RenderPayload {
    pub fn screen(text: impl Into<String>, buttons: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            buttons,
            ephemeral: false,
            document: None,
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
            ephemeral: true,
            document: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub item_name: String,
    pub fixed_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    pub orders: usize,
    /// Sum of per-order fixed prices. Quantity is deliberately not
    /// multiplied in; every shipped flow records quantity 1.
    pub total_spend: f64,
    pub total_calories: f64,
    /// Integer-truncated spend per order.
    pub average_spend: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRow {
    pub created: DateTime<Utc>,
    pub restaurant: String,
    pub category: String,
    pub item: String,
    pub price: f64,
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_row_accepts_numeric_strings_with_commas() {
        let row: CatalogRow = serde_json::from_str(
            r#"{"item_name": "Borscht", "calories": "310,5", "price": 250}"#,
        )
        .expect("row");
        assert_eq!(row.calories, 310.5);
        assert_eq!(row.price, 250.0);
        assert_eq!(row.proteins, 0.0);
        assert!(row.group.is_none());
    }

    #[test]
    fn catalog_row_defaults_unparseable_numbers_to_zero() {
        let row: CatalogRow = serde_json::from_str(
            r#"{"item_name": "Tea", "calories": "n/a", "price": null}"#,
        )
        .expect("row");
        assert_eq!(row.calories, 0.0);
        assert_eq!(row.price, 0.0);
    }
}
