use super::*;
use crate::{catalog, orders, ItemPicker};
use shared::domain::ItemId;
use shared::protocol::CatalogRow;
use storage::Storage;

fn catalog_row(name: &str, price: f64, calories: f64) -> CatalogRow {
    CatalogRow {
        group: Some("Food".to_string()),
        category: Some("Mains".to_string()),
        item_name: name.to_string(),
        composition: String::new(),
        weight: String::new(),
        calories,
        proteins: 10.0,
        fats: 5.0,
        carbohydrates: 20.0,
        price,
    }
}

/// Three items priced 100/250/150 with calories 300/0/450, one order
/// each, all for user 700.
async fn setup_with_orders() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctx = ApiContext {
        storage,
        picker: ItemPicker::with_seed(3),
    };
    catalog::load_catalog(
        &ctx,
        "Canteen",
        None,
        &[
            catalog_row("Porridge", 100.0, 300.0),
            catalog_row("Steak", 250.0, 0.0),
            catalog_row("Pasta", 150.0, 450.0),
        ],
    )
    .await
    .expect("catalog");

    for name in ["Porridge", "Steak", "Pasta"] {
        let item_id: i64 = sqlx::query_scalar("SELECT id FROM menu_items WHERE name = ?")
            .bind(name)
            .fetch_one(ctx.storage.pool())
            .await
            .expect("item id");
        orders::place_order(&ctx, 700, Some("dave"), ItemId(item_id), 1)
            .await
            .expect("order");
    }
    ctx
}

#[tokio::test]
async fn aggregate_matches_the_reference_numbers() {
    let ctx = setup_with_orders().await;
    let summary = aggregate(&ctx, 700, None)
        .await
        .expect("aggregate")
        .expect("data");
    assert_eq!(summary.orders, 3);
    assert_eq!(summary.total_spend, 500.0);
    assert_eq!(summary.total_calories, 750.0);
    // Integer truncation of 500 / 3.
    assert_eq!(summary.average_spend, 166);
}

#[tokio::test]
async fn empty_window_short_circuits_to_no_data() {
    let ctx = setup_with_orders().await;
    assert!(aggregate(&ctx, 999, None).await.expect("aggregate").is_none());

    // Push everything out of a 7-day window; no division by zero.
    sqlx::query("UPDATE orders SET created = '2019-06-01 09:00:00'")
        .execute(ctx.storage.pool())
        .await
        .expect("backdate");
    assert!(aggregate(&ctx, 700, Some(7))
        .await
        .expect("aggregate")
        .is_none());
}

#[tokio::test]
async fn window_excludes_older_orders() {
    let ctx = setup_with_orders().await;
    let oldest: i64 = sqlx::query_scalar("SELECT min(id) FROM orders")
        .fetch_one(ctx.storage.pool())
        .await
        .expect("oldest");
    let backdated = (chrono::Utc::now() - chrono::Duration::days(10)).format("%Y-%m-%d %H:%M:%S");
    sqlx::query("UPDATE orders SET created = ? WHERE id = ?")
        .bind(backdated.to_string())
        .bind(oldest)
        .execute(ctx.storage.pool())
        .await
        .expect("backdate");

    let windowed = aggregate(&ctx, 700, Some(7))
        .await
        .expect("aggregate")
        .expect("data");
    assert_eq!(windowed.orders, 2);
    assert_eq!(windowed.total_spend, 400.0);

    let all_time = aggregate(&ctx, 700, None)
        .await
        .expect("aggregate")
        .expect("data");
    assert_eq!(all_time.orders, 3);
}

#[tokio::test]
async fn export_rows_carry_the_full_ancestry() {
    let ctx = setup_with_orders().await;
    let rows = export_rows(&ctx, 700, None).await.expect("rows");
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.restaurant, "Canteen");
        assert_eq!(row.category, "Mains");
        assert_eq!(row.proteins, 10.0);
    }
    // Newest first: the last order placed was Pasta.
    assert_eq!(rows[0].item, "Pasta");
    assert_eq!(rows[0].price, 150.0);
}

#[tokio::test]
async fn export_degrades_to_placeholders_when_links_break() {
    let ctx = setup_with_orders().await;
    let steak_id: i64 = sqlx::query_scalar("SELECT id FROM menu_items WHERE name = 'Steak'")
        .fetch_one(ctx.storage.pool())
        .await
        .expect("steak");
    sqlx::query("DELETE FROM menu_items WHERE id = ?")
        .bind(steak_id)
        .execute(ctx.storage.pool())
        .await
        .expect("delete");

    let rows = export_rows(&ctx, 700, None).await.expect("rows");
    assert_eq!(rows.len(), 3, "broken links must not drop rows");
    let broken = rows.iter().find(|r| r.item == "unknown").expect("broken row");
    assert_eq!(broken.restaurant, "unknown");
    assert_eq!(broken.price, 250.0);
    assert_eq!(broken.calories, 0.0);
}

#[tokio::test]
async fn export_for_an_unknown_user_is_empty() {
    let ctx = setup_with_orders().await;
    let rows = export_rows(&ctx, 999, None).await.expect("rows");
    assert!(rows.is_empty());
}
