use super::*;
use crate::{catalog, ItemPicker};
use shared::protocol::CatalogRow;
use shared::domain::{ItemId, RestaurantId};
use storage::Storage;

fn catalog_row(group: &str, category: &str, name: &str, price: f64) -> CatalogRow {
    CatalogRow {
        group: Some(group.to_string()),
        category: Some(category.to_string()),
        item_name: name.to_string(),
        composition: "stuff".to_string(),
        weight: "300 g".to_string(),
        calories: 300.0,
        proteins: 12.0,
        fats: 9.0,
        carbohydrates: 40.0,
        price,
    }
}

async fn setup() -> (ApiContext, RestaurantId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctx = ApiContext {
        storage,
        picker: ItemPicker::with_seed(7),
    };
    let summary = catalog::load_catalog(
        &ctx,
        "Canteen",
        Some("ground floor"),
        &[
            catalog_row("Food", "Soups", "Borscht", 250.0),
            catalog_row("Food", "Soups", "Solyanka", 270.0),
            catalog_row("Food", "Breakfast", "Omelette", 180.0),
            catalog_row("Drinks", "Cold", "Lemonade", 90.0),
        ],
    )
    .await
    .expect("catalog");
    (ctx, summary.restaurant_id)
}

async fn view(ctx: &ApiContext, state: &NavState) -> MenuView {
    match handle_menu_action(ctx, 1000, Some("walker"), state)
        .await
        .expect("outcome")
    {
        MenuOutcome::View(view) => view,
        other => panic!("expected a view, got {other:?}"),
    }
}

#[tokio::test]
async fn root_lists_restaurants_with_level_one_states() {
    let (ctx, restaurant) = setup().await;
    let MenuView::Restaurants { entries } = view(&ctx, &NavState::root()).await else {
        panic!("expected restaurant list");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "Canteen");
    assert_eq!(entries[0].1, NavState::in_restaurant(restaurant));
    assert!(entries[0].1.is_consistent());
}

#[tokio::test]
async fn walking_down_the_tree_keeps_every_state_consistent() {
    let (ctx, restaurant) = setup().await;

    let MenuView::Groups {
        random,
        entries,
        back,
    } = view(&ctx, &NavState::in_restaurant(restaurant)).await
    else {
        panic!("expected groups");
    };
    assert_eq!(back, NavState::root());
    assert!(random.is_consistent());
    assert_eq!(random.random_scope(), shared::domain::RandomScope::Restaurant(restaurant));
    let (_, food_state) = entries
        .iter()
        .find(|(name, _)| name == "Food")
        .cloned()
        .expect("food group");
    assert!(food_state.is_consistent());
    assert_eq!(food_state.level, 2);

    let MenuView::Categories {
        random,
        entries,
        back,
    } = view(&ctx, &food_state).await
    else {
        panic!("expected categories");
    };
    assert_eq!(back, NavState::in_restaurant(restaurant));
    assert_eq!(
        random.random_scope(),
        shared::domain::RandomScope::Group(food_state.group)
    );
    let (_, soups_state) = entries
        .iter()
        .find(|(name, _)| name == "Soups")
        .cloned()
        .expect("soups");
    assert!(soups_state.is_consistent());
    assert_eq!(soups_state.level, 3);

    let MenuView::Items {
        random,
        entries,
        back,
    } = view(&ctx, &soups_state).await
    else {
        panic!("expected items");
    };
    assert_eq!(back, NavState::in_group(restaurant, food_state.group));
    assert_eq!(
        random.random_scope(),
        shared::domain::RandomScope::Category(soups_state.category)
    );
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert!(entry.state.is_consistent(), "{:?}", entry.state);
        assert_eq!(entry.state.level, 4);
        assert_ne!(entry.state.item, ItemId(0));
    }
}

#[tokio::test]
async fn direct_item_card_offers_order_and_ancestry_back_target() {
    let (ctx, restaurant) = setup().await;
    let MenuView::Groups { entries, .. } = view(&ctx, &NavState::in_restaurant(restaurant)).await
    else {
        panic!("expected groups");
    };
    let food_state = entries
        .iter()
        .find(|(name, _)| name == "Food")
        .map(|(_, s)| *s)
        .expect("food");
    let MenuView::Categories { entries, .. } = view(&ctx, &food_state).await else {
        panic!("expected categories");
    };
    let soups_state = entries
        .iter()
        .find(|(name, _)| name == "Soups")
        .map(|(_, s)| *s)
        .expect("soups");
    let MenuView::Items { entries, .. } = view(&ctx, &soups_state).await else {
        panic!("expected items");
    };
    let borscht = entries
        .iter()
        .find(|e| e.name == "Borscht")
        .expect("borscht");

    let MenuView::Item(card) = view(&ctx, &borscht.state).await else {
        panic!("expected item card");
    };
    assert!(!card.random_pick);
    assert!(card.reroll.is_none());
    assert_eq!(card.detail.item.name, "Borscht");
    assert_eq!(
        card.back,
        NavState::in_category(restaurant, food_state.group, soups_state.category)
    );
    assert_eq!(
        card.order,
        NavState::order_for(
            restaurant,
            food_state.group,
            soups_state.category,
            card.detail.item.item_id
        )
    );
    assert!(card.order.is_consistent());
}

#[tokio::test]
async fn random_pick_derives_back_target_from_real_ancestry() {
    let (ctx, restaurant) = setup().await;
    let random_state = NavState::random_in(
        restaurant,
        shared::domain::GroupId(0),
        shared::domain::CategoryId(0),
    );

    let MenuView::Item(card) = view(&ctx, &random_state).await else {
        panic!("expected item card");
    };
    assert!(card.random_pick);
    // The caller only knew the restaurant; back must point into the
    // picked item's actual category, not the level-1 context.
    assert_eq!(card.detail.restaurant_id, restaurant);
    assert_eq!(
        card.back,
        NavState::in_category(
            card.detail.restaurant_id,
            card.detail.group_id,
            card.detail.item.category_id
        )
    );
    assert_eq!(card.back.level, 3);
    assert!(card.back.is_consistent());
    assert!(card.order.is_consistent());
    assert_eq!(card.reroll, Some(random_state));
}

#[tokio::test]
async fn random_pick_stays_inside_the_requested_category() {
    let (ctx, restaurant) = setup().await;
    let MenuView::Groups { entries, .. } = view(&ctx, &NavState::in_restaurant(restaurant)).await
    else {
        panic!("expected groups");
    };
    let food_state = entries
        .iter()
        .find(|(name, _)| name == "Food")
        .map(|(_, s)| *s)
        .expect("food");
    let MenuView::Categories { entries, .. } = view(&ctx, &food_state).await else {
        panic!("expected categories");
    };
    let soups_state = entries
        .iter()
        .find(|(name, _)| name == "Soups")
        .map(|(_, s)| *s)
        .expect("soups");

    let random_state =
        NavState::random_in(restaurant, soups_state.group, soups_state.category);
    for _ in 0..20 {
        let MenuView::Item(card) = view(&ctx, &random_state).await else {
            panic!("expected item card");
        };
        assert!(
            card.detail.item.name == "Borscht" || card.detail.item.name == "Solyanka",
            "picked {} outside the soup category",
            card.detail.item.name
        );
    }
}

#[tokio::test]
async fn random_in_an_empty_restaurant_reports_empty_scope() {
    let (ctx, _) = setup().await;
    let empty = ctx
        .storage
        .upsert_restaurant("Pop-up", None)
        .await
        .expect("restaurant");
    let err = handle_menu_action(
        &ctx,
        1000,
        None,
        &NavState::random_in(empty, shared::domain::GroupId(0), shared::domain::CategoryId(0)),
    )
    .await
    .expect_err("should be empty");
    assert!(matches!(err.code, ErrorCode::EmptyScope));
}

#[tokio::test]
async fn inconsistent_decoded_state_is_rejected() {
    let (ctx, restaurant) = setup().await;
    let broken = NavState {
        level: 3,
        restaurant,
        group: shared::domain::GroupId(0),
        category: shared::domain::CategoryId(5),
        item: ItemId(0),
        action: NavAction::None,
    };
    let err = handle_menu_action(&ctx, 1000, None, &broken)
        .await
        .expect_err("should be invalid");
    assert!(matches!(err.code, ErrorCode::InvalidState));
}

#[tokio::test]
async fn vanished_item_is_reported_as_unavailable() {
    let (ctx, restaurant) = setup().await;
    let MenuView::Groups { entries, .. } = view(&ctx, &NavState::in_restaurant(restaurant)).await
    else {
        panic!("expected groups");
    };
    let food_state = entries[0].1;
    let MenuView::Categories { entries, .. } = view(&ctx, &food_state).await else {
        panic!("expected categories");
    };
    let ghost = NavState::for_item(
        restaurant,
        food_state.group,
        entries[0].1.category,
        ItemId(424242),
    );
    let err = handle_menu_action(&ctx, 1000, None, &ghost)
        .await
        .expect_err("should be missing");
    assert!(matches!(err.code, ErrorCode::NotFound));
}

#[tokio::test]
async fn order_level_places_an_order_and_reports_a_receipt() {
    let (ctx, restaurant) = setup().await;
    let random_state = NavState::random_in(
        restaurant,
        shared::domain::GroupId(0),
        shared::domain::CategoryId(0),
    );
    let MenuView::Item(card) = view(&ctx, &random_state).await else {
        panic!("expected item card");
    };

    let outcome = handle_menu_action(&ctx, 1000, Some("walker"), &card.order)
        .await
        .expect("order");
    let MenuOutcome::OrderPlaced(receipt) = outcome else {
        panic!("expected a receipt");
    };
    assert_eq!(receipt.item_name, card.detail.item.name);
    assert_eq!(receipt.fixed_price, card.detail.item.price);
}
