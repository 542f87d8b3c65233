use shared::{
    error::{ApiError, ErrorCode},
    protocol::OrderReceipt,
    token::{NavAction, NavState},
};
use storage::ItemDetail;

use crate::{orders, store_error, ApiContext};

/// One tappable list entry: the label source and the state its button
/// should carry.
pub type Entry = (String, NavState);

#[derive(Debug, Clone)]
pub struct ItemEntry {
    pub name: String,
    pub price: f64,
    pub state: NavState,
}

#[derive(Debug, Clone)]
pub struct ItemCard {
    pub detail: ItemDetail,
    pub random_pick: bool,
    pub order: NavState,
    pub reroll: Option<NavState>,
    pub back: NavState,
}

#[derive(Debug, Clone)]
pub enum MenuView {
    Restaurants {
        entries: Vec<Entry>,
    },
    Groups {
        random: NavState,
        entries: Vec<Entry>,
        back: NavState,
    },
    Categories {
        random: NavState,
        entries: Vec<Entry>,
        back: NavState,
    },
    Items {
        random: NavState,
        entries: Vec<ItemEntry>,
        back: NavState,
    },
    Item(ItemCard),
}

#[derive(Debug, Clone)]
pub enum MenuOutcome {
    View(MenuView),
    OrderPlaced(OrderReceipt),
}

/// Resolves one decoded navigation action against the catalog. The
/// engine keeps no state of its own: everything it needs arrives in
/// `state`, and every state it hands back is checked by the same
/// consistency rules it enforces on input.
pub async fn handle_menu_action(
    ctx: &ApiContext,
    external_id: i64,
    display_name: Option<&str>,
    state: &NavState,
) -> Result<MenuOutcome, ApiError> {
    if !state.is_consistent() {
        return Err(ApiError::new(
            ErrorCode::InvalidState,
            "navigation state does not match its level",
        ));
    }

    match state.level {
        0 => restaurants_view(ctx).await,
        1 => groups_view(ctx, state).await,
        2 => categories_view(ctx, state).await,
        3 => items_view(ctx, state).await,
        4 => item_view(ctx, state).await,
        _ => {
            let receipt = orders::place_order(ctx, external_id, display_name, state.item, 1).await?;
            Ok(MenuOutcome::OrderPlaced(receipt))
        }
    }
}

async fn restaurants_view(ctx: &ApiContext) -> Result<MenuOutcome, ApiError> {
    let restaurants = ctx
        .storage
        .list_active_restaurants()
        .await
        .map_err(store_error)?;
    let entries = restaurants
        .into_iter()
        .map(|r| (r.name, NavState::in_restaurant(r.restaurant_id)))
        .collect();
    Ok(MenuOutcome::View(MenuView::Restaurants { entries }))
}

async fn groups_view(ctx: &ApiContext, state: &NavState) -> Result<MenuOutcome, ApiError> {
    let groups = ctx
        .storage
        .list_groups(state.restaurant)
        .await
        .map_err(store_error)?;
    let entries = groups
        .into_iter()
        .map(|g| (g.name, NavState::in_group(state.restaurant, g.group_id)))
        .collect();
    Ok(MenuOutcome::View(MenuView::Groups {
        random: NavState::random_in(state.restaurant, state.group, state.category),
        entries,
        back: NavState::root(),
    }))
}

async fn categories_view(ctx: &ApiContext, state: &NavState) -> Result<MenuOutcome, ApiError> {
    let categories = ctx
        .storage
        .list_categories(state.group)
        .await
        .map_err(store_error)?;
    let entries = categories
        .into_iter()
        .map(|c| {
            (
                c.name,
                NavState::in_category(state.restaurant, state.group, c.category_id),
            )
        })
        .collect();
    Ok(MenuOutcome::View(MenuView::Categories {
        random: NavState::random_in(state.restaurant, state.group, state.category),
        entries,
        back: NavState::in_restaurant(state.restaurant),
    }))
}

async fn items_view(ctx: &ApiContext, state: &NavState) -> Result<MenuOutcome, ApiError> {
    let items = ctx
        .storage
        .list_items(state.category)
        .await
        .map_err(store_error)?;
    let entries = items
        .into_iter()
        .map(|item| ItemEntry {
            state: NavState::for_item(state.restaurant, state.group, state.category, item.item_id),
            name: item.name,
            price: item.price,
        })
        .collect();
    Ok(MenuOutcome::View(MenuView::Items {
        random: NavState::random_in(state.restaurant, state.group, state.category),
        entries,
        back: NavState::in_group(state.restaurant, state.group),
    }))
}

async fn item_view(ctx: &ApiContext, state: &NavState) -> Result<MenuOutcome, ApiError> {
    let random_pick = state.action == NavAction::Random;
    let detail = if random_pick {
        let candidates = ctx
            .storage
            .random_candidate_ids(state.random_scope())
            .await
            .map_err(store_error)?;
        let Some(item_id) = ctx.picker.pick(&candidates) else {
            return Err(ApiError::new(
                ErrorCode::EmptyScope,
                "no items in the selected scope",
            ));
        };
        fetch_detail(ctx, item_id).await?
    } else {
        fetch_detail(ctx, state.item).await?
    };

    // Back and order targets follow the item's true ancestry: a random
    // pick may land on an item the caller never navigated to.
    let back = NavState::in_category(detail.restaurant_id, detail.group_id, detail.item.category_id);
    let order = NavState::order_for(
        detail.restaurant_id,
        detail.group_id,
        detail.item.category_id,
        detail.item.item_id,
    );
    // A re-roll keeps the caller's scope, not the picked item's.
    let reroll =
        random_pick.then(|| NavState::random_in(state.restaurant, state.group, state.category));

    Ok(MenuOutcome::View(MenuView::Item(ItemCard {
        detail,
        random_pick,
        order,
        reroll,
        back,
    })))
}

async fn fetch_detail(ctx: &ApiContext, item_id: shared::domain::ItemId) -> Result<ItemDetail, ApiError> {
    ctx.storage
        .find_item(item_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "item is no longer available"))
}

#[cfg(test)]
#[path = "tests/nav_tests.rs"]
mod tests;
