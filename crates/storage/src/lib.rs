use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{CategoryId, GroupId, ItemId, OrderId, RandomScope, RestaurantId, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredRestaurant {
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredGroup {
    pub group_id: GroupId,
    pub restaurant_id: RestaurantId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StoredCategory {
    pub category_id: CategoryId,
    pub group_id: GroupId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StoredItem {
    pub item_id: ItemId,
    pub category_id: CategoryId,
    pub name: String,
    pub composition: String,
    pub weight: String,
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub price: f64,
}

/// An item together with its true ancestry, as needed to rebuild the
/// "back" target from the item itself.
#[derive(Debug, Clone)]
pub struct ItemDetail {
    pub item: StoredItem,
    pub category_name: String,
    pub group_id: GroupId,
    pub restaurant_id: RestaurantId,
}

/// Normalized catalog row ready for insertion; fallback labels and
/// numeric defaults are applied before this point.
#[derive(Debug, Clone)]
pub struct MenuRowInsert {
    pub group: String,
    pub category: String,
    pub name: String,
    pub composition: String,
    pub weight: String,
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct OrderWithItem {
    pub order_id: OrderId,
    pub quantity: i64,
    pub fixed_price: f64,
    pub created: DateTime<Utc>,
    pub item: Option<OrderItemInfo>,
}

#[derive(Debug, Clone)]
pub struct OrderItemInfo {
    pub item_id: ItemId,
    pub name: String,
    pub calories: f64,
}

/// One order joined against whatever remains of its catalog ancestry.
/// Every joined column is optional so history survives catalog reloads.
#[derive(Debug, Clone)]
pub struct OrderHistoryRow {
    pub order_id: OrderId,
    pub quantity: i64,
    pub fixed_price: f64,
    pub created: DateTime<Utc>,
    pub item_name: Option<String>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub category_name: Option<String>,
    pub restaurant_name: Option<String>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn upsert_restaurant(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<RestaurantId> {
        let rec = sqlx::query(
            "INSERT INTO restaurants (name, description) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET description=excluded.description, updated=CURRENT_TIMESTAMP
             RETURNING id",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(RestaurantId(rec.get::<i64, _>(0)))
    }

    pub async fn list_active_restaurants(&self) -> Result<Vec<StoredRestaurant>> {
        let rows = sqlx::query(
            "SELECT id, name, description FROM restaurants WHERE is_active = 1 ORDER BY lower(name) ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredRestaurant {
                restaurant_id: RestaurantId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
                description: r.get::<Option<String>, _>(2),
            })
            .collect())
    }

    pub async fn list_groups(&self, restaurant_id: RestaurantId) -> Result<Vec<StoredGroup>> {
        let rows =
            sqlx::query("SELECT id, restaurant_id, name FROM menu_groups WHERE restaurant_id = ? ORDER BY id ASC")
                .bind(restaurant_id.0)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredGroup {
                group_id: GroupId(r.get::<i64, _>(0)),
                restaurant_id: RestaurantId(r.get::<i64, _>(1)),
                name: r.get::<String, _>(2),
            })
            .collect())
    }

    pub async fn list_categories(&self, group_id: GroupId) -> Result<Vec<StoredCategory>> {
        let rows =
            sqlx::query("SELECT id, group_id, name FROM categories WHERE group_id = ? ORDER BY id ASC")
                .bind(group_id.0)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredCategory {
                category_id: CategoryId(r.get::<i64, _>(0)),
                group_id: GroupId(r.get::<i64, _>(1)),
                name: r.get::<String, _>(2),
            })
            .collect())
    }

    pub async fn list_items(&self, category_id: CategoryId) -> Result<Vec<StoredItem>> {
        let rows = sqlx::query(
            "SELECT id, category_id, name, composition, weight, calories, proteins, fats, carbohydrates, price
             FROM menu_items
             WHERE category_id = ?
             ORDER BY id ASC",
        )
        .bind(category_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| item_from_row(&r)).collect())
    }

    pub async fn find_item(&self, item_id: ItemId) -> Result<Option<ItemDetail>> {
        let row = sqlx::query(
            "SELECT mi.id, mi.category_id, mi.name, mi.composition, mi.weight,
                    mi.calories, mi.proteins, mi.fats, mi.carbohydrates, mi.price,
                    c.name, c.group_id, g.restaurant_id
             FROM menu_items mi
             INNER JOIN categories c ON c.id = mi.category_id
             INNER JOIN menu_groups g ON g.id = c.group_id
             WHERE mi.id = ?",
        )
        .bind(item_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ItemDetail {
            item: item_from_row(&r),
            category_name: r.get::<String, _>(10),
            group_id: GroupId(r.get::<i64, _>(11)),
            restaurant_id: RestaurantId(r.get::<i64, _>(12)),
        }))
    }

    /// Candidate ids for a random pick. Evaluated fresh on every call so
    /// a re-roll sees catalog changes immediately.
    pub async fn random_candidate_ids(&self, scope: RandomScope) -> Result<Vec<ItemId>> {
        let rows = match scope {
            RandomScope::Category(category_id) => {
                sqlx::query("SELECT id FROM menu_items WHERE category_id = ?")
                    .bind(category_id.0)
                    .fetch_all(&self.pool)
                    .await?
            }
            RandomScope::Group(group_id) => {
                sqlx::query(
                    "SELECT mi.id FROM menu_items mi
                     INNER JOIN categories c ON c.id = mi.category_id
                     WHERE c.group_id = ?",
                )
                .bind(group_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            RandomScope::Restaurant(restaurant_id) => {
                sqlx::query(
                    "SELECT mi.id FROM menu_items mi
                     INNER JOIN categories c ON c.id = mi.category_id
                     INNER JOIN menu_groups g ON g.id = c.group_id
                     WHERE g.restaurant_id = ?",
                )
                .bind(restaurant_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            RandomScope::Any => {
                sqlx::query(
                    "SELECT mi.id FROM menu_items mi
                     INNER JOIN categories c ON c.id = mi.category_id
                     INNER JOIN menu_groups g ON g.id = c.group_id
                     INNER JOIN restaurants r ON r.id = g.restaurant_id
                     WHERE r.is_active = 1",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows
            .into_iter()
            .map(|r| ItemId(r.get::<i64, _>(0)))
            .collect())
    }

    /// Replaces a restaurant's whole catalog in one transaction: the old
    /// groups, categories and items go away together, then the new rows
    /// are inserted with group/category names deduplicated in order of
    /// appearance. Returns (groups, categories, items) inserted.
    pub async fn replace_catalog(
        &self,
        restaurant_id: RestaurantId,
        rows: &[MenuRowInsert],
    ) -> Result<(usize, usize, usize)> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM menu_items WHERE category_id IN (
                SELECT c.id FROM categories c
                INNER JOIN menu_groups g ON g.id = c.group_id
                WHERE g.restaurant_id = ?
             )",
        )
        .bind(restaurant_id.0)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM categories WHERE group_id IN (
                SELECT id FROM menu_groups WHERE restaurant_id = ?
             )",
        )
        .bind(restaurant_id.0)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM menu_groups WHERE restaurant_id = ?")
            .bind(restaurant_id.0)
            .execute(&mut *tx)
            .await?;

        let mut group_ids: HashMap<String, i64> = HashMap::new();
        let mut category_ids: HashMap<(i64, String), i64> = HashMap::new();

        for row in rows {
            let group_id = match group_ids.get(&row.group).copied() {
                Some(id) => id,
                None => {
                    let rec = sqlx::query(
                        "INSERT INTO menu_groups (restaurant_id, name) VALUES (?, ?) RETURNING id",
                    )
                    .bind(restaurant_id.0)
                    .bind(&row.group)
                    .fetch_one(&mut *tx)
                    .await?;
                    let id = rec.get::<i64, _>(0);
                    group_ids.insert(row.group.clone(), id);
                    id
                }
            };

            let category_key = (group_id, row.category.clone());
            let category_id = match category_ids.get(&category_key).copied() {
                Some(id) => id,
                None => {
                    let rec = sqlx::query(
                        "INSERT INTO categories (group_id, name) VALUES (?, ?) RETURNING id",
                    )
                    .bind(group_id)
                    .bind(&row.category)
                    .fetch_one(&mut *tx)
                    .await?;
                    let id = rec.get::<i64, _>(0);
                    category_ids.insert(category_key, id);
                    id
                }
            };

            sqlx::query(
                "INSERT INTO menu_items (category_id, name, composition, weight, calories, proteins, fats, carbohydrates, price)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(category_id)
            .bind(&row.name)
            .bind(&row.composition)
            .bind(&row.weight)
            .bind(row.calories)
            .bind(row.proteins)
            .bind(row.fats)
            .bind(row.carbohydrates)
            .bind(row.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((group_ids.len(), category_ids.len(), rows.len()))
    }

    pub async fn find_user(&self, external_id: i64) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT id FROM users WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| UserId(r.get::<i64, _>(0))))
    }

    pub async fn find_or_create_user(
        &self,
        external_id: i64,
        display_name: Option<&str>,
    ) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (external_id, display_name) VALUES (?, ?)
             ON CONFLICT(external_id) DO UPDATE SET display_name=COALESCE(excluded.display_name, users.display_name)
             RETURNING id",
        )
        .bind(external_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn insert_order(
        &self,
        user_id: UserId,
        item_id: ItemId,
        quantity: i64,
        fixed_price: f64,
    ) -> Result<OrderId> {
        let rec = sqlx::query(
            "INSERT INTO orders (user_id, item_id, quantity, fixed_price) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id.0)
        .bind(item_id.0)
        .bind(quantity)
        .bind(fixed_price)
        .fetch_one(&self.pool)
        .await?;
        Ok(OrderId(rec.get::<i64, _>(0)))
    }

    pub async fn list_orders_for_day(
        &self,
        user_id: UserId,
        day: NaiveDate,
    ) -> Result<Vec<OrderWithItem>> {
        let rows = sqlx::query(
            "SELECT o.id, o.quantity, o.fixed_price, o.created, mi.id, mi.name, mi.calories
             FROM orders o
             LEFT JOIN menu_items mi ON mi.id = o.item_id
             WHERE o.user_id = ? AND date(o.created) = ?
             ORDER BY o.id DESC",
        )
        .bind(user_id.0)
        .bind(day.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| OrderWithItem {
                order_id: OrderId(r.get::<i64, _>(0)),
                quantity: r.get::<i64, _>(1),
                fixed_price: r.get::<f64, _>(2),
                created: r.get::<DateTime<Utc>, _>(3),
                item: r.get::<Option<i64>, _>(4).map(|item_id| OrderItemInfo {
                    item_id: ItemId(item_id),
                    name: r.get::<Option<String>, _>(5).unwrap_or_default(),
                    calories: r.get::<Option<f64>, _>(6).unwrap_or_default(),
                }),
            })
            .collect())
    }

    pub async fn list_orders_since(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<OrderHistoryRow>> {
        let rows = if let Some(since) = since {
            sqlx::query(
                "SELECT o.id, o.quantity, o.fixed_price, o.created,
                        mi.name, mi.calories, mi.proteins, mi.fats, mi.carbohydrates,
                        c.name, r.name
                 FROM orders o
                 LEFT JOIN menu_items mi ON mi.id = o.item_id
                 LEFT JOIN categories c ON c.id = mi.category_id
                 LEFT JOIN menu_groups g ON g.id = c.group_id
                 LEFT JOIN restaurants r ON r.id = g.restaurant_id
                 WHERE o.user_id = ? AND datetime(o.created) >= datetime(?)
                 ORDER BY o.id DESC",
            )
            .bind(user_id.0)
            .bind(since)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT o.id, o.quantity, o.fixed_price, o.created,
                        mi.name, mi.calories, mi.proteins, mi.fats, mi.carbohydrates,
                        c.name, r.name
                 FROM orders o
                 LEFT JOIN menu_items mi ON mi.id = o.item_id
                 LEFT JOIN categories c ON c.id = mi.category_id
                 LEFT JOIN menu_groups g ON g.id = c.group_id
                 LEFT JOIN restaurants r ON r.id = g.restaurant_id
                 WHERE o.user_id = ?
                 ORDER BY o.id DESC",
            )
            .bind(user_id.0)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows
            .into_iter()
            .map(|r| OrderHistoryRow {
                order_id: OrderId(r.get::<i64, _>(0)),
                quantity: r.get::<i64, _>(1),
                fixed_price: r.get::<f64, _>(2),
                created: r.get::<DateTime<Utc>, _>(3),
                item_name: r.get::<Option<String>, _>(4),
                calories: r.get::<Option<f64>, _>(5),
                proteins: r.get::<Option<f64>, _>(6),
                fats: r.get::<Option<f64>, _>(7),
                carbohydrates: r.get::<Option<f64>, _>(8),
                category_name: r.get::<Option<String>, _>(9),
                restaurant_name: r.get::<Option<String>, _>(10),
            })
            .collect())
    }

    pub async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(order_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn item_from_row(r: &sqlx::sqlite::SqliteRow) -> StoredItem {
    StoredItem {
        item_id: ItemId(r.get::<i64, _>(0)),
        category_id: CategoryId(r.get::<i64, _>(1)),
        name: r.get::<String, _>(2),
        composition: r.get::<String, _>(3),
        weight: r.get::<String, _>(4),
        calories: r.get::<f64, _>(5),
        proteins: r.get::<f64, _>(6),
        fats: r.get::<f64, _>(7),
        carbohydrates: r.get::<f64, _>(8),
        price: r.get::<f64, _>(9),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
