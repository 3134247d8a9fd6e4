use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::Pagination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_category")]
pub enum Category {
    Tops,
    Bottoms,
    Dresses,
    Outerwear,
    Shoes,
    Accessories,
    Activewear,
    Formal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_condition")]
pub enum Condition {
    #[serde(rename = "Like New")]
    #[sqlx(rename = "Like New")]
    LikeNew,
    Excellent,
    Good,
    Fair,
}

/// Approval axis of the moderation state machine. `Approved` and `Rejected`
/// are terminal; the report flag lives on a separate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "item_status", rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
}

/// A listed item. `points_value` is derived server-side and never
/// user-editable; `report_reason`/`reported_by` are set while a report is
/// open and cleared on resolution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub item_type: String,
    pub size: String,
    pub condition: Condition,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub points_value: i32,
    pub status: ItemStatus,
    pub report_reason: Option<String>,
    pub reported_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Item {
    pub fn is_reported(&self) -> bool {
        self.report_reason.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub item_type: String,
    pub size: String,
    pub condition: Condition,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub points_value: i32,
}

/// Equality filters for listing, matching the browse surface.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub size: Option<String>,
    pub condition: Option<Condition>,
    pub status: Option<ItemStatus>,
    pub owner_id: Option<Uuid>,
    pub reported: Option<bool>,
    pub search: Option<String>,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, new_item: NewItem) -> anyhow::Result<Item>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Item>>;
    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: &Pagination,
    ) -> anyhow::Result<(Vec<Item>, i64)>;
    async fn set_status(&self, id: Uuid, status: ItemStatus) -> anyhow::Result<Option<Item>>;
    async fn set_report(
        &self,
        id: Uuid,
        reason: &str,
        reported_by: Uuid,
    ) -> anyhow::Result<Option<Item>>;
    async fn clear_report(&self, id: Uuid) -> anyhow::Result<Option<Item>>;
    /// Returns the deleted item so callers can clean up its files.
    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Item>>;
}

const ITEM_COLUMNS: &str = "id, owner_id, title, description, category, item_type, size, \
                            condition, tags, images, points_value, status, report_reason, \
                            reported_by, created_at";

const ITEM_SORT_FIELDS: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("title", "title"),
    ("points_value", "points_value"),
];

const ITEM_FILTER_WHERE: &str = r#"
    ($1::item_category IS NULL OR category = $1)
    AND ($2::text IS NULL OR size = $2)
    AND ($3::item_condition IS NULL OR condition = $3)
    AND ($4::item_status IS NULL OR status = $4)
    AND ($5::uuid IS NULL OR owner_id = $5)
    AND ($6::bool IS NULL OR (report_reason IS NOT NULL) = $6)
    AND ($7::text IS NULL OR title ILIKE '%' || $7 || '%')
"#;

#[derive(Clone)]
pub struct PgItemStore {
    db: PgPool,
}

impl PgItemStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, new_item: NewItem) -> anyhow::Result<Item> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items
                (owner_id, title, description, category, item_type, size, condition, tags, images, points_value)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(new_item.owner_id)
        .bind(&new_item.title)
        .bind(&new_item.description)
        .bind(new_item.category)
        .bind(&new_item.item_type)
        .bind(&new_item.size)
        .bind(new_item.condition)
        .bind(&new_item.tags)
        .bind(&new_item.images)
        .bind(new_item.points_value)
        .fetch_one(&self.db)
        .await?;
        Ok(item)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(item)
    }

    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: &Pagination,
    ) -> anyhow::Result<(Vec<Item>, i64)> {
        let order = pagination.order_clause(ITEM_SORT_FIELDS, "created_at DESC");
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE {ITEM_FILTER_WHERE} \
             ORDER BY {order} LIMIT $8 OFFSET $9",
        ))
        .bind(filter.category)
        .bind(&filter.size)
        .bind(filter.condition)
        .bind(filter.status)
        .bind(filter.owner_id)
        .bind(filter.reported)
        .bind(&filter.search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM items WHERE {ITEM_FILTER_WHERE}",
        ))
        .bind(filter.category)
        .bind(&filter.size)
        .bind(filter.condition)
        .bind(filter.status)
        .bind(filter.owner_id)
        .bind(filter.reported)
        .bind(&filter.search)
        .fetch_one(&self.db)
        .await?;

        Ok((items, total))
    }

    async fn set_status(&self, id: Uuid, status: ItemStatus) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET status = $2 WHERE id = $1 RETURNING {ITEM_COLUMNS}",
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.db)
        .await?;
        Ok(item)
    }

    async fn set_report(
        &self,
        id: Uuid,
        reason: &str,
        reported_by: Uuid,
    ) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET report_reason = $2, reported_by = $3 WHERE id = $1 \
             RETURNING {ITEM_COLUMNS}",
        ))
        .bind(id)
        .bind(reason)
        .bind(reported_by)
        .fetch_optional(&self.db)
        .await?;
        Ok(item)
    }

    async fn clear_report(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET report_reason = NULL, reported_by = NULL WHERE id = $1 \
             RETURNING {ITEM_COLUMNS}",
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(item)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "DELETE FROM items WHERE id = $1 RETURNING {ITEM_COLUMNS}",
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(item)
    }
}
