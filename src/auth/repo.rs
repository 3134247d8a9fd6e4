use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::Pagination;

/// Closed set of roles. Authorization is checked against this enum, never
/// against free-form role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User record. `password_hash` is `None` for social-only accounts and is
/// never serialized; `deleted_at` marks a soft delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub is_block: bool,
    pub social_id: Option<String>,
    pub social_type: Option<String>,
    pub points: i32,
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    pub social_id: Option<String>,
    pub social_type: Option<String>,
}

/// Persistence seam for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User>;
    /// Lookup ignoring soft-deleted records.
    async fn find_active_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn set_email_verified(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn set_password_hash(&self, id: Uuid, hash: &str) -> anyhow::Result<Option<User>>;
    /// Sets social identity and marks the account verified.
    async fn set_social(
        &self,
        id: Uuid,
        social_id: &str,
        social_type: &str,
    ) -> anyhow::Result<Option<User>>;
    async fn set_block(&self, id: Uuid, blocked: bool) -> anyhow::Result<Option<User>>;
    async fn add_points(&self, id: Uuid, delta: i32) -> anyhow::Result<Option<User>>;
    async fn soft_delete(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Hard delete; only used by the registration rollback so a failed
    /// registration leaves the email reusable.
    async fn hard_delete(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn list(&self, pagination: &Pagination) -> anyhow::Result<(Vec<User>, i64)>;
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role, is_email_verified, is_block, \
                            social_id, social_type, points, created_at, deleted_at";

const USER_SORT_FIELDS: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("email", "email"),
    ("name", "name"),
    ("points", "points"),
];

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn update_returning(&self, sql: String, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, role, is_email_verified, social_id, social_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.is_email_verified)
        .bind(&new_user.social_id)
        .bind(&new_user.social_type)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_active_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL",
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL",
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_email_verified(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.update_returning(
            format!("UPDATE users SET is_email_verified = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}"),
            id,
        )
        .await
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2 WHERE id = $1 RETURNING {USER_COLUMNS}",
        ))
        .bind(id)
        .bind(hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_social(
        &self,
        id: Uuid,
        social_id: &str,
        social_type: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET social_id = $2, social_type = $3, is_email_verified = TRUE
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(social_id)
        .bind(social_type)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_block(&self, id: Uuid, blocked: bool) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_block = $2 WHERE id = $1 RETURNING {USER_COLUMNS}",
        ))
        .bind(id)
        .bind(blocked)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn add_points(&self, id: Uuid, delta: i32) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET points = points + $2 WHERE id = $1 RETURNING {USER_COLUMNS}",
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn soft_delete(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.update_returning(
            format!(
                "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL \
                 RETURNING {USER_COLUMNS}"
            ),
            id,
        )
        .await
    }

    async fn hard_delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, pagination: &Pagination) -> anyhow::Result<(Vec<User>, i64)> {
        let order = pagination.order_clause(USER_SORT_FIELDS, "created_at DESC");
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL \
             ORDER BY {order} LIMIT $1 OFFSET $2",
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.db)
                .await?;
        Ok((users, total))
    }
}
