use async_trait::async_trait;
use axum::extract::FromRef;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{jwt::JwtKeys, repo::User},
    error::{AppError, AppResult},
    state::AppState,
};

/// Token kinds persisted in the store. JWTs only ever carry `access` or
/// `refresh`; `otp` rows hold short numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "token_kind", rename_all = "lowercase")]
pub enum TokenKind {
    Otp,
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Token {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub blacklisted: bool,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Persistence seam for tokens. Every validation round-trips here; there is
/// no in-memory token cache.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, new_token: NewToken) -> anyhow::Result<Token>;
    /// Lookup by value regardless of kind, skipping blacklisted rows.
    async fn find_by_value(&self, value: &str) -> anyhow::Result<Option<Token>>;
    async fn find_valid(&self, value: &str, kind: TokenKind) -> anyhow::Result<Option<Token>>;
    async fn find_for_user(&self, user_id: Uuid, kind: TokenKind)
        -> anyhow::Result<Option<Token>>;
    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()>;
    async fn delete_for_user_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<()>;
    async fn delete_for_user(&self, user_id: Uuid) -> anyhow::Result<()>;
}

const TOKEN_COLUMNS: &str = "id, user_id, kind, token, expires_at, blacklisted";

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, new_token: NewToken) -> anyhow::Result<Token> {
        let token = sqlx::query_as::<_, Token>(&format!(
            r#"
            INSERT INTO tokens (user_id, kind, token, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {TOKEN_COLUMNS}
            "#,
        ))
        .bind(new_token.user_id)
        .bind(new_token.kind)
        .bind(&new_token.token)
        .bind(new_token.expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(token)
    }

    async fn find_by_value(&self, value: &str) -> anyhow::Result<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = $1 AND blacklisted = FALSE",
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    async fn find_valid(&self, value: &str, kind: TokenKind) -> anyhow::Result<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens \
             WHERE token = $1 AND kind = $2 AND blacklisted = FALSE",
        ))
        .bind(value)
        .bind(kind)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        kind: TokenKind,
    ) -> anyhow::Result<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens \
             WHERE user_id = $1 AND kind = $2 AND blacklisted = FALSE \
             ORDER BY expires_at DESC LIMIT 1",
        ))
        .bind(user_id)
        .bind(kind)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_for_user_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tokens WHERE user_id = $1 AND kind = $2")
            .bind(user_id)
            .bind(kind)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// One signed token plus its expiry, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TokenMeta {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Access/refresh pair issued on successful authentication.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBundle {
    pub access: TokenMeta,
    pub refresh: TokenMeta,
}

/// Mints a fresh OTP for the user, superseding any prior unconsumed one.
/// The plaintext code goes to the mailer and is never logged.
pub async fn issue_otp(state: &AppState, user_id: Uuid) -> AppResult<String> {
    state
        .tokens
        .delete_for_user_kind(user_id, TokenKind::Otp)
        .await?;

    let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(state.config.otp_ttl_minutes);
    state
        .tokens
        .insert(NewToken {
            user_id,
            kind: TokenKind::Otp,
            token: code.clone(),
            expires_at,
        })
        .await?;
    debug!(user_id = %user_id, "otp issued");
    Ok(code)
}

/// Signs and persists an access/refresh pair. Both rows are stored so
/// refresh tokens can be revoked and logout can invalidate sessions.
pub async fn issue_auth_tokens(state: &AppState, user: &User) -> AppResult<TokenBundle> {
    let keys = JwtKeys::from_ref(state);
    let now = OffsetDateTime::now_utc();

    let access_expires = now + Duration::seconds(keys.access_ttl.as_secs() as i64);
    let access_token = keys.sign_access(user.id, user.role)?;
    state
        .tokens
        .insert(NewToken {
            user_id: user.id,
            kind: TokenKind::Access,
            token: access_token.clone(),
            expires_at: access_expires,
        })
        .await?;

    let refresh_expires = now + Duration::seconds(keys.refresh_ttl.as_secs() as i64);
    let refresh_token = keys.sign_refresh(user.id, user.role)?;
    state
        .tokens
        .insert(NewToken {
            user_id: user.id,
            kind: TokenKind::Refresh,
            token: refresh_token.clone(),
            expires_at: refresh_expires,
        })
        .await?;

    debug!(user_id = %user.id, "auth tokens issued");
    Ok(TokenBundle {
        access: TokenMeta {
            token: access_token,
            expires_at: access_expires,
        },
        refresh: TokenMeta {
            token: refresh_token,
            expires_at: refresh_expires,
        },
    })
}

/// Validates a stored token value against the expected kind.
pub async fn verify_stored(
    state: &AppState,
    value: &str,
    expected: TokenKind,
) -> AppResult<Token> {
    let token = state
        .tokens
        .find_by_value(value)
        .await?
        .ok_or(AppError::NotFound("Token not found"))?;
    if token.kind != expected {
        return Err(AppError::Unauthorized("Wrong token type"));
    }
    if token.expires_at <= OffsetDateTime::now_utc() {
        return Err(AppError::Unauthorized("Token expired"));
    }
    Ok(token)
}

/// Drops every token the user holds (logout, password reset).
pub async fn revoke_all(state: &AppState, user_id: Uuid) -> AppResult<()> {
    state.tokens.delete_for_user(user_id).await?;
    Ok(())
}
