use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    admin::moderation,
    auth::{jwt::AdminUser, repo::User},
    error::{AppError, AppResult},
    items::repo::{Item, ItemFilter, ItemStatus},
    pagination::{Page, Pagination},
    response::ApiResponse,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/items/pending", get(pending_items))
        .route("/admin/items/reported", get(reported_items))
        .route(
            "/admin/items/:id/manage-status",
            put(manage_item_status),
        )
        .route("/admin/items/:id", axum::routing::delete(delete_item))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/manage-block", put(manage_user_block))
        .route("/admin/users/:id", axum::routing::delete(delete_user))
}

/// Moderation action carried in the manage-status body.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManageAction {
    Approved,
    Rejected,
    Resolved,
}

#[derive(Debug, Deserialize)]
pub struct ManageStatusRequest {
    pub status: ManageAction,
}

#[derive(Debug, Deserialize)]
pub struct ManageBlockRequest {
    pub is_block: bool,
}

#[instrument(skip(state))]
async fn pending_items(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<Page<Item>>>, AppError> {
    let filter = ItemFilter {
        status: Some(ItemStatus::Pending),
        ..ItemFilter::default()
    };
    let (items, total) = state.items.list(&filter, &pagination).await?;
    Ok(Json(ApiResponse::ok(
        "Pending items",
        Page::new(items, total, &pagination),
    )))
}

#[instrument(skip(state))]
async fn reported_items(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<Page<Item>>>, AppError> {
    let filter = ItemFilter {
        reported: Some(true),
        ..ItemFilter::default()
    };
    let (items, total) = state.items.list(&filter, &pagination).await?;
    Ok(Json(ApiResponse::ok(
        "Reported items",
        Page::new(items, total, &pagination),
    )))
}

#[instrument(skip(state, payload))]
async fn manage_item_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManageStatusRequest>,
) -> Result<Json<ApiResponse<Item>>, AppError> {
    let (item, message) = apply_action(&state, id, payload.status).await?;
    Ok(Json(ApiResponse::ok(message, item)))
}

async fn apply_action(
    state: &AppState,
    id: Uuid,
    action: ManageAction,
) -> AppResult<(Item, &'static str)> {
    match action {
        ManageAction::Approved => Ok((moderation::approve(state, id).await?, "Item approved")),
        ManageAction::Rejected => Ok((moderation::reject(state, id).await?, "Item rejected")),
        ManageAction::Resolved => Ok((
            moderation::resolve_report(state, id).await?,
            "Report resolved",
        )),
    }
}

#[instrument(skip(state))]
async fn delete_item(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Item>>, AppError> {
    let item = moderation::remove(&state, id).await?;
    Ok(Json(ApiResponse::ok("Item deleted", item)))
}

#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ApiResponse<Page<User>>>, AppError> {
    let (users, total) = state.users.list(&pagination).await?;
    Ok(Json(ApiResponse::ok(
        "Users",
        Page::new(users, total, &pagination),
    )))
}

#[instrument(skip(state, payload))]
async fn manage_user_block(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManageBlockRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state
        .users
        .set_block(id, payload.is_block)
        .await?
        .ok_or(AppError::NotFound("Email not found"))?;
    if payload.is_block {
        // Blocked users lose their live sessions immediately.
        state.tokens.delete_for_user(id).await?;
    }
    let message = if payload.is_block {
        "User blocked"
    } else {
        "User unblocked"
    };
    Ok(Json(ApiResponse::ok(message, user)))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = state
        .users
        .soft_delete(id)
        .await?
        .ok_or(AppError::NotFound("Email not found"))?;
    state.tokens.delete_for_user(id).await?;
    Ok(Json(ApiResponse::ok("User deleted", user)))
}
