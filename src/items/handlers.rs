use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    items::{
        dto::{CreateItemRequest, ListItemsQuery, ReportItemRequest},
        repo::{Item, ItemFilter},
        service,
    },
    pagination::Page,
    response::ApiResponse,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/:id", get(item_details).delete(delete_item))
        .route("/items/:id/report", post(report_item))
}

#[instrument(skip(state, payload))]
async fn create_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Item>>), AppError> {
    let item = service::create_item(&state, user_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Item submitted for review", item)),
    ))
}

#[instrument(skip(state))]
async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<ApiResponse<Page<Item>>>, AppError> {
    let filter = ItemFilter {
        category: query.category,
        size: query.size,
        condition: query.condition,
        status: query.status,
        search: query.search,
        ..ItemFilter::default()
    };
    let (items, total) = state.items.list(&filter, &query.pagination).await?;
    Ok(Json(ApiResponse::ok(
        "Items",
        Page::new(items, total, &query.pagination),
    )))
}

#[instrument(skip(state))]
async fn item_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Item>>, AppError> {
    let item = state
        .items
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Item not found"))?;
    Ok(Json(ApiResponse::ok("Item details", item)))
}

#[instrument(skip(state))]
async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Item>>, AppError> {
    let item = service::delete_own_item(&state, user_id, id).await?;
    Ok(Json(ApiResponse::ok("Item deleted", item)))
}

#[instrument(skip(state, payload))]
async fn report_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportItemRequest>,
) -> Result<Json<ApiResponse<Item>>, AppError> {
    let item = service::report_item(&state, user_id, id, payload).await?;
    Ok(Json(ApiResponse::ok("Item reported", item)))
}
