use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    items::repo::{Item, ItemStatus},
    state::AppState,
    storage,
};

/// Approves a pending item and awards its point value to the owner.
/// Idempotent for already-approved items; a rejected item can never be
/// approved afterwards.
pub async fn approve(state: &AppState, item_id: Uuid) -> AppResult<Item> {
    let item = require_item(state, item_id).await?;
    match item.status {
        ItemStatus::Approved => Ok(item),
        ItemStatus::Rejected => Err(AppError::Conflict("Item already rejected")),
        ItemStatus::Pending => {
            let item = state
                .items
                .set_status(item_id, ItemStatus::Approved)
                .await?
                .ok_or(AppError::NotFound("Item not found"))?;
            state.users.add_points(item.owner_id, item.points_value).await?;
            info!(item_id = %item.id, points = item.points_value, "item approved");
            Ok(item)
        }
    }
}

/// Rejects a pending item. Idempotent for already-rejected items; an
/// approved item can never be rejected afterwards.
pub async fn reject(state: &AppState, item_id: Uuid) -> AppResult<Item> {
    let item = require_item(state, item_id).await?;
    match item.status {
        ItemStatus::Rejected => Ok(item),
        ItemStatus::Approved => Err(AppError::Conflict("Item already approved")),
        ItemStatus::Pending => {
            let item = state
                .items
                .set_status(item_id, ItemStatus::Rejected)
                .await?
                .ok_or(AppError::NotFound("Item not found"))?;
            info!(item_id = %item.id, "item rejected");
            Ok(item)
        }
    }
}

/// Clears the report metadata. The approval status is left untouched.
pub async fn resolve_report(state: &AppState, item_id: Uuid) -> AppResult<Item> {
    let item = state
        .items
        .clear_report(item_id)
        .await?
        .ok_or(AppError::NotFound("Item not found"))?;
    info!(item_id = %item.id, "report resolved");
    Ok(item)
}

/// Deletes the record, then cleans up its image files in the background.
/// The record deletion is authoritative; file failures only log.
pub async fn remove(state: &AppState, item_id: Uuid) -> AppResult<Item> {
    let item = state
        .items
        .delete(item_id)
        .await?
        .ok_or(AppError::NotFound("Item not found"))?;

    let store = state.storage.clone();
    let images = item.images.clone();
    tokio::spawn(async move {
        storage::delete_files(store.as_ref(), &images).await;
    });

    info!(item_id = %item.id, "item removed by admin");
    Ok(item)
}

async fn require_item(state: &AppState, item_id: Uuid) -> AppResult<Item> {
    state
        .items
        .find_by_id(item_id)
        .await?
        .ok_or(AppError::NotFound("Item not found"))
}
