use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    items::{
        dto::{CreateItemRequest, ReportItemRequest},
        repo::{Item, NewItem},
        scoring,
    },
    state::AppState,
    storage,
};

const MAX_IMAGES: usize = 5;
const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

fn extension_for(content_type: &str) -> AppResult<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        "image/tiff" => Ok("tiff"),
        "image/heic" => Ok("heic"),
        other => Err(AppError::Validation(format!(
            "unsupported image type: {other}"
        ))),
    }
}

/// Persists a new listing: validates and stores the images, computes the
/// point value from condition and category, and inserts with status
/// `pending`.
pub async fn create_item(
    state: &AppState,
    owner_id: Uuid,
    payload: CreateItemRequest,
) -> AppResult<Item> {
    let owner = state
        .users
        .find_by_id(owner_id)
        .await?
        .ok_or(AppError::NotFound("Email not found"))?;
    if owner.is_block {
        return Err(AppError::Unauthorized("Your account is blocked by admin"));
    }

    if payload.images.is_empty() || payload.images.len() > MAX_IMAGES {
        return Err(AppError::Validation(format!(
            "between 1 and {MAX_IMAGES} images are required"
        )));
    }
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }

    let mut filenames = Vec::with_capacity(payload.images.len());
    for (index, image) in payload.images.iter().enumerate() {
        if image.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation("image exceeds 2 MB".into()));
        }
        let content_type = payload
            .content_types
            .get(index)
            .map(String::as_str)
            .unwrap_or("image/jpeg");
        let ext = extension_for(content_type)?;
        filenames.push(format!("{}.{ext}", Uuid::new_v4()));
    }

    for (filename, image) in filenames.iter().zip(&payload.images) {
        state
            .storage
            .save(filename, Bytes::from(image.clone().into_vec()))
            .await?;
    }

    let points_value = scoring::points_value(payload.condition, payload.category);
    let insert = state
        .items
        .insert(NewItem {
            owner_id,
            title: payload.title,
            description: payload.description,
            category: payload.category,
            item_type: payload.item_type,
            size: payload.size,
            condition: payload.condition,
            tags: payload.tags,
            images: filenames.clone(),
            points_value,
        })
        .await;
    let item = match insert {
        Ok(item) => item,
        // The files were written before the row; compensating delete so a
        // failed insert leaves no orphans behind.
        Err(e) => {
            warn!(owner_id = %owner_id, error = %e, "item insert failed; removing stored images");
            storage::delete_files(state.storage.as_ref(), &filenames).await;
            return Err(e.into());
        }
    };

    info!(item_id = %item.id, owner_id = %owner_id, points = points_value, "item submitted");
    Ok(item)
}

/// Deletes the caller's own listing. The record delete is authoritative;
/// image files are cleaned up in the background and failures only log.
pub async fn delete_own_item(state: &AppState, owner_id: Uuid, item_id: Uuid) -> AppResult<Item> {
    let item = state
        .items
        .find_by_id(item_id)
        .await?
        .ok_or(AppError::NotFound("Item not found"))?;
    if item.owner_id != owner_id {
        return Err(AppError::Forbidden("Not your item"));
    }

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

    info!(item_id = %item.id, "item deleted by owner");
    Ok(item)
}

/// Flags an item for moderation. Reporting is independent of the approval
/// axis and does not change the item's status.
pub async fn report_item(
    state: &AppState,
    reporter_id: Uuid,
    item_id: Uuid,
    payload: ReportItemRequest,
) -> AppResult<Item> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::Validation("report reason is required".into()));
    }
    let item = state
        .items
        .set_report(item_id, payload.reason.trim(), reporter_id)
        .await?
        .ok_or(AppError::NotFound("Item not found"))?;
    info!(item_id = %item.id, reporter_id = %reporter_id, "item reported");
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::repo::{Category, Condition, ItemStatus};
    use crate::testing::TestState;
    use serde_bytes::ByteBuf;

    fn create_request() -> CreateItemRequest {
        CreateItemRequest {
            title: "Wool coat".into(),
            description: "Warm winter coat".into(),
            category: Category::Outerwear,
            item_type: "Coat".into(),
            size: "M".into(),
            condition: Condition::LikeNew,
            tags: vec!["winter".into()],
            images: vec![ByteBuf::from(vec![0u8; 16])],
            content_types: vec!["image/jpeg".into()],
        }
    }

    #[tokio::test]
    async fn created_items_start_pending_with_computed_points() {
        let ts = TestState::new();
        let owner = ts.seed_user("jane@example.com").await;

        let item = create_item(&ts.state, owner.id, create_request())
            .await
            .expect("create item");
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.points_value, 45);
        assert_eq!(item.images.len(), 1);
        assert_eq!(ts.storage.saved_count(), 1);
    }

    #[tokio::test]
    async fn create_rejects_too_many_images() {
        let ts = TestState::new();
        let owner = ts.seed_user("jane@example.com").await;

        let mut request = create_request();
        request.images = vec![ByteBuf::from(vec![0u8; 4]); 6];
        let err = create_item(&ts.state, owner.id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_removes_stored_images_when_insert_fails() {
        let ts = TestState::new();
        let owner = ts.seed_user("jane@example.com").await;
        ts.items.fail_inserts();

        let err = create_item(&ts.state, owner.id, create_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        // Every file written before the failed insert is cleaned up again.
        assert_eq!(ts.storage.saved_count(), 1);
        assert_eq!(ts.storage.deleted_count(), 1);
    }

    #[tokio::test]
    async fn create_rejects_blocked_owner() {
        let ts = TestState::new();
        let owner = ts.seed_user("jane@example.com").await;
        ts.state.users.set_block(owner.id, true).await.unwrap();

        let err = create_item(&ts.state, owner.id, create_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn delete_is_owner_only() {
        let ts = TestState::new();
        let owner = ts.seed_user("jane@example.com").await;
        let other = ts.seed_user("sam@example.com").await;
        let item = create_item(&ts.state, owner.id, create_request())
            .await
            .expect("create item");

        let err = delete_own_item(&ts.state, other.id, item.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        delete_own_item(&ts.state, owner.id, item.id)
            .await
            .expect("owner delete");
        assert!(ts.state.items.find_by_id(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn report_sets_flag_without_touching_status() {
        let ts = TestState::new();
        let owner = ts.seed_user("jane@example.com").await;
        let reporter = ts.seed_user("sam@example.com").await;
        let item = create_item(&ts.state, owner.id, create_request())
            .await
            .expect("create item");

        let reported = report_item(
            &ts.state,
            reporter.id,
            item.id,
            ReportItemRequest {
                reason: "counterfeit".into(),
            },
        )
        .await
        .expect("report");
        assert!(reported.is_reported());
        assert_eq!(reported.status, ItemStatus::Pending);
        assert_eq!(reported.reported_by, Some(reporter.id));
    }
}
