use serde::Deserialize;
use serde_bytes::ByteBuf;

use crate::{
    items::repo::{Category, Condition, ItemStatus},
    pagination::Pagination,
};

/// Item submission. Images arrive base64-decoded into raw bytes with a
/// parallel list of content types. Note there is no points field: the value
/// is always computed server-side.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub item_type: String,
    pub size: String,
    pub condition: Condition,
    #[serde(default)]
    pub tags: Vec<String>,
    pub images: Vec<ByteBuf>,
    #[serde(default)]
    pub content_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub category: Option<Category>,
    pub size: Option<String>,
    pub condition: Option<Condition>,
    pub status: Option<ItemStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportItemRequest {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::Uri};

    #[test]
    fn list_query_parses_pagination_and_filters() {
        let uri: Uri = "/items?page=2&limit=5&category=Tops&sort_by=title:asc"
            .parse()
            .unwrap();
        let Query(query) = Query::<ListItemsQuery>::try_from_uri(&uri).expect("parse query");
        assert_eq!(query.pagination.page, 2);
        assert_eq!(query.pagination.limit, 5);
        assert_eq!(query.pagination.sort_by.as_deref(), Some("title:asc"));
        assert_eq!(query.category, Some(Category::Tops));
    }

    #[test]
    fn list_query_defaults_without_parameters() {
        let uri: Uri = "/items".parse().unwrap();
        let Query(query) = Query::<ListItemsQuery>::try_from_uri(&uri).expect("parse query");
        assert_eq!(query.pagination.page, 1);
        assert_eq!(query.pagination.limit, 10);
        assert!(query.category.is_none());
    }
}
