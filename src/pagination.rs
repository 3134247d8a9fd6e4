use serde::{de, Deserialize, Serialize};

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    10
}

/// Accepts integers given as numbers or as strings. Query strings that go
/// through `#[serde(flatten)]` arrive buffered as strings, so a plain `i64`
/// field would reject `?page=2` there.
fn de_i64<'de, D: de::Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    struct I64Visitor;

    impl de::Visitor<'_> for I64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(I64Visitor)
}

/// Offset pagination query: `?page=2&limit=10&sort_by=created_at:desc`.
/// Multiple sort criteria are comma separated.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page", deserialize_with = "de_i64")]
    pub page: i64,
    #[serde(default = "default_limit", deserialize_with = "de_i64")]
    pub limit: i64,
    #[serde(default)]
    pub sort_by: Option<String>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            sort_by: None,
        }
    }
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    /// Builds an ORDER BY clause from `sort_by`, mapping request field names
    /// to whitelisted columns. Unknown fields are skipped; an empty result
    /// falls back to `default_order`.
    pub fn order_clause(&self, allowed: &[(&str, &str)], default_order: &str) -> String {
        let mut parts = Vec::new();
        if let Some(sort_by) = &self.sort_by {
            for criterion in sort_by.split(',') {
                let (field, dir) = match criterion.split_once(':') {
                    Some((f, d)) => (f.trim(), d.trim()),
                    None => (criterion.trim(), "asc"),
                };
                if let Some((_, column)) = allowed.iter().find(|(name, _)| *name == field) {
                    let dir = if dir.eq_ignore_ascii_case("desc") {
                        "DESC"
                    } else {
                        "ASC"
                    };
                    parts.push(format!("{column} {dir}"));
                }
            }
        }
        if parts.is_empty() {
            default_order.to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// One page of results plus the counters the client paginates with.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub results: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_results: i64,
    pub total_pages: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(results: Vec<T>, total_results: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        Self {
            results,
            page: pagination.page.max(1),
            limit,
            total_results,
            total_pages: (total_results + limit - 1) / limit,
        }
    }

    pub fn map<U: Serialize>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            results: self.results.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_results: self.total_results,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[(&str, &str)] = &[("created_at", "created_at"), ("title", "title")];

    fn with_sort(sort_by: &str) -> Pagination {
        Pagination {
            sort_by: Some(sort_by.to_string()),
            ..Pagination::default()
        }
    }

    #[test]
    fn default_order_when_sort_missing() {
        let p = Pagination::default();
        assert_eq!(p.order_clause(ALLOWED, "created_at DESC"), "created_at DESC");
    }

    #[test]
    fn parses_field_and_direction() {
        let p = with_sort("title:desc,created_at:asc");
        assert_eq!(
            p.order_clause(ALLOWED, "created_at DESC"),
            "title DESC, created_at ASC"
        );
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let p = with_sort("password_hash:asc");
        assert_eq!(p.order_clause(ALLOWED, "created_at DESC"), "created_at DESC");
    }

    #[test]
    fn direction_defaults_to_asc() {
        let p = with_sort("title");
        assert_eq!(p.order_clause(ALLOWED, "created_at DESC"), "title ASC");
    }

    #[test]
    fn offset_and_total_pages() {
        let p = Pagination {
            page: 3,
            limit: 10,
            sort_by: None,
        };
        assert_eq!(p.offset(), 20);
        let page: Page<i32> = Page::new(vec![], 31, &p);
        assert_eq!(page.total_pages, 4);
    }

    #[test]
    fn accepts_numbers_given_as_strings() {
        let p: Pagination =
            serde_json::from_value(serde_json::json!({"page": "2", "limit": "5"})).unwrap();
        assert_eq!(p.page, 2);
        assert_eq!(p.limit, 5);

        let p: Pagination =
            serde_json::from_value(serde_json::json!({"page": 3, "limit": 20})).unwrap();
        assert_eq!(p.page, 3);
        assert_eq!(p.limit, 20);
    }

    #[test]
    fn rejects_non_numeric_strings() {
        assert!(serde_json::from_value::<Pagination>(serde_json::json!({"page": "abc"})).is_err());
    }

    #[test]
    fn limit_is_clamped() {
        let p = Pagination {
            page: 1,
            limit: 100_000,
            sort_by: None,
        };
        assert_eq!(p.limit(), 100);
    }
}
