//! Cache keys for webhook assignment queries.
//!
//! ```text
//! element_webhooks
//! ├── detail/{id}
//! └── list
//!     ├── search/{filters}/{page}/{page_size}
//!     └── binding/{organization}/{feature}/{page}/{element}
//! ```

use elementhook_cache::{InvalidationRules, QueryKey};
use elementhook_remote::{AssignmentFilters, FunctionalKey, Pagination};

pub const ROOT: &str = "element_webhooks";

pub fn root() -> QueryKey {
    QueryKey::new(ROOT)
}

pub fn detail(id: &str) -> QueryKey {
    root().with("detail").with(id)
}

/// Every multi-row query.
pub fn lists() -> QueryKey {
    root().with("list")
}

/// All pages for one filter set.
pub fn search_prefix(filters: &AssignmentFilters) -> QueryKey {
    let filters = serde_json::to_string(filters).unwrap_or_default();
    lists().with("search").with(filters)
}

pub fn search_page(filters: &AssignmentFilters, pagination: Pagination) -> QueryKey {
    search_prefix(filters)
        .with(pagination.page.to_string())
        .with(pagination.page_size.to_string())
}

pub fn binding(key: &FunctionalKey) -> QueryKey {
    lists()
        .with("binding")
        .with(key.organization_id.as_str())
        .with(key.feature_slug.as_str())
        .with(key.page_path.as_str())
        .with(key.element_id.as_str())
}

pub fn invalidation_rules() -> InvalidationRules {
    InvalidationRules {
        list_prefix: lists(),
        detail_prefix: root().with("detail"),
    }
}
