//! Offset pagination for list endpoints.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 25;
pub const MAX_LIMIT: i64 = 100;

/// `?skip=&limit=` query parameters. `limit` is clamped to `1..=100`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    #[must_use]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// A page of results with the total count before pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total_count: i64, page: Pagination) -> Self {
        Self {
            data,
            total_count,
            skip: page.skip(),
            limit: page.limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let page = Pagination::default();
        assert_eq!(page.skip(), 0);
        assert_eq!(page.limit(), DEFAULT_LIMIT);

        let page = Pagination {
            skip: Some(-5),
            limit: Some(1000),
        };
        assert_eq!(page.skip(), 0);
        assert_eq!(page.limit(), MAX_LIMIT);

        let page = Pagination {
            skip: Some(50),
            limit: Some(0),
        };
        assert_eq!(page.skip(), 50);
        assert_eq!(page.limit(), 1);
    }
}
