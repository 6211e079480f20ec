use std::collections::HashMap;

use scrape_core::ServiceError;

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

/// `?skip=&limit=` on listing routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Missing values take their defaults; `limit` is capped at [`MAX_LIMIT`].
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let skip = parse_count(query, "skip")?.unwrap_or(0);
        let limit = parse_count(query, "limit")?
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Ok(Self { skip, limit })
    }
}

fn parse_count(query: &HashMap<String, String>, key: &str) -> Result<Option<usize>, ServiceError> {
    match query.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
            ServiceError::bad_request(format!("`{key}` must be a non-negative integer"))
                .with_data(serde_json::json!({ key: raw }))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_and_cap() {
        assert_eq!(Pagination::from_query(&query(&[])).unwrap(), Pagination::default());

        let page = Pagination::from_query(&query(&[("skip", "20"), ("limit", "5000")])).unwrap();
        assert_eq!(page, Pagination { skip: 20, limit: MAX_LIMIT });
    }

    #[test]
    fn rejects_negative_numbers() {
        let err = Pagination::from_query(&query(&[("skip", "-1")])).unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(err.message.contains("skip"));
    }
}
