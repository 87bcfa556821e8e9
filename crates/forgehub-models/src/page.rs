use serde::{Deserialize, Serialize};

/// Pagination envelope of a result page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub current: Option<String>,
    /// Continuation reference; `None` once the last page is reached
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: usize,
}

/// A page of results wrapped in its pagination envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// A page holding every result, with no continuation.
    pub fn single(results: Vec<T>) -> Self {
        Self {
            pagination: Pagination {
                limit: results.len(),
                offset: 0,
                first: None,
                previous: None,
                current: None,
                next: None,
                total: results.len(),
            },
            results,
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            pagination: self.pagination,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
