//! Page request criteria and page results

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::SortOrder;

/// Page, size, sort and filters sent with a paged fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Zero-based page index
    pub page: usize,
    /// Page length
    pub size: usize,
    pub sort: SortOrder,
    /// Filter key to value, e.g. `name` or `category`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl SearchCriteria {
    pub fn new(sort: SortOrder, size: usize) -> Self {
        Self {
            page: 0,
            size: size.max(1),
            sort,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Non-empty value of a filter
    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Merge a form update and restart from the first page
    pub fn apply(&mut self, update: &CriteriaUpdate) {
        if let Some(sort) = &update.sort {
            self.sort = sort.clone();
        }
        for (key, value) in &update.filters {
            self.filters.insert(key.clone(), value.clone());
        }
        self.page = 0;
    }

    /// Drop filters that carry no value
    pub fn strip_empty_filters(&mut self) {
        self.filters.retain(|_, value| !value.is_empty());
    }

    /// Copy of the criteria as it goes over the wire
    pub fn outgoing(&self) -> SearchCriteria {
        let mut outgoing = self.clone();
        outgoing.strip_empty_filters();
        outgoing
    }

    /// Query parameters in request order: page, size, sort, then filters
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("size".to_string(), self.size.to_string()),
            ("sort".to_string(), self.sort.to_string()),
        ];
        pairs.extend(
            self.filters
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        pairs
    }

    /// `page=0&size=25&sort=name,asc` style rendering, used in log lines
    pub fn query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Partial criteria emitted by a search form edit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaUpdate {
    pub sort: Option<SortOrder>,
    pub filters: BTreeMap<String, String>,
}

impl CriteriaUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Fold a later edit into this one; later values win
    pub fn merge(&mut self, later: CriteriaUpdate) {
        if later.sort.is_some() {
            self.sort = later.sort;
        }
        self.filters.extend(later.filters);
    }

    /// Whether the given text filter carries a non-empty value
    pub fn text_filter_present(&self, key: &str) -> bool {
        self.filters.get(key).is_some_and(|value| !value.is_empty())
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub content: Vec<T>,
    /// True iff no page follows this one
    pub last: bool,
}

impl<T> PageResult<T> {
    pub fn new(content: Vec<T>, last: bool) -> Self {
        Self { content, last }
    }

    /// Cut one page out of a fully filtered and sorted result set
    pub fn slice(all: Vec<T>, page: usize, size: usize) -> Self {
        let size = size.max(1);
        let total = all.len();
        let start = page.saturating_mul(size);
        let content: Vec<T> = all.into_iter().skip(start).take(size).collect();
        let last = start.saturating_add(size) >= total;
        Self { content, last }
    }
}
