//! Sort types shared by the list screens

use serde::{Deserialize, Serialize};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(format!("Invalid sort direction: {}", s)),
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Sort order sent with every page request, written as `field,direction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = s
            .split_once(',')
            .ok_or_else(|| format!("Invalid sort '{}': expected field,direction", s))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("Invalid sort '{}': missing field", s));
        }
        Ok(SortOrder::new(field, direction.parse()?))
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.field, self.direction)
    }
}

impl TryFrom<String> for SortOrder {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortOrder> for String {
    fn from(value: SortOrder) -> Self {
        value.to_string()
    }
}

/// Entry of a sort picker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortOption {
    pub label: &'static str,
    pub value: SortOrder,
}

impl SortOption {
    fn new(label: &'static str, value: SortOrder) -> Self {
        Self { label, value }
    }
}

/// Sort choices offered on the category list
pub fn category_sort_options() -> Vec<SortOption> {
    vec![
        SortOption::new("Created at (newest first)", SortOrder::desc("createdAt")),
        SortOption::new("Created at (oldest first)", SortOrder::asc("createdAt")),
        SortOption::new("Name (A-Z)", SortOrder::asc("name")),
        SortOption::new("Name (Z-A)", SortOrder::desc("name")),
    ]
}

/// Sort choices offered on the expense list
pub fn expense_sort_options() -> Vec<SortOption> {
    vec![
        SortOption::new("Created at (newest first)", SortOrder::desc("createdAt")),
        SortOption::new("Created at (oldest first)", SortOrder::asc("createdAt")),
        SortOption::new("Date (newest first)", SortOrder::desc("date")),
        SortOption::new("Date (oldest first)", SortOrder::asc("date")),
        SortOption::new("Name (A-Z)", SortOrder::asc("name")),
        SortOption::new("Name (Z-A)", SortOrder::desc("name")),
    ]
}
