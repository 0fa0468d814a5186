//! In-process backend implementing the category and expense services
//!
//! Stands in for the remote REST API: filtering by name substring and
//! category, sorting by any known field, paging with a `last` flag.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::criteria::{PageResult, SearchCriteria};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Category, CategoryUpsert, Expense, ExpenseUpsert};
use crate::service::{CategoryService, ExpenseService};
use crate::types::{SortDirection, SortOrder};

/// Failure to load a seed file
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Cannot read seed file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid seed file: {message}")]
    InvalidYaml { message: String },

    #[error("Expense '{expense}' refers to unknown category '{category}'")]
    UnknownCategory { expense: String, category: String },
}

#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    categories: Vec<SeedCategory>,
    #[serde(default)]
    expenses: Vec<SeedExpense>,
}

#[derive(Debug, Deserialize)]
struct SeedCategory {
    id: Option<String>,
    name: String,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SeedExpense {
    id: Option<String>,
    name: String,
    amount: Decimal,
    date: NaiveDate,
    /// Category id
    category: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryData {
    categories: Vec<Category>,
    expenses: Vec<Expense>,
    next_id: u64,
}

impl MemoryData {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Category and expense store held in memory
#[derive(Debug)]
pub struct MemoryBackend {
    data: RwLock<MemoryData>,
    available: AtomicBool,
    latency: Duration,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(MemoryData::default()),
            available: AtomicBool::new(true),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Load categories and expenses from a YAML seed file
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_seed_yaml(&content)
    }

    /// Load categories and expenses from YAML text
    pub fn from_seed_yaml(content: &str) -> Result<Self, SeedError> {
        let seed: Seed = if content.trim().is_empty() {
            Seed::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| SeedError::InvalidYaml {
                message: e.to_string(),
            })?
        };

        let backend = Self::new();
        {
            let mut data = backend.write();
            for category in seed.categories {
                let id = match category.id {
                    Some(id) => id,
                    None => data.next_id("c"),
                };
                data.categories.push(Category {
                    id,
                    name: category.name,
                    created_at: category.created_at,
                });
            }

            for expense in seed.expenses {
                let category = match expense.category {
                    Some(category_id) => Some(
                        data.categories
                            .iter()
                            .find(|c| c.id == category_id)
                            .cloned()
                            .ok_or_else(|| SeedError::UnknownCategory {
                                expense: expense.name.clone(),
                                category: category_id.clone(),
                            })?,
                    ),
                    None => None,
                };
                let id = match expense.id {
                    Some(id) => id,
                    None => data.next_id("e"),
                };
                data.expenses.push(Expense {
                    id,
                    name: expense.name,
                    amount: expense.amount,
                    date: expense.date,
                    category,
                    created_at: expense.created_at,
                });
            }

            log::info!(
                "Seeded backend with {} categories and {} expenses",
                data.categories.len(),
                data.expenses.len()
            );
        }

        Ok(backend)
    }

    /// Make every call fail with `ServiceError::Unavailable` while `false`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    pub fn category_count(&self) -> usize {
        self.read().categories.len()
    }

    pub fn expense_count(&self) -> usize {
        self.read().expenses.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn round_trip(&self) -> ServiceResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::Unavailable)
        }
    }
}

fn name_matches(name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) => name.to_lowercase().contains(&filter.to_lowercase()),
        None => true,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn unknown_sort(sort: &SortOrder) -> ServiceError {
    ServiceError::Validation {
        message: format!("Unknown sort field: {}", sort.field),
    }
}

fn category_ordering(sort: &SortOrder) -> ServiceResult<fn(&Category, &Category) -> Ordering> {
    match sort.field.as_str() {
        "name" => Ok(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        "createdAt" => Ok(|a, b| a.created_at.cmp(&b.created_at)),
        _ => Err(unknown_sort(sort)),
    }
}

fn expense_ordering(sort: &SortOrder) -> ServiceResult<fn(&Expense, &Expense) -> Ordering> {
    match sort.field.as_str() {
        "name" => Ok(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        "date" => Ok(|a, b| a.date.cmp(&b.date)),
        "amount" => Ok(|a, b| a.amount.cmp(&b.amount)),
        "createdAt" => Ok(|a, b| a.created_at.cmp(&b.created_at)),
        _ => Err(unknown_sort(sort)),
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation {
            message: "Name must not be empty".to_string(),
        });
    }
    Ok(name.to_string())
}

#[async_trait]
impl CategoryService for MemoryBackend {
    async fn list_categories(
        &self,
        criteria: SearchCriteria,
    ) -> ServiceResult<PageResult<Category>> {
        self.round_trip().await?;
        let ordering = category_ordering(&criteria.sort)?;

        let mut matching: Vec<Category> = self
            .read()
            .categories
            .iter()
            .filter(|c| name_matches(&c.name, criteria.filter("name")))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            directed(ordering(a, b), criteria.sort.direction).then_with(|| a.id.cmp(&b.id))
        });

        Ok(PageResult::slice(matching, criteria.page, criteria.size))
    }

    async fn upsert_category(&self, category: CategoryUpsert) -> ServiceResult<Category> {
        self.round_trip().await?;
        let name = validate_name(&category.name)?;
        let mut data = self.write();

        let saved = match category.id {
            Some(id) => {
                let existing = data
                    .categories
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| ServiceError::not_found("Category", &id))?;
                existing.name = name;
                let saved = existing.clone();
                // expenses embed their category
                for expense in data.expenses.iter_mut() {
                    if expense.category_id() == Some(saved.id.as_str()) {
                        expense.category = Some(saved.clone());
                    }
                }
                saved
            }
            None => {
                let created = Category {
                    id: data.next_id("c"),
                    name,
                    created_at: Some(Utc::now()),
                };
                data.categories.push(created.clone());
                created
            }
        };

        Ok(saved)
    }

    async fn delete_category(&self, id: &str) -> ServiceResult<()> {
        self.round_trip().await?;
        let mut data = self.write();

        let in_use = data
            .expenses
            .iter()
            .filter(|e| e.category_id() == Some(id))
            .count();
        if in_use > 0 {
            return Err(ServiceError::Validation {
                message: format!("Category is used by {} expenses", in_use),
            });
        }

        let before = data.categories.len();
        data.categories.retain(|c| c.id != id);
        if data.categories.len() == before {
            return Err(ServiceError::not_found("Category", id));
        }
        Ok(())
    }
}

#[async_trait]
impl ExpenseService for MemoryBackend {
    async fn list_expenses(&self, criteria: SearchCriteria) -> ServiceResult<PageResult<Expense>> {
        self.round_trip().await?;
        let ordering = expense_ordering(&criteria.sort)?;
        let category = criteria.filter("category");

        let mut matching: Vec<Expense> = self
            .read()
            .expenses
            .iter()
            .filter(|e| name_matches(&e.name, criteria.filter("name")))
            .filter(|e| category.is_none() || e.category_id() == category)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            directed(ordering(a, b), criteria.sort.direction).then_with(|| a.id.cmp(&b.id))
        });

        Ok(PageResult::slice(matching, criteria.page, criteria.size))
    }

    async fn upsert_expense(&self, expense: ExpenseUpsert) -> ServiceResult<Expense> {
        self.round_trip().await?;
        let name = validate_name(&expense.name)?;
        if expense.amount <= Decimal::ZERO {
            return Err(ServiceError::Validation {
                message: "Amount must be greater than 0".to_string(),
            });
        }

        let mut data = self.write();
        let category = match &expense.category_id {
            Some(category_id) => Some(
                data.categories
                    .iter()
                    .find(|c| &c.id == category_id)
                    .cloned()
                    .ok_or_else(|| ServiceError::not_found("Category", category_id))?,
            ),
            None => None,
        };

        let saved = match expense.id {
            Some(id) => {
                let existing = data
                    .expenses
                    .iter_mut()
                    .find(|e| e.id == id)
                    .ok_or_else(|| ServiceError::not_found("Expense", &id))?;
                existing.name = name;
                existing.amount = expense.amount;
                existing.date = expense.date;
                existing.category = category;
                existing.clone()
            }
            None => {
                let created = Expense {
                    id: data.next_id("e"),
                    name,
                    amount: expense.amount,
                    date: expense.date,
                    category,
                    created_at: Some(Utc::now()),
                };
                data.expenses.push(created.clone());
                created
            }
        };

        Ok(saved)
    }

    async fn delete_expense(&self, id: &str) -> ServiceResult<()> {
        self.round_trip().await?;
        let mut data = self.write();
        let before = data.expenses.len();
        data.expenses.retain(|e| e.id != id);
        if data.expenses.len() == before {
            return Err(ServiceError::not_found("Expense", id));
        }
        Ok(())
    }
}
