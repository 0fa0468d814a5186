//! Category and expense services, and their adapters to page fetchers

use std::sync::Arc;

use async_trait::async_trait;

use crate::controller::PageFetcher;
use crate::criteria::{PageResult, SearchCriteria};
use crate::error::{FetchError, ServiceResult};
use crate::models::{Category, CategoryUpsert, Expense, ExpenseUpsert};
use crate::types::SortOrder;

/// Upper bound on pages walked by [`load_all_categories`]
const MAX_CATEGORY_PAGES: usize = 1_000;

/// Remote category store
#[async_trait]
pub trait CategoryService: Send + Sync {
    async fn list_categories(
        &self,
        criteria: SearchCriteria,
    ) -> ServiceResult<PageResult<Category>>;
    async fn upsert_category(&self, category: CategoryUpsert) -> ServiceResult<Category>;
    async fn delete_category(&self, id: &str) -> ServiceResult<()>;
}

/// Remote expense store
#[async_trait]
pub trait ExpenseService: Send + Sync {
    async fn list_expenses(&self, criteria: SearchCriteria) -> ServiceResult<PageResult<Expense>>;
    async fn upsert_expense(&self, expense: ExpenseUpsert) -> ServiceResult<Expense>;
    async fn delete_expense(&self, id: &str) -> ServiceResult<()>;
}

/// Pages of categories for a list controller
pub struct CategoryFetcher {
    service: Arc<dyn CategoryService>,
}

impl CategoryFetcher {
    pub fn new(service: Arc<dyn CategoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PageFetcher<Category> for CategoryFetcher {
    async fn fetch(&self, criteria: SearchCriteria) -> Result<PageResult<Category>, FetchError> {
        Ok(self.service.list_categories(criteria).await?)
    }
}

/// Pages of expenses for a list controller
pub struct ExpenseFetcher {
    service: Arc<dyn ExpenseService>,
}

impl ExpenseFetcher {
    pub fn new(service: Arc<dyn ExpenseService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PageFetcher<Expense> for ExpenseFetcher {
    async fn fetch(&self, criteria: SearchCriteria) -> Result<PageResult<Expense>, FetchError> {
        Ok(self.service.list_expenses(criteria).await?)
    }
}

/// Walk every category page, for pickers that need the whole set
pub async fn load_all_categories(
    service: &dyn CategoryService,
    sort: SortOrder,
    page_size: usize,
) -> Result<Vec<Category>, FetchError> {
    let mut criteria = SearchCriteria::new(sort, page_size);
    let mut categories = Vec::new();

    for page in 0..MAX_CATEGORY_PAGES {
        criteria.page = page;
        let result = service.list_categories(criteria.clone()).await?;
        categories.extend(result.content);
        if result.last {
            return Ok(categories);
        }
    }

    log::warn!(
        "Stopped loading categories after {} pages without a last page",
        MAX_CATEGORY_PAGES
    );
    Ok(categories)
}
