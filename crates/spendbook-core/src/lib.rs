//! Spendbook core
//!
//! Paged, search-filtered list controllers and the expense/category domain
//! they serve: models, search criteria, services with an in-memory backend,
//! record editors and the two list screens.

pub mod controller;
pub mod criteria;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod grouping;
pub mod memory;
pub mod models;
pub mod notify;
pub mod period;
pub mod screens;
pub mod service;
pub mod types;

pub use controller::{
    Completion, ListController, ListControllerBuilder, ListSnapshot, ListState, PageFetcher,
};
pub use criteria::{CriteriaUpdate, PageResult, SearchCriteria};
pub use debounce::Debouncer;
pub use editor::{CategoryEditor, Confirmer, EditorOutcome, ExpenseEditor, FixedConfirmer};
pub use error::{ErrorCode, ErrorSeverity, FetchError, FormError, ServiceError, ServiceResult};
pub use grouping::{group_by_key, group_expenses_by_day, ExpenseGroup, Group};
pub use memory::{MemoryBackend, SeedError};
pub use models::{Category, CategoryUpsert, Expense, ExpenseUpsert};
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier};
pub use period::MonthCursor;
pub use screens::{CategoryListScreen, ExpenseListScreen, SearchForm};
pub use service::{
    load_all_categories, CategoryFetcher, CategoryService, ExpenseFetcher, ExpenseService,
};
pub use types::{
    category_sort_options, expense_sort_options, SortDirection, SortOption, SortOrder,
};
