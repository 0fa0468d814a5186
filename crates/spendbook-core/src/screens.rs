//! Category and expense list screens
//!
//! A screen wires a search form to a [`ListController`] and ties the
//! controller's lifecycle to the screen's visibility: `enter` starts it,
//! `leave` stops it. Closing an editor with [`EditorOutcome::Refresh`]
//! reloads the list.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use spendbook_config::Config;
use tokio::sync::watch;

use crate::controller::{Completion, ListController, ListControllerBuilder, ListSnapshot};
use crate::criteria::CriteriaUpdate;
use crate::editor::EditorOutcome;
use crate::grouping::{group_expenses_by_day, ExpenseGroup};
use crate::models::{Category, Expense};
use crate::notify::Notifier;
use crate::period::MonthCursor;
use crate::service::{
    load_all_categories, CategoryFetcher, CategoryService, ExpenseFetcher, ExpenseService,
};
use crate::types::{category_sort_options, expense_sort_options, SortOption, SortOrder};

/// Search form of a list screen. Every edit publishes the whole form.
pub struct SearchForm {
    sender: watch::Sender<CriteriaUpdate>,
}

impl SearchForm {
    fn new(sort: SortOrder) -> (Self, watch::Receiver<CriteriaUpdate>) {
        let (sender, receiver) = watch::channel(CriteriaUpdate::new().sort(sort));
        (Self { sender }, receiver)
    }

    /// Set a filter field; an empty value clears it
    pub fn set_filter(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        self.sender.send_modify(|form| {
            form.filters.insert(key.to_string(), value);
        });
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.sender.send_modify(|form| form.sort = Some(sort));
    }

    pub fn value(&self) -> CriteriaUpdate {
        self.sender.borrow().clone()
    }
}

fn configured_sort(value: &str, fallback: fn() -> SortOrder) -> SortOrder {
    value.parse().unwrap_or_else(|err| {
        log::warn!("{}, using {}", err, fallback());
        fallback()
    })
}

/// Paged category list with name search
pub struct CategoryListScreen {
    form: SearchForm,
    controller: ListController<Category, Vec<Category>>,
}

impl CategoryListScreen {
    pub fn new(
        service: Arc<dyn CategoryService>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let sort = configured_sort(&config.categories.default_sort, || SortOrder::asc("name"));
        let (form, feed) = SearchForm::new(sort.clone());
        let controller = ListControllerBuilder::<Category>::new(
            "categories",
            sort,
            Arc::new(CategoryFetcher::new(service)),
            notifier,
        )
        .settings(&config.lists)
        .feed(feed)
        .build();

        Self { form, controller }
    }

    pub fn enter(&self) {
        self.controller.start();
    }

    pub fn leave(&self) {
        self.controller.stop();
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.form.set_filter("name", name);
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.form.set_sort(sort);
    }

    /// Infinite scroll
    pub fn load_more(&self, done: Option<Completion>) -> bool {
        self.controller.load_next_page(done)
    }

    /// Pull to refresh
    pub fn refresh(&self, done: Option<Completion>) -> bool {
        self.controller.refresh(done)
    }

    /// React to a closed category editor
    pub fn editor_closed(&self, outcome: Option<EditorOutcome>) {
        if outcome == Some(EditorOutcome::Refresh) {
            self.controller.refresh(None);
        }
    }

    pub fn sort_options(&self) -> Vec<SortOption> {
        category_sort_options()
    }

    pub fn form(&self) -> &SearchForm {
        &self.form
    }

    pub fn controller(&self) -> &ListController<Category, Vec<Category>> {
        &self.controller
    }

    pub fn snapshot(&self) -> ListSnapshot<Category, Vec<Category>> {
        self.controller.snapshot()
    }
}

/// Paged expense list grouped by day, with name and category search
pub struct ExpenseListScreen {
    form: SearchForm,
    controller: ListController<Expense, Vec<ExpenseGroup>>,
    category_service: Arc<dyn CategoryService>,
    notifier: Arc<dyn Notifier>,
    page_size: usize,
    categories: Mutex<Vec<Category>>,
    month: Mutex<MonthCursor>,
}

impl ExpenseListScreen {
    pub fn new(
        service: Arc<dyn ExpenseService>,
        category_service: Arc<dyn CategoryService>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let sort = configured_sort(&config.expenses.default_sort, || SortOrder::desc("date"));
        let (form, feed) = SearchForm::new(sort.clone());
        let controller = ListControllerBuilder::<Expense>::new(
            "expenses",
            sort,
            Arc::new(ExpenseFetcher::new(service)),
            Arc::clone(&notifier),
        )
        .settings(&config.lists)
        .feed(feed)
        .build_with_view(group_expenses_by_day);

        Self {
            form,
            controller,
            category_service,
            notifier,
            page_size: config.lists.page_size,
            categories: Mutex::new(Vec::new()),
            month: Mutex::new(MonthCursor::current()),
        }
    }

    /// Start the list and load the category picker options
    pub async fn enter(&self) {
        self.controller.start();
        self.load_categories().await;
    }

    pub fn leave(&self) {
        self.controller.stop();
    }

    async fn load_categories(&self) {
        let service = self.category_service.as_ref();
        match load_all_categories(service, SortOrder::asc("name"), self.page_size).await {
            Ok(categories) => {
                log::debug!("Loaded {} category options", categories.len());
                *lock(&self.categories) = categories;
            }
            Err(err) => self.notifier.notify_failure("Could not load categories", &err),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.form.set_filter("name", name);
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.form.set_sort(sort);
    }

    /// Restrict to one category id; `None` shows all
    pub fn set_category(&self, category_id: Option<&str>) {
        self.form.set_filter("category", category_id.unwrap_or_default());
    }

    /// Infinite scroll
    pub fn load_more(&self, done: Option<Completion>) -> bool {
        self.controller.load_next_page(done)
    }

    /// Pull to refresh
    pub fn refresh(&self, done: Option<Completion>) -> bool {
        self.controller.refresh(done)
    }

    /// React to a closed expense editor
    pub fn editor_closed(&self, outcome: Option<EditorOutcome>) {
        if outcome == Some(EditorOutcome::Refresh) {
            self.controller.refresh(None);
        }
    }

    /// Move the month navigator
    pub fn add_months(&self, months: i32) {
        lock(&self.month).add_months(months);
    }

    pub fn set_month(&self, month: MonthCursor) {
        *lock(&self.month) = month;
    }

    pub fn month(&self) -> MonthCursor {
        *lock(&self.month)
    }

    /// Loaded day groups falling in the navigator's month
    pub fn month_groups(&self) -> Vec<ExpenseGroup> {
        let month = self.month();
        self.controller
            .view()
            .into_iter()
            .filter(|group| month.contains(&group.key))
            .collect()
    }

    pub fn category_options(&self) -> Vec<Category> {
        lock(&self.categories).clone()
    }

    pub fn sort_options(&self) -> Vec<SortOption> {
        expense_sort_options()
    }

    pub fn form(&self) -> &SearchForm {
        &self.form
    }

    pub fn controller(&self) -> &ListController<Expense, Vec<ExpenseGroup>> {
        &self.controller
    }

    pub fn groups(&self) -> Vec<ExpenseGroup> {
        self.controller.view()
    }

    pub fn snapshot(&self) -> ListSnapshot<Expense, Vec<ExpenseGroup>> {
        self.controller.snapshot()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
