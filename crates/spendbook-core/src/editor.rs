//! Record editors behind the category and expense forms
//!
//! An editor holds the form values of one record. `save` and `delete` talk to
//! the service, report through the [`Notifier`] and resolve to an
//! [`EditorOutcome`] when the form should close, or `None` when it stays open.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{FetchError, FormError, ServiceError, ServiceResult};
use crate::models::{Category, CategoryUpsert, Expense, ExpenseUpsert};
use crate::notify::Notifier;
use crate::service::{CategoryService, ExpenseService};

/// Longest accepted record name, in characters
pub const NAME_MAX_LEN: usize = 40;

/// How a closed editor asks its list to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorOutcome {
    /// The record changed, reload the list
    Refresh,
    /// Closed without changes
    Cancel,
}

impl FromStr for EditorOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "refresh" => Ok(EditorOutcome::Refresh),
            "cancel" => Ok(EditorOutcome::Cancel),
            _ => Err(format!("Unknown editor outcome: {}", s)),
        }
    }
}

impl std::fmt::Display for EditorOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorOutcome::Refresh => write!(f, "refresh"),
            EditorOutcome::Cancel => write!(f, "cancel"),
        }
    }
}

/// Asks the user to confirm a destructive action
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Confirmer with a fixed answer, for non-interactive use
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmer(pub bool);

#[async_trait]
impl Confirmer for FixedConfirmer {
    async fn confirm(&self, question: &str) -> bool {
        log::debug!("{} -> {}", question, if self.0 { "yes" } else { "no" });
        self.0
    }
}

fn validate_name(name: &str) -> Result<(), FormError> {
    if name.trim().is_empty() {
        return Err(FormError::new("name", "is required"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(FormError::new(
            "name",
            format!("must be at most {} characters", NAME_MAX_LEN),
        ));
    }
    Ok(())
}

/// Report a service result and map it to the form's fate
fn settle<T>(
    notifier: &dyn Notifier,
    result: ServiceResult<T>,
    success: &str,
    failure: &str,
) -> Option<EditorOutcome> {
    match result {
        Ok(_) => {
            notifier.notify_success(success);
            Some(EditorOutcome::Refresh)
        }
        Err(err) => {
            notifier.notify_failure(failure, &FetchError::from(err));
            None
        }
    }
}

/// Editor for one category
pub struct CategoryEditor {
    service: Arc<dyn CategoryService>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    form: CategoryUpsert,
}

impl CategoryEditor {
    /// Editor for a new category
    pub fn new(
        service: Arc<dyn CategoryService>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        Self {
            service,
            notifier,
            confirmer,
            form: CategoryUpsert::default(),
        }
    }

    /// Load an existing category into the form
    pub fn with_category(mut self, category: &Category) -> Self {
        self.form = CategoryUpsert {
            id: Some(category.id.clone()),
            name: category.name.clone(),
        };
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.form.name = name.into();
    }

    pub fn form(&self) -> &CategoryUpsert {
        &self.form
    }

    pub fn is_new(&self) -> bool {
        self.form.id.is_none()
    }

    pub fn validate(&self) -> Result<(), FormError> {
        validate_name(&self.form.name)
    }

    pub async fn save(&self) -> Option<EditorOutcome> {
        let result = match self.validate() {
            Ok(()) => self.service.upsert_category(self.form.clone()).await,
            Err(err) => Err(ServiceError::from(err)),
        };
        settle(
            self.notifier.as_ref(),
            result,
            "Category saved",
            "Could not save category",
        )
    }

    /// Delete after confirmation. Declining keeps the form open.
    pub async fn delete(&self) -> Option<EditorOutcome> {
        let Some(id) = self.form.id.as_deref() else {
            log::warn!("Cannot delete a category that was never saved");
            return None;
        };
        if !self
            .confirmer
            .confirm("Are you sure you want to delete this category?")
            .await
        {
            return None;
        }

        let result = self.service.delete_category(id).await;
        settle(
            self.notifier.as_ref(),
            result,
            "Category deleted",
            "Could not delete category",
        )
    }

    pub fn cancel(&self) -> EditorOutcome {
        EditorOutcome::Cancel
    }
}

/// Editor for one expense
pub struct ExpenseEditor {
    service: Arc<dyn ExpenseService>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    form: ExpenseUpsert,
}

impl ExpenseEditor {
    /// Editor for a new expense dated `date`
    pub fn new(
        service: Arc<dyn ExpenseService>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
        date: NaiveDate,
    ) -> Self {
        Self {
            service,
            notifier,
            confirmer,
            form: ExpenseUpsert {
                id: None,
                name: String::new(),
                amount: Decimal::ZERO,
                date,
                category_id: None,
            },
        }
    }

    /// Load an existing expense into the form
    pub fn with_expense(mut self, expense: &Expense) -> Self {
        self.form = ExpenseUpsert {
            id: Some(expense.id.clone()),
            name: expense.name.clone(),
            amount: expense.amount,
            date: expense.date,
            category_id: expense.category_id().map(str::to_string),
        };
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.form.name = name.into();
    }

    pub fn set_amount(&mut self, amount: Decimal) {
        self.form.amount = amount;
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.form.date = date;
    }

    pub fn set_category(&mut self, category_id: Option<String>) {
        self.form.category_id = category_id;
    }

    pub fn form(&self) -> &ExpenseUpsert {
        &self.form
    }

    pub fn is_new(&self) -> bool {
        self.form.id.is_none()
    }

    pub fn validate(&self) -> Result<(), FormError> {
        validate_name(&self.form.name)?;
        if self.form.amount <= Decimal::ZERO {
            return Err(FormError::new("amount", "must be greater than 0"));
        }
        Ok(())
    }

    pub async fn save(&self) -> Option<EditorOutcome> {
        let result = match self.validate() {
            Ok(()) => self.service.upsert_expense(self.form.clone()).await,
            Err(err) => Err(ServiceError::from(err)),
        };
        settle(
            self.notifier.as_ref(),
            result,
            "Expense saved",
            "Could not save expense",
        )
    }

    /// Delete after confirmation. Declining keeps the form open.
    pub async fn delete(&self) -> Option<EditorOutcome> {
        let Some(id) = self.form.id.as_deref() else {
            log::warn!("Cannot delete an expense that was never saved");
            return None;
        };
        if !self
            .confirmer
            .confirm("Are you sure you want to delete this expense?")
            .await
        {
            return None;
        }

        let result = self.service.delete_expense(id).await;
        settle(
            self.notifier.as_ref(),
            result,
            "Expense deleted",
            "Could not delete expense",
        )
    }

    pub fn cancel(&self) -> EditorOutcome {
        EditorOutcome::Cancel
    }
}
