//! Month navigation for the expense list header

use chrono::{Datelike, Months, NaiveDate};

/// Month currently shown on the expense screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    first_day: NaiveDate,
}

impl MonthCursor {
    /// Cursor on the month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    /// Cursor on the current month (UTC)
    pub fn current() -> Self {
        Self::containing(chrono::Utc::now().date_naive())
    }

    /// Move by `months`, negative values go back. Out-of-range moves are ignored.
    pub fn add_months(&mut self, months: i32) {
        let moved = if months >= 0 {
            self.first_day.checked_add_months(Months::new(months.unsigned_abs()))
        } else {
            self.first_day.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        if let Some(first_day) = moved {
            self.first_day = first_day;
        } else {
            log::warn!("Month navigation by {} out of range, staying on {}", months, self.label());
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(self.first_day)
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        *date >= self.first_day && *date <= self.last_day()
    }

    /// e.g. "January 2024"
    pub fn label(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }
}
