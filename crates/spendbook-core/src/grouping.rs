//! Presentation grouping for accumulated list items

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Expense;

/// Items sharing one key, in list order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

/// Expenses booked on the same day
pub type ExpenseGroup = Group<NaiveDate, Expense>;

/// Group items by `key`. Groups appear in order of first occurrence and
/// keep the relative order of their items.
pub fn group_by_key<T, K, F>(items: &[T], key: F) -> Vec<Group<K, T>>
where
    T: Clone,
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Group<K, T>> = Vec::new();

    for item in items {
        let k = key(item);
        match index.get(&k) {
            Some(&pos) => groups[pos].items.push(item.clone()),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push(Group {
                    key: k,
                    items: vec![item.clone()],
                });
            }
        }
    }

    groups
}

/// Group expenses by day
pub fn group_expenses_by_day(expenses: &[Expense]) -> Vec<ExpenseGroup> {
    group_by_key(expenses, |expense| expense.date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn expense(id: &str, date: &str) -> Expense {
        Expense {
            id: id.to_string(),
            name: format!("Expense {}", id),
            amount: Decimal::ONE,
            date: date.parse().unwrap(),
            category: None,
            created_at: None,
        }
    }

    #[test]
    fn test_groups_in_first_occurrence_order() {
        let items = vec![
            expense("1", "2024-01-02"),
            expense("2", "2024-01-01"),
            expense("3", "2024-01-02"),
        ];
        let groups = group_expenses_by_day(&items);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "2024-01-02".parse::<NaiveDate>().unwrap());
        assert_eq!(
            groups[0].items.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );
        assert_eq!(groups[1].key, "2024-01-01".parse::<NaiveDate>().unwrap());
        assert_eq!(groups[1].items[0].id, "2");
    }

    #[test]
    fn test_empty_input() {
        assert!(group_expenses_by_day(&[]).is_empty());
    }

    #[test]
    fn test_generic_key() {
        let groups = group_by_key(&[1, 2, 3, 4, 5], |n| n % 2);
        assert_eq!(groups[0].key, 1);
        assert_eq!(groups[0].items, vec![1, 3, 5]);
        assert_eq!(groups[1].items, vec![2, 4]);
    }
}
