//! Spending summaries
//!
//! Pure aggregation over a slice of expenses. Amounts in different
//! currencies are summed as raw numbers; there is no conversion.

use std::collections::{BTreeMap, HashMap};

use crate::models::{round_cents, CategoryTotal, Expense, MonthTotal, Summary, VendorTotal};

/// Number of vendors kept in [`Summary::top_vendors`]
pub const TOP_VENDORS: usize = 10;

/// Group-and-sum that remembers first-seen order, so a stable sort on the
/// totals breaks ties by input order
struct Grouped<'a> {
    index: HashMap<&'a str, usize>,
    totals: Vec<(&'a str, f64)>,
}

impl<'a> Grouped<'a> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            totals: Vec::new(),
        }
    }

    fn add(&mut self, key: &'a str, amount: f64) {
        match self.index.get(key) {
            Some(&i) => self.totals[i].1 += amount,
            None => {
                self.index.insert(key, self.totals.len());
                self.totals.push((key, amount));
            }
        }
    }

    /// Totals sorted by amount descending
    fn ranked(mut self) -> Vec<(&'a str, f64)> {
        for entry in &mut self.totals {
            entry.1 = round_cents(entry.1);
        }
        self.totals.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.totals
    }
}

/// Summarize a set of expenses
///
/// Empty input gives a zeroed [`Summary`].
pub fn summarize(expenses: &[Expense]) -> Summary {
    if expenses.is_empty() {
        return Summary::default();
    }

    let mut categories = Grouped::new();
    let mut vendors = Grouped::new();
    let mut months: BTreeMap<String, f64> = BTreeMap::new();
    let mut total = 0.0;

    for expense in expenses {
        let amount = round_cents(expense.amount);
        total += amount;
        categories.add(&expense.category, amount);
        vendors.add(&expense.vendor, amount);
        *months
            .entry(expense.date.format("%Y-%m").to_string())
            .or_insert(0.0) += amount;
    }

    let total = round_cents(total);
    let count = expenses.len();

    let category_breakdown = categories
        .ranked()
        .into_iter()
        .map(|(category, amount)| CategoryTotal {
            category: category.to_string(),
            amount,
            percentage: if total > 0.0 {
                round_cents(amount / total * 100.0)
            } else {
                0.0
            },
        })
        .collect();

    let top_vendors = vendors
        .ranked()
        .into_iter()
        .take(TOP_VENDORS)
        .map(|(vendor, amount)| VendorTotal {
            vendor: vendor.to_string(),
            amount,
        })
        .collect();

    let monthly_trend = months
        .into_iter()
        .map(|(month, amount)| MonthTotal {
            month,
            amount: round_cents(amount),
        })
        .collect();

    Summary {
        total_expenses: total,
        expense_count: count,
        average_expense: round_cents(total / count as f64),
        category_breakdown,
        top_vendors,
        monthly_trend,
    }
}
