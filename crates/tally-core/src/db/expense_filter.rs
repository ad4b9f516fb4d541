//! Expense filter builder for constructing dynamic SQL queries
//!
//! Builds the WHERE clause and parameters for listing a user's expenses.
//! The owner condition is always present so no filter combination can reach
//! another user's rows.

use chrono::NaiveDate;

/// Builder for constructing expense query filters
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
    /// Match any of these categories (used by reports)
    pub categories: Option<Vec<String>>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Substring of the vendor (LIKE, so ASCII case-insensitive)
    pub vendor: Option<String>,
    /// Exact tag membership
    pub tag: Option<String>,
    /// Substring of vendor, notes or receipt number
    pub search: Option<String>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl ExpenseFilter {
    /// Create a new filter builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set inclusive date range bounds
    pub fn date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = category.map(String::from);
        self
    }

    /// Restrict to a set of categories; an empty or missing set means all
    pub fn categories(mut self, categories: Option<Vec<String>>) -> Self {
        self.categories = categories.filter(|c| !c.is_empty());
        self
    }

    pub fn amount_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    pub fn vendor(mut self, vendor: Option<&str>) -> Self {
        self.vendor = vendor.map(String::from);
        self
    }

    pub fn tag(mut self, tag: Option<&str>) -> Self {
        self.tag = tag.map(String::from);
        self
    }

    pub fn search(mut self, query: Option<&str>) -> Self {
        self.search = query.map(String::from);
        self
    }

    /// Build the filter components for the given owner
    pub fn build(&self, user_id: &str) -> FilterResult {
        let mut conditions = vec!["e.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

        if let Some(start) = self.start_date {
            conditions.push("e.date >= ?".to_string());
            params.push(Box::new(start.to_string()));
        }

        if let Some(end) = self.end_date {
            conditions.push("e.date <= ?".to_string());
            params.push(Box::new(end.to_string()));
        }

        if let Some(category) = non_blank(&self.category) {
            conditions.push("e.category = ?".to_string());
            params.push(Box::new(category.to_string()));
        }

        if let Some(categories) = &self.categories {
            let placeholders: Vec<&str> = categories.iter().map(|_| "?").collect();
            conditions.push(format!("e.category IN ({})", placeholders.join(", ")));
            for category in categories {
                params.push(Box::new(category.clone()));
            }
        }

        if let Some(min) = self.min_amount {
            conditions.push("e.amount >= ?".to_string());
            params.push(Box::new(min));
        }

        if let Some(max) = self.max_amount {
            conditions.push("e.amount <= ?".to_string());
            params.push(Box::new(max));
        }

        if let Some(vendor) = non_blank(&self.vendor) {
            conditions.push("e.vendor LIKE ? ESCAPE '\\'".to_string());
            params.push(Box::new(like_pattern(vendor)));
        }

        if let Some(tag) = non_blank(&self.tag) {
            conditions.push(
                "EXISTS (SELECT 1 FROM json_each(e.tags) WHERE json_each.value = ?)".to_string(),
            );
            params.push(Box::new(tag.to_string()));
        }

        if let Some(search) = non_blank(&self.search) {
            conditions.push(
                "(e.vendor LIKE ? ESCAPE '\\' \
                 OR COALESCE(e.notes, '') LIKE ? ESCAPE '\\' \
                 OR COALESCE(e.receipt_number, '') LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            let pattern = like_pattern(search);
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            params,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Wrap a user-supplied fragment as a LIKE substring pattern
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
