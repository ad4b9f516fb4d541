//! Expense operations
//!
//! Every query is scoped to the owning user. An expense id that exists but
//! belongs to someone else behaves exactly like one that does not exist.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Row};
use tracing::{debug, info};

use super::{new_id, parse_datetime, Database, ExpenseFilter};
use crate::error::Result;
use crate::models::{Expense, ExpenseUpdate, LineItem, NewExpense};

/// Upper bound on rows returned by an interactive listing
pub const LIST_LIMIT: i64 = 1000;

/// Upper bound on rows fed to analytics and reports
pub const AGGREGATE_LIMIT: i64 = 10_000;

const EXPENSE_COLUMNS: &str = "e.expense_id, e.user_id, e.vendor, e.date, e.amount, e.currency, \
     e.category, e.payment_method, e.receipt_number, e.line_items, e.tags, e.notes, \
     e.receipt_image, e.confidence_score, e.created_at, e.updated_at";

impl Database {
    /// Create an expense owned by `user_id`
    ///
    /// The caller is expected to have run [`NewExpense::validate`].
    pub fn create_expense(&self, user_id: &str, expense: &NewExpense) -> Result<Expense> {
        let conn = self.conn()?;
        let expense_id = new_id("exp");
        let now = Utc::now();
        let now_str = super::format_timestamp(now);

        conn.execute(
            r#"
            INSERT INTO expenses (
                expense_id, user_id, vendor, date, amount, currency, category,
                payment_method, receipt_number, line_items, tags, notes,
                receipt_image, confidence_score, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                expense_id,
                user_id,
                expense.vendor,
                expense.date.to_string(),
                expense.amount,
                expense.currency,
                expense.category,
                expense.payment_method,
                expense.receipt_number,
                serde_json::to_string(&expense.line_items)?,
                serde_json::to_string(&expense.tags)?,
                expense.notes,
                expense.receipt_image,
                expense.confidence_score,
                now_str,
                now_str,
            ],
        )?;

        debug!(expense_id = %expense_id, user_id = %user_id, "Created expense");

        Ok(Expense {
            expense_id,
            user_id: user_id.to_string(),
            vendor: expense.vendor.clone(),
            date: expense.date,
            amount: expense.amount,
            currency: expense.currency.clone(),
            category: expense.category.clone(),
            payment_method: expense.payment_method.clone(),
            receipt_number: expense.receipt_number.clone(),
            line_items: expense.line_items.clone(),
            tags: expense.tags.clone(),
            notes: expense.notes.clone(),
            receipt_image: expense.receipt_image.clone(),
            confidence_score: expense.confidence_score,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch one expense if it belongs to `user_id`
    pub fn get_expense(&self, user_id: &str, expense_id: &str) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM expenses e WHERE e.expense_id = ? AND e.user_id = ?",
            EXPENSE_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![expense_id, user_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(row_to_expense(row)?)),
            None => Ok(None),
        }
    }

    /// List a user's expenses, newest date first
    pub fn list_expenses(
        &self,
        user_id: &str,
        filter: &ExpenseFilter,
        limit: i64,
    ) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let mut built = filter.build(user_id);

        let sql = format!(
            "SELECT {} FROM expenses e {} ORDER BY e.date DESC, e.created_at DESC LIMIT ?",
            EXPENSE_COLUMNS, built.where_clause
        );
        built.params.push(Box::new(limit));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            built.params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let expenses = stmt
            .query_map(params_refs.as_slice(), row_to_expense)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    /// Expenses dated within `start..=end`, optionally restricted to a set of
    /// categories, in listing order. Feeds reports and summaries.
    pub fn expenses_in_range(
        &self,
        user_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        categories: Option<Vec<String>>,
    ) -> Result<Vec<Expense>> {
        let filter = ExpenseFilter::new()
            .date_range(start, end)
            .categories(categories);
        self.list_expenses(user_id, &filter, AGGREGATE_LIMIT)
    }

    /// Apply a partial update; returns false if the expense is not the user's
    pub fn update_expense(
        &self,
        user_id: &str,
        expense_id: &str,
        update: &ExpenseUpdate,
    ) -> Result<bool> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(vendor) = &update.vendor {
            sets.push("vendor = ?");
            values.push(Box::new(vendor.clone()));
        }
        if let Some(date) = update.date {
            sets.push("date = ?");
            values.push(Box::new(date.to_string()));
        }
        if let Some(amount) = update.amount {
            sets.push("amount = ?");
            values.push(Box::new(amount));
        }
        if let Some(currency) = &update.currency {
            sets.push("currency = ?");
            values.push(Box::new(currency.clone()));
        }
        if let Some(category) = &update.category {
            sets.push("category = ?");
            values.push(Box::new(category.clone()));
        }
        if let Some(payment_method) = &update.payment_method {
            sets.push("payment_method = ?");
            values.push(Box::new(payment_method.clone()));
        }
        if let Some(receipt_number) = &update.receipt_number {
            sets.push("receipt_number = ?");
            values.push(Box::new(receipt_number.clone()));
        }
        if let Some(line_items) = &update.line_items {
            sets.push("line_items = ?");
            values.push(Box::new(serde_json::to_string(line_items)?));
        }
        if let Some(tags) = &update.tags {
            sets.push("tags = ?");
            values.push(Box::new(serde_json::to_string(tags)?));
        }
        if let Some(notes) = &update.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }

        sets.push("updated_at = ?");
        values.push(Box::new(super::format_timestamp(Utc::now())));
        values.push(Box::new(expense_id.to_string()));
        values.push(Box::new(user_id.to_string()));

        let sql = format!(
            "UPDATE expenses SET {} WHERE expense_id = ? AND user_id = ?",
            sets.join(", ")
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn()?;
        let changed = conn.execute(&sql, params_refs.as_slice())?;
        Ok(changed > 0)
    }

    /// Delete one expense; returns false if the expense is not the user's
    pub fn delete_expense(&self, user_id: &str, expense_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expenses WHERE expense_id = ? AND user_id = ?",
            params![expense_id, user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Delete every listed expense that belongs to `user_id`
    ///
    /// Ids that are unknown or owned by someone else are skipped silently.
    /// Returns the number of rows actually deleted.
    pub fn bulk_delete_expenses(&self, user_id: &str, expense_ids: &[String]) -> Result<usize> {
        if expense_ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;

        // Stay well under SQLite's bound-parameter limit
        for chunk in expense_ids.chunks(500) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let sql = format!(
                "DELETE FROM expenses WHERE user_id = ? AND expense_id IN ({})",
                placeholders.join(", ")
            );
            let values = std::iter::once(user_id).chain(chunk.iter().map(String::as_str));
            deleted += tx.execute(&sql, params_from_iter(values))?;
        }

        tx.commit()?;

        info!(
            user_id = %user_id,
            requested = expense_ids.len(),
            deleted,
            "Bulk deleted expenses"
        );
        Ok(deleted)
    }

    /// Distinct tags used by a user, sorted
    pub fn list_tags(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT j.value
            FROM expenses e, json_each(e.tags) j
            WHERE e.user_id = ? AND j.type = 'text'
            ORDER BY j.value
            "#,
        )?;

        let tags = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tags)
    }
}

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let date_str: String = row.get(3)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let line_items_json: String = row.get(9)?;
    let tags_json: String = row.get(10)?;
    let line_items: Vec<LineItem> = serde_json::from_str(&line_items_json).unwrap_or_default();
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    Ok(Expense {
        expense_id: row.get(0)?,
        user_id: row.get(1)?,
        vendor: row.get(2)?,
        date,
        amount: row.get(4)?,
        currency: row.get(5)?,
        category: row.get(6)?,
        payment_method: row.get(7)?,
        receipt_number: row.get(8)?,
        line_items,
        tags,
        notes: row.get(11)?,
        receipt_image: row.get(12)?,
        confidence_score: row.get(13)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}
