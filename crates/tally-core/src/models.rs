//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Currency used when nothing else is known
pub const DEFAULT_CURRENCY: &str = "USD";

/// Round a money value to whole cents
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The fixed expense category vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Groceries,
    #[serde(rename = "Meals & Dining")]
    MealsDining,
    Travel,
    Transportation,
    #[serde(rename = "Office Supplies")]
    OfficeSupplies,
    Equipment,
    #[serde(rename = "Software & Subscriptions")]
    SoftwareSubscriptions,
    Utilities,
    Marketing,
    #[serde(rename = "Professional Services")]
    ProfessionalServices,
    Healthcare,
    Entertainment,
    Shopping,
    #[serde(rename = "Shipping & Postage")]
    ShippingPostage,
    Other,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Self::Groceries,
        Self::MealsDining,
        Self::Travel,
        Self::Transportation,
        Self::OfficeSupplies,
        Self::Equipment,
        Self::SoftwareSubscriptions,
        Self::Utilities,
        Self::Marketing,
        Self::ProfessionalServices,
        Self::Healthcare,
        Self::Entertainment,
        Self::Shopping,
        Self::ShippingPostage,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groceries => "Groceries",
            Self::MealsDining => "Meals & Dining",
            Self::Travel => "Travel",
            Self::Transportation => "Transportation",
            Self::OfficeSupplies => "Office Supplies",
            Self::Equipment => "Equipment",
            Self::SoftwareSubscriptions => "Software & Subscriptions",
            Self::Utilities => "Utilities",
            Self::Marketing => "Marketing",
            Self::ProfessionalServices => "Professional Services",
            Self::Healthcare => "Healthcare",
            Self::Entertainment => "Entertainment",
            Self::Shopping => "Shopping",
            Self::ShippingPostage => "Shipping & Postage",
            Self::Other => "Other",
        }
    }

    /// Display names of the whole vocabulary, in declaration order
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    /// Case-insensitive match against the display names; "and" is accepted
    /// in place of "&".
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(" and ", " & ");
        Self::ALL
            .iter()
            .find(|c| c.as_str().to_lowercase() == wanted)
            .copied()
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

fn default_quantity() -> f64 {
    1.0
}

/// A persisted expense record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub expense_id: String,
    pub user_id: String,
    pub vendor: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    /// Usually one of [`Category`], but free text is kept as entered
    pub category: String,
    pub payment_method: Option<String>,
    pub receipt_number: Option<String>,
    pub line_items: Vec<LineItem>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    /// Embedded image as a data URI
    pub receipt_image: Option<String>,
    /// Present only for AI-extracted expenses
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New expense for creation (from a reviewed draft or manual entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub vendor: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub category: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub receipt_image: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl NewExpense {
    /// Minimal manual entry; everything optional is left empty
    pub fn new(vendor: &str, date: NaiveDate, amount: f64, category: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            date,
            amount,
            currency: default_currency(),
            category: category.to_string(),
            payment_method: None,
            receipt_number: None,
            line_items: Vec::new(),
            tags: Vec::new(),
            notes: None,
            receipt_image: None,
            confidence_score: None,
        }
    }

    /// Check required fields and normalize the currency code
    pub fn validate(mut self) -> Result<Self> {
        self.vendor = validate_vendor(&self.vendor)?;
        validate_amount(self.amount)?;
        self.currency = validate_currency(&self.currency)?;
        if self.category.trim().is_empty() {
            return Err(Error::InvalidData("category must not be empty".into()));
        }
        if let Some(score) = self.confidence_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(Error::InvalidData(
                    "confidence_score must be between 0 and 1".into(),
                ));
            }
        }
        self.amount = round_cents(self.amount);
        Ok(self)
    }
}

/// Partial update: only fields that are present change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub line_items: Option<Vec<LineItem>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ExpenseUpdate {
    pub fn validate(mut self) -> Result<Self> {
        if let Some(vendor) = &self.vendor {
            self.vendor = Some(validate_vendor(vendor)?);
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
            self.amount = Some(round_cents(amount));
        }
        if let Some(currency) = &self.currency {
            self.currency = Some(validate_currency(currency)?);
        }
        Ok(self)
    }
}

fn validate_vendor(vendor: &str) -> Result<String> {
    let vendor = vendor.trim();
    if vendor.is_empty() {
        return Err(Error::InvalidData("vendor must not be empty".into()));
    }
    Ok(vendor.to_string())
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidData(format!(
            "amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<String> {
    let code = currency.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidData(format!(
            "currency must be a 3-letter code, got '{}'",
            currency
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// An authentication principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A login session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// How urgently a reviewer should check an extraction draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewLevel {
    Ok,
    ReviewCarefully,
    LowConfidence,
}

impl ReviewLevel {
    /// Below this the draft is flagged "review carefully"
    pub const CAREFUL_BELOW: f64 = 0.85;
    /// Below this the draft is flagged as low confidence
    pub const LOW_BELOW: f64 = 0.70;

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < Self::LOW_BELOW {
            Self::LowConfidence
        } else if confidence < Self::CAREFUL_BELOW {
            Self::ReviewCarefully
        } else {
            Self::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ReviewCarefully => "review_carefully",
            Self::LowConfidence => "low_confidence",
        }
    }
}

/// Unsaved output of the extraction pipeline, shown to the user for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDraft {
    pub vendor: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub payment_method: Option<String>,
    pub receipt_number: Option<String>,
    pub line_items: Vec<LineItem>,
    pub confidence_score: f64,
    pub review: ReviewLevel,
    /// Names of fields that fell back to a default value
    pub defaulted_fields: Vec<String>,
}

/// Category total within a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

/// Vendor total within a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorTotal {
    pub vendor: String,
    pub amount: f64,
}

/// Month total within a summary (`month` is `YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthTotal {
    pub month: String,
    pub amount: f64,
}

/// Aggregate view over a set of expenses
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_expenses: f64,
    pub expense_count: usize,
    pub average_expense: f64,
    pub category_breakdown: Vec<CategoryTotal>,
    pub top_vendors: Vec<VendorTotal>,
    pub monthly_trend: Vec<MonthTotal>,
}

/// Platform-wide counters for administrators
#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_expenses: i64,
    pub total_amount: f64,
    pub active_sessions: i64,
}

/// A user with their expense totals, for administrators
#[derive(Debug, Clone, Serialize)]
pub struct UserWithStats {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub expense_count: i64,
    pub total_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_vocabulary() {
        assert_eq!(Category::ALL.len(), 15);
        assert_eq!(Category::names()[1], "Meals & Dining");
        assert_eq!(
            serde_json::to_string(&Category::SoftwareSubscriptions).unwrap(),
            "\"Software & Subscriptions\""
        );
    }

    #[test]
    fn test_category_from_str_is_lenient() {
        assert_eq!(
            "meals and dining".parse::<Category>().unwrap(),
            Category::MealsDining
        );
        assert_eq!(" GROCERIES ".parse::<Category>().unwrap(), Category::Groceries);
        assert!("Snacks".parse::<Category>().is_err());
    }

    #[test]
    fn test_review_level_thresholds() {
        assert_eq!(ReviewLevel::from_confidence(0.95), ReviewLevel::Ok);
        assert_eq!(ReviewLevel::from_confidence(0.85), ReviewLevel::Ok);
        assert_eq!(
            ReviewLevel::from_confidence(0.84),
            ReviewLevel::ReviewCarefully
        );
        assert_eq!(
            ReviewLevel::from_confidence(0.70),
            ReviewLevel::ReviewCarefully
        );
        assert_eq!(
            ReviewLevel::from_confidence(0.69),
            ReviewLevel::LowConfidence
        );
    }

    #[test]
    fn test_new_expense_validation() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let ok = NewExpense {
            currency: "cad".into(),
            ..NewExpense::new("  Tim Hortons ", date, 4.567, "Meals & Dining")
        }
        .validate()
        .unwrap();
        assert_eq!(ok.vendor, "Tim Hortons");
        assert_eq!(ok.currency, "CAD");
        assert_eq!(ok.amount, 4.57);

        assert!(NewExpense::new("", date, 1.0, "Other").validate().is_err());
        assert!(NewExpense::new("A", date, -1.0, "Other").validate().is_err());
        assert!(NewExpense::new("A", date, f64::NAN, "Other")
            .validate()
            .is_err());

        let bad_currency = NewExpense {
            currency: "DOLLARS".into(),
            ..NewExpense::new("A", date, 1.0, "Other")
        };
        assert!(bad_currency.validate().is_err());
    }

    #[test]
    fn test_manual_category_is_free_text() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let expense = NewExpense::new("Pet Shop", date, 10.0, "Pets")
            .validate()
            .unwrap();
        assert_eq!(expense.category, "Pets");
    }

    #[test]
    fn test_line_item_quantity_defaults_to_one() {
        let item: LineItem = serde_json::from_str(r#"{"description": "Milk"}"#).unwrap();
        assert_eq!(item.quantity, 1.0);
        assert!(item.unit_price.is_none());
    }
}
