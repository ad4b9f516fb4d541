//! Extraction response parser
//!
//! Turns the model's reply into an [`ExtractionDraft`]. Each field has its
//! own normalizer returning a [`Normalized`] value, and the draft records
//! which fields fell back to a default.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use super::currency::{symbol_to_code, CurrencyRules};
use crate::error::ExtractionError;
use crate::models::{round_cents, Category, ExtractionDraft, LineItem, ReviewLevel};

/// Vendor used when the model gives none
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Confidence assumed when the model gives none
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// A field value plus whether it came from a fallback default
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Normalized<T> {
    fn given(value: T) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            defaulted: true,
        }
    }
}

/// Return the contents of the first fenced block, or the input unchanged
///
/// The opening fence may carry a language tag (```` ```json ````).
pub fn strip_fences(reply: &str) -> &str {
    let Some(open) = reply.find("```") else {
        return reply;
    };
    let after_open = &reply[open + 3..];
    // Skip the language tag up to the end of the fence line
    let body_start = match after_open.find('\n') {
        Some(nl) if !after_open[..nl].contains('{') => nl + 1,
        _ => 0,
    };
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Parse the reply into a JSON object
///
/// After fence stripping, a reply that is not valid JSON gets one repair
/// attempt on the span between the first `{` and the last `}`.
pub fn parse_object(reply: &str) -> Result<Map<String, Value>, ExtractionError> {
    let text = strip_fences(reply).trim();

    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(first) => {
            let repaired = match (text.find('{'), text.rfind('}')) {
                (Some(s), Some(e)) if s < e => serde_json::from_str::<Value>(&text[s..=e]).ok(),
                _ => None,
            };
            match repaired {
                Some(value) => {
                    debug!("Recovered JSON object from surrounding text");
                    value
                }
                None => {
                    return Err(ExtractionError::MalformedResponse(format!(
                        "{} | Raw: {}",
                        first,
                        truncate(text, 200)
                    )))
                }
            }
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractionError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

/// Parse and normalize a model reply into a reviewable draft
pub fn parse_reply(
    reply: &str,
    today: NaiveDate,
    rules: &CurrencyRules,
) -> Result<ExtractionDraft, ExtractionError> {
    let obj = parse_object(reply)?;
    let field = |name: &str| obj.get(name).filter(|v| !v.is_null());

    let vendor = normalize_vendor(field("vendor"));
    let date = normalize_date(field("date"), today);
    let amount = normalize_amount(field("amount"));
    let category = normalize_category(field("category"));
    let payment_method = normalize_optional_text(obj.get("payment_method"));
    let receipt_number = normalize_optional_text(obj.get("receipt_number"));
    let line_items = normalize_line_items(field("line_items"));
    let confidence = normalize_confidence(field("confidence_score"));

    let mut context = vendor.value.clone();
    for item in &line_items.value {
        context.push('\n');
        context.push_str(&item.description);
    }
    let currency = normalize_currency(field("currency"), &context, rules);

    let mut defaulted_fields = Vec::new();
    for (name, defaulted) in [
        ("vendor", vendor.defaulted),
        ("date", date.defaulted),
        ("amount", amount.defaulted),
        ("currency", currency.defaulted),
        ("category", category.defaulted),
        ("payment_method", payment_method.defaulted),
        ("receipt_number", receipt_number.defaulted),
        ("line_items", line_items.defaulted),
        ("confidence_score", confidence.defaulted),
    ] {
        if defaulted {
            defaulted_fields.push(name.to_string());
        }
    }

    Ok(ExtractionDraft {
        vendor: vendor.value,
        date: date.value,
        amount: amount.value,
        currency: currency.value,
        category: category.value,
        payment_method: payment_method.value,
        receipt_number: receipt_number.value,
        line_items: line_items.value,
        confidence_score: confidence.value,
        review: ReviewLevel::from_confidence(confidence.value),
        defaulted_fields,
    })
}

pub fn normalize_vendor(value: Option<&Value>) -> Normalized<String> {
    match value.and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Normalized::given(s.to_string()),
        _ => Normalized::fallback(UNKNOWN_VENDOR.to_string()),
    }
}

pub fn normalize_date(value: Option<&Value>, today: NaiveDate) -> Normalized<NaiveDate> {
    match value.and_then(Value::as_str).and_then(parse_date) {
        Some(date) => Normalized::given(date),
        None => Normalized::fallback(today),
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `MM/DD/YYYY`; a trailing time
/// after an ISO date is ignored
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            s.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

/// Non-negative, rounded to cents; anything else becomes 0
pub fn normalize_amount(value: Option<&Value>) -> Normalized<f64> {
    match value.and_then(coerce_number) {
        Some(n) if n >= 0.0 => Normalized::given(round_cents(n)),
        _ => Normalized::fallback(0.0),
    }
}

/// Absent means "Other". A present value is kept even when it is outside
/// the vocabulary; known names are only normalized to their canonical form.
pub fn normalize_category(value: Option<&Value>) -> Normalized<String> {
    match value.and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => match s.parse::<Category>() {
            Ok(category) => Normalized::given(category.as_str().to_string()),
            Err(_) => Normalized::given(s.to_string()),
        },
        _ => Normalized::fallback(Category::Other.as_str().to_string()),
    }
}

/// Code, then symbol, then the rule table over the receipt text
pub fn normalize_currency(
    value: Option<&Value>,
    context: &str,
    rules: &CurrencyRules,
) -> Normalized<String> {
    let raw = value.and_then(Value::as_str).map(str::trim).unwrap_or("");

    if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Normalized::given(raw.to_ascii_uppercase());
    }
    if let Some(code) = symbol_to_code(raw) {
        return Normalized::given(code.to_string());
    }

    let text = format!("{}\n{}", raw, context);
    Normalized::fallback(rules.detect_or_default(&text).to_string())
}

/// Null or absent is a normal "none"; only a value of the wrong shape
/// counts as defaulted
pub fn normalize_optional_text(value: Option<&Value>) -> Normalized<Option<String>> {
    match value {
        None | Some(Value::Null) => Normalized::given(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") {
                Normalized::given(None)
            } else {
                Normalized::given(Some(s.to_string()))
            }
        }
        Some(Value::Number(n)) => Normalized::given(Some(n.to_string())),
        Some(_) => Normalized::fallback(None),
    }
}

/// Items without a description are dropped; quantity defaults to 1
pub fn normalize_line_items(value: Option<&Value>) -> Normalized<Vec<LineItem>> {
    let Some(Value::Array(entries)) = value else {
        return Normalized::fallback(Vec::new());
    };

    let items = entries
        .iter()
        .filter_map(|entry| {
            let description = entry.get("description")?.as_str()?.trim();
            if description.is_empty() {
                return None;
            }
            let quantity = entry
                .get("quantity")
                .and_then(coerce_number)
                .filter(|q| *q > 0.0)
                .unwrap_or(1.0);
            Some(LineItem {
                description: description.to_string(),
                quantity,
                unit_price: entry.get("unit_price").and_then(coerce_number).map(round_cents),
                total: entry.get("total").and_then(coerce_number).map(round_cents),
            })
        })
        .collect();

    Normalized::given(items)
}

pub fn normalize_confidence(value: Option<&Value>) -> Normalized<f64> {
    match value.and_then(coerce_number) {
        Some(c) if (0.0..=1.0).contains(&c) => Normalized::given(c),
        _ => Normalized::fallback(DEFAULT_CONFIDENCE),
    }
}

/// Numbers pass through; strings like `"$1,234.50"` or `"12,50"` are
/// cleaned and parsed
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_decimal_text(s)?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A final comma followed by one or two digits is the decimal mark and
/// dots before it group thousands; otherwise commas group thousands.
/// Groups after the first must be exactly three digits.
fn parse_decimal_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let comma_decimal = cleaned.rfind(',').is_some_and(|i| {
        let tail = &cleaned[i + 1..];
        (1..=2).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_digit())
    });
    let (group, decimal) = if comma_decimal { ('.', ',') } else { (',', '.') };

    let (whole, fraction) = match cleaned.rsplit_once(decimal) {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };
    if whole.contains(decimal) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !whole
        .split(group)
        .skip(1)
        .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let digits: String = whole.chars().filter(|c| *c != group).collect();
    format!("{}.{}", digits, fraction).parse::<f64>().ok()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn parse(reply: &str) -> Result<ExtractionDraft, ExtractionError> {
        parse_reply(reply, today(), &CurrencyRules::new().unwrap())
    }

    #[test]
    fn test_full_reply() {
        let draft = parse(
            r#"{
                "vendor": "Tim Hortons #2231",
                "date": "2025-06-28",
                "amount": 7.456,
                "currency": "cad",
                "category": "Meals & Dining",
                "payment_method": "Interac",
                "receipt_number": 99812,
                "line_items": [
                    {"description": "Double Double", "quantity": 2, "unit_price": 2.19, "total": 4.38},
                    {"description": "Timbits", "unit_price": "$2.49"}
                ],
                "confidence_score": 0.93
            }"#,
        )
        .unwrap();

        assert_eq!(draft.vendor, "Tim Hortons #2231");
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2025, 6, 28).unwrap());
        assert_eq!(draft.amount, 7.46);
        assert_eq!(draft.currency, "CAD");
        assert_eq!(draft.payment_method.as_deref(), Some("Interac"));
        assert_eq!(draft.receipt_number.as_deref(), Some("99812"));
        assert_eq!(draft.line_items.len(), 2);
        assert_eq!(draft.line_items[1].quantity, 1.0);
        assert_eq!(draft.line_items[1].unit_price, Some(2.49));
        assert_eq!(draft.review, ReviewLevel::Ok);
        assert!(draft.defaulted_fields.is_empty());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let draft = parse(r#"{"vendor": "Corner Store"}"#).unwrap();
        assert_eq!(draft.amount, 0.0);
        assert_eq!(draft.category, "Other");
        assert_eq!(draft.confidence_score, 0.5);
        assert_eq!(draft.currency, "USD");
        assert_eq!(draft.date, today());
        assert!(draft.line_items.is_empty());
        assert!(draft.payment_method.is_none());
        assert_eq!(draft.review, ReviewLevel::LowConfidence);
        assert_eq!(
            draft.defaulted_fields,
            vec!["date", "amount", "currency", "category", "line_items", "confidence_score"]
        );
    }

    #[test]
    fn test_empty_object_defaults_vendor() {
        let draft = parse("{}").unwrap();
        assert_eq!(draft.vendor, "Unknown");
        assert!(draft.defaulted_fields.contains(&"vendor".to_string()));
    }

    #[test]
    fn test_out_of_vocabulary_category_passes_through() {
        let draft = parse(r#"{"category": "Pet Supplies"}"#).unwrap();
        assert_eq!(draft.category, "Pet Supplies");
        assert!(!draft.defaulted_fields.contains(&"category".to_string()));

        let draft = parse(r#"{"category": "office supplies"}"#).unwrap();
        assert_eq!(draft.category, "Office Supplies");
    }

    #[test]
    fn test_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"vendor\": \"Staples\", \"amount\": \"12.50\"}\n```\nThanks";
        let draft = parse(reply).unwrap();
        assert_eq!(draft.vendor, "Staples");
        assert_eq!(draft.amount, 12.5);
    }

    #[test]
    fn test_only_first_fenced_block_is_used() {
        let reply = "```\n{\"vendor\": \"First\"}\n```\n```\n{\"vendor\": \"Second\"}\n```";
        assert_eq!(parse(reply).unwrap().vendor, "First");
    }

    #[test]
    fn test_repair_surrounding_text() {
        let draft = parse("Sure! {\"vendor\": \"Shell\", \"amount\": 40} Let me know.").unwrap();
        assert_eq!(draft.vendor, "Shell");
        assert_eq!(draft.amount, 40.0);
    }

    #[test]
    fn test_malformed_replies() {
        assert!(matches!(
            parse("I could not read this receipt."),
            Err(ExtractionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse("{\"vendor\": "),
            Err(ExtractionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse("[1, 2, 3]"),
            Err(ExtractionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!("$1,234.50")), Some(1234.5));
        assert_eq!(coerce_number(&json!(12)), Some(12.0));
        assert_eq!(coerce_number(&json!("n/a")), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(coerce_number(&json!("12,50")), Some(12.5));
        assert_eq!(coerce_number(&json!("1.234,50")), Some(1234.5));
        assert_eq!(coerce_number(&json!("€ 3,9")), Some(3.9));
        assert_eq!(coerce_number(&json!("1,234")), Some(1234.0));
    }

    #[test]
    fn test_ambiguous_separators_are_defaulted() {
        assert_eq!(coerce_number(&json!("12,5000")), None);
        assert_eq!(coerce_number(&json!("1.2.3")), None);
        assert_eq!(coerce_number(&json!("1.2,50")), None);

        let draft = parse(r#"{"vendor": "Café Rouge", "amount": "1.23.4"}"#).unwrap();
        assert_eq!(draft.amount, 0.0);
        assert!(draft.defaulted_fields.contains(&"amount".to_string()));

        let draft = parse(r#"{"vendor": "Café Rouge", "amount": "1.234,50"}"#).unwrap();
        assert_eq!(draft.amount, 1234.5);
        assert!(!draft.defaulted_fields.contains(&"amount".to_string()));
    }

    #[test]
    fn test_bare_dollar_sign_uses_rule_table() {
        let with_symbol =
            parse(r#"{"vendor": "Tim Hortons #2231", "currency": "$"}"#).unwrap();
        let without = parse(r#"{"vendor": "Tim Hortons #2231"}"#).unwrap();
        assert_eq!(with_symbol.currency, "CAD");
        assert_eq!(with_symbol.currency, without.currency);

        let draft = parse(r#"{"vendor": "Corner Store", "currency": "$"}"#).unwrap();
        assert_eq!(draft.currency, "USD");
        assert!(draft.defaulted_fields.contains(&"currency".to_string()));
    }

    #[test]
    fn test_negative_amount_is_defaulted() {
        let n = normalize_amount(Some(&json!(-5.0)));
        assert_eq!(n, Normalized::fallback(0.0));
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(parse_date("2025-03-07"), Some(expected));
        assert_eq!(parse_date("2025/03/07"), Some(expected));
        assert_eq!(parse_date("03/07/2025"), Some(expected));
        assert_eq!(parse_date("2025-03-07T14:22:00"), Some(expected));
        assert_eq!(parse_date("March 7th"), None);
    }

    #[test]
    fn test_confidence_out_of_range() {
        assert_eq!(normalize_confidence(Some(&json!(85))).value, 0.5);
        assert_eq!(normalize_confidence(Some(&json!("0.8"))).value, 0.8);
        assert_eq!(
            parse(r#"{"confidence_score": 0.75}"#).unwrap().review,
            ReviewLevel::ReviewCarefully
        );
    }

    #[test]
    fn test_currency_from_symbol_and_rules() {
        let rules = CurrencyRules::new().unwrap();
        assert_eq!(
            normalize_currency(Some(&json!("£")), "", &rules),
            Normalized::given("GBP".to_string())
        );

        let detected = normalize_currency(None, "Loblaws\nMilk 2L", &rules);
        assert_eq!(detected.value, "CAD");
        assert!(detected.defaulted);

        let draft = parse(r#"{"vendor": "Canadian Tire", "currency": "dollars"}"#).unwrap();
        assert_eq!(draft.currency, "CAD");
    }

    #[test]
    fn test_line_items_without_description_are_skipped() {
        let items = normalize_line_items(Some(&json!([
            {"description": "", "total": 1.0},
            {"total": 2.0},
            {"description": "Paper", "quantity": 0, "total": "3.00"}
        ])));
        assert_eq!(items.value.len(), 1);
        assert_eq!(items.value[0].description, "Paper");
        assert_eq!(items.value[0].quantity, 1.0);
        assert_eq!(items.value[0].total, Some(3.0));
    }
}
