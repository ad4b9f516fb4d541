//! Extraction prompt builder
//!
//! The template is compiled into the binary and rendered with mustache-style
//! `{{var}}` replacement. Output depends only on the inputs.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use super::currency;

const EXTRACT_RECEIPT: &str = include_str!("../../prompts/extract_receipt.md");

/// Build the instruction sent alongside a receipt image
pub fn build_prompt(today: NaiveDate, categories: &[&str]) -> String {
    let today_str = today.format("%Y-%m-%d").to_string();
    let year = today.year().to_string();
    let year_short = format!("{:02}", today.year().rem_euclid(100));
    let categories = categories.join(", ");
    let rules = currency::prompt_rules();

    let vars: HashMap<&str, &str> = HashMap::from([
        ("today", today_str.as_str()),
        ("current_year", year.as_str()),
        ("current_year_short", year_short.as_str()),
        ("categories", categories.as_str()),
        ("currency_rules", rules.as_str()),
    ]);

    render(EXTRACT_RECEIPT, &vars)
}

fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let pattern = format!("{{{{{}}}}}", key);
        result = result.replace(&pattern, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let names = Category::names();
        assert_eq!(build_prompt(today(), &names), build_prompt(today(), &names));
    }

    #[test]
    fn test_all_placeholders_rendered() {
        let prompt = build_prompt(today(), &Category::names());
        assert!(!prompt.contains("{{"));
        assert!(prompt.contains("2025-02-14"));
        assert!(prompt.contains("the year is 2025"));
        assert!(prompt.contains("\"25\""));
    }

    #[test]
    fn test_prompt_lists_vocabulary_and_currency_rules() {
        let prompt = build_prompt(today(), &Category::names());
        for name in Category::names() {
            assert!(prompt.contains(name), "missing category {}", name);
        }
        assert!(prompt.contains(&currency::prompt_rules()));
        assert!(prompt.contains("Interac"));
        assert!(prompt.contains("2 decimal places"));
    }
}
