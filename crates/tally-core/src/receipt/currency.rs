//! Currency detection rule table
//!
//! An ordered list of (pattern, currency) rules grouped by signal strength.
//! Evaluation walks the table top to bottom and the first match wins, so a
//! stronger signal always beats a weaker one. The same table is rendered
//! into the extraction prompt so the model and the parser apply identical
//! rules.

use regex::Regex;

use crate::error::Result;
use crate::models::DEFAULT_CURRENCY;

/// How strong a piece of evidence is, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Signal {
    /// A currency code or unambiguous symbol printed on the receipt
    ExplicitCode,
    /// A sales-tax label only used in one country
    TaxLabel,
    /// A merchant that only trades in one country
    KnownMerchant,
    /// A postal code, province or country name in the address
    AddressRegion,
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExplicitCode => "explicit currency code",
            Self::TaxLabel => "regional tax label",
            Self::KnownMerchant => "known merchant",
            Self::AddressRegion => "address region",
        }
    }
}

/// One row of the table
#[derive(Debug, Clone, Copy)]
pub struct CurrencyRule {
    pub signal: Signal,
    /// Human-readable description, also used in the prompt
    pub evidence: &'static str,
    pub pattern: &'static str,
    pub currency: &'static str,
}

/// The table, in evaluation order
pub const RULES: &[CurrencyRule] = &[
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "CAD, C$ or CA$",
        pattern: r"(?i)\bCAD\b|\bCA?\$",
        currency: "CAD",
    },
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "USD or US$",
        pattern: r"(?i)\bUSD\b|\bUS\$",
        currency: "USD",
    },
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "GBP or £",
        pattern: r"(?i)\bGBP\b|£",
        currency: "GBP",
    },
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "EUR or €",
        pattern: r"(?i)\bEUR\b|€",
        currency: "EUR",
    },
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "AUD or A$",
        pattern: r"(?i)\bAUD\b|\bA\$",
        currency: "AUD",
    },
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "INR or ₹",
        pattern: r"(?i)\bINR\b|₹",
        currency: "INR",
    },
    CurrencyRule {
        signal: Signal::ExplicitCode,
        evidence: "JPY or ¥",
        pattern: r"(?i)\bJPY\b|¥",
        currency: "JPY",
    },
    CurrencyRule {
        signal: Signal::TaxLabel,
        evidence: "HST, PST, QST, GST/HST, TPS or TVQ",
        pattern: r"\b(HST|PST|QST|TPS|TVQ)\b",
        currency: "CAD",
    },
    CurrencyRule {
        signal: Signal::TaxLabel,
        evidence: "CGST, SGST or IGST",
        pattern: r"\b(CGST|SGST|IGST)\b",
        currency: "INR",
    },
    CurrencyRule {
        signal: Signal::KnownMerchant,
        evidence: "Tim Hortons, Loblaws, Canadian Tire, Shoppers Drug Mart, Sobeys, No Frills, Real Canadian Superstore, Petro-Canada, Hudson's Bay, Indigo",
        pattern: r"(?i)\b(tim hortons|loblaws|canadian tire|shoppers drug mart|sobeys|no frills|real canadian superstore|petro-canada|hudson'?s bay|indigo)\b",
        currency: "CAD",
    },
    CurrencyRule {
        signal: Signal::KnownMerchant,
        evidence: "Tesco, Sainsbury's, Waitrose, Asda, Greggs, Argos",
        pattern: r"(?i)\b(tesco|sainsbury'?s?|waitrose|asda|greggs|argos)\b",
        currency: "GBP",
    },
    CurrencyRule {
        signal: Signal::KnownMerchant,
        evidence: "Coles, Bunnings, JB Hi-Fi",
        pattern: r"(?i)\b(coles|bunnings|jb hi-fi)\b",
        currency: "AUD",
    },
    CurrencyRule {
        signal: Signal::AddressRegion,
        evidence: "a Canadian postal code (e.g. M5V 3L9) or province abbreviation after a city",
        pattern: r"\b[ABCEGHJ-NPRSTVXY]\d[ABCEGHJ-NPRSTV-Z] ?\d[ABCEGHJ-NPRSTV-Z]\d\b|, (ON|QC|BC|AB|MB|SK|NS|NB|NL|PE)\b",
        currency: "CAD",
    },
    CurrencyRule {
        signal: Signal::AddressRegion,
        evidence: "Canada in the address",
        pattern: r"(?i)\bcanada\b",
        currency: "CAD",
    },
    CurrencyRule {
        signal: Signal::AddressRegion,
        evidence: "United Kingdom or UK in the address",
        pattern: r"(?i)\bunited kingdom\b|\bU\.?K\.?\b",
        currency: "GBP",
    },
];

/// A currency decision and the evidence behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub currency: &'static str,
    pub signal: Signal,
}

/// [`RULES`] with their patterns compiled
#[derive(Debug, Clone)]
pub struct CurrencyRules {
    compiled: Vec<(CurrencyRule, Regex)>,
}

impl CurrencyRules {
    pub fn new() -> Result<Self> {
        let compiled = RULES
            .iter()
            .map(|rule| Ok((*rule, Regex::new(rule.pattern)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { compiled })
    }

    /// First matching rule, if any
    pub fn detect(&self, text: &str) -> Option<Detection> {
        self.compiled
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(rule, _)| Detection {
                currency: rule.currency,
                signal: rule.signal,
            })
    }

    /// Like [`detect`](Self::detect) but falls back to the default currency
    pub fn detect_or_default(&self, text: &str) -> &'static str {
        self.detect(text)
            .map(|d| d.currency)
            .unwrap_or(DEFAULT_CURRENCY)
    }
}

/// Render the table as numbered prompt instructions
pub fn prompt_rules() -> String {
    let mut lines = Vec::with_capacity(RULES.len() + 1);
    for (i, rule) in RULES.iter().enumerate() {
        lines.push(format!(
            "{}. [{}] {} -> {}",
            i + 1,
            rule.signal.label(),
            rule.evidence,
            rule.currency
        ));
    }
    lines.push(format!(
        "{}. [default] none of the above -> {}",
        RULES.len() + 1,
        DEFAULT_CURRENCY
    ));
    lines.join("\n")
}

/// Map a printed currency symbol to its code
///
/// A bare `$` is shared by too many currencies and maps to nothing.
pub fn symbol_to_code(symbol: &str) -> Option<&'static str> {
    match symbol.trim() {
        "US$" => Some("USD"),
        "C$" | "CA$" => Some("CAD"),
        "A$" => Some("AUD"),
        "£" => Some("GBP"),
        "€" => Some("EUR"),
        "¥" => Some("JPY"),
        "₹" => Some("INR"),
        _ => None,
    }
}
