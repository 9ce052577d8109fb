//! Pipeline configuration.
//!
//! Every section has usable defaults, so an empty TOML file (or
//! `ImportConfig::default()`) is a valid configuration:
//!
//! ```toml
//! [parse]
//! default_currency = "XOF"
//! expected_standard = "SYSCOHADA"
//!
//! [rules]
//! fiscal_year_start = "2024-01-01"
//! fiscal_year_end = "2024-12-31"
//! allowed_journals = ["VT", "AC", "BQ", "OD"]
//!
//! [import]
//! dry_run = true
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::AccountingStandard;
use crate::Format;

/// Complete configuration for [`ImportPipeline`](crate::ImportPipeline).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub parse: ParseOptions,
    pub rules: ValidationRules,
    pub import: ImportOptions,
}

impl ImportConfig {
    /// Load a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Options controlling detection and tokenizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Currency used when a line has no currency column.
    pub default_currency: String,

    /// Skip standard detection and use this one.
    pub expected_standard: Option<AccountingStandard>,

    /// Skip format detection and use this one.
    pub format: Option<Format>,

    /// Skip delimiter detection and use this one.
    pub delimiter: Option<char>,

    /// Skip encoding detection and decode with this label (e.g. `iso-8859-15`).
    pub encoding: Option<String>,

    /// Manual `field -> header` mapping applied over the detected layout,
    /// e.g. `account_number = "GL"`.
    pub columns: BTreeMap<String, String>,

    /// Read ambiguous `xx/yy/zzzz` dates as day first.
    pub day_first: bool,

    /// Number of lines kept for previews.
    pub preview_rows: usize,

    /// Tolerance for balance checks.
    pub balance_tolerance: Decimal,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_currency: "EUR".to_string(),
            expected_standard: None,
            format: None,
            delimiter: None,
            encoding: None,
            columns: BTreeMap::new(),
            day_first: true,
            preview_rows: 10,
            balance_tolerance: default_tolerance(),
        }
    }
}

/// Rules applied by the [`Validator`](crate::Validator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    /// First day of the fiscal year.
    pub fiscal_year_start: Option<NaiveDate>,

    /// Last day of the fiscal year.
    pub fiscal_year_end: Option<NaiveDate>,

    /// Journal codes the company uses; empty means "standard codes".
    pub allowed_journals: Vec<String>,

    /// Account numbers of the company chart; empty disables the check.
    pub chart_of_accounts: Vec<String>,

    /// Report unknown journals and accounts as errors instead of warnings.
    pub strict_references: bool,

    /// Tolerance for global and per-entry balance checks.
    pub balance_tolerance: Decimal,

    /// Warn when lines are not in date order.
    pub check_chronology: bool,

    /// Warn on repeated lines.
    pub check_duplicates: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            fiscal_year_start: None,
            fiscal_year_end: None,
            allowed_journals: Vec::new(),
            chart_of_accounts: Vec::new(),
            strict_references: false,
            balance_tolerance: default_tolerance(),
            check_chronology: true,
            check_duplicates: true,
        }
    }
}

/// Options for the transactional import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Run the whole import, then roll it back.
    pub dry_run: bool,

    /// Import even if validation reported errors.
    pub allow_invalid: bool,

    /// Create accounts missing from the store.
    pub create_missing_accounts: bool,

    /// Create journals missing from the store.
    pub create_missing_journals: bool,

    /// Tolerance for the per-entry balance check done before insertion.
    pub balance_tolerance: Decimal,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            allow_invalid: false,
            create_missing_accounts: true,
            create_missing_journals: true,
            balance_tolerance: default_tolerance(),
        }
    }
}

/// One cent.
pub fn default_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        let config = ImportConfig::from_toml_str("").unwrap();
        assert_eq!(config, ImportConfig::default());
        assert_eq!(config.parse.default_currency, "EUR");
        assert!(config.import.create_missing_accounts);
    }

    #[test]
    fn test_partial_config() {
        let config = ImportConfig::from_toml_str(
            r#"
            [parse]
            default_currency = "XOF"
            expected_standard = "SYSCOHADA"
            format = "FEC"
            delimiter = "|"

            [rules]
            fiscal_year_start = "2024-01-01"
            fiscal_year_end = "2024-12-31"
            allowed_journals = ["VT", "AC"]
            balance_tolerance = "0.05"

            [import]
            dry_run = true
            "#,
        )
        .unwrap();

        assert_eq!(config.parse.default_currency, "XOF");
        assert_eq!(config.parse.expected_standard, Some(AccountingStandard::Syscohada));
        assert_eq!(config.parse.format, Some(Format::Fec));
        assert_eq!(config.parse.delimiter, Some('|'));
        assert!(config.parse.day_first);
        assert_eq!(config.rules.fiscal_year_start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(config.rules.allowed_journals, vec!["VT".to_string(), "AC".to_string()]);
        assert_eq!(config.rules.balance_tolerance, Decimal::new(5, 2));
        assert!(config.import.dry_run);
        assert!(!config.import.allow_invalid);
    }

    #[test]
    fn test_column_mapping_and_format_names() {
        let config = ImportConfig::from_toml_str(
            r#"
            [parse]
            format = "QUICKBOOKS"

            [parse.columns]
            account_number = "GL"
            entry_date = "When"
            "#,
        )
        .unwrap();

        assert_eq!(config.parse.format, Some(Format::QuickBooks));
        assert_eq!(config.parse.columns.get("account_number").map(String::as_str), Some("GL"));
        assert_eq!(config.parse.columns.len(), 2);

        let ifrs = ImportConfig::from_toml_str("[parse]\nformat = \"IFRS_CSV\"").unwrap();
        assert_eq!(ifrs.parse.format, Some(Format::IfrsCsv));
    }

    #[test]
    fn test_invalid_config() {
        let err = ImportConfig::from_toml_str("[parse]\nday_first = \"maybe\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
