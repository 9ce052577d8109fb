//! Common types shared by every supported accounting file format.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One normalized ledger line, whatever the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingLine {
    /// Journal code (e.g. `VT`, `BQ1`, `GENERAL JOURNAL`).
    pub journal_code: String,

    /// Journal label; defaults to the journal code.
    pub journal_name: String,

    /// Entry (voucher) number grouping the lines of one journal entry.
    pub entry_number: String,

    /// Physical line number in the source file (1-based, header is line 1).
    pub line_number: usize,

    /// Accounting date of the entry.
    pub entry_date: NaiveDate,

    /// Date of the supporting document.
    pub document_date: Option<NaiveDate>,

    /// Validation (posting) date.
    pub validation_date: Option<NaiveDate>,

    /// Account number in the chart of accounts.
    pub account_number: String,

    /// Account label.
    pub account_name: String,

    /// Auxiliary (sub-ledger) account, e.g. a customer or supplier code.
    pub auxiliary_account: Option<String>,

    /// Auxiliary account label.
    pub auxiliary_name: Option<String>,

    /// Supporting document reference.
    pub document_ref: Option<String>,

    /// Line description.
    pub description: String,

    /// Debit amount, zero when the line is a credit.
    pub debit: Decimal,

    /// Credit amount, zero when the line is a debit.
    pub credit: Decimal,

    /// Currency code (ISO 4217).
    pub currency: String,

    /// Amount expressed in the foreign currency, if any.
    pub foreign_amount: Option<Decimal>,

    /// Lettering (matching) code.
    pub lettering_code: Option<String>,

    /// Lettering date.
    pub lettering_date: Option<NaiveDate>,

    /// The raw source line, kept for diagnostics.
    pub raw: String,
}

impl AccountingLine {
    /// Key identifying the journal entry this line belongs to.
    pub fn entry_key(&self) -> EntryKey {
        EntryKey {
            journal_code: self.journal_code.clone(),
            entry_number: self.entry_number.clone(),
        }
    }

    /// Signed amount: debit minus credit.
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Journal code plus entry number: identifies a double-entry transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub journal_code: String,
    pub entry_number: String,
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.journal_code, self.entry_number)
    }
}

/// Debit/Credit indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitCredit {
    /// Debit side.
    Debit,
    /// Credit side.
    Credit,
}

impl FromStr for DebitCredit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "D" | "DR" | "DBIT" | "DEBIT" | "DÉBIT" => Ok(DebitCredit::Debit),
            "C" | "CR" | "CRDT" | "CREDIT" | "CRÉDIT" => Ok(DebitCredit::Credit),
            _ => Err(format!("Invalid debit/credit indicator: {}", s)),
        }
    }
}

impl DebitCredit {
    /// Short code used in FEC `Sens` columns.
    pub fn code(&self) -> &'static str {
        match self {
            DebitCredit::Debit => "D",
            DebitCredit::Credit => "C",
        }
    }
}

/// Accounting standard (chart of accounts family) a file follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountingStandard {
    /// French Plan Comptable Général.
    Pcg,
    /// OHADA zone chart (West/Central Africa).
    Syscohada,
    /// International Financial Reporting Standards.
    Ifrs,
    /// Système Comptable Financier (Maghreb).
    Scf,
    /// US generally accepted accounting principles.
    UsGaap,
}

impl FromStr for AccountingStandard {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "pcg" | "fr" | "france" => Ok(AccountingStandard::Pcg),
            "syscohada" | "ohada" => Ok(AccountingStandard::Syscohada),
            "ifrs" => Ok(AccountingStandard::Ifrs),
            "scf" => Ok(AccountingStandard::Scf),
            "us_gaap" | "usgaap" | "gaap" => Ok(AccountingStandard::UsGaap),
            _ => Err(Error::InvalidFormat(format!("unknown accounting standard: {}", s))),
        }
    }
}

impl AccountingStandard {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            AccountingStandard::Pcg => "PCG",
            AccountingStandard::Syscohada => "SYSCOHADA",
            AccountingStandard::Ifrs => "IFRS",
            AccountingStandard::Scf => "SCF",
            AccountingStandard::UsGaap => "US_GAAP",
        }
    }

    /// Account classes (first digit) defined by the standard's chart, if the
    /// standard uses a numbered chart.
    pub fn account_classes(&self) -> Option<&'static [char]> {
        match self {
            AccountingStandard::Pcg | AccountingStandard::Scf => {
                Some(&['1', '2', '3', '4', '5', '6', '7'])
            }
            AccountingStandard::Syscohada => {
                Some(&['1', '2', '3', '4', '5', '6', '7', '8', '9'])
            }
            AccountingStandard::Ifrs | AccountingStandard::UsGaap => None,
        }
    }
}

impl fmt::Display for AccountingStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Malformed value (date, amount, currency code).
    Format,
    /// Mandatory field missing or out of bounds.
    Validation,
    /// Business rule (journal codes, fiscal year, chart of accounts).
    Business,
    /// Debit/credit balance.
    Balance,
    /// Lines out of date order.
    Chronology,
    /// Line seen twice.
    Duplicate,
}

/// A per-row (or file-level, `line == 0`) diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Line number in the source file; 0 for file-level issues.
    pub line: usize,
    pub severity: Severity,
    pub kind: IssueKind,
    /// Logical field the issue relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    /// Suggested fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Raw line content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Issue {
    pub fn error(line: usize, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: Severity::Error,
            kind,
            field: None,
            message: message.into(),
            suggestion: None,
            data: None,
        }
    }

    pub fn warning(line: usize, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(line, kind, message)
        }
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_data(mut self, data: &str) -> Self {
        self.data = Some(data.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.line > 0 {
            write!(f, "{} (line {}", level, self.line)?;
        } else {
            write!(f, "{} (file", level)?;
        }
        if let Some(ref field) = self.field {
            write!(f, ", {}", field)?;
        }
        write!(f, "): {}", self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " [{}]", suggestion)?;
        }
        Ok(())
    }
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}
