//! Ledger Import Library
//!
//! A library for detecting, parsing, validating and importing general-ledger
//! exports produced by accounting software across several jurisdictions.
//!
//! # Supported Formats
//!
//! - **FEC**: French *Fichier des Écritures Comptables* (DGFiP)
//! - **SYSCOHADA**: OHADA zone ledgers
//! - **SCF**: Maghreb *Système Comptable Financier* ledgers
//! - **IFRS CSV**: international debit/credit exports
//! - **QuickBooks**: IIF and journal CSV exports
//! - **Sage** and **Xero** exports
//! - Any other delimited ledger with recognizable headers
//!
//! # Pipeline
//!
//! raw bytes → [`encoding`] → [`detect`] → [`parser`] → [`validate`] →
//! [`stats`] → [`importer`] (optional, transactional) or [`export`].
//!
//! # Examples
//!
//! ## Validating a FEC file
//!
//! ```no_run
//! use ledger_import::{ImportConfig, ImportPipeline};
//!
//! let bytes = std::fs::read("123456789FEC20241231.txt")?;
//! let pipeline = ImportPipeline::new(ImportConfig::default());
//! let (parsed, report) = pipeline.validate(&bytes)?;
//! println!("{} lines, valid: {}", parsed.lines.len(), report.is_valid);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Importing into a ledger store
//!
//! ```no_run
//! use ledger_import::{ImportConfig, ImportPipeline, LedgerStore};
//!
//! let bytes = std::fs::read("export.csv")?;
//! let mut store = LedgerStore::open("ledger.db")?;
//! let pipeline = ImportPipeline::new(ImportConfig::default());
//! let outcome = pipeline.import(&bytes, &mut store, "ACME")?;
//! println!("{} entries created", outcome.summary.entries_created);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod logging;
pub mod encoding;
pub mod fields;
pub mod columns;
pub mod detect;
pub mod parser;
pub mod stats;
pub mod validate;
pub mod importer;
pub mod export;
pub mod pipeline;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// Re-export commonly used types
pub use config::{ImportConfig, ImportOptions, ParseOptions, ValidationRules};
pub use error::{Error, Result};
pub use importer::{ImportSummary, LedgerStore};
pub use parser::{LedgerParser, ParseResult};
pub use pipeline::{ImportOutcome, ImportPipeline};
pub use stats::Statistics;
pub use types::{AccountingLine, AccountingStandard, DebitCredit, Issue, IssueKind, Severity};
pub use validate::{ValidationReport, Validator};

/// Supported accounting file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    /// French FEC (DGFiP audit file)
    Fec,
    /// SYSCOHADA ledger
    Syscohada,
    /// Maghreb SCF ledger
    Scf,
    /// IFRS debit/credit CSV
    IfrsCsv,
    /// QuickBooks IIF or journal export
    #[serde(rename = "QUICKBOOKS")]
    QuickBooks,
    /// Sage nominal ledger export
    Sage,
    /// Xero journal or invoice export
    Xero,
    /// Unrecognized layout, parsed through column aliases only
    Generic,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fec" => Ok(Format::Fec),
            "syscohada" | "ohada" => Ok(Format::Syscohada),
            "scf" => Ok(Format::Scf),
            "ifrs" | "ifrs_csv" | "ifrs-csv" => Ok(Format::IfrsCsv),
            "quickbooks" | "qb" | "iif" => Ok(Format::QuickBooks),
            "sage" => Ok(Format::Sage),
            "xero" => Ok(Format::Xero),
            "generic" | "csv" => Ok(Format::Generic),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

impl Format {
    /// Every format, in detection priority order.
    pub const ALL: [Format; 8] = [
        Format::Fec,
        Format::Syscohada,
        Format::Scf,
        Format::IfrsCsv,
        Format::QuickBooks,
        Format::Sage,
        Format::Xero,
        Format::Generic,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Fec => "FEC",
            Format::Syscohada => "SYSCOHADA",
            Format::Scf => "SCF",
            Format::IfrsCsv => "IFRS_CSV",
            Format::QuickBooks => "QUICKBOOKS",
            Format::Sage => "SAGE",
            Format::Xero => "XERO",
            Format::Generic => "GENERIC",
        }
    }

    /// Accounting standard implied by the format itself, if any.
    pub fn implied_standard(&self) -> Option<AccountingStandard> {
        match self {
            Format::Fec => Some(AccountingStandard::Pcg),
            Format::Syscohada => Some(AccountingStandard::Syscohada),
            Format::Scf => Some(AccountingStandard::Scf),
            Format::IfrsCsv => Some(AccountingStandard::Ifrs),
            _ => None,
        }
    }

    /// Whether dates in this format are written month first.
    pub fn month_first_dates(&self) -> bool {
        matches!(self, Format::QuickBooks)
    }

    /// Format hint from a file extension. Only unambiguous extensions give
    /// a hint; everything else is left to content detection.
    pub fn from_extension(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "iif" => Some(Format::QuickBooks),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
