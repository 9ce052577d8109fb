//! Transactional import of parsed lines into a local SQLite ledger.
//!
//! Every import runs in one transaction: either all accepted entries are
//! written, or (on a database error or a dry run) nothing is.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::ImportOptions;
use crate::error::Result;
use crate::stats::{group_entries, EntryGroup};
use crate::types::AccountingLine;

/// Busy timeout applied to every connection.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS journals (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id  TEXT NOT NULL,
    code        TEXT NOT NULL,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    UNIQUE (company_id, code)
);

CREATE TABLE IF NOT EXISTS accounts (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id   TEXT NOT NULL,
    number       TEXT NOT NULL,
    name         TEXT NOT NULL,
    account_type TEXT NOT NULL,
    class        TEXT NOT NULL,
    UNIQUE (company_id, number)
);

CREATE TABLE IF NOT EXISTS journal_entries (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    company_id    TEXT NOT NULL,
    journal_id    INTEGER NOT NULL REFERENCES journals (id),
    entry_number  TEXT NOT NULL,
    entry_date    TEXT NOT NULL,
    description   TEXT NOT NULL,
    reference     TEXT,
    total_debit   TEXT NOT NULL,
    total_credit  TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'IMPORTED',
    UNIQUE (company_id, journal_id, entry_number)
);

CREATE TABLE IF NOT EXISTS journal_entry_lines (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id          INTEGER NOT NULL REFERENCES journal_entries (id) ON DELETE CASCADE,
    line_number       INTEGER NOT NULL,
    account_id        INTEGER NOT NULL REFERENCES accounts (id),
    auxiliary_account TEXT,
    description       TEXT NOT NULL,
    debit             TEXT NOT NULL,
    credit            TEXT NOT NULL,
    currency          TEXT NOT NULL,
    foreign_amount    TEXT,
    lettering_code    TEXT,
    source_line       INTEGER NOT NULL
);
"#;

/// Journal category derived from the journal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalKind {
    Opening,
    Sales,
    Purchases,
    Bank,
    Cash,
    Reversal,
    Misc,
}

impl JournalKind {
    pub fn from_code(code: &str) -> Self {
        let code = code.to_uppercase();
        let starts = |prefixes: &[&str]| prefixes.iter().any(|p| code.starts_with(p));
        if starts(&["AN"]) {
            JournalKind::Opening
        } else if starts(&["VE", "VT"]) {
            JournalKind::Sales
        } else if starts(&["AC", "AH"]) {
            JournalKind::Purchases
        } else if starts(&["BQ", "BA"]) {
            JournalKind::Bank
        } else if starts(&["CA"]) {
            JournalKind::Cash
        } else if starts(&["EX"]) {
            JournalKind::Reversal
        } else {
            JournalKind::Misc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JournalKind::Opening => "OPENING",
            JournalKind::Sales => "SALES",
            JournalKind::Purchases => "PURCHASES",
            JournalKind::Bank => "BANK",
            JournalKind::Cash => "CASH",
            JournalKind::Reversal => "REVERSAL",
            JournalKind::Misc => "MISC",
        }
    }

    /// Name given to a journal created without a label.
    pub fn label(&self) -> &'static str {
        match self {
            JournalKind::Opening => "Opening balances",
            JournalKind::Sales => "Sales",
            JournalKind::Purchases => "Purchases",
            JournalKind::Bank => "Bank",
            JournalKind::Cash => "Cash",
            JournalKind::Reversal => "Reversals",
            JournalKind::Misc => "Miscellaneous",
        }
    }
}

/// Account type and class derived from the first digit of the number.
pub fn account_type(number: &str) -> (&'static str, String) {
    let first = number.chars().next().filter(|c| c.is_ascii_digit());
    let kind = match first {
        Some('1') => "CAPITAL",
        Some('2') => "FIXED_ASSET",
        Some('3') => "INVENTORY",
        Some('4') => "THIRD_PARTY",
        Some('5') => "FINANCIAL",
        Some('6') => "EXPENSE",
        Some('7') => "REVENUE",
        Some('8') => "SPECIAL",
        _ => "OTHER",
    };
    let class = match first {
        Some(digit) => format!("CLASS_{}", digit),
        None => "UNCLASSIFIED".to_string(),
    };
    (kind, class)
}

/// Counts reported by [`LedgerStore::import`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub journals_created: usize,
    pub journals_existing: usize,
    pub accounts_created: usize,
    pub accounts_existing: usize,
    pub entries_created: usize,
    /// Entries already present for the company, skipped.
    pub entries_existing: usize,
    pub entries_rejected: usize,
    pub lines_created: usize,
    /// One message per rejected entry.
    pub rejections: Vec<String>,
    /// The transaction was rolled back.
    pub dry_run: bool,
}

/// SQLite-backed ledger.
pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    /// Open (or create) a ledger database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Import lines for a company.
    ///
    /// Lines are grouped by journal code and entry number. Unbalanced
    /// entries, and entries referencing journals or accounts that may not be
    /// created, are rejected. Entries already stored are skipped.
    #[instrument(skip(self, lines, options), fields(lines = lines.len(), dry_run = options.dry_run))]
    pub fn import(
        &mut self,
        company_id: &str,
        lines: &[AccountingLine],
        options: &ImportOptions,
    ) -> Result<ImportSummary> {
        let tx = self.conn.transaction()?;
        let mut summary = ImportSummary {
            dry_run: options.dry_run,
            ..ImportSummary::default()
        };
        let mut journals: HashMap<String, Option<i64>> = HashMap::new();
        let mut accounts: HashMap<String, Option<i64>> = HashMap::new();

        for entry in group_entries(lines) {
            if !entry.is_balanced(options.balance_tolerance) {
                reject(
                    &mut summary,
                    format!(
                        "Entry {} rejected: debit {} does not equal credit {}",
                        entry.key,
                        entry.debit(),
                        entry.credit()
                    ),
                );
                continue;
            }

            let Some(journal_id) = resolve_journal(&tx, company_id, &entry, options, &mut journals, &mut summary)?
            else {
                reject(
                    &mut summary,
                    format!("Entry {} rejected: unknown journal {}", entry.key, entry.key.journal_code),
                );
                continue;
            };

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM journal_entries WHERE company_id = ?1 AND journal_id = ?2 AND entry_number = ?3",
                    params![company_id, journal_id, entry.key.entry_number],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                summary.entries_existing += 1;
                continue;
            }

            let mut account_ids = Vec::with_capacity(entry.lines.len());
            let mut unknown = None;
            for line in &entry.lines {
                match resolve_account(&tx, company_id, line, options, &mut accounts, &mut summary)? {
                    Some(id) => account_ids.push(id),
                    None => {
                        unknown = Some(line.account_number.clone());
                        break;
                    }
                }
            }
            if let Some(account) = unknown {
                reject(
                    &mut summary,
                    format!("Entry {} rejected: unknown account {}", entry.key, account),
                );
                continue;
            }

            insert_entry(&tx, company_id, journal_id, &entry, &account_ids)?;
            summary.entries_created += 1;
            summary.lines_created += entry.lines.len();
        }

        if options.dry_run {
            tx.rollback()?;
        } else {
            tx.commit()?;
        }

        info!(
            entries_created = summary.entries_created,
            entries_existing = summary.entries_existing,
            entries_rejected = summary.entries_rejected,
            lines_created = summary.lines_created,
            "import finished"
        );
        Ok(summary)
    }

    pub fn journal_count(&self, company_id: &str) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM journals WHERE company_id = ?1", company_id)
    }

    pub fn account_count(&self, company_id: &str) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM accounts WHERE company_id = ?1", company_id)
    }

    pub fn entry_count(&self, company_id: &str) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM journal_entries WHERE company_id = ?1", company_id)
    }

    pub fn line_count(&self, company_id: &str) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM journal_entry_lines l
             JOIN journal_entries e ON e.id = l.entry_id
             WHERE e.company_id = ?1",
            company_id,
        )
    }

    /// Underlying connection, for ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn count(&self, sql: &str, company_id: &str) -> Result<usize> {
        let n: i64 = self.conn.query_row(sql, params![company_id], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn reject(summary: &mut ImportSummary, message: String) {
    warn!("{}", message);
    summary.entries_rejected += 1;
    summary.rejections.push(message);
}

fn resolve_journal(
    tx: &Transaction<'_>,
    company_id: &str,
    entry: &EntryGroup<'_>,
    options: &ImportOptions,
    cache: &mut HashMap<String, Option<i64>>,
    summary: &mut ImportSummary,
) -> Result<Option<i64>> {
    let code = &entry.key.journal_code;
    if let Some(id) = cache.get(code) {
        return Ok(*id);
    }

    let found: Option<i64> = tx
        .query_row(
            "SELECT id FROM journals WHERE company_id = ?1 AND code = ?2",
            params![company_id, code],
            |row| row.get(0),
        )
        .optional()?;

    let id = match found {
        Some(id) => {
            summary.journals_existing += 1;
            Some(id)
        }
        None if options.create_missing_journals => {
            let kind = JournalKind::from_code(code);
            let name = entry
                .lines
                .first()
                .map(|l| l.journal_name.as_str())
                .filter(|n| !n.is_empty())
                .unwrap_or(kind.label());
            tx.execute(
                "INSERT INTO journals (company_id, code, name, kind) VALUES (?1, ?2, ?3, ?4)",
                params![company_id, code, name, kind.as_str()],
            )?;
            summary.journals_created += 1;
            Some(tx.last_insert_rowid())
        }
        None => None,
    };

    cache.insert(code.clone(), id);
    Ok(id)
}

fn resolve_account(
    tx: &Transaction<'_>,
    company_id: &str,
    line: &AccountingLine,
    options: &ImportOptions,
    cache: &mut HashMap<String, Option<i64>>,
    summary: &mut ImportSummary,
) -> Result<Option<i64>> {
    let number = &line.account_number;
    if let Some(id) = cache.get(number) {
        return Ok(*id);
    }

    let found: Option<i64> = tx
        .query_row(
            "SELECT id FROM accounts WHERE company_id = ?1 AND number = ?2",
            params![company_id, number],
            |row| row.get(0),
        )
        .optional()?;

    let id = match found {
        Some(id) => {
            summary.accounts_existing += 1;
            Some(id)
        }
        None if options.create_missing_accounts => {
            let (kind, class) = account_type(number);
            let name = if line.account_name.is_empty() {
                number.as_str()
            } else {
                line.account_name.as_str()
            };
            tx.execute(
                "INSERT INTO accounts (company_id, number, name, account_type, class) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![company_id, number, name, kind, class],
            )?;
            summary.accounts_created += 1;
            Some(tx.last_insert_rowid())
        }
        None => None,
    };

    cache.insert(number.clone(), id);
    Ok(id)
}

fn insert_entry(
    tx: &Transaction<'_>,
    company_id: &str,
    journal_id: i64,
    entry: &EntryGroup<'_>,
    account_ids: &[i64],
) -> Result<()> {
    let first = entry.lines.first();
    tx.execute(
        r#"INSERT INTO journal_entries (
                company_id, journal_id, entry_number, entry_date, description,
                reference, total_debit, total_credit
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            company_id,
            journal_id,
            entry.key.entry_number,
            first.map(|l| l.entry_date),
            first.map(|l| l.description.as_str()).unwrap_or_default(),
            first.and_then(|l| l.document_ref.as_deref()),
            entry.debit().to_string(),
            entry.credit().to_string(),
        ],
    )?;
    let entry_id = tx.last_insert_rowid();

    let mut stmt = tx.prepare(
        r#"INSERT INTO journal_entry_lines (
                entry_id, line_number, account_id, auxiliary_account, description,
                debit, credit, currency, foreign_amount, lettering_code, source_line
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
    )?;
    for (idx, (line, account_id)) in entry.lines.iter().zip(account_ids).enumerate() {
        stmt.execute(params![
            entry_id,
            (idx + 1) as i64,
            account_id,
            line.auxiliary_account,
            line.description,
            line.debit.to_string(),
            line.credit.to_string(),
            line.currency,
            line.foreign_amount.map(|a| a.to_string()),
            line.lettering_code,
            line.line_number as i64,
        ])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests::line;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<AccountingLine> {
        vec![
            line("VT", "1", "2024-01-05", "411000", "120", "0"),
            line("VT", "1", "2024-01-05", "706000", "0", "100"),
            line("VT", "1", "2024-01-05", "445710", "0", "20"),
            line("BQ", "2", "2024-01-06", "512000", "120", "0"),
            line("BQ", "2", "2024-01-06", "411000", "0", "120"),
        ]
    }

    #[test]
    fn test_journal_kind_and_account_type() {
        assert_eq!(JournalKind::from_code("AN"), JournalKind::Opening);
        assert_eq!(JournalKind::from_code("vt01"), JournalKind::Sales);
        assert_eq!(JournalKind::from_code("ACH"), JournalKind::Purchases);
        assert_eq!(JournalKind::from_code("BQ2"), JournalKind::Bank);
        assert_eq!(JournalKind::from_code("CAIS"), JournalKind::Cash);
        assert_eq!(JournalKind::from_code("EXT"), JournalKind::Reversal);
        assert_eq!(JournalKind::from_code("OD"), JournalKind::Misc);

        assert_eq!(account_type("411000"), ("THIRD_PARTY", "CLASS_4".to_string()));
        assert_eq!(account_type("60110000"), ("EXPENSE", "CLASS_6".to_string()));
        assert_eq!(account_type("9000"), ("OTHER", "CLASS_9".to_string()));
        assert_eq!(account_type("Checking"), ("OTHER", "UNCLASSIFIED".to_string()));
    }

    #[test]
    fn test_import_creates_everything() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let summary = store.import("ACME", &sample(), &ImportOptions::default()).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                journals_created: 2,
                journals_existing: 0,
                accounts_created: 4,
                accounts_existing: 0,
                entries_created: 2,
                entries_existing: 0,
                entries_rejected: 0,
                lines_created: 5,
                rejections: vec![],
                dry_run: false,
            }
        );
        assert_eq!(store.entry_count("ACME").unwrap(), 2);
        assert_eq!(store.line_count("ACME").unwrap(), 5);
        assert_eq!(store.account_count("ACME").unwrap(), 4);
        assert_eq!(store.journal_count("OTHER").unwrap(), 0);

        let (kind, total): (String, String) = store
            .connection()
            .query_row(
                "SELECT j.kind, e.total_debit FROM journal_entries e JOIN journals j ON j.id = e.journal_id
                 WHERE e.entry_number = '1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(kind, "SALES");
        assert_eq!(total, "120");

        let (stored, date): (String, chrono::NaiveDate) = store
            .connection()
            .query_row(
                "SELECT entry_date, entry_date FROM journal_entries WHERE entry_number = '2'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(stored, "2024-01-06");
        assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        store.import("ACME", &sample(), &ImportOptions::default()).unwrap();
        let again = store.import("ACME", &sample(), &ImportOptions::default()).unwrap();

        assert_eq!(again.entries_created, 0);
        assert_eq!(again.entries_existing, 2);
        assert_eq!(again.journals_existing, 2);
        assert_eq!(again.lines_created, 0);
        assert_eq!(store.line_count("ACME").unwrap(), 5);

        // another company gets its own ledger
        let other = store.import("GLOBEX", &sample(), &ImportOptions::default()).unwrap();
        assert_eq!(other.entries_created, 2);
    }

    #[test]
    fn test_dry_run_rolls_back() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        let options = ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        };
        let summary = store.import("ACME", &sample(), &options).unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.entries_created, 2);
        assert_eq!(summary.lines_created, 5);
        assert_eq!(store.entry_count("ACME").unwrap(), 0);
        assert_eq!(store.account_count("ACME").unwrap(), 0);
    }

    #[test]
    fn test_unbalanced_entry_rejected() {
        let mut lines = sample();
        lines[4].credit = rust_decimal::Decimal::from(100);

        let mut store = LedgerStore::open_in_memory().unwrap();
        let summary = store.import("ACME", &lines, &ImportOptions::default()).unwrap();

        assert_eq!(summary.entries_created, 1);
        assert_eq!(summary.entries_rejected, 1);
        assert_eq!(
            summary.rejections,
            vec!["Entry BQ-2 rejected: debit 120 does not equal credit 100".to_string()]
        );
        assert_eq!(store.line_count("ACME").unwrap(), 3);
    }

    #[test]
    fn test_missing_references_without_creation() {
        let mut store = LedgerStore::open_in_memory().unwrap();
        store.import("ACME", &sample()[..3], &ImportOptions::default()).unwrap();

        let options = ImportOptions {
            create_missing_accounts: false,
            create_missing_journals: false,
            ..ImportOptions::default()
        };
        let mut lines = sample();
        lines.push(line("VT", "3", "2024-01-07", "411000", "50", "0"));
        lines.push(line("VT", "3", "2024-01-07", "708000", "0", "50"));
        let summary = store.import("ACME", &lines, &options).unwrap();

        assert_eq!(summary.entries_existing, 1);
        assert_eq!(summary.entries_rejected, 2);
        assert_eq!(summary.rejections[0], "Entry BQ-2 rejected: unknown journal BQ");
        assert_eq!(summary.rejections[1], "Entry VT-3 rejected: unknown account 708000");
        assert_eq!(summary.journals_created, 0);
        assert_eq!(summary.accounts_created, 0);
        assert_eq!(store.entry_count("ACME").unwrap(), 1);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut store = LedgerStore::open(&path).unwrap();
            store.import("ACME", &sample(), &ImportOptions::default()).unwrap();
        }

        let store = LedgerStore::open(&path).unwrap();
        assert_eq!(store.entry_count("ACME").unwrap(), 2);
    }
}
