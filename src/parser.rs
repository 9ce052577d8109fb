//! Row parser: turns decoded ledger text into [`AccountingLine`]s.
//!
//! Parsing never fails on bad rows. Each rejected row becomes an error
//! [`Issue`] carrying its physical line number, and the remaining rows are
//! still returned. `Err` is reserved for I/O and decoding failures.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, info, warn};

use crate::columns::{ColumnMap, Field};
use crate::config::ParseOptions;
use crate::detect::{detect_delimiter, detect_format, resolve_standard};
use crate::encoding::{decode, DetectedEncoding};
use crate::error::Result;
use crate::fields::{clean_cell, parse_amount, parse_date};
use crate::stats::Statistics;
use crate::types::{AccountingLine, AccountingStandard, DebitCredit, Issue, IssueKind};
use crate::Format;

/// Journal code used when a row has none.
const DEFAULT_JOURNAL: &str = "OD";

/// Outcome of parsing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    /// No errors were reported, or at least one line was parsed.
    pub success: bool,
    pub format: Format,
    pub standard: Option<AccountingStandard>,
    pub encoding: Option<DetectedEncoding>,
    pub delimiter: char,
    pub headers: Vec<String>,
    /// Resolved `field -> header` names.
    pub columns: BTreeMap<String, String>,
    pub lines: Vec<AccountingLine>,
    pub issues: Vec<Issue>,
    /// Informational notes about detection decisions.
    pub notes: Vec<String>,
    pub stats: Statistics,
}

impl ParseResult {
    fn failed(issue: Issue) -> Self {
        ParseResult {
            success: false,
            format: Format::Generic,
            standard: None,
            encoding: None,
            delimiter: ',',
            headers: Vec::new(),
            columns: BTreeMap::new(),
            lines: Vec::new(),
            issues: vec![issue],
            notes: Vec::new(),
            stats: Statistics::default(),
        }
    }

    /// First `n` lines.
    pub fn preview(&self, n: usize) -> &[AccountingLine] {
        &self.lines[..n.min(self.lines.len())]
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// One tokenized record with its physical line number.
struct Row {
    line: usize,
    cells: Vec<String>,
    raw: String,
}

/// Values a QuickBooks `TRNS` row hands down to its `SPL` rows.
#[derive(Default)]
struct OpenTransaction {
    entry_number: String,
    date: String,
    journal: String,
}

/// Parser for delimited ledger exports.
#[derive(Debug, Clone, Default)]
pub struct LedgerParser {
    options: ParseOptions,
}

impl LedgerParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a file from any source implementing `Read`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use ledger_import::{LedgerParser, ParseOptions};
    ///
    /// let mut file = File::open("123456789FEC20241231.txt")?;
    /// let result = LedgerParser::new(ParseOptions::default()).parse_read(&mut file)?;
    /// println!("{} lines in {} format", result.lines.len(), result.format);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn parse_read<R: Read>(&self, reader: &mut R) -> Result<ParseResult> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.parse_bytes(&bytes)
    }

    /// Decode and parse raw file content.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParseResult> {
        let (text, encoding) = decode(bytes, self.options.encoding.as_deref())?;
        debug!(encoding = encoding.name, bom = encoding.had_bom, "decoded input");

        let mut result = self.parse_str(&text)?;

        result
            .notes
            .insert(0, format!("Encoding: {}{}", encoding.name, if encoding.had_bom { " (BOM)" } else { "" }));
        if encoding.lossy {
            result.issues.push(
                Issue::warning(0, IssueKind::Format, "Some bytes could not be decoded and were replaced")
                    .with_suggestion("Set the file encoding explicitly"),
            );
        }
        result.encoding = Some(encoding);
        Ok(result)
    }

    /// Parse already decoded text.
    pub fn parse_str(&self, text: &str) -> Result<ParseResult> {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

        if normalized.lines().filter(|l| !l.trim().is_empty()).count() < 2 {
            return Ok(ParseResult::failed(Issue::error(
                0,
                IssueKind::Validation,
                "File is empty or has no data rows",
            )));
        }

        let delimiter = self
            .options
            .delimiter
            .unwrap_or_else(|| detect_delimiter(&normalized));
        let rows = tokenize(&normalized, delimiter)?;

        // QuickBooks IIF: `!TRNS` and `!SPL` lines are the layouts, TRNS/SPL lines are data
        let iif_header = rows
            .iter()
            .position(|row| first_cell(row).eq_ignore_ascii_case("!TRNS"));
        let split_header = iif_header.and_then(|_| {
            rows.iter()
                .find(|row| first_cell(row).eq_ignore_ascii_case("!SPL"))
        });

        let (header, data): (&Row, Vec<&Row>) = match iif_header {
            Some(pos) => (
                &rows[pos],
                rows[pos + 1..]
                    .iter()
                    .filter(|row| {
                        let kind = first_cell(row);
                        kind.eq_ignore_ascii_case("TRNS") || kind.eq_ignore_ascii_case("SPL")
                    })
                    .collect(),
            ),
            None => match rows.split_first() {
                Some((header, rest)) => (header, rest.iter().collect()),
                None => {
                    return Ok(ParseResult::failed(Issue::error(
                        0,
                        IssueKind::Validation,
                        "File is empty or has no data rows",
                    )))
                }
            },
        };

        let headers: Vec<String> = header.cells.iter().map(|c| clean_cell(c).to_string()).collect();
        let format = match (self.options.format, iif_header) {
            (Some(format), _) => format,
            (None, Some(_)) => Format::QuickBooks,
            (None, None) => detect_format(&headers),
        };
        let mut columns = ColumnMap::resolve(&headers);
        let mut issues = Vec::new();
        for (name, target) in &self.options.columns {
            let field = name.parse::<Field>()?;
            if !columns.assign(field, &headers, target) {
                issues.push(
                    Issue::warning(
                        header.line,
                        IssueKind::Format,
                        format!("Mapped column not found: {} = {}", field.name(), target),
                    )
                    .with_field(field.name()),
                );
            }
        }
        let split_columns = split_header.map(|row| {
            let split_headers: Vec<&str> = row.cells.iter().map(|c| clean_cell(c)).collect();
            ColumnMap::resolve(&split_headers)
        });
        let day_first = self.options.day_first && !format.month_first_dates();

        let mut notes = vec![
            format!("Delimiter: {:?}", delimiter),
            format!("Format: {}", format),
        ];

        let missing = columns.missing_mandatory();
        if !missing.is_empty() {
            issues.extend(missing.iter().map(|name| {
                Issue::error(header.line, IssueKind::Validation, format!("Missing column: {}", name))
                    .with_suggestion("Check the header row, the delimiter or the column mapping")
            }));
            warn!(format = %format, missing = ?missing, "mandatory columns missing");
            return Ok(ParseResult {
                success: false,
                format,
                standard: self.options.expected_standard.or_else(|| format.implied_standard()),
                encoding: None,
                delimiter,
                columns: columns.describe(&headers),
                headers,
                lines: Vec::new(),
                issues,
                notes,
                stats: Statistics::compute(&[], data.len(), 0, self.options.balance_tolerance),
            });
        }

        let mut lines = Vec::with_capacity(data.len());
        let mut error_rows = 0;
        let mut open = OpenTransaction::default();
        let mut transactions = 0usize;

        for (idx, row) in data.iter().enumerate() {
            let is_split = iif_header.is_some() && first_cell(row).eq_ignore_ascii_case("SPL");
            let row_columns = match (&split_columns, is_split) {
                (Some(split), true) => split,
                _ => &columns,
            };

            let inherited = if iif_header.is_some() {
                if !is_split {
                    transactions += 1;
                    let entry_number = cell(&columns, row, Field::EntryNumber);
                    open = OpenTransaction {
                        entry_number: if entry_number.is_empty() {
                            transactions.to_string()
                        } else {
                            entry_number.to_string()
                        },
                        date: cell(&columns, row, Field::EntryDate).to_string(),
                        journal: cell(&columns, row, Field::JournalCode).to_string(),
                    };
                }
                Some(&open)
            } else {
                None
            };

            match self.parse_row(row_columns, row, idx + 1, day_first, inherited, &mut issues) {
                Ok(line) => lines.push(line),
                Err(issue) => {
                    error_rows += 1;
                    issues.push(issue);
                }
            }
        }

        let accounts: Vec<&str> = lines.iter().map(|l| l.account_number.as_str()).collect();
        let standard = resolve_standard(self.options.expected_standard, format, &accounts);
        notes.push(match standard {
            Some(standard) => format!("Standard: {}", standard),
            None => "Standard: unknown".to_string(),
        });

        let stats = Statistics::compute(&lines, data.len(), error_rows, self.options.balance_tolerance);
        if !stats.is_balanced {
            warn!(debit = %stats.total_debit, credit = %stats.total_credit, "file is not balanced");
            issues.push(
                Issue::warning(
                    0,
                    IssueKind::Balance,
                    format!(
                        "Total debit ({}) and total credit ({}) differ by {}",
                        stats.total_debit,
                        stats.total_credit,
                        stats.balance.abs()
                    ),
                )
                .with_suggestion("Check for missing or duplicated lines"),
            );
        }

        let has_errors = issues.iter().any(Issue::is_error);
        info!(
            format = %format,
            lines = lines.len(),
            error_rows,
            "parsed ledger file"
        );

        Ok(ParseResult {
            success: !has_errors || !lines.is_empty(),
            format,
            standard,
            encoding: None,
            delimiter,
            columns: columns.describe(&headers),
            headers,
            lines,
            issues,
            notes,
            stats,
        })
    }

    /// Build one line, or the error that rejects the row. Non-fatal problems
    /// are pushed to `issues`.
    fn parse_row(
        &self,
        columns: &ColumnMap,
        row: &Row,
        ordinal: usize,
        day_first: bool,
        inherited: Option<&OpenTransaction>,
        issues: &mut Vec<Issue>,
    ) -> std::result::Result<AccountingLine, Issue> {
        let get = |field: Field| cell(columns, row, field);
        let or_inherited = |field: Field, pick: fn(&OpenTransaction) -> &str| -> String {
            let value = get(field);
            match inherited {
                Some(open) if value.is_empty() => pick(open).to_string(),
                _ => value.to_string(),
            }
        };

        let raw_date = or_inherited(Field::EntryDate, |o| o.date.as_str());
        let entry_date = match parse_date(&raw_date, day_first) {
            Some(date) => date,
            None => {
                let message = if raw_date.is_empty() {
                    "Missing entry date".to_string()
                } else {
                    format!("Invalid date: {}", raw_date)
                };
                return Err(Issue::error(row.line, IssueKind::Format, message)
                    .with_field(Field::EntryDate.name())
                    .with_data(&row.raw));
            }
        };

        let account_number = get(Field::AccountNumber);
        if account_number.is_empty() {
            return Err(Issue::error(row.line, IssueKind::Validation, "Missing account number")
                .with_field(Field::AccountNumber.name())
                .with_data(&row.raw));
        }

        let amount_of = |field: Field| -> std::result::Result<Decimal, Issue> {
            let raw = get(field);
            parse_amount(raw).map(|a| a.unwrap_or(Decimal::ZERO)).map_err(|_| {
                Issue::error(row.line, IssueKind::Format, format!("Invalid amount: {}", raw))
                    .with_field(field.name())
                    .with_data(&row.raw)
            })
        };

        let (debit, credit) = if columns.has_debit_credit() {
            (amount_of(Field::Debit)?, amount_of(Field::Credit)?)
        } else {
            let amount = amount_of(Field::Amount)?;
            match get(Field::Direction).parse::<DebitCredit>() {
                Ok(DebitCredit::Debit) => (amount.abs(), Decimal::ZERO),
                Ok(DebitCredit::Credit) => (Decimal::ZERO, amount.abs()),
                Err(_) if amount.is_sign_negative() => (Decimal::ZERO, -amount),
                Err(_) => (amount, Decimal::ZERO),
            }
        };

        let mut optional_date = |field: Field| {
            let raw = get(field);
            if raw.is_empty() {
                return None;
            }
            let date = parse_date(raw, day_first);
            if date.is_none() {
                issues.push(
                    Issue::warning(row.line, IssueKind::Format, format!("Invalid date ignored: {}", raw))
                        .with_field(field.name()),
                );
            }
            date
        };
        let document_date = optional_date(Field::DocumentDate);
        let validation_date = optional_date(Field::ValidationDate);
        let lettering_date = optional_date(Field::LetteringDate);

        let foreign_amount = match parse_amount(get(Field::ForeignAmount)) {
            Ok(amount) => amount.filter(|a| !a.is_zero()),
            Err(_) => {
                issues.push(
                    Issue::warning(
                        row.line,
                        IssueKind::Format,
                        format!("Invalid foreign amount ignored: {}", get(Field::ForeignAmount)),
                    )
                    .with_field(Field::ForeignAmount.name()),
                );
                None
            }
        };

        let mut journal_code = or_inherited(Field::JournalCode, |o| o.journal.as_str());
        if journal_code.is_empty() {
            journal_code = DEFAULT_JOURNAL.to_string();
        }
        let journal_name = match get(Field::JournalName) {
            "" => journal_code.clone(),
            name => name.to_string(),
        };

        // Split ids (SPLID) identify the split, not the transaction
        let mut entry_number = match inherited {
            Some(open) => open.entry_number.clone(),
            None => get(Field::EntryNumber).to_string(),
        };
        if entry_number.is_empty() {
            entry_number = ordinal.to_string();
        }

        let currency = match get(Field::Currency) {
            "" => self.options.default_currency.clone(),
            code => code.to_uppercase(),
        };

        Ok(AccountingLine {
            journal_code,
            journal_name,
            entry_number,
            line_number: row.line,
            entry_date,
            document_date,
            validation_date,
            account_number: account_number.to_string(),
            account_name: get(Field::AccountName).to_string(),
            auxiliary_account: non_empty(get(Field::AuxiliaryAccount)),
            auxiliary_name: non_empty(get(Field::AuxiliaryName)),
            document_ref: non_empty(get(Field::DocumentRef)),
            description: get(Field::Description).to_string(),
            debit,
            credit,
            currency,
            foreign_amount,
            lettering_code: non_empty(get(Field::LetteringCode)),
            lettering_date,
            raw: row.raw.clone(),
        })
    }
}

/// Split normalized text into records, skipping blank ones.
///
/// Pipe and tab separated files (FEC, IIF) are read without quote handling:
/// their free-text fields may contain stray `"` characters.
fn tokenize(text: &str, delimiter: char) -> Result<Vec<Row>> {
    let physical: Vec<&str> = text.split('\n').collect();
    let quoting = matches!(delimiter, ',' | ';');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .quoting(quoting)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let raw = line
            .checked_sub(1)
            .and_then(|idx| physical.get(idx))
            .map(|s| s.to_string())
            .unwrap_or_default();
        rows.push(Row {
            line,
            cells: record.iter().map(str::to_string).collect(),
            raw,
        });
    }
    Ok(rows)
}

fn first_cell(row: &Row) -> &str {
    row.cells.first().map(|c| clean_cell(c)).unwrap_or("")
}

fn cell<'r>(columns: &ColumnMap, row: &'r Row, field: Field) -> &'r str {
    columns
        .get(field)
        .and_then(|idx| row.cells.get(idx))
        .map(|c| clean_cell(c))
        .unwrap_or("")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const FEC: &str = "\
JournalCode|JournalLib|EcritureNum|EcritureDate|CompteNum|CompteLib|CompAuxNum|CompAuxLib|PieceRef|PieceDate|EcritureLib|Debit|Credit|EcritureLet|DateLet|ValidDate|Montantdevise|Idevise
VT|Ventes|VT0001|20240115|411000|Clients|C001|Dupont SA|F2024-001|20240115|Facture \"Dupont|1200,00|0,00|AA|20240220|20240116||
VT|Ventes|VT0001|20240115|706000|Prestations de services|||F2024-001|20240115|Facture Dupont|0,00|1000,00|||20240116||
VT|Ventes|VT0001|20240115|445710|TVA collectee|||F2024-001|20240115|Facture Dupont|0,00|200,00|||20240116||
";

    fn parser() -> LedgerParser {
        LedgerParser::new(ParseOptions::default())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_fec() {
        let result = parser().parse_bytes(FEC.as_bytes()).unwrap();

        assert!(result.success);
        assert_eq!(result.format, Format::Fec);
        assert_eq!(result.standard, Some(AccountingStandard::Pcg));
        assert_eq!(result.delimiter, '|');
        assert_eq!(result.headers.len(), 18);
        assert_eq!(result.error_count(), 0);
        assert_eq!(result.lines.len(), 3);

        let first = &result.lines[0];
        assert_eq!(first.journal_code, "VT");
        assert_eq!(first.journal_name, "Ventes");
        assert_eq!(first.entry_number, "VT0001");
        assert_eq!(first.line_number, 2);
        assert_eq!(first.entry_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(first.account_number, "411000");
        assert_eq!(first.auxiliary_account.as_deref(), Some("C001"));
        assert_eq!(first.description, "Facture \"Dupont");
        assert_eq!(first.debit, dec("1200.00"));
        assert_eq!(first.credit, Decimal::ZERO);
        assert_eq!(first.currency, "EUR");
        assert_eq!(first.lettering_code.as_deref(), Some("AA"));
        assert_eq!(first.lettering_date, NaiveDate::from_ymd_opt(2024, 2, 20));
        assert_eq!(first.validation_date, NaiveDate::from_ymd_opt(2024, 1, 16));
        assert!(first.raw.starts_with("VT|Ventes|VT0001"));

        assert!(result.stats.is_balanced);
        assert_eq!(result.stats.entry_count, 1);
        assert_eq!(result.columns.get("entry_date").map(String::as_str), Some("EcritureDate"));
        assert_eq!(result.encoding.map(|e| e.name), Some("UTF-8"));
    }

    #[test]
    fn test_parse_syscohada_semicolon() {
        let content = "\
NumCompte;CodeJournal;NumEcriture;DatePiece;Libelle;Debit;Credit
601100;AC;1;15/03/2024;Achat marchandises;\"150 000\";
\r
401100;AC;1;15/03/2024;Achat marchandises;;150 000 FCFA
";
        let options = ParseOptions {
            default_currency: "XOF".into(),
            ..ParseOptions::default()
        };
        let result = LedgerParser::new(options).parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(result.format, Format::Syscohada);
        assert_eq!(result.standard, Some(AccountingStandard::Syscohada));
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].debit, Decimal::from(150_000));
        assert_eq!(result.lines[1].credit, Decimal::from(150_000));
        assert_eq!(result.lines[1].line_number, 4);
        assert_eq!(result.lines[0].currency, "XOF");
        assert_eq!(result.stats.total_rows, 2);
    }

    #[test]
    fn test_parse_quickbooks_iif() {
        let content = "\
!TRNS\tTRNSID\tTRNSTYPE\tDATE\tACCNT\tNAME\tAMOUNT\tMEMO
!SPL\tSPLID\tTRNSTYPE\tDATE\tACCNT\tNAME\tAMOUNT\tMEMO
!ENDTRNS
TRNS\t\tGENERAL JOURNAL\t1/5/2024\tChecking\t\t500\tOwner deposit
SPL\t\t\t\tOwner Equity\t\t-500\tOwner deposit
ENDTRNS
TRNS\t\tGENERAL JOURNAL\t2/3/2024\tRent Expense\t\t1200\tFebruary rent
SPL\t\tGENERAL JOURNAL\t2/3/2024\tChecking\t\t-1200\tFebruary rent
ENDTRNS
";
        let result = parser().parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(result.format, Format::QuickBooks);
        assert_eq!(result.delimiter, '\t');
        assert_eq!(result.error_count(), 0);
        assert_eq!(result.lines.len(), 4);

        let split = &result.lines[1];
        assert_eq!(split.entry_number, "1");
        assert_eq!(split.journal_code, "GENERAL JOURNAL");
        assert_eq!(split.entry_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(split.account_number, "Owner Equity");
        assert_eq!(split.credit, Decimal::from(500));
        assert_eq!(split.line_number, 5);

        // month-first dates
        assert_eq!(result.lines[2].entry_date, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        assert_eq!(result.lines[3].entry_number, "2");
        assert_eq!(result.stats.entry_count, 2);
        assert!(result.stats.is_balanced);
    }

    #[test]
    fn test_quickbooks_split_ids_and_layouts() {
        let content = "\
!TRNS\tTRNSID\tTRNSTYPE\tDATE\tACCNT\tCLASS\tAMOUNT\tDOCNUM\tMEMO
!SPL\tSPLID\tTRNSTYPE\tDATE\tACCNT\tAMOUNT\tMEMO
!ENDTRNS
TRNS\t100\tDEPOSIT\t3/1/2024\tChecking\tRetail\t500.00\tD-17\tDeposit
SPL\t101\tDEPOSIT\t3/1/2024\tSales\t-300.00\tDeposit
SPL\t102\tDEPOSIT\t\tService Income\t-200.00\tDeposit
ENDTRNS
TRNS\t103\tCHECK\t3/2/2024\tChecking\tRetail\t-80.00\t1001\tSupplies
SPL\t104\tCHECK\t3/2/2024\tOffice Supplies\t80.00\tSupplies
ENDTRNS
";
        let result = parser().parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(result.format, Format::QuickBooks);
        assert_eq!(result.error_count(), 0, "{:?}", result.issues);
        let entries: Vec<&str> = result.lines.iter().map(|l| l.entry_number.as_str()).collect();
        assert_eq!(entries, vec!["100", "100", "100", "103", "103"]);

        let amounts: Vec<(Decimal, Decimal)> = result.lines.iter().map(|l| (l.debit, l.credit)).collect();
        assert_eq!(
            amounts,
            vec![
                (dec("500.00"), Decimal::ZERO),
                (Decimal::ZERO, dec("300.00")),
                (Decimal::ZERO, dec("200.00")),
                (Decimal::ZERO, dec("80.00")),
                (dec("80.00"), Decimal::ZERO),
            ]
        );
        assert_eq!(result.lines[0].document_ref.as_deref(), Some("D-17"));
        assert_eq!(result.lines[1].document_ref, None);
        assert_eq!(result.lines[2].entry_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(result.lines[4].description, "Supplies");
        assert_eq!(result.stats.entry_count, 2);
        assert!(result.stats.is_balanced);
    }

    #[test]
    fn test_manual_column_mapping() {
        let content = "\
When,GL,Label,In,Out
2024-04-02,512000,Transfer,75.00,
2024-04-02,580000,Transfer,,75.00
";
        let unmapped = parser().parse_bytes(content.as_bytes()).unwrap();
        assert!(!unmapped.success);
        assert!(unmapped.lines.is_empty());

        let mut options = ParseOptions::default();
        for (field, header) in [
            ("entry_date", "When"),
            ("account_number", "GL"),
            ("description", "label"),
            ("debit", "In"),
            ("credit", "Out"),
        ] {
            options.columns.insert(field.to_string(), header.to_string());
        }
        let result = LedgerParser::new(options.clone()).parse_bytes(content.as_bytes()).unwrap();

        assert!(result.success);
        assert_eq!(result.error_count(), 0);
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].account_number, "512000");
        assert_eq!(result.lines[0].description, "Transfer");
        assert_eq!(result.lines[1].credit, dec("75.00"));
        assert_eq!(result.columns.get("account_number").map(String::as_str), Some("GL"));

        options.columns.insert("currency".into(), "Devise".into());
        let result = LedgerParser::new(options.clone()).parse_bytes(content.as_bytes()).unwrap();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.warnings().count(), 1);
        assert_eq!(result.warnings().next().map(|w| w.line), Some(1));

        options.columns.insert("colour".into(), "Label".into());
        assert!(LedgerParser::new(options).parse_bytes(content.as_bytes()).is_err());
    }

    #[test]
    fn test_row_errors_keep_other_rows() {
        let content = "\
Date,Account,Description,Debit,Credit
2024-01-10,512000,Deposit,100.00,
2024-13-10,706000,Bad date,,100.00
2024-01-10,,No account,,100.00
2024-01-10,706000,Bad amount,,abc
2024-01-10,706000,Sale,,100.00
";
        let result = parser().parse_bytes(content.as_bytes()).unwrap();

        assert!(result.success);
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.stats.error_rows, 3);
        assert_eq!(result.stats.total_rows, 5);

        let errors: Vec<&Issue> = result.errors().collect();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].line, 3);
        assert_eq!(errors[0].field.as_deref(), Some("entry_date"));
        assert_eq!(errors[0].message, "Invalid date: 2024-13-10");
        assert_eq!(errors[1].field.as_deref(), Some("account_number"));
        assert_eq!(errors[2].field.as_deref(), Some("credit"));
        assert_eq!(errors[2].data.as_deref(), Some("2024-01-10,706000,Bad amount,,abc"));

        // defaults
        assert_eq!(result.lines[0].journal_code, "OD");
        assert_eq!(result.lines[0].journal_name, "OD");
        assert_eq!(result.lines[0].entry_number, "1");
        assert_eq!(result.lines[1].entry_number, "5");
    }

    #[test]
    fn test_amount_and_direction_columns() {
        let content = "\
EcritureDate;CompteNum;Montant;Sens
01/02/2024;512000;-250,00;C
01/02/2024;411000;250,00;D
01/02/2024;471000;-10,00;
";
        let result = parser().parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.lines[0].credit, Decimal::from(250));
        assert_eq!(result.lines[0].debit, Decimal::ZERO);
        assert_eq!(result.lines[1].debit, Decimal::from(250));
        assert_eq!(result.lines[2].credit, Decimal::from(10));
        assert_eq!(result.lines[0].entry_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_imbalance_warning() {
        let content = "Date,Account,Debit,Credit\n2024-01-10,512000,100.00,\n2024-01-10,706000,,90.00\n";
        let result = parser().parse_bytes(content.as_bytes()).unwrap();

        assert!(!result.stats.is_balanced);
        let warnings: Vec<&Issue> = result.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, IssueKind::Balance);
        assert_eq!(warnings[0].line, 0);
    }

    #[test]
    fn test_missing_columns() {
        let content = "Foo,Bar\n1,2\n";
        let result = parser().parse_bytes(content.as_bytes()).unwrap();

        assert!(!result.success);
        assert!(result.lines.is_empty());
        assert_eq!(result.error_count(), 3);
        assert!(result.issues.iter().all(|i| i.line == 1));
        assert_eq!(result.issues[0].message, "Missing column: account number");
    }

    #[test]
    fn test_empty_file() {
        for content in ["", "Date,Account,Debit,Credit\n", "\n\n  \n"] {
            let result = parser().parse_bytes(content.as_bytes()).unwrap();
            assert!(!result.success);
            assert_eq!(result.issues.len(), 1);
            assert_eq!(result.issues[0].line, 0);
        }
    }

    #[test]
    fn test_windows_1252_input() {
        let mut bytes = b"Date;Compte;Libell\xe9;D\xe9bit;Cr\xe9dit\r\n".to_vec();
        bytes.extend_from_slice(b"05/01/2024;512000;Caf\xe9;12,50;\r\n");
        bytes.extend_from_slice(b"05/01/2024;625700;Caf\xe9;;12,50\r\n");

        let result = parser().parse_bytes(&bytes).unwrap();

        assert_eq!(result.encoding.map(|e| e.name), Some("windows-1252"));
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].description, "Café");
        assert_eq!(result.lines[0].debit, dec("12.50"));
        assert_eq!(result.lines[1].line_number, 3);
    }

    #[test]
    fn test_quoted_fields_and_forced_options() {
        let content = "\
Date,Account,Description,Amount
01/02/2024,1000,\"Rent, February\",\"1,200.00\"
01/02/2024,4000,\"Rent, February\",\"(1,200.00)\"
";
        let options = ParseOptions {
            format: Some(Format::Generic),
            day_first: false,
            ..ParseOptions::default()
        };
        let result = LedgerParser::new(options).parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(result.format, Format::Generic);
        assert_eq!(result.lines[0].description, "Rent, February");
        assert_eq!(result.lines[0].debit, dec("1200.00"));
        assert_eq!(result.lines[1].credit, dec("1200.00"));
        assert_eq!(result.lines[0].entry_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_preview_and_read() {
        let result = parser().parse_read(&mut FEC.as_bytes()).unwrap();
        assert_eq!(result.preview(2).len(), 2);
        assert_eq!(result.preview(50).len(), 3);
    }
}
