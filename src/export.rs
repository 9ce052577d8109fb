//! Writers for normalized lines: DGFiP FEC and a plain CSV ledger.

use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

use crate::error::{Error, Result};
use crate::types::AccountingLine;

/// The 18 FEC columns, in the mandated order.
pub const FEC_COLUMNS: [&str; 18] = [
    "JournalCode",
    "JournalLib",
    "EcritureNum",
    "EcritureDate",
    "CompteNum",
    "CompteLib",
    "CompAuxNum",
    "CompAuxLib",
    "PieceRef",
    "PieceDate",
    "EcritureLib",
    "Debit",
    "Credit",
    "EcritureLet",
    "DateLet",
    "ValidDate",
    "Montantdevise",
    "Idevise",
];

/// Currency of FEC amounts; `Idevise` is left empty for it.
const FEC_CURRENCY: &str = "EUR";

/// FEC file name: `{SIREN}FEC{YYYYMMDD}.txt`, dated on the closing date.
pub fn fec_file_name(siren: &str, closing_date: NaiveDate) -> String {
    format!("{}FEC{}.txt", siren.trim(), closing_date.format("%Y%m%d"))
}

/// Writes lines as a FEC file.
#[derive(Debug, Clone, Copy)]
pub struct FecWriter {
    separator: u8,
}

impl Default for FecWriter {
    fn default() -> Self {
        Self { separator: b'|' }
    }
}

impl FecWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another separator. FEC allows `|` and tab only.
    pub fn with_separator(separator: char) -> Result<Self> {
        match separator {
            '|' | '\t' => Ok(Self {
                separator: separator as u8,
            }),
            other => Err(Error::InvalidFormat(format!(
                "FEC separator must be '|' or tab, got {:?}",
                other
            ))),
        }
    }

    /// Write the header and one record per line.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use ledger_import::{export::FecWriter, AccountingLine};
    ///
    /// let lines: Vec<AccountingLine> = Vec::new();
    /// let mut file = File::create("123456789FEC20241231.txt")?;
    /// FecWriter::new().write_to(&mut file, &lines)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_to<W: Write>(&self, writer: &mut W, lines: &[AccountingLine]) -> Result<()> {
        let mut out = WriterBuilder::new()
            .delimiter(self.separator)
            .quote_style(QuoteStyle::Never)
            .from_writer(writer);

        out.write_record(FEC_COLUMNS)?;

        for line in lines {
            let (foreign_amount, currency) = match line.foreign_amount {
                Some(amount) => (fec_amount(amount), line.currency.clone()),
                None if line.currency != FEC_CURRENCY => (String::new(), line.currency.clone()),
                None => (String::new(), String::new()),
            };

            out.write_record([
                self.text(&line.journal_code),
                self.text(&line.journal_name),
                self.text(&line.entry_number),
                fec_date(line.entry_date),
                self.text(&line.account_number),
                self.text(&line.account_name),
                self.text(line.auxiliary_account.as_deref().unwrap_or_default()),
                self.text(line.auxiliary_name.as_deref().unwrap_or_default()),
                self.text(line.document_ref.as_deref().unwrap_or_default()),
                fec_date(line.document_date.unwrap_or(line.entry_date)),
                self.text(&line.description),
                fec_amount(line.debit),
                fec_amount(line.credit),
                self.text(line.lettering_code.as_deref().unwrap_or_default()),
                line.lettering_date.map(fec_date).unwrap_or_default(),
                fec_date(line.validation_date.unwrap_or(line.entry_date)),
                foreign_amount,
                currency,
            ])?;
        }

        out.flush()?;
        Ok(())
    }

    /// Free text with separators and line breaks replaced by spaces.
    fn text(&self, value: &str) -> String {
        let separator = self.separator as char;
        value
            .chars()
            .map(|c| if c == separator || c == '\n' || c == '\r' { ' ' } else { c })
            .collect()
    }
}

fn fec_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn fec_amount(amount: Decimal) -> String {
    format!("{:.2}", amount).replace('.', ",")
}

/// Normalized CSV record.
#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    #[serde(rename = "Journal")]
    journal_code: &'a str,
    #[serde(rename = "JournalName")]
    journal_name: &'a str,
    #[serde(rename = "EntryNumber")]
    entry_number: &'a str,
    #[serde(rename = "EntryDate")]
    entry_date: String,
    #[serde(rename = "AccountNumber")]
    account_number: &'a str,
    #[serde(rename = "AccountName")]
    account_name: &'a str,
    #[serde(rename = "AuxiliaryAccount")]
    auxiliary_account: &'a str,
    #[serde(rename = "Reference")]
    document_ref: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "DebitAmount")]
    debit: String,
    #[serde(rename = "CreditAmount")]
    credit: String,
    #[serde(rename = "Currency")]
    currency: &'a str,
}

/// Writes lines as a comma-separated ledger with ISO dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_to<W: Write>(&self, writer: &mut W, lines: &[AccountingLine]) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);

        for line in lines {
            out.serialize(CsvRecord {
                journal_code: &line.journal_code,
                journal_name: &line.journal_name,
                entry_number: &line.entry_number,
                entry_date: line.entry_date.format("%Y-%m-%d").to_string(),
                account_number: &line.account_number,
                account_name: &line.account_name,
                auxiliary_account: line.auxiliary_account.as_deref().unwrap_or_default(),
                document_ref: line.document_ref.as_deref().unwrap_or_default(),
                description: &line.description,
                debit: format!("{:.2}", line.debit),
                credit: format!("{:.2}", line.credit),
                currency: &line.currency,
            })?;
        }

        out.flush()?;
        Ok(())
    }
}
