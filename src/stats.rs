//! Aggregation: totals, distinct journals/currencies/accounts, date range,
//! and grouping of lines into journal entries.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::types::{AccountingLine, DateRange, EntryKey};

/// Summary figures for a set of lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Data rows read from the file.
    pub total_rows: usize,
    /// Rows turned into lines.
    pub valid_rows: usize,
    /// Rows rejected by the parser.
    pub error_rows: usize,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    /// Total debit minus total credit.
    pub balance: Decimal,
    pub is_balanced: bool,
    /// Currencies in order of first appearance.
    pub currencies: Vec<String>,
    /// Journal codes in order of first appearance.
    pub journals: Vec<String>,
    /// Distinct account numbers, sorted.
    pub accounts: Vec<String>,
    /// Distinct journal entries (journal code + entry number).
    pub entry_count: usize,
    pub date_range: Option<DateRange>,
}

impl Statistics {
    pub fn compute(
        lines: &[AccountingLine],
        total_rows: usize,
        error_rows: usize,
        tolerance: Decimal,
    ) -> Self {
        let mut total_debit = Decimal::ZERO;
        let mut total_credit = Decimal::ZERO;
        let mut currencies: Vec<String> = Vec::new();
        let mut journals: Vec<String> = Vec::new();
        let mut accounts = BTreeSet::new();
        let mut entries = BTreeSet::new();
        let mut date_range: Option<DateRange> = None;

        for line in lines {
            total_debit += line.debit;
            total_credit += line.credit;

            if !currencies.contains(&line.currency) {
                currencies.push(line.currency.clone());
            }
            if !journals.contains(&line.journal_code) {
                journals.push(line.journal_code.clone());
            }
            accounts.insert(line.account_number.clone());
            entries.insert(line.entry_key());

            date_range = Some(match date_range {
                None => DateRange {
                    start: line.entry_date,
                    end: line.entry_date,
                },
                Some(range) => DateRange {
                    start: range.start.min(line.entry_date),
                    end: range.end.max(line.entry_date),
                },
            });
        }

        let balance = total_debit - total_credit;

        Statistics {
            total_rows,
            valid_rows: lines.len(),
            error_rows,
            total_debit,
            total_credit,
            balance,
            is_balanced: balance.abs() <= tolerance,
            currencies,
            journals,
            accounts: accounts.into_iter().collect(),
            entry_count: entries.len(),
            date_range,
        }
    }
}

/// Lines sharing one journal code and entry number.
#[derive(Debug, Clone)]
pub struct EntryGroup<'a> {
    pub key: EntryKey,
    pub lines: Vec<&'a AccountingLine>,
}

impl<'a> EntryGroup<'a> {
    pub fn debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Absolute difference between debit and credit.
    pub fn difference(&self) -> Decimal {
        (self.debit() - self.credit()).abs()
    }

    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.difference() <= tolerance
    }

    /// Source line number of the entry's first line.
    pub fn first_line(&self) -> usize {
        self.lines.first().map(|l| l.line_number).unwrap_or(0)
    }
}

/// Group lines into entries, in order of first appearance.
pub fn group_entries(lines: &[AccountingLine]) -> Vec<EntryGroup<'_>> {
    let mut index: HashMap<EntryKey, usize> = HashMap::new();
    let mut groups: Vec<EntryGroup<'_>> = Vec::new();

    for line in lines {
        let key = line.entry_key();
        match index.get(&key) {
            Some(&pos) => groups[pos].lines.push(line),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(EntryGroup {
                    key,
                    lines: vec![line],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    /// Build a minimal line for tests across the crate.
    pub(crate) fn line(
        journal: &str,
        entry: &str,
        date: &str,
        account: &str,
        debit: &str,
        credit: &str,
    ) -> AccountingLine {
        AccountingLine {
            journal_code: journal.into(),
            journal_name: journal.into(),
            entry_number: entry.into(),
            line_number: 0,
            entry_date: NaiveDate::from_str(date).unwrap(),
            document_date: None,
            validation_date: None,
            account_number: account.into(),
            account_name: format!("Account {}", account),
            auxiliary_account: None,
            auxiliary_name: None,
            document_ref: Some(format!("REF-{}", entry)),
            description: "Test line".into(),
            debit: Decimal::from_str(debit).unwrap(),
            credit: Decimal::from_str(credit).unwrap(),
            currency: "EUR".into(),
            foreign_amount: None,
            lettering_code: None,
            lettering_date: None,
            raw: String::new(),
        }
    }

    #[test]
    fn test_compute_statistics() {
        let mut usd = line("BQ", "2", "2024-01-03", "512000", "0", "50");
        usd.currency = "USD".into();
        let lines = vec![
            line("VT", "1", "2024-01-05", "411000", "120", "0"),
            line("VT", "1", "2024-01-05", "706000", "0", "120"),
            line("BQ", "2", "2024-01-03", "627000", "50", "0"),
            usd,
        ];

        let stats = Statistics::compute(&lines, 5, 1, Decimal::new(1, 2));

        assert_eq!(stats.total_rows, 5);
        assert_eq!(stats.valid_rows, 4);
        assert_eq!(stats.error_rows, 1);
        assert_eq!(stats.total_debit, Decimal::from(170));
        assert_eq!(stats.total_credit, Decimal::from(170));
        assert!(stats.is_balanced);
        assert_eq!(stats.currencies, vec!["EUR".to_string(), "USD".to_string()]);
        assert_eq!(stats.journals, vec!["VT".to_string(), "BQ".to_string()]);
        assert_eq!(stats.accounts.first().map(String::as_str), Some("411000"));
        assert_eq!(stats.entry_count, 2);
        assert_eq!(
            stats.date_range,
            Some(DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            })
        );
    }

    #[test]
    fn test_unbalanced_statistics() {
        let lines = vec![line("OD", "1", "2024-01-01", "471000", "10.02", "0")];
        let stats = Statistics::compute(&lines, 1, 0, Decimal::new(1, 2));
        assert_eq!(stats.balance, Decimal::from_str("10.02").unwrap());
        assert!(!stats.is_balanced);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = Statistics::compute(&[], 0, 0, Decimal::new(1, 2));
        assert!(stats.is_balanced);
        assert_eq!(stats.date_range, None);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn test_group_entries_keeps_order() {
        let lines = vec![
            line("VT", "2", "2024-01-01", "411000", "10", "0"),
            line("VT", "1", "2024-01-01", "411000", "5", "0"),
            line("VT", "2", "2024-01-01", "706000", "0", "10"),
            line("AC", "2", "2024-01-01", "401000", "0", "7"),
        ];
        let groups = group_entries(&lines);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key.to_string(), "VT-2");
        assert_eq!(groups[0].lines.len(), 2);
        assert!(groups[0].is_balanced(Decimal::ZERO));
        assert_eq!(groups[1].key.to_string(), "VT-1");
        assert_eq!(groups[1].difference(), Decimal::from(5));
        assert_eq!(groups[2].key.to_string(), "AC-2");
    }
}
