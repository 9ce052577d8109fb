//! Double-entry validation of parsed lines.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

use crate::config::ValidationRules;
use crate::parser::ParseResult;
use crate::stats::{group_entries, Statistics};
use crate::types::{AccountingLine, AccountingStandard, EntryKey, Issue, IssueKind};
use crate::Format;

/// Journal codes commonly used with French-style charts.
const STANDARD_JOURNALS: [&str; 15] = [
    "AC", "ACH", "VE", "VT", "VEN", "BQ", "BA", "CA", "CAIS", "OD", "AN", "EXT", "PAIE", "TVA",
    "INV",
];

const MAX_JOURNAL_CODE: usize = 20;
const ACCOUNT_LENGTH: std::ops::RangeInclusive<usize> = 3..=20;

/// An entry whose debit and credit totals differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnbalancedEntry {
    pub key: EntryKey,
    /// Line number of the entry's first line.
    pub line: usize,
    pub debit: Decimal,
    pub credit: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// No error-severity issue was found.
    pub is_valid: bool,
    pub issues: Vec<Issue>,
    pub stats: Statistics,
    pub unbalanced_entries: Vec<UnbalancedEntry>,
}

impl ValidationReport {
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

/// Applies [`ValidationRules`] to parsed lines.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: ValidationRules,
}

impl Validator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// Validate a parse result. Parse issues are carried into the report,
    /// except the parser's imbalance warning which the balance rule restates.
    pub fn validate(&self, parsed: &ParseResult) -> ValidationReport {
        let mut report = self.validate_lines(&parsed.lines, parsed.format, parsed.standard);

        let mut issues: Vec<Issue> = parsed
            .issues
            .iter()
            .filter(|i| i.kind != IssueKind::Balance)
            .cloned()
            .collect();
        issues.append(&mut report.issues);
        report.issues = issues;

        report.stats = Statistics {
            total_rows: parsed.stats.total_rows,
            error_rows: parsed.stats.error_rows,
            ..report.stats
        };
        report.is_valid = !report.issues.iter().any(Issue::is_error);

        info!(
            valid = report.is_valid,
            errors = report.error_count(),
            warnings = report.warnings().count(),
            "validation finished"
        );
        report
    }

    pub fn validate_lines(
        &self,
        lines: &[AccountingLine],
        format: Format,
        standard: Option<AccountingStandard>,
    ) -> ValidationReport {
        let mut issues = Vec::new();

        for line in lines {
            self.check_line(line, format, standard, &mut issues);
        }
        self.check_references(lines, format, &mut issues);

        let stats = Statistics::compute(lines, lines.len(), 0, self.rules.balance_tolerance);
        if !stats.is_balanced {
            issues.push(Issue::error(
                0,
                IssueKind::Balance,
                format!(
                    "Total debit ({}) does not equal total credit ({}), difference {}",
                    stats.total_debit,
                    stats.total_credit,
                    stats.balance.abs()
                ),
            ));
        }

        let unbalanced_entries = self.check_entries(lines, &mut issues);

        if self.rules.check_chronology {
            check_chronology(lines, &mut issues);
        }
        if self.rules.check_duplicates {
            check_duplicates(lines, &mut issues);
        }

        if !unbalanced_entries.is_empty() {
            warn!(count = unbalanced_entries.len(), "unbalanced entries found");
        }

        ValidationReport {
            is_valid: !issues.iter().any(Issue::is_error),
            issues,
            stats,
            unbalanced_entries,
        }
    }

    fn check_line(
        &self,
        line: &AccountingLine,
        format: Format,
        standard: Option<AccountingStandard>,
        issues: &mut Vec<Issue>,
    ) {
        let at = line.line_number;
        let mut error = |field: &str, message: String| {
            issues.push(Issue::error(at, IssueKind::Validation, message).with_field(field));
        };

        if line.journal_code.is_empty() {
            error("journal_code", "Missing journal code".to_string());
        } else if line.journal_code.chars().count() > MAX_JOURNAL_CODE {
            error(
                "journal_code",
                format!("Journal code '{}' is longer than {} characters", line.journal_code, MAX_JOURNAL_CODE),
            );
        }

        if line.entry_number.is_empty() {
            error("entry_number", "Missing entry number".to_string());
        }

        if !ACCOUNT_LENGTH.contains(&line.account_number.chars().count()) {
            error(
                "account_number",
                format!("Account number '{}' must be 3 to 20 characters", line.account_number),
            );
        }

        if let Some(standard) = standard {
            if let (Some(classes), Some(class)) = (standard.account_classes(), line.account_number.chars().next()) {
                if !classes.contains(&class) {
                    error(
                        "account_number",
                        format!("Account class '{}' does not exist in the {} chart", class, standard),
                    );
                }
            }
        }

        if line.debit.is_sign_negative() || line.credit.is_sign_negative() {
            error("amount", "Negative amounts are not allowed".to_string());
        } else if !line.debit.is_zero() && !line.credit.is_zero() {
            error("amount", "A line cannot carry both a debit and a credit".to_string());
        } else if line.debit.is_zero() && line.credit.is_zero() {
            error("amount", "Line has no amount".to_string());
        }

        if line.currency.len() != 3 || !line.currency.chars().all(|c| c.is_ascii_uppercase()) {
            error("currency", format!("Invalid currency code '{}'", line.currency));
        }

        if format == Format::Fec {
            let required = [
                ("journal_name", line.journal_name.is_empty()),
                ("account_name", line.account_name.is_empty()),
                ("document_ref", line.document_ref.is_none()),
                ("description", line.description.is_empty()),
            ];
            for (field, missing) in required {
                if missing {
                    error(field, format!("FEC requires a value for {}", field));
                }
            }
        }

        if let (Some(start), Some(end)) = (self.rules.fiscal_year_start, self.rules.fiscal_year_end) {
            if line.entry_date < start || line.entry_date > end {
                issues.push(
                    Issue::warning(
                        at,
                        IssueKind::Business,
                        format!("Date {} is outside the fiscal year {} to {}", line.entry_date, start, end),
                    )
                    .with_field("entry_date"),
                );
            }
        }
    }

    /// Journal and account reference checks, reported once per unknown code.
    fn check_references(&self, lines: &[AccountingLine], format: Format, issues: &mut Vec<Issue>) {
        let strict = self.rules.strict_references;
        let reference_issue = |line: usize, message: String| {
            if strict {
                Issue::error(line, IssueKind::Business, message)
            } else {
                Issue::warning(line, IssueKind::Business, message)
            }
        };

        let standard_codes = matches!(format, Format::Fec | Format::Syscohada | Format::Scf);
        let mut seen_journals = BTreeSet::new();
        let mut seen_accounts = BTreeSet::new();

        for line in lines {
            if seen_journals.insert(line.journal_code.as_str()) {
                if !self.rules.allowed_journals.is_empty() {
                    if !self.rules.allowed_journals.iter().any(|j| j == &line.journal_code) {
                        issues.push(
                            reference_issue(
                                line.line_number,
                                format!("Journal '{}' is not in the configured journal list", line.journal_code),
                            )
                            .with_field("journal_code"),
                        );
                    }
                } else if standard_codes
                    && !STANDARD_JOURNALS.contains(&line.journal_code.to_uppercase().as_str())
                {
                    issues.push(
                        Issue::warning(
                            line.line_number,
                            IssueKind::Business,
                            format!("Journal code '{}' is not a standard code", line.journal_code),
                        )
                        .with_field("journal_code")
                        .with_suggestion(format!("Usual codes: {}", STANDARD_JOURNALS.join(", "))),
                    );
                }
            }

            if !self.rules.chart_of_accounts.is_empty()
                && seen_accounts.insert(line.account_number.as_str())
                && !self.rules.chart_of_accounts.iter().any(|a| a == &line.account_number)
            {
                issues.push(
                    reference_issue(
                        line.line_number,
                        format!("Account '{}' is not in the chart of accounts", line.account_number),
                    )
                    .with_field("account_number"),
                );
            }
        }
    }

    fn check_entries(&self, lines: &[AccountingLine], issues: &mut Vec<Issue>) -> Vec<UnbalancedEntry> {
        let mut unbalanced = Vec::new();

        for entry in group_entries(lines) {
            if !entry.is_balanced(self.rules.balance_tolerance) {
                let (debit, credit) = (entry.debit(), entry.credit());
                issues.push(
                    Issue::error(
                        entry.first_line(),
                        IssueKind::Balance,
                        format!(
                            "Entry {} is not balanced: debit {}, credit {}, difference {}",
                            entry.key,
                            debit,
                            credit,
                            entry.difference()
                        ),
                    )
                    .with_field("entry_number"),
                );
                unbalanced.push(UnbalancedEntry {
                    key: entry.key.clone(),
                    line: entry.first_line(),
                    debit,
                    credit,
                    difference: entry.difference(),
                });
            }

            let dates: BTreeSet<NaiveDate> = entry.lines.iter().map(|l| l.entry_date).collect();
            if dates.len() > 1 {
                issues.push(
                    Issue::warning(
                        entry.first_line(),
                        IssueKind::Validation,
                        format!("Entry {} has lines on {} different dates", entry.key, dates.len()),
                    )
                    .with_field("entry_date"),
                );
            }
        }

        unbalanced
    }
}

fn check_chronology(lines: &[AccountingLine], issues: &mut Vec<Issue>) {
    for pair in lines.windows(2) {
        if pair[1].entry_date < pair[0].entry_date {
            issues.push(
                Issue::warning(
                    pair[1].line_number,
                    IssueKind::Chronology,
                    format!(
                        "Date {} is earlier than the previous line ({})",
                        pair[1].entry_date, pair[0].entry_date
                    ),
                )
                .with_field("entry_date"),
            );
        }
    }
}

fn check_duplicates(lines: &[AccountingLine], issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    for line in lines {
        let key = (
            &line.journal_code,
            &line.entry_number,
            line.entry_date,
            &line.account_number,
            line.debit,
            line.credit,
        );
        if !seen.insert(key) {
            issues.push(
                Issue::warning(line.line_number, IssueKind::Duplicate, "Duplicate line")
                    .with_data(&line.raw),
            );
        }
    }
}
