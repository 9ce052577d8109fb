//! Format, delimiter and accounting standard detection.

use tracing::debug;

use crate::fields::normalize_header;
use crate::types::AccountingStandard;
use crate::Format;

/// Delimiters tried, in tie-break order.
const DELIMITER_CANDIDATES: [char; 4] = ['|', ';', '\t', ','];

/// Number of lines sampled for delimiter detection.
const SAMPLE_LINES: usize = 10;

/// Number of account numbers sampled for standard detection.
const STANDARD_SAMPLE: usize = 50;

/// Column signatures per format, checked in `Format::ALL` order.
fn signatures(format: Format) -> &'static [&'static [&'static str]] {
    match format {
        Format::Fec => &[&[
            "JournalCode", "EcritureNum", "EcritureDate", "CompteNum", "Debit", "Credit",
        ]],
        Format::Syscohada => &[
            &["NumCompte", "CodeJournal", "DatePiece", "Debit", "Credit"],
            &["Compte", "Journal", "Date", "Debit", "Credit"],
        ],
        Format::Scf => &[&["CodeJournal", "NumeroCompte", "DateEcriture", "Debit", "Credit"]],
        Format::IfrsCsv => &[
            &["AccountCode", "TransactionDate", "Debit", "Credit"],
            &["Account", "Date", "Dr", "Cr"],
        ],
        Format::QuickBooks => &[
            &["TRNS", "TRNSTYPE", "DATE", "ACCNT", "AMOUNT"],
            &["!TRNS", "TRNSID", "TRNSTYPE", "DATE", "ACCNT"],
        ],
        Format::Sage => &[
            &["NominalCode", "Date", "Debit", "Credit"],
            &["Type", "NominalCode", "Date", "Reference", "Details", "NetAmount"],
        ],
        Format::Xero => &[
            &["*ContactName", "*InvoiceNumber", "*InvoiceDate", "AccountCode"],
            &["Date", "SourceAccount", "Description", "Amount"],
        ],
        Format::Generic => &[],
    }
}

/// Detect the most likely field delimiter by checking consistency across the
/// first lines.
///
/// For each candidate, count fields per line. The candidate must split the
/// header into more than one field; the score is the number of lines with
/// the header's field count times that field count.
pub fn detect_delimiter(content: &str) -> char {
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();

    if sample_lines.is_empty() {
        return ',';
    }

    let mut best = ',';
    let mut best_score = 0usize;

    for delim in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim as u8)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count();
        let score = consistent * target;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    debug!(delimiter = ?best, score = best_score, "delimiter detected");
    best
}

/// Classify a header row.
///
/// A signature qualifies when at least `min(3, len)` of its columns appear
/// among the headers; the signature with the highest matched fraction wins,
/// earlier formats winning ties.
pub fn detect_format<S: AsRef<str>>(headers: &[S]) -> Format {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();

    // (matched, len) of the best signature so far
    let mut best: Option<(Format, usize, usize)> = None;

    for format in Format::ALL {
        for signature in signatures(format) {
            let matched = signature
                .iter()
                .filter(|column| normalized.contains(&normalize_header(column)))
                .count();

            if matched < signature.len().min(3) {
                continue;
            }

            let better = match best {
                None => true,
                Some((_, best_matched, best_len)) => matched * best_len > best_matched * signature.len(),
            };
            if better {
                best = Some((format, matched, signature.len()));
            }
        }
    }

    let format = best.map(|(format, _, _)| format).unwrap_or(Format::Generic);
    debug!(format = %format, "format detected");
    format
}

fn is_pcg_account(account: &str) -> bool {
    account.len() == 6
        && account.starts_with(['1', '2', '3', '4', '5', '6', '7'])
        && account.chars().all(|c| c.is_ascii_digit())
}

fn is_ohada_account(account: &str) -> bool {
    (4..=8).contains(&account.len())
        && !account.starts_with('0')
        && account.chars().all(|c| c.is_ascii_digit())
}

fn is_ifrs_account(account: &str) -> bool {
    (2..=10).contains(&account.len()) && account.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Guess the accounting standard from account numbers.
///
/// Samples the first 50 numbers; a pattern must match more than 60% of them.
pub fn detect_standard<S: AsRef<str>>(account_numbers: &[S]) -> Option<AccountingStandard> {
    if account_numbers.is_empty() {
        return None;
    }

    let samples: Vec<&str> = account_numbers
        .iter()
        .take(STANDARD_SAMPLE)
        .map(|a| a.as_ref())
        .collect();
    let threshold = samples.len() as f64 * 0.6;
    let share = |pred: fn(&str) -> bool| samples.iter().filter(|a| pred(a)).count() as f64;

    if share(is_pcg_account) > threshold {
        Some(AccountingStandard::Pcg)
    } else if share(is_ohada_account) > threshold {
        Some(AccountingStandard::Syscohada)
    } else if share(is_ifrs_account) > threshold {
        Some(AccountingStandard::Ifrs)
    } else {
        None
    }
}

/// Pick the standard for a parse: configured, then implied by the format,
/// then guessed from account numbers.
pub fn resolve_standard<S: AsRef<str>>(
    expected: Option<AccountingStandard>,
    format: Format,
    account_numbers: &[S],
) -> Option<AccountingStandard> {
    expected
        .or_else(|| format.implied_standard())
        .or_else(|| detect_standard(account_numbers))
}
