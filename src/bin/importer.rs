//! Ledger Import - CLI tool for inspecting, validating and importing
//! accounting ledger exports.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use ledger_import::{
    columns::parse_mapping, logging, AccountingStandard, Error, Format, ImportConfig, ImportPipeline, Issue, LedgerStore,
    ParseResult, Result, Statistics, ValidationReport,
};

#[derive(Parser)]
#[command(name = "ledger_import")]
#[command(about = "Inspect, validate and import accounting ledger exports (FEC, SYSCOHADA, SCF, IFRS, QuickBooks, Sage, Xero)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct InputArgs {
    /// Input file path (or stdin if not provided)
    input: Option<PathBuf>,

    /// Input format (fec, syscohada, scf, ifrs, quickbooks, sage, xero, generic)
    #[arg(long)]
    format: Option<String>,

    /// Field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// Text encoding label (e.g. utf-8, iso-8859-15)
    #[arg(long)]
    encoding: Option<String>,

    /// Currency for lines without one
    #[arg(long)]
    currency: Option<String>,

    /// Accounting standard (pcg, syscohada, ifrs, scf, us-gaap)
    #[arg(long)]
    standard: Option<String>,

    /// Map a field to a header, e.g. `--map account_number=GL` (repeatable)
    #[arg(long = "map", value_name = "FIELD=HEADER")]
    map: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the format and preview the first lines
    Inspect {
        #[command(flatten)]
        input: InputArgs,

        /// Number of lines to preview
        #[arg(long)]
        preview: Option<usize>,
    },

    /// Parse and validate without importing
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Parse, validate and import into a ledger database
    Import {
        #[command(flatten)]
        input: InputArgs,

        /// Ledger database path
        #[arg(long)]
        db: PathBuf,

        /// Company the entries belong to
        #[arg(long)]
        company: String,

        /// Run the import and roll it back
        #[arg(long)]
        dry_run: bool,

        /// Import even if validation reports errors
        #[arg(long)]
        allow_invalid: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = match cli.config {
        Some(ref path) => ImportConfig::load(path)?,
        None => ImportConfig::default(),
    };

    match cli.command {
        Command::Inspect { input, preview } => {
            let bytes = read_input(&input, &mut config)?;
            if let Some(rows) = preview {
                config.parse.preview_rows = rows;
            }
            let pipeline = ImportPipeline::new(config);
            let parsed = pipeline.inspect(&bytes)?;
            let rows = pipeline.config().parse.preview_rows;

            if cli.json {
                print_json(&InspectReport {
                    format: parsed.format,
                    standard: parsed.standard,
                    delimiter: parsed.delimiter,
                    headers: &parsed.headers,
                    notes: &parsed.notes,
                    stats: &parsed.stats,
                    preview: parsed.preview(rows),
                    issues: &parsed.issues,
                })?;
            } else {
                print_parse(&parsed);
                print_preview(&parsed, rows);
                print_issues(&parsed.issues);
            }
        }
        Command::Validate { input } => {
            let bytes = read_input(&input, &mut config)?;
            let pipeline = ImportPipeline::new(config);
            let (parsed, report) = pipeline.validate(&bytes)?;

            if cli.json {
                print_json(&report)?;
            } else {
                print_parse(&parsed);
                print_report(&report);
            }

            if !report.is_valid {
                return Err(Error::ValidationFailed {
                    errors: report.error_count(),
                });
            }
        }
        Command::Import {
            input,
            db,
            company,
            dry_run,
            allow_invalid,
        } => {
            let bytes = read_input(&input, &mut config)?;
            config.import.dry_run |= dry_run;
            config.import.allow_invalid |= allow_invalid;

            let mut store = LedgerStore::open(&db)?;
            let pipeline = ImportPipeline::new(config);
            let outcome = pipeline.import(&bytes, &mut store, &company)?;

            if cli.json {
                print_json(&outcome)?;
            } else {
                print_parse(&outcome.parse);
                print_report(&outcome.report);
                let s = &outcome.summary;
                println!();
                println!("Import{}:", if s.dry_run { " (dry run, rolled back)" } else { "" });
                println!("  journals: {} created, {} existing", s.journals_created, s.journals_existing);
                println!("  accounts: {} created, {} existing", s.accounts_created, s.accounts_existing);
                println!(
                    "  entries:  {} created, {} existing, {} rejected",
                    s.entries_created, s.entries_existing, s.entries_rejected
                );
                println!("  lines:    {} created", s.lines_created);
                for rejection in &s.rejections {
                    println!("  - {}", rejection);
                }
            }
        }
    }

    Ok(())
}

/// Read the input and apply the command-line overrides to the config.
fn read_input(args: &InputArgs, config: &mut ImportConfig) -> Result<Vec<u8>> {
    if let Some(ref format) = args.format {
        config.parse.format = Some(format.parse::<Format>()?);
    } else if let Some(hint) = args.input.as_deref().and_then(Format::from_extension) {
        config.parse.format = Some(hint);
    }
    if let Some(delimiter) = args.delimiter {
        config.parse.delimiter = Some(delimiter);
    }
    if let Some(ref encoding) = args.encoding {
        config.parse.encoding = Some(encoding.clone());
    }
    if let Some(ref currency) = args.currency {
        config.parse.default_currency = currency.to_uppercase();
    }
    if let Some(ref standard) = args.standard {
        config.parse.expected_standard = Some(standard.parse::<AccountingStandard>()?);
    }
    for mapping in &args.map {
        let (field, header) = parse_mapping(mapping)?;
        config.parse.columns.insert(field.name().to_string(), header);
    }

    let mut bytes = Vec::new();
    match args.input {
        Some(ref path) => {
            File::open(path)?.read_to_end(&mut bytes)?;
        }
        None => {
            io::stdin().read_to_end(&mut bytes)?;
        }
    }
    Ok(bytes)
}

#[derive(Serialize)]
struct InspectReport<'a> {
    format: Format,
    standard: Option<AccountingStandard>,
    delimiter: char,
    headers: &'a [String],
    notes: &'a [String],
    stats: &'a Statistics,
    preview: &'a [ledger_import::AccountingLine],
    issues: &'a [Issue],
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), value)?;
    println!();
    Ok(())
}

fn print_parse(parsed: &ParseResult) {
    for note in &parsed.notes {
        println!("{}", note);
    }
    print_stats(&parsed.stats);
}

fn print_stats(stats: &Statistics) {
    println!(
        "Rows: {} total, {} valid, {} rejected",
        stats.total_rows, stats.valid_rows, stats.error_rows
    );
    println!(
        "Totals: debit {}, credit {}, balance {}{}",
        stats.total_debit,
        stats.total_credit,
        stats.balance,
        if stats.is_balanced { "" } else { " (NOT BALANCED)" }
    );
    println!(
        "Entries: {}, accounts: {}, journals: {}",
        stats.entry_count,
        stats.accounts.len(),
        stats.journals.join(", ")
    );
    if let Some(range) = stats.date_range {
        println!("Period: {} to {}", range.start, range.end);
    }
}

fn print_preview(parsed: &ParseResult, rows: usize) {
    let preview = parsed.preview(rows);
    if preview.is_empty() {
        return;
    }
    println!();
    println!(
        "{:>6}  {:<8} {:<10} {:<10} {:<12} {:>14} {:>14}  Description",
        "Line", "Journal", "Entry", "Date", "Account", "Debit", "Credit"
    );
    for line in preview {
        println!(
            "{:>6}  {:<8} {:<10} {:<10} {:<12} {:>14} {:>14}  {}",
            line.line_number,
            line.journal_code,
            line.entry_number,
            line.entry_date,
            line.account_number,
            line.debit,
            line.credit,
            line.description
        );
    }
}

fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        return;
    }
    println!();
    for issue in issues {
        println!("{}", issue);
    }
}

fn print_report(report: &ValidationReport) {
    print_issues(&report.issues);
    println!();
    if report.is_valid {
        println!("Valid ({} warning(s))", report.warnings().count());
    } else {
        println!(
            "Invalid: {} error(s), {} warning(s), {} unbalanced entr{}",
            report.error_count(),
            report.warnings().count(),
            report.unbalanced_entries.len(),
            if report.unbalanced_entries.len() == 1 { "y" } else { "ies" }
        );
    }
}
