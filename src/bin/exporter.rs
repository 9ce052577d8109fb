//! Ledger Export - CLI tool for converting accounting ledger exports to FEC
//! or to a normalized CSV ledger.

use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use ledger_import::{
    columns::parse_mapping,
    export::{fec_file_name, CsvWriter, FecWriter},
    fields::parse_date,
    logging, AccountingLine, Error, Format, ImportConfig, LedgerParser, Result,
};

#[derive(Parser)]
#[command(name = "ledger_export")]
#[command(about = "Convert accounting ledger exports to FEC or normalized CSV", long_about = None)]
struct Cli {
    /// Input file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Input format (detected when omitted)
    #[arg(long = "input-format")]
    input_format: Option<String>,

    /// Output format (fec, csv)
    #[arg(long = "output-format", default_value = "fec")]
    output_format: String,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write into this directory under the regulatory FEC file name
    #[arg(long = "output-dir", requires = "siren")]
    output_dir: Option<PathBuf>,

    /// Company SIREN, used for the FEC file name
    #[arg(long)]
    siren: Option<String>,

    /// Fiscal year closing date (defaults to the last entry date)
    #[arg(long = "closing-date")]
    closing_date: Option<String>,

    /// FEC separator ("|" or "tab")
    #[arg(long, default_value = "|")]
    separator: String,

    /// Map a field to a header, e.g. `--map account_number=GL` (repeatable)
    #[arg(long = "map", value_name = "FIELD=HEADER")]
    map: Vec<String>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Fec,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fec" => Ok(OutputFormat::Fec),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
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

    let output_format = cli.output_format.parse::<OutputFormat>()?;
    let separator = match cli.separator.as_str() {
        "tab" | "\\t" | "\t" => '\t',
        other => other.chars().next().unwrap_or('|'),
    };
    let fec_writer = FecWriter::with_separator(separator)?;

    let mut config = match cli.config {
        Some(ref path) => ImportConfig::load(path)?,
        None => ImportConfig::default(),
    };
    if let Some(ref format) = cli.input_format {
        config.parse.format = Some(format.parse::<Format>()?);
    } else if let Some(hint) = cli.input.as_deref().and_then(Format::from_extension) {
        config.parse.format = Some(hint);
    }

    for mapping in &cli.map {
        let (field, header) = parse_mapping(mapping)?;
        config.parse.columns.insert(field.name().to_string(), header);
    }

    let parser = LedgerParser::new(config.parse);
    let parsed = if let Some(ref input_path) = cli.input {
        let mut file = File::open(input_path)?;
        parser.parse_read(&mut file)?
    } else {
        let mut stdin = io::stdin();
        parser.parse_read(&mut stdin)?
    };

    // Rejected rows are reported but do not stop the conversion
    for issue in parsed.errors() {
        eprintln!("{}", issue);
    }
    if parsed.lines.is_empty() {
        return Err(Error::InvalidFormat(format!(
            "no lines could be read from the {} input",
            parsed.format
        )));
    }

    let output = match (&cli.output, &cli.output_dir, &cli.siren) {
        (Some(path), _, _) => Some(path.clone()),
        (None, Some(dir), Some(siren)) => {
            let closing_date = match cli.closing_date {
                Some(ref value) => {
                    parse_date(value, true).ok_or_else(|| Error::InvalidDate(value.clone()))?
                }
                None => parsed
                    .stats
                    .date_range
                    .map(|range| range.end)
                    .ok_or_else(|| Error::InvalidDate("no entry dates in input".to_string()))?,
            };
            Some(dir.join(fec_file_name(siren, closing_date)))
        }
        _ => None,
    };

    if let Some(ref path) = output {
        let mut file = File::create(path)?;
        write_output(&mut file, &parsed.lines, output_format, &fec_writer)?;
        eprintln!("Wrote {} lines to {}", parsed.lines.len(), path.display());
    } else {
        let mut stdout = io::stdout();
        write_output(&mut stdout, &parsed.lines, output_format, &fec_writer)?;
    }

    Ok(())
}

fn write_output<W: Write>(
    writer: &mut W,
    lines: &[AccountingLine],
    format: OutputFormat,
    fec: &FecWriter,
) -> Result<()> {
    match format {
        OutputFormat::Fec => fec.write_to(writer, lines),
        OutputFormat::Csv => CsvWriter::new().write_to(writer, lines),
    }
}
