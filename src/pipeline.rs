//! End-to-end pipeline: parse, validate, gate, import.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::importer::{ImportSummary, LedgerStore};
use crate::parser::{LedgerParser, ParseResult};
use crate::validate::{ValidationReport, Validator};

/// Everything produced by a successful [`ImportPipeline::import`].
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub parse: ParseResult,
    pub report: ValidationReport,
    pub summary: ImportSummary,
}

/// Runs the parser, validator and importer with one configuration.
#[derive(Debug, Clone, Default)]
pub struct ImportPipeline {
    config: ImportConfig,
}

impl ImportPipeline {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Parse only. The preview is `ParseResult::preview(config.parse.preview_rows)`.
    pub fn inspect(&self, bytes: &[u8]) -> Result<ParseResult> {
        LedgerParser::new(self.config.parse.clone()).parse_bytes(bytes)
    }

    /// Parse and validate.
    pub fn validate(&self, bytes: &[u8]) -> Result<(ParseResult, ValidationReport)> {
        let parsed = self.inspect(bytes)?;
        let report = Validator::new(self.config.rules.clone()).validate(&parsed);
        Ok((parsed, report))
    }

    /// Parse, validate and import into `store`.
    ///
    /// An invalid file is refused with [`Error::ValidationFailed`] unless
    /// `import.allow_invalid` is set. Unbalanced entries are rejected by the
    /// store either way.
    pub fn import(&self, bytes: &[u8], store: &mut LedgerStore, company_id: &str) -> Result<ImportOutcome> {
        let (parse, report) = self.validate(bytes)?;

        if !report.is_valid {
            if !self.config.import.allow_invalid {
                warn!(errors = report.error_count(), "import refused");
                return Err(Error::ValidationFailed {
                    errors: report.error_count(),
                });
            }
            warn!(errors = report.error_count(), "importing despite validation errors");
        }

        let summary = store.import(company_id, &parse.lines, &self.config.import)?;
        info!(company = company_id, entries = summary.entries_created, "pipeline finished");

        Ok(ImportOutcome { parse, report, summary })
    }
}
