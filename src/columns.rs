//! Column layout resolution: maps header cells to logical ledger fields.

use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::fields::normalize_header;

/// Logical fields of an accounting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    JournalCode,
    JournalName,
    EntryNumber,
    EntryDate,
    DocumentDate,
    ValidationDate,
    AccountNumber,
    AccountName,
    AuxiliaryAccount,
    AuxiliaryName,
    DocumentRef,
    Description,
    Debit,
    Credit,
    Amount,
    Direction,
    Currency,
    ForeignAmount,
    LetteringCode,
    LetteringDate,
}

impl Field {
    /// Resolution order. Fields earlier in the list claim ambiguous headers
    /// first (e.g. `DatePiece` is an entry date before it is a document date).
    pub const ALL: [Field; 20] = [
        Field::JournalCode,
        Field::JournalName,
        Field::EntryNumber,
        Field::EntryDate,
        Field::DocumentDate,
        Field::ValidationDate,
        Field::AccountNumber,
        Field::AccountName,
        Field::AuxiliaryAccount,
        Field::AuxiliaryName,
        Field::DocumentRef,
        Field::Description,
        Field::Debit,
        Field::Credit,
        Field::ForeignAmount,
        Field::Amount,
        Field::Direction,
        Field::Currency,
        Field::LetteringCode,
        Field::LetteringDate,
    ];

    /// Field name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Field::JournalCode => "journal_code",
            Field::JournalName => "journal_name",
            Field::EntryNumber => "entry_number",
            Field::EntryDate => "entry_date",
            Field::DocumentDate => "document_date",
            Field::ValidationDate => "validation_date",
            Field::AccountNumber => "account_number",
            Field::AccountName => "account_name",
            Field::AuxiliaryAccount => "auxiliary_account",
            Field::AuxiliaryName => "auxiliary_name",
            Field::DocumentRef => "document_ref",
            Field::Description => "description",
            Field::Debit => "debit",
            Field::Credit => "credit",
            Field::Amount => "amount",
            Field::Direction => "direction",
            Field::Currency => "currency",
            Field::ForeignAmount => "foreign_amount",
            Field::LetteringCode => "lettering_code",
            Field::LetteringDate => "lettering_date",
        }
    }

    /// Header names recognized for the field, most specific first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::JournalCode => &[
                "JournalCode", "CodeJournal", "Code_Journal", "Journal", "JrnlCode", "JL",
                "TRNSTYPE",
            ],
            Field::JournalName => &[
                "JournalLib", "LibJournal", "Lib_Journal", "JournalName", "LibelleJournal",
                "JrnlName",
            ],
            Field::EntryNumber => &[
                "EcritureNum", "NumEcriture", "Num_Ecriture", "EntryNumber", "TransactionID",
                "TRNSID", "JournalNumber", "Numero",
            ],
            Field::EntryDate => &[
                "EcritureDate", "DateEcriture", "Date_Ecriture", "TransactionDate", "Date",
                "DatePiece", "EntryDate", "InvoiceDate",
            ],
            Field::DocumentDate => &[
                "PieceDate", "Date_Piece", "DocumentDate", "DocDate", "InvoiceDate",
            ],
            Field::ValidationDate => &[
                "ValidDate", "DateValidation", "Date_Validation", "PostedDate", "ApprovedDate",
            ],
            Field::AccountNumber => &[
                "CompteNum", "NumCompte", "Num_Compte", "NumeroCompte", "AccountCode",
                "AccountNumber", "ACCNT", "NominalCode", "GLCode", "Compte", "Account",
                "SourceAccount",
            ],
            Field::AccountName => &[
                "CompteLib", "LibCompte", "Lib_Compte", "AccountName", "AccountDescription",
                "IntituleCompte", "NomCompte",
            ],
            Field::AuxiliaryAccount => &[
                "CompAuxNum", "NumCompteAux", "SubAccount", "AuxiliaryAccount", "AuxiliaryCode", "Auxiliaire",
            ],
            Field::AuxiliaryName => &[
                "CompAuxLib", "LibCompteAux", "SubAccountName", "AuxiliaryName", "ContactName",
            ],
            Field::DocumentRef => &[
                "PieceRef", "RefPiece", "Ref_Piece", "NumPiece", "Reference", "DocNum",
                "InvoiceNumber", "Piece",
            ],
            Field::Description => &[
                "EcritureLib", "LibEcriture", "Lib_Ecriture", "Description", "Memo", "Libelle",
                "Narrative", "Details",
            ],
            Field::Debit => &[
                "Debit", "MontantDebit", "Montant_Debit", "DebitAmount", "Dr",
            ],
            Field::Credit => &[
                "Credit", "MontantCredit", "Montant_Credit", "CreditAmount", "Cr",
            ],
            Field::Amount => &["Amount", "Montant", "NetAmount", "Value"],
            Field::Direction => &["Sens", "DebitCredit", "DrCr", "DC"],
            Field::Currency => &["Idevise", "Devise", "Currency", "CurrencyCode"],
            Field::ForeignAmount => &[
                "Montantdevise", "ForeignAmount", "OriginalAmount",
            ],
            Field::LetteringCode => &[
                "EcritureLet", "Lettrage", "MatchingCode", "ReconciliationCode",
            ],
            Field::LetteringDate => &[
                "DateLet", "DateLettrage", "Date_Lettrage", "MatchingDate", "ReconciliationDate",
            ],
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    /// Accepts the diagnostic name (`account_number`) in any case, with or
    /// without underscores.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize_header(s);
        Field::ALL
            .into_iter()
            .find(|field| normalize_header(field.name()) == wanted)
            .ok_or_else(|| Error::Config(format!("unknown field in column mapping: {}", s)))
    }
}

/// Parse a `field=header` mapping as given on the command line.
pub fn parse_mapping(value: &str) -> Result<(Field, String)> {
    let (field, header) = value
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("column mapping must be field=header: {}", value)))?;
    let header = header.trim();
    if header.is_empty() {
        return Err(Error::Config(format!("column mapping has no header: {}", value)));
    }
    Ok((field.trim().parse()?, header.to_string()))
}

/// Minimum alias length for substring matching; shorter aliases (`Dr`, `JL`,
/// `DC`) only match exactly.
const MIN_SUBSTRING_ALIAS: usize = 4;

/// Resolved column positions for a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    positions: BTreeMap<Field, usize>,
}

impl ColumnMap {
    /// Resolve the header row.
    ///
    /// First pass: exact (normalized) matches, in field order then alias
    /// order. Second pass: substring matches for long aliases. A column is
    /// claimed by at most one field.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let mut positions = BTreeMap::new();
        let mut claimed = vec![false; normalized.len()];

        for field in Field::ALL {
            for alias in field.aliases() {
                let alias = normalize_header(alias);
                let found = normalized
                    .iter()
                    .enumerate()
                    .find(|(idx, header)| !claimed[*idx] && **header == alias)
                    .map(|(idx, _)| idx);
                if let Some(idx) = found {
                    positions.insert(field, idx);
                    claimed[idx] = true;
                    break;
                }
            }
        }

        for field in Field::ALL {
            if positions.contains_key(&field) {
                continue;
            }
            for alias in field.aliases() {
                let alias = normalize_header(alias);
                if alias.len() < MIN_SUBSTRING_ALIAS {
                    continue;
                }
                let found = normalized
                    .iter()
                    .enumerate()
                    .find(|(idx, header)| !claimed[*idx] && header.contains(&alias))
                    .map(|(idx, _)| idx);
                if let Some(idx) = found {
                    positions.insert(field, idx);
                    claimed[idx] = true;
                    break;
                }
            }
        }

        ColumnMap { positions }
    }

    /// Point `field` at the header named `header`, taking the column away
    /// from any field that claimed it. Returns false when no header matches.
    pub fn assign<S: AsRef<str>>(&mut self, field: Field, headers: &[S], header: &str) -> bool {
        let wanted = normalize_header(header);
        let Some(idx) = headers
            .iter()
            .position(|h| normalize_header(h.as_ref()) == wanted)
        else {
            return false;
        };
        self.positions.retain(|_, claimed| *claimed != idx);
        self.positions.insert(field, idx);
        true
    }

    /// Column index of a field.
    pub fn get(&self, field: Field) -> Option<usize> {
        self.positions.get(&field).copied()
    }

    pub fn has(&self, field: Field) -> bool {
        self.positions.contains_key(&field)
    }

    /// Whether debit and credit come from separate columns.
    pub fn has_debit_credit(&self) -> bool {
        self.has(Field::Debit) || self.has(Field::Credit)
    }

    /// Mandatory fields that could not be resolved.
    pub fn missing_mandatory(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has(Field::AccountNumber) {
            missing.push("account number");
        }
        if !self.has(Field::EntryDate) {
            missing.push("entry date");
        }
        if !self.has_debit_credit() && !self.has(Field::Amount) {
            missing.push("amounts (debit/credit or amount)");
        }
        missing
    }

    /// Resolved `field name -> header` pairs, for reports.
    pub fn describe<S: AsRef<str>>(&self, headers: &[S]) -> BTreeMap<String, String> {
        self.positions
            .iter()
            .filter_map(|(field, idx)| {
                headers
                    .get(*idx)
                    .map(|h| (field.name().to_string(), h.as_ref().to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEC_HEADERS: [&str; 18] = [
        "JournalCode", "JournalLib", "EcritureNum", "EcritureDate", "CompteNum", "CompteLib",
        "CompAuxNum", "CompAuxLib", "PieceRef", "PieceDate", "EcritureLib", "Debit", "Credit",
        "EcritureLet", "DateLet", "ValidDate", "Montantdevise", "Idevise",
    ];

    #[test]
    fn test_fec_layout() {
        let map = ColumnMap::resolve(&FEC_HEADERS);
        assert_eq!(map.get(Field::JournalCode), Some(0));
        assert_eq!(map.get(Field::JournalName), Some(1));
        assert_eq!(map.get(Field::EntryNumber), Some(2));
        assert_eq!(map.get(Field::EntryDate), Some(3));
        assert_eq!(map.get(Field::AccountNumber), Some(4));
        assert_eq!(map.get(Field::DocumentDate), Some(9));
        assert_eq!(map.get(Field::Debit), Some(11));
        assert_eq!(map.get(Field::Credit), Some(12));
        assert_eq!(map.get(Field::ForeignAmount), Some(16));
        assert_eq!(map.get(Field::Currency), Some(17));
        // Montant must not steal Montantdevise
        assert_eq!(map.get(Field::Amount), None);
        assert!(map.missing_mandatory().is_empty());
    }

    #[test]
    fn test_accented_and_spaced_headers() {
        let map = ColumnMap::resolve(&["Date", "N° Compte", "Libellé", "Débit", "Crédit"]);
        assert_eq!(map.get(Field::EntryDate), Some(0));
        assert_eq!(map.get(Field::AccountNumber), Some(1));
        assert_eq!(map.get(Field::Description), Some(2));
        assert_eq!(map.get(Field::Debit), Some(3));
        assert_eq!(map.get(Field::Credit), Some(4));
    }

    #[test]
    fn test_short_aliases_match_exactly_only() {
        let map = ColumnMap::resolve(&["Date", "Account", "Dr", "Cr", "Address"]);
        assert_eq!(map.get(Field::Debit), Some(2));
        assert_eq!(map.get(Field::Credit), Some(3));
        assert_eq!(map.get(Field::Amount), None);
    }

    #[test]
    fn test_amount_with_direction() {
        let map = ColumnMap::resolve(&["EcritureDate", "CompteNum", "Montant", "Sens"]);
        assert_eq!(map.get(Field::Amount), Some(2));
        assert_eq!(map.get(Field::Direction), Some(3));
        assert!(!map.has_debit_credit());
        assert!(map.missing_mandatory().is_empty());
    }

    #[test]
    fn test_assign_overrides_resolution() {
        let headers = ["When", "GL", "Memo", "Debit", "Credit", "Account"];
        let mut map = ColumnMap::resolve(&headers);
        assert_eq!(map.get(Field::AccountNumber), Some(5));
        assert_eq!(map.get(Field::EntryDate), None);

        assert!(map.assign(Field::EntryDate, &headers, "when"));
        assert!(map.assign(Field::AccountNumber, &headers, "GL"));
        assert!(map.assign(Field::AccountName, &headers, "Account"));
        assert_eq!(map.get(Field::EntryDate), Some(0));
        assert_eq!(map.get(Field::AccountNumber), Some(1));
        assert_eq!(map.get(Field::AccountName), Some(5));
        assert!(map.missing_mandatory().is_empty());

        assert!(!map.assign(Field::Currency, &headers, "Devise"));
        assert_eq!(map.get(Field::Currency), None);
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("account_number".parse::<Field>().unwrap(), Field::AccountNumber);
        assert_eq!("EntryDate".parse::<Field>().unwrap(), Field::EntryDate);
        assert!(matches!("colour".parse::<Field>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            parse_mapping("account_number=N° compte").unwrap(),
            (Field::AccountNumber, "N° compte".to_string())
        );
        assert_eq!(parse_mapping(" debit = In ").unwrap(), (Field::Debit, "In".to_string()));
        assert!(parse_mapping("debit").is_err());
        assert!(parse_mapping("debit=").is_err());
        assert!(parse_mapping("colour=Red").is_err());
    }

    #[test]
    fn test_missing_mandatory() {
        let map = ColumnMap::resolve(&["Foo", "Bar"]);
        assert_eq!(
            map.missing_mandatory(),
            vec!["account number", "entry date", "amounts (debit/credit or amount)"]
        );
    }
}
