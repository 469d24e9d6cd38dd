//! Order-ledger and contact-log ingestion.
//!
//! Ledgers are CSV exports whose headers may be Chinese or English. Rows whose
//! date or revenue cannot be read are rejected one by one; a ledger where too
//! many rows fail is treated as corrupt and refused as a whole.

mod contacts;
mod normalizer;
mod parser;

pub use contacts::{load_contact_log, read_contact_log, ContactLogError};
pub use parser::{LedgerField, ParsedLedger, RejectedRow};

use chrono::NaiveDate;
use parser::ParseFailure;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Systemic corruption: too many rows were unreadable to trust the rest.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{origin}: {rejected} of {total} rows rejected, mostly for an unreadable `{field}` value")]
pub struct DataIntegrityError {
    pub origin: String,
    pub field: LedgerField,
    pub rejected: usize,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerImportError {
    #[error("failed to read ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CSV data in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },
    #[error("{origin} has no `{field}` column (accepted headers: {accepted})")]
    MissingColumn {
        origin: String,
        field: LedgerField,
        accepted: String,
    },
    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),
}

/// Reads order ledgers into [`OrderRecord`](crate::workflows::outreach::OrderRecord)s.
#[derive(Debug, Clone, Copy)]
pub struct LedgerImporter {
    reference_date: NaiveDate,
    max_rejected_fraction: f64,
}

impl LedgerImporter {
    /// `reference_date` anchors dates written without a year.
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            max_rejected_fraction: 0.5,
        }
    }

    pub fn with_max_rejected_fraction(mut self, fraction: f64) -> Self {
        self.max_rejected_fraction = fraction;
        self
    }

    pub fn import_path(&self, path: impl AsRef<Path>) -> Result<ParsedLedger, LedgerImportError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LedgerImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import_reader(BufReader::new(file), &path.display().to_string())
    }

    pub fn import_reader<R: Read>(
        &self,
        reader: R,
        origin: &str,
    ) -> Result<ParsedLedger, LedgerImportError> {
        let parsed = parser::parse_ledger(reader, self.reference_date).map_err(|failure| {
            match failure {
                ParseFailure::Csv(source) => LedgerImportError::Csv {
                    origin: origin.to_string(),
                    source,
                },
                ParseFailure::MissingColumn(field) => LedgerImportError::MissingColumn {
                    origin: origin.to_string(),
                    field,
                    accepted: field.aliases().join(", "),
                },
            }
        })?;

        self.check_integrity(&parsed, origin)?;
        info!(
            origin,
            rows = parsed.total_rows,
            orders = parsed.orders.len(),
            rejected = parsed.rejected.len(),
            "ledger imported"
        );
        Ok(parsed)
    }

    fn check_integrity(&self, parsed: &ParsedLedger, origin: &str) -> Result<(), DataIntegrityError> {
        let rejected = parsed.rejected.len();
        let total = parsed.total_rows;
        if rejected == 0 || total == 0 {
            return Ok(());
        }

        let fraction = rejected as f64 / total as f64;
        if rejected < total && fraction <= self.max_rejected_fraction {
            return Ok(());
        }

        let mut by_field: HashMap<LedgerField, usize> = HashMap::new();
        for row in &parsed.rejected {
            *by_field.entry(row.field).or_default() += 1;
        }
        let field = parsed
            .rejected
            .iter()
            .map(|row| row.field)
            .max_by_key(|field| by_field.get(field).copied().unwrap_or(0))
            .unwrap_or(LedgerField::OrderDate);

        Err(DataIntegrityError {
            origin: origin.to_string(),
            field,
            rejected,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn importer() -> LedgerImporter {
        LedgerImporter::new(NaiveDate::from_ymd_opt(2025, 11, 12).expect("valid date"))
    }

    #[test]
    fn missing_required_column_names_the_field() {
        let err = importer()
            .import_reader(Cursor::new("姓名,收款额\n张三,100\n"), "orders.csv")
            .expect_err("no date column");
        match err {
            LedgerImportError::MissingColumn { field, accepted, .. } => {
                assert_eq!(field, LedgerField::OrderDate);
                assert!(accepted.contains("顾客付款日期"));
            }
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn isolated_bad_rows_are_dropped() {
        let csv = "手机号,顾客付款日期,收款额\n\
13800000001,2025-10-01,199\n\
13800000002,not a date,88\n\
13800000003,2025-10-03,\"¥1,200\"\n\
,,\n";
        let parsed = importer()
            .import_reader(Cursor::new(csv), "orders.csv")
            .expect("one bad row is tolerated");
        assert_eq!(parsed.total_rows, 3);
        assert_eq!(parsed.orders.len(), 2);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].field, LedgerField::OrderDate);
        assert_eq!(parsed.rejected[0].line, 3);
    }

    #[test]
    fn systemic_failure_is_a_data_integrity_error() {
        let csv = "手机号,顾客付款日期,收款额\n\
13800000001,2025-10-01,免单\n\
13800000002,2025-10-02,待定\n\
13800000003,2025-10-03,120\n";
        let err = importer()
            .import_reader(Cursor::new(csv), "march.csv")
            .expect_err("two of three rows fail");
        match err {
            LedgerImportError::Integrity(integrity) => {
                assert_eq!(integrity.origin, "march.csv");
                assert_eq!(integrity.field, LedgerField::GrossRevenue);
                assert_eq!(integrity.rejected, 2);
                assert_eq!(integrity.total, 3);
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }
}
