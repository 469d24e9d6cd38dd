use super::normalizer::{clean_cell, parse_date};
use crate::workflows::outreach::{normalize_phone, ContactLog, CooldownSource};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PHONE_HEADERS: [&str; 8] = [
    "手机号", "手机", "手机号码", "联系电话", "电话", "联系方式", "phone", "mobile",
];
const DATE_HEADERS: [&str; 6] = [
    "最后联系日期",
    "最后联系日",
    "最近联系日期",
    "联系日期",
    "last_contact",
    "contacted_on",
];

/// Why a contact log could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ContactLogError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("no {column} column (accepted headers: {accepted})")]
    MissingColumn {
        column: &'static str,
        accepted: String,
    },
}

/// Loads the outreach log for cooldown checks.
///
/// Any problem with the log (no path, unreadable file, unknown layout) disables
/// the cooldown rule for the run instead of failing it.
pub fn load_contact_log(path: Option<&Path>, reference_date: NaiveDate) -> CooldownSource {
    let Some(path) = path else {
        return CooldownSource::unavailable("no contact log configured");
    };

    let loaded = File::open(path)
        .map_err(|source| ContactLogError::Io {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|file| read_contact_log(file, reference_date));

    match loaded {
        Ok(log) => {
            info!(path = %path.display(), phones = log.len(), "contact log loaded");
            CooldownSource::Available(log)
        }
        Err(err) => {
            let reason = match err {
                ContactLogError::Io { .. } => err.to_string(),
                _ => format!("{}: {err}", path.display()),
            };
            warn!(%reason, "contact log unavailable");
            CooldownSource::unavailable(reason)
        }
    }
}

/// Reads `phone,date` style rows, keeping the latest date per normalised phone.
pub fn read_contact_log<R: Read>(
    reader: R,
    reference_date: NaiveDate,
) -> Result<ContactLog, ContactLogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|header| clean_cell(header).unwrap_or_default().to_lowercase())
        .collect();
    let find = |column: &'static str, candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|candidate| headers.iter().position(|header| header.as_str() == *candidate))
            .ok_or_else(|| ContactLogError::MissingColumn {
                column,
                accepted: candidates.join(", "),
            })
    };
    let phone_column = find("phone", &PHONE_HEADERS[..])?;
    let date_column = find("contact date", &DATE_HEADERS[..])?;

    let mut log = ContactLog::new();
    for record in csv_reader.records() {
        let record = record?;
        let phone = record.get(phone_column).and_then(normalize_phone);
        let date = record
            .get(date_column)
            .and_then(|raw| parse_date(raw, reference_date));
        match (phone, date) {
            (Some(phone), Some(date)) => log.record(phone, date),
            _ => debug!(row = ?record, "contact row skipped"),
        }
    }

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 12).expect("valid date")
    }

    #[test]
    fn latest_contact_per_phone_wins() {
        let csv = "手机号,联系日期,备注\n138 0000 0001,2025-11-01,\n+8613800000001,2025-11-09,回访\n13900000002,11/05,\n,2025-11-01,\n";
        let log = read_contact_log(Cursor::new(csv), reference()).expect("readable log");
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.last_contact("13800000001"),
            NaiveDate::from_ymd_opt(2025, 11, 9)
        );
        assert_eq!(
            log.last_contact("13900000002"),
            NaiveDate::from_ymd_opt(2025, 11, 5)
        );
    }

    #[test]
    fn missing_columns_or_file_disable_cooldown() {
        let err = read_contact_log(Cursor::new("name,notes\nA,B\n"), reference())
            .expect_err("no phone column");
        assert!(matches!(
            err,
            ContactLogError::MissingColumn { column: "phone", .. }
        ));
        assert!(err.to_string().contains("手机号"));

        let err = read_contact_log(Cursor::new("phone,notes\n13800000001,B\n"), reference())
            .expect_err("no date column");
        assert!(matches!(
            err,
            ContactLogError::MissingColumn { column: "contact date", .. }
        ));

        let source = load_contact_log(Some(Path::new("./no-such-contact-log.csv")), reference());
        assert!(!source.is_available());
        assert!(!load_contact_log(None, reference()).is_available());
    }
}
