use chrono::{DateTime, Datelike, Duration, NaiveDate};

const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
// Serial day numbers between 1954 and 2173; smaller numbers read as month.day.
const EXCEL_SERIAL_RANGE: std::ops::Range<f64> = 20_000.0..100_000.0;

/// Trims a cell and drops byte-order marks and zero-width spaces; blank becomes `None`.
pub(crate) fn clean_cell(value: &str) -> Option<String> {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First signed decimal token after stripping currency symbols and thousands separators.
///
/// `"¥1,280.50"` is 1280.5 and a range such as `"105-110(按款式)"` is 105.
pub(crate) fn parse_money(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '¥' | '￥' | ','))
        .collect();
    let chars: Vec<(usize, char)> = normalized.char_indices().collect();

    let first_digit = chars.iter().position(|(_, ch)| ch.is_ascii_digit())?;
    let mut start = chars[first_digit].0;
    if first_digit > 0 && matches!(chars[first_digit - 1].1, '+' | '-') {
        start = chars[first_digit - 1].0;
    }

    let mut cursor = first_digit;
    while cursor < chars.len() && chars[cursor].1.is_ascii_digit() {
        cursor += 1;
    }
    if cursor + 1 < chars.len() && chars[cursor].1 == '.' && chars[cursor + 1].1.is_ascii_digit() {
        cursor += 1;
        while cursor < chars.len() && chars[cursor].1.is_ascii_digit() {
            cursor += 1;
        }
    }
    let end = chars
        .get(cursor)
        .map(|(offset, _)| *offset)
        .unwrap_or(normalized.len());

    normalized[start..end].parse().ok()
}

/// Parses the date formats found in exported ledgers and contact sheets.
///
/// Month/day values without a year take `reference`'s year, or the year before
/// when that would land after `reference`.
pub(crate) fn parse_date(raw: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }
    if let Some(date) = excel_serial(text) {
        return Some(date);
    }

    let date_part = text.split_whitespace().next().unwrap_or(text);
    let date_part = date_part.split('T').next().unwrap_or(date_part);
    let groups: Vec<&str> = date_part
        .split(|ch: char| !ch.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .collect();

    match groups.as_slice() {
        [year, month, day] if year.len() == 4 || year.len() == 2 => {
            ymd(expand_year(year)?, month.parse().ok()?, day.parse().ok()?)
        }
        [month, day] if month.len() <= 2 && day.len() <= 2 => {
            month_day(month.parse().ok()?, day.parse().ok()?, reference)
        }
        [compact] if compact.len() == 8 => NaiveDate::parse_from_str(compact, "%Y%m%d").ok(),
        [compact] if compact.len() == 6 => NaiveDate::parse_from_str(compact, "%y%m%d").ok(),
        _ => None,
    }
}

fn excel_serial(text: &str) -> Option<NaiveDate> {
    let serial: f64 = text.parse().ok()?;
    if !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let (year, month, day) = EXCEL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(year, month, day)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 2 {
        Some(if year <= 68 { 2000 + year } else { 1900 + year })
    } else {
        Some(year)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_day(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    match ymd(reference.year(), month, day) {
        Some(date) if date <= reference => Some(date),
        _ => ymd(reference.year() - 1, month, day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn money_takes_first_numeric_token() {
        assert_eq!(parse_money("¥1,280.50"), Some(1280.5));
        assert_eq!(parse_money("￥99"), Some(99.0));
        assert_eq!(parse_money("105-110(按款式)"), Some(105.0));
        assert_eq!(parse_money("-20.5 退差价"), Some(-20.5));
        assert_eq!(parse_money("约 35.元"), Some(35.0));
        assert_eq!(parse_money("待定"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn dates_accept_common_export_formats() {
        let reference = date(2025, 11, 12);
        for raw in [
            "2025-03-04",
            "2025/3/4",
            "2025.03.04",
            "20250304",
            "2025年3月4日",
            "2025-03-04 18:22:05",
            "2025-03-04T18:22:05+08:00",
            "25-03-04",
            "45720",
        ] {
            assert_eq!(parse_date(raw, reference), Some(date(2025, 3, 4)), "{raw}");
        }
        assert_eq!(parse_date("unknown", reference), None);
        assert_eq!(parse_date("2025-02-30", reference), None);
    }

    #[test]
    fn month_day_rolls_back_when_in_the_future() {
        let reference = date(2025, 11, 12);
        assert_eq!(parse_date("11/12", reference), Some(date(2025, 11, 12)));
        assert_eq!(parse_date("12-24", reference), Some(date(2024, 12, 24)));
        assert_eq!(parse_date("3.8", reference), Some(date(2025, 3, 8)));
    }

    #[test]
    fn clean_cell_strips_invisible_characters() {
        assert_eq!(clean_cell("\u{feff} 张三 "), Some("张三".to_string()));
        assert_eq!(clean_cell("   "), None);
    }
}
