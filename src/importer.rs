use std::path::Path;

use log::debug;
use uuid::Uuid;

use crate::models::ActivityRecord;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> f64 {
    let s = raw.replace(',', "").replace('"', "").replace('$', "");
    let s = s.trim();
    let value = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        -inner.trim().parse::<f64>().unwrap_or(0.0)
    } else {
        s.parse().unwrap_or(0.0)
    };
    // "NaN" and "inf" parse as valid f64s
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn parse_date_mdy(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Brings a date cell to `YYYY-MM-DD` when it is recognizable, otherwise keeps the trimmed text.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(date) = parse_date_mdy(raw) {
        return date;
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Amount for layouts that split money into two columns: the debit when present, else the
/// negated credit.
fn debit_or_negated_credit(debit: &str, credit: &str) -> f64 {
    let amount = if debit.trim().is_empty() {
        -parse_amount(credit)
    } else {
        parse_amount(debit)
    };
    // avoid handing out -0.0 for rows with neither column filled
    if amount == 0.0 {
        0.0
    } else {
        amount
    }
}

fn mask_account_number(account: &str) -> &str {
    let chars = account.chars().count();
    if chars > 4 {
        let skip = account
            .char_indices()
            .nth(chars - 4)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &account[skip..]
    } else {
        account
    }
}

fn split_row(line: &str) -> Option<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let record = rdr.records().next()?.ok()?;
    Some(record.iter().map(|f| f.trim().to_string()).collect())
}

// ---------------------------------------------------------------------------
// Layout table
// ---------------------------------------------------------------------------

/// Fields pulled out of one export row, before an id is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub date: String,
    pub account: String,
    pub description: String,
    pub category: String,
    pub amount: f64,
}

pub struct LayoutSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub min_columns: usize,
    /// Lowercase words that identify the vendor in a file name.
    pub file_name_hints: &'static [&'static str],
    /// Lowercase header cells that must all be present in the first line.
    pub header_fingerprint: &'static [&'static str],
    /// Maps a row with at least `min_columns` cells.
    pub extract: fn(&[String]) -> ParsedRow,
}

// Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit
fn extract_capital_one(f: &[String]) -> ParsedRow {
    ParsedRow {
        date: normalize_date(&f[0]),
        account: f[2].clone(),
        description: f[3].clone(),
        category: f[4].clone(),
        amount: debit_or_negated_credit(&f[5], &f[6]),
    }
}

// Account Type,Account Number,Transaction Date,Cheque Number,Description 1,Description 2,CAD$,USD$
fn extract_rbc(f: &[String]) -> ParsedRow {
    ParsedRow {
        date: normalize_date(&f[2]),
        account: format!("{}-{}", mask_account_number(&f[1]), f[0]),
        description: format!("{} {}", f[4], f[5]).trim().to_string(),
        category: String::new(),
        // RBC reports spend as negative
        amount: {
            let amount = -parse_amount(&f[6]);
            if amount == 0.0 {
                0.0
            } else {
                amount
            }
        },
    }
}

// Date,Description,Withdrawals,Deposits,Balance
fn extract_td(f: &[String]) -> ParsedRow {
    ParsedRow {
        date: normalize_date(&f[0]),
        account: "td".to_string(),
        description: f[1].clone(),
        category: String::new(),
        amount: debit_or_negated_credit(&f[2], &f[3]),
    }
}

const CAPITAL_ONE: LayoutSpec = LayoutSpec {
    key: "cap1",
    name: "Capital One",
    min_columns: 7,
    file_name_hints: &["capitalone", "capital_one", "capital-one", "cap1"],
    header_fingerprint: &["transaction date", "posted date", "card no."],
    extract: extract_capital_one,
};

const RBC: LayoutSpec = LayoutSpec {
    key: "rbc",
    name: "RBC",
    min_columns: 7,
    file_name_hints: &["rbc"],
    header_fingerprint: &["account type", "account number", "cad$"],
    extract: extract_rbc,
};

const TD: LayoutSpec = LayoutSpec {
    key: "td",
    name: "TD",
    min_columns: 4,
    file_name_hints: &["accountactivity", "td"],
    header_fingerprint: &["date", "description", "withdrawals", "deposits"],
    extract: extract_td,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawLayout {
    CapitalOne,
    Rbc,
    Td,
}

impl RawLayout {
    pub fn spec(&self) -> &'static LayoutSpec {
        match self {
            Self::CapitalOne => &CAPITAL_ONE,
            Self::Rbc => &RBC,
            Self::Td => &TD,
        }
    }

    pub fn key(&self) -> &'static str {
        self.spec().key
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn min_columns(&self) -> usize {
        self.spec().min_columns
    }
}

pub const ALL_LAYOUTS: &[RawLayout] = &[RawLayout::CapitalOne, RawLayout::Rbc, RawLayout::Td];

pub fn get_by_key(key: &str) -> Option<RawLayout> {
    ALL_LAYOUTS
        .iter()
        .find(|l| l.key().eq_ignore_ascii_case(key.trim()))
        .copied()
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// True when `word` occurs in `text` with no letter or digit directly on either side.
fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Guesses the layout from the file name, then from the header line. `None` means inconclusive.
pub fn detect(file_name: &str, raw_text: &str) -> Option<RawLayout> {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name)
        .to_lowercase();
    let by_name = ALL_LAYOUTS
        .iter()
        .find(|l| l.spec().file_name_hints.iter().any(|hint| contains_word(&base, hint)));
    if let Some(layout) = by_name {
        return Some(*layout);
    }

    let header = raw_text.lines().next()?.trim_start_matches('\u{feff}');
    let cells: Vec<String> = split_row(header)?
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();
    ALL_LAYOUTS
        .iter()
        .find(|l| {
            l.spec()
                .header_fingerprint
                .iter()
                .all(|token| cells.iter().any(|c| c == token))
        })
        .copied()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses an export into records sorted by date. The first line is a header and is skipped;
/// rows with too few cells are dropped.
pub fn parse(layout: RawLayout, raw_text: &str) -> Vec<ActivityRecord> {
    let spec = layout.spec();
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for line in raw_text.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let Some(cells) = split_row(line) else {
            dropped += 1;
            continue;
        };
        if cells.len() < spec.min_columns {
            dropped += 1;
            continue;
        }
        let row = (spec.extract)(&cells);
        records.push(ActivityRecord::new(
            Uuid::new_v4().to_string(),
            row.date,
            row.account,
            row.category,
            row.amount,
            row.description,
        ));
    }

    if dropped > 0 {
        debug!("{}: dropped {dropped} malformed row(s)", spec.key);
    }
    records.sort_by(|a, b| a.date.cmp(&b.date));
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP1_HEADER: &str =
        "Transaction Date,Posted Date,Card No.,Description,Category,Debit,Credit";
    const RBC_HEADER: &str = "\"Account Type\",\"Account Number\",\"Transaction Date\",\
        \"Cheque Number\",\"Description 1\",\"Description 2\",\"CAD$\",\"USD$\"";
    const TD_HEADER: &str = "Date,Description,Withdrawals,Deposits,Balance";

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), 1234.56);
        assert_eq!(parse_amount("\"500.00\""), 500.0);
        assert_eq!(parse_amount("  -42.50  "), -42.5);
        assert_eq!(parse_amount("0"), 0.0);
        assert_eq!(parse_amount("not_a_number"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
    }

    #[test]
    fn test_parse_amount_never_returns_nan() {
        assert_eq!(parse_amount("NaN"), 0.0);
        assert_eq!(parse_amount("inf"), 0.0);
        assert_eq!(parse_amount("-infinity"), 0.0);
    }

    #[test]
    fn test_parse_amount_parenthesized_negatives() {
        assert_eq!(parse_amount("(500.00)"), -500.0);
        assert_eq!(parse_amount("$1,234.56"), 1234.56);
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("01/15/2025"), "2025-01-15");
        assert_eq!(normalize_date("1/5/2025"), "2025-01-05");
        assert_eq!(normalize_date("2025-01-15"), "2025-01-15");
        assert_eq!(normalize_date(" garbage "), "garbage");
        assert_eq!(normalize_date("02/30/2025"), "02/30/2025");
    }

    #[test]
    fn test_header_only_is_empty_for_all_layouts() {
        for (layout, header) in [
            (RawLayout::CapitalOne, CAP1_HEADER),
            (RawLayout::Rbc, RBC_HEADER),
            (RawLayout::Td, TD_HEADER),
        ] {
            assert!(parse(layout, header).is_empty(), "{}", layout.key());
            assert!(parse(layout, &format!("{header}\n")).is_empty());
            assert!(parse(layout, "").is_empty());
        }
    }

    #[test]
    fn test_capital_one_parse() {
        let text = format!(
            "{CAP1_HEADER}\n\
             2025-01-16,2025-01-17,1234,STARBUCKS,Dining,4.50,\n\
             2025-01-15,2025-01-16,1234,PAYMENT THANK YOU,Payment,,500.00\n"
        );
        let rows = parse(RawLayout::CapitalOne, &text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "PAYMENT THANK YOU");
        assert_eq!(rows[0].amount, -500.0);
        assert_eq!(rows[1].description, "STARBUCKS");
        assert_eq!(rows[1].category, "Dining");
        assert_eq!(rows[1].account, "1234");
        assert_eq!(rows[1].amount, 4.5);
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[test]
    fn test_malformed_row_between_valid_rows_is_dropped() {
        let text = format!(
            "{CAP1_HEADER}\n\
             2025-02-10,2025-02-11,1234,HARDWARE STORE,Merchandise,80.00,\n\
             Total,,3\n\
             2025-02-01,2025-02-02,1234,GROCER,Groceries,45.10,\n"
        );
        let rows = parse(RawLayout::CapitalOne, &text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2025-02-01");
        assert_eq!(rows[1].date, "2025-02-10");
    }

    #[test]
    fn test_rbc_parse_masks_account_and_flips_sign() {
        let text = format!(
            "{RBC_HEADER}\n\
             Chequing,01234-5678901,1/15/2025,,\"GROCERY\",\"STORE #12\",-65.20,\n\
             Chequing,01234-5678901,1/14/2025,,\"PAYROLL\",\"DEPOSIT\",\"1,500.00\",\n"
        );
        let rows = parse(RawLayout::Rbc, &text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2025-01-14");
        assert_eq!(rows[0].amount, -1500.0);
        assert_eq!(rows[1].account, "8901-Chequing");
        assert_eq!(rows[1].description, "GROCERY STORE #12");
        assert_eq!(rows[1].category, "");
        assert_eq!(rows[1].amount, 65.2);
    }

    #[test]
    fn test_td_parse() {
        let text = format!(
            "{TD_HEADER}\n\
             03/02/2025,HYDRO BILL,120.00,,880.00\n\
             03/01/2025,E-TRANSFER,,1000.00,1000.00\n"
        );
        let rows = parse(RawLayout::Td, &text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, -1000.0);
        assert_eq!(rows[1].amount, 120.0);
        assert_eq!(rows[1].account, "td");
    }

    #[test]
    fn test_parse_output_is_sorted_and_stable() {
        let text = format!(
            "{CAP1_HEADER}\n\
             2025-01-03,,1,C,,3,\n\
             2025-01-01,,1,A,,1,\n\
             2025-01-03,,1,D,,4,\n\
             2025-01-02,,1,B,,2,\n"
        );
        let rows = parse(RawLayout::CapitalOne, &text);
        let descs: Vec<&str> = rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descs, vec!["A", "B", "C", "D"]);

        let mut resorted = rows.clone();
        resorted.sort_by(|a, b| a.date.cmp(&b.date));
        assert_eq!(resorted, rows);
    }

    #[test]
    fn test_unparseable_amounts_become_zero() {
        let text = format!("{CAP1_HEADER}\n2025-01-01,,1,X,,abc,\n2025-01-02,,1,Y,,,NaN\n");
        let rows = parse(RawLayout::CapitalOne, &text);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.amount.is_finite()));
        assert_eq!(rows[0].amount, 0.0);
        assert_eq!(rows[1].amount, 0.0);
    }

    #[test]
    fn test_detect_by_file_name() {
        assert_eq!(detect("/tmp/CapitalOne_Jan.csv", ""), Some(RawLayout::CapitalOne));
        assert_eq!(detect("rbc-2025.csv", ""), Some(RawLayout::Rbc));
        assert_eq!(detect("accountactivity.csv", ""), Some(RawLayout::Td));
        assert_eq!(detect("TD_chequing.csv", ""), Some(RawLayout::Td));
        assert_eq!(detect("export-td-2025.csv", ""), Some(RawLayout::Td));
    }

    #[test]
    fn test_file_name_hints_match_whole_words() {
        assert_eq!(detect("std_export.csv", "a,b\n"), None);
        assert_eq!(detect("budget-std-2025.csv", "a,b\n"), None);
        assert_eq!(detect("herbcare.csv", "a,b\n"), None);
        assert_eq!(detect("std_export.csv", CAP1_HEADER), Some(RawLayout::CapitalOne));
    }

    #[test]
    fn test_detect_by_header() {
        assert_eq!(detect("export.csv", CAP1_HEADER), Some(RawLayout::CapitalOne));
        let with_bom = format!("\u{feff}{RBC_HEADER}\nrow");
        assert_eq!(detect("export.csv", &with_bom), Some(RawLayout::Rbc));
        assert_eq!(detect("export.csv", TD_HEADER), Some(RawLayout::Td));
    }

    #[test]
    fn test_detect_inconclusive() {
        assert_eq!(detect("export.csv", "Date,Amount\n2025-01-01,3"), None);
        assert_eq!(detect("export.csv", ""), None);
    }

    #[test]
    fn test_get_by_key() {
        assert_eq!(get_by_key("cap1"), Some(RawLayout::CapitalOne));
        assert_eq!(get_by_key("RBC"), Some(RawLayout::Rbc));
        assert_eq!(get_by_key("amex"), None);
    }
}
