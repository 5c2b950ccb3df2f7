use std::fmt;
use std::io::Cursor;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader};

use super::model::{RecordSet, Value};
use crate::cache::fingerprint_bytes;
use crate::config::DashboardConfig;
use crate::error::{AttemptFailure, ParseFailure};

// ---------------------------------------------------------------------------
// Formats and options
// ---------------------------------------------------------------------------

/// A format the loader knows how to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    DelimitedText,
    Spreadsheet,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::DelimitedText => write!(f, "delimited text"),
            SourceFormat::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

/// Formats are tried in this order; the first success wins.
pub const ATTEMPT_ORDER: [SourceFormat; 2] = [SourceFormat::DelimitedText, SourceFormat::Spreadsheet];

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub delimiter: u8,
    /// An attempt that parses but lacks any of these columns is a failure.
    pub required_columns: Vec<String>,
}

impl LoaderOptions {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            delimiter: config.delimiter_byte(),
            required_columns: config.required_columns(),
        }
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Parse uploaded bytes, trying each format in [`ATTEMPT_ORDER`].
///
/// Never panics on bad input: when every attempt fails the returned
/// [`ParseFailure`] holds one message per attempt.
pub fn load_bytes(bytes: &[u8], options: &LoaderOptions) -> Result<RecordSet, ParseFailure> {
    let fingerprint = fingerprint_bytes(bytes);
    let mut attempts = Vec::with_capacity(ATTEMPT_ORDER.len());

    for format in ATTEMPT_ORDER {
        match parse_as(format, bytes, options, &fingerprint) {
            Ok(record_set) => {
                log::info!(
                    "Parsed {} rows x {} columns as {format}",
                    record_set.len(),
                    record_set.columns.len()
                );
                return Ok(record_set);
            }
            Err(e) => {
                log::warn!("Could not parse upload as {format}: {e:#}");
                attempts.push(AttemptFailure {
                    format,
                    message: format!("{e:#}"),
                });
            }
        }
    }

    Err(ParseFailure { attempts })
}

fn parse_as(
    format: SourceFormat,
    bytes: &[u8],
    options: &LoaderOptions,
    fingerprint: &str,
) -> Result<RecordSet> {
    let record_set = match format {
        SourceFormat::DelimitedText => {
            parse_delimited(bytes, options.delimiter, fingerprint.to_owned())?
        }
        SourceFormat::Spreadsheet => parse_spreadsheet(bytes, fingerprint.to_owned())?,
    };
    check_required_columns(&record_set.columns, &options.required_columns)?;
    Ok(record_set)
}

fn check_required_columns(columns: &[String], required: &[String]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|r| !columns.contains(r))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!("missing required columns: {}", missing.join(", "));
    }
    Ok(())
}

fn header_name(raw: &str, idx: usize) -> String {
    if raw.trim().is_empty() {
        format!("Unnamed: {idx}")
    } else {
        raw.to_string()
    }
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Header row followed by records separated by `delimiter`. Every record must
/// have as many fields as the header, and the text must be valid UTF-8.
pub fn parse_delimited(bytes: &[u8], delimiter: u8, fingerprint: String) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(h, i))
        .collect();
    if headers.is_empty() {
        bail!("input is empty");
    }

    let mut raw: Vec<Vec<String>> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers.
        let record = result.with_context(|| format!("record on line {}", row_no + 2))?;
        raw.push(record.iter().map(str::to_string).collect());
    }

    let kinds: Vec<ColumnKind> = (0..headers.len())
        .map(|col| ColumnKind::infer(raw.iter().map(|r| r[col].as_str())))
        .collect();

    let rows = raw
        .into_iter()
        .map(|r| {
            r.into_iter()
                .zip(&kinds)
                .map(|(cell, kind)| kind.convert(cell))
                .collect()
        })
        .collect();

    Ok(RecordSet::from_rows(headers, rows, fingerprint))
}

/// Column dtype inferred from every non-empty cell, like a dataframe reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let (mut any, mut ints, mut floats, mut bools) = (false, true, true, true);
        for cell in cells.filter(|c| !c.is_empty()) {
            any = true;
            ints &= cell.parse::<i64>().is_ok();
            floats &= cell.parse::<f64>().is_ok();
            bools &= parse_bool(cell).is_some();
        }
        match (any, ints, floats, bools) {
            (false, ..) => ColumnKind::Text,
            (true, true, _, _) => ColumnKind::Integer,
            (true, _, true, _) => ColumnKind::Float,
            (true, _, _, true) => ColumnKind::Bool,
            _ => ColumnKind::Text,
        }
    }

    fn convert(self, cell: String) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }
        let parsed = match self {
            ColumnKind::Integer => cell.parse().ok().map(Value::Integer),
            ColumnKind::Float => cell.parse().ok().map(Value::Float),
            ColumnKind::Bool => parse_bool(&cell).map(Value::Bool),
            ColumnKind::Text => None,
        };
        parsed.unwrap_or(Value::String(cell))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet workbook
// ---------------------------------------------------------------------------

/// First sheet of an xlsx / xls / ods workbook; its first row is the header.
pub fn parse_spreadsheet(bytes: &[u8], fingerprint: String) -> Result<RecordSet> {
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).context("opening workbook")?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .with_context(|| format!("sheet '{sheet}' is empty"))?
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(&cell.to_string(), i))
        .collect();

    let mut rows: Vec<Vec<Value>> = sheet_rows
        .map(|r| r.iter().map(cell_value).collect())
        .collect();
    unify_column_types(&mut rows, headers.len());

    Ok(RecordSet::from_rows(headers, rows, fingerprint))
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Integer(*i),
        // Workbooks store every number as a double.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Integer(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Give each column a single type: integers widen to floats next to floats,
/// and any text in a column turns the whole column into text.
fn unify_column_types(rows: &mut [Vec<Value>], width: usize) {
    for col in 0..width {
        let cells = || rows.iter().filter_map(|r| r.get(col));
        let has_text = cells().any(|v| matches!(v, Value::String(_)));
        let has_float = cells().any(|v| matches!(v, Value::Float(_)));

        for row in rows.iter_mut() {
            let Some(cell) = row.get_mut(col) else {
                continue;
            };
            let replacement = match &*cell {
                Value::Null | Value::String(_) => None,
                other if has_text => Some(Value::String(other.to_string())),
                Value::Integer(i) if has_float => Some(Value::Float(*i as f64)),
                _ => None,
            };
            if let Some(v) = replacement {
                *cell = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LoaderOptions {
        LoaderOptions {
            delimiter: b';',
            required_columns: vec!["age".into(), "job".into(), "y".into()],
        }
    }

    const SEMICOLON: &str = "age;job;balance;y\n25;admin;1.5;yes\n40;tech;;no\n60;admin;3;yes\n";

    #[test]
    fn semicolon_text_is_typed_per_column() {
        let rs = load_bytes(SEMICOLON.as_bytes(), &options()).unwrap();
        assert_eq!(rs.columns, vec!["age", "job", "balance", "y"]);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.value(0, "age"), Some(&Value::Integer(25)));
        assert_eq!(rs.value(0, "job"), Some(&Value::from("admin")));
        assert_eq!(rs.value(2, "balance"), Some(&Value::Float(3.0)));
        assert_eq!(rs.value(1, "balance"), Some(&Value::Null));
        assert_eq!(rs.fingerprint, fingerprint_bytes(SEMICOLON.as_bytes()));
    }

    #[test]
    fn mixed_columns_stay_text() {
        let rs = parse_delimited(b"a;b\n1;true\nx;False\n", b';', String::new()).unwrap();
        assert_eq!(rs.value(0, "a"), Some(&Value::from("1")));
        assert_eq!(rs.value(1, "b"), Some(&Value::Bool(false)));
    }

    #[test]
    fn blank_headers_are_named_by_position() {
        let rs = parse_delimited(b";job\n1;admin\n", b';', String::new()).unwrap();
        assert_eq!(rs.columns, vec!["Unnamed: 0", "job"]);
    }

    #[test]
    fn ragged_records_fail_the_text_attempt() {
        let err = parse_delimited(b"age;job\n25;admin;extra\n", b';', String::new()).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn wrong_delimiter_fails_both_attempts() {
        let comma = "age,job,y\n25,admin,yes\n";
        let failure = load_bytes(comma.as_bytes(), &options()).unwrap_err();
        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(failure.attempts[0].format, SourceFormat::DelimitedText);
        assert!(failure.attempts[0].message.contains("missing required columns"));
        assert_eq!(failure.attempts[1].format, SourceFormat::Spreadsheet);
    }

    #[test]
    fn garbage_reports_two_distinct_messages() {
        let garbage = [0xffu8, 0xfe, 0x00, 0x13, 0x37, 0xc3, 0x28, 0x0a, 0x9f];
        let failure = load_bytes(&garbage, &options()).unwrap_err();
        let messages = failure.messages();
        assert_eq!(messages.len(), 2);
        assert_ne!(messages[0], messages[1]);
        assert!(messages[0].contains("delimited text"));
        assert!(messages[1].contains("spreadsheet"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(load_bytes(b"", &options()).is_err());
    }

    #[test]
    fn workbook_loads_through_the_spreadsheet_fallback() {
        let table = RecordSet::from_rows(
            vec!["age".into(), "job".into(), "y".into()],
            vec![
                vec![Value::Integer(25), "admin".into(), "yes".into()],
                vec![Value::Integer(40), "tech".into(), "no".into()],
                vec![Value::Integer(60), "admin".into(), "yes".into()],
            ],
            "table".into(),
        );
        let bytes = crate::data::export::to_xlsx(&table).unwrap();

        let rs = load_bytes(&bytes, &options()).unwrap();
        assert_eq!(rs.columns, table.columns);
        assert_eq!(rs.rows, table.rows);
        assert_eq!(rs.fingerprint, fingerprint_bytes(&bytes));
    }

    #[test]
    fn spreadsheet_text_columns_absorb_numbers() {
        let mut rows = vec![
            vec![Value::Integer(1), Value::Integer(2)],
            vec![Value::from("x"), Value::Float(2.5)],
        ];
        unify_column_types(&mut rows, 2);
        assert_eq!(rows[0][0], Value::from("1"));
        assert_eq!(rows[0][1], Value::Float(2.0));
    }
}
