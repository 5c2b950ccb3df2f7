use std::sync::Arc;

use anyhow::{Context, Result, anyhow, ensure};
use rust_xlsxwriter::Workbook;

use super::model::{RecordSet, Value};
use crate::cache::{MemoCache, cache_key};

/// Name of the only worksheet in exported workbooks.
pub const SHEET_NAME: &str = "Sheet1";

// Worksheet limits, header row included.
const MAX_XLSX_ROWS: usize = 1_048_576;
const MAX_XLSX_COLS: usize = 16_384;

/// UTF-8, comma-separated, header row, no index column. Nulls are empty fields.
pub fn to_csv(dataset: &RecordSet) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&dataset.columns)
        .context("writing CSV header")?;
    for (i, row) in dataset.rows.iter().enumerate() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .with_context(|| format!("writing CSV row {i}"))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("flushing CSV buffer: {}", e.error()))
}

/// Single worksheet named [`SHEET_NAME`], header row, no index column.
/// Numbers and booleans are written as native cells.
pub fn to_xlsx(dataset: &RecordSet) -> Result<Vec<u8>> {
    ensure!(
        dataset.len() < MAX_XLSX_ROWS,
        "{} rows exceed the worksheet limit",
        dataset.len()
    );
    ensure!(
        dataset.columns.len() <= MAX_XLSX_COLS,
        "{} columns exceed the worksheet limit",
        dataset.columns.len()
    );

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (c, name) in dataset.columns.iter().enumerate() {
        sheet.write_string(0, c as u16, name)?;
    }
    for (r, row) in dataset.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::String(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Value::Integer(i) => {
                    sheet.write_number(r, c, *i as f64)?;
                }
                Value::Float(f) => {
                    sheet.write_number(r, c, *f)?;
                }
                Value::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Value::Null => {}
            }
        }
    }

    workbook.save_to_buffer().context("encoding workbook")
}

/// Export formats offered for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Caches encoded downloads by (format, table fingerprint).
#[derive(Debug)]
pub struct Exporter {
    cache: MemoCache<Arc<Vec<u8>>>,
}

impl Exporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: MemoCache::new(capacity),
        }
    }

    pub fn export(&mut self, dataset: &RecordSet, format: ExportFormat) -> Result<Arc<Vec<u8>>> {
        let key = cache_key("export", &(format.extension(), &dataset.fingerprint))?;
        self.cache.get_or_try_insert_with(key, || {
            let bytes = match format {
                ExportFormat::Csv => to_csv(dataset)?,
                ExportFormat::Xlsx => to_xlsx(dataset)?,
            };
            log::info!(
                "Encoded {} rows as {} ({} bytes)",
                dataset.len(),
                format.extension(),
                bytes.len()
            );
            Ok(Arc::new(bytes))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{parse_delimited, parse_spreadsheet};
    use crate::data::testing::arb_bank;
    use proptest::prelude::*;
    use calamine::Reader;
    use std::io::Cursor;

    fn sample() -> RecordSet {
        RecordSet::from_rows(
            vec!["age".into(), "job".into(), "y".into()],
            vec![
                vec![Value::Integer(25), "admin.".into(), "yes".into()],
                vec![Value::Integer(40), "blue-collar".into(), "no".into()],
                vec![Value::Integer(60), "has, comma".into(), Value::Null],
            ],
            "sample".into(),
        )
    }

    #[test]
    fn csv_has_header_and_no_index() {
        let text = String::from_utf8(to_csv(&sample()).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("age,job,y"));
        assert_eq!(lines.next(), Some("25,admin.,yes"));
        assert_eq!(lines.nth(1), Some("60,\"has, comma\","));
    }

    #[test]
    fn csv_round_trips_through_the_loader() {
        let original = sample();
        let bytes = to_csv(&original).unwrap();
        let parsed = parse_delimited(&bytes, b',', String::new()).unwrap();
        assert_eq!(parsed.columns, original.columns);
        assert_eq!(parsed.rows, original.rows);
    }

    #[test]
    fn xlsx_has_single_named_sheet_and_round_trips() {
        let original = sample();
        let bytes = to_xlsx(&original).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);

        let parsed = parse_spreadsheet(&bytes, String::new()).unwrap();
        assert_eq!(parsed.columns, original.columns);
        assert_eq!(parsed.rows, original.rows);
    }

    #[test]
    fn empty_table_still_has_a_header() {
        let empty = RecordSet::from_rows(vec!["y".into()], Vec::new(), String::new());
        assert_eq!(to_csv(&empty).unwrap(), b"y\n");
        assert!(!to_xlsx(&empty).unwrap().is_empty());
    }

    #[test]
    fn exporter_reuses_encoded_bytes() {
        let mut exporter = Exporter::new(4);
        let rs = sample();
        let a = exporter.export(&rs, ExportFormat::Csv).unwrap();
        let b = exporter.export(&rs, ExportFormat::Csv).unwrap();
        let c = exporter.export(&rs, ExportFormat::Xlsx).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    proptest! {
        #[test]
        fn any_table_round_trips_through_csv(rs in arb_bank(30)) {
            let bytes = to_csv(&rs).unwrap();
            let parsed = parse_delimited(&bytes, b',', String::new()).unwrap();
            prop_assert_eq!(&parsed.columns, &rs.columns);
            prop_assert_eq!(&parsed.rows, &rs.rows);
        }
    }
}
