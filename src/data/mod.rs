/// Data layer: core types, loading, filtering, summarising and export.
///
/// Architecture:
/// ```text
///  .csv (;) / .xlsx
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  bytes → RecordSet (delimited first, spreadsheet fallback)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ RecordSet │  columns, rows, unique values, fingerprint
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  range + membership predicates → narrower RecordSet
///   └──────────┘
///        │
///        ├──────────────┐
///        ▼              ▼
///   ┌───────────┐  ┌──────────┐
///   │ aggregate  │  │  export   │  CSV / XLSX bytes
///   └───────────┘  └──────────┘
///     target-column percentages
/// ```

pub mod aggregate;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;

#[cfg(test)]
pub mod testing;
