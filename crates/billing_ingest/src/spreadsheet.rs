use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};

use crate::error::{DataSourceError, Result};
use crate::normalize::{excel_serial_to_date, parse_date_string, ColumnMap, RawRow, RawValue};

/// Reads the billing table from the first worksheet of an xlsx workbook.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DataSourceError::EmptyWorkbook)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    read_range(&range)
}

fn read_range(range: &Range<Data>) -> Result<Vec<RawRow>> {
    let (header_row_idx, columns) = find_header_row(range)?;

    let mut out = Vec::new();
    for row in range.rows().skip(header_row_idx + 1) {
        // Exports usually end with a few blank rows.
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        out.push(columns.row_from(|idx| cell_value(row.get(idx))));
    }
    Ok(out)
}

/// Find the first row that names every billing column. Report titles above the
/// table are skipped. When no row qualifies the first non-empty row decides
/// which columns are reported missing.
fn find_header_row(range: &Range<Data>) -> Result<(usize, ColumnMap)> {
    let mut first_error = None;

    for (r_idx, row) in range.rows().enumerate() {
        let names: Vec<String> = row
            .iter()
            .map(|c| cell_value(Some(c)).as_text().unwrap_or_default())
            .collect();
        if names.iter().all(|n| n.is_empty()) {
            continue;
        }

        match ColumnMap::from_headers(names.iter().map(String::as_str)) {
            Ok(map) => return Ok((r_idx, map)),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| {
        DataSourceError::MissingColumns(
            crate::normalize::REQUIRED_FILE_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )
    }))
}

fn cell_value(cell: Option<&Data>) -> RawValue {
    let Some(c) = cell else {
        return RawValue::Empty;
    };

    match c {
        Data::Empty | Data::Error(_) => RawValue::Empty,
        Data::String(s) => RawValue::text(s.clone()),
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Integer(*i),
        Data::Bool(b) => RawValue::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(RawValue::Date)
            .unwrap_or_default(),
        Data::DateTimeIso(s) => parse_date_string(s)
            .map(RawValue::Date)
            .unwrap_or_else(|| RawValue::text(s.clone())),
        other => RawValue::text(other.to_string()),
    }
}
