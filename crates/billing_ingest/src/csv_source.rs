use encoding_rs::WINDOWS_1252;

use crate::error::Result;
use crate::normalize::{ColumnMap, RawRow, RawValue};

/// Reads a billing CSV export. Every cell arrives as text.
pub fn read_csv(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let text = decode_text_lossy(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(headers.iter())?;

    let mut out = Vec::new();
    for rec in reader.records() {
        let rec = rec?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        out.push(columns.row_from(|idx| RawValue::text(rec.get(idx).unwrap_or(""))));
    }
    Ok(out)
}

/// Spreadsheet tools on Windows save CSV as Windows-1252 unless told otherwise,
/// so anything that is not valid UTF-8 is decoded with that code page.
fn decode_text_lossy(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}
