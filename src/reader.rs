use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::error::ServiceError;

/// Default worksheet for eGRID generator exports.
pub const DEFAULT_SHEET: &str = "GEN23";

/// Structurally decoded upload: header names plus string cells, one row per
/// record. Column-presence validation happens downstream in the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Upload formats accepted by the service, keyed off the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    pub fn from_name(file_name: &str) -> Result<Self, ServiceError> {
        if file_name.ends_with(".csv") {
            Ok(FileFormat::Csv)
        } else if file_name.ends_with(".xlsx") {
            Ok(FileFormat::Excel)
        } else {
            Err(ServiceError::Validation(
                "Only CSV and Excel files are supported".to_string(),
            ))
        }
    }
}

pub fn decode(bytes: &[u8], format: FileFormat) -> Result<RawTable, ServiceError> {
    match format {
        FileFormat::Csv => decode_csv(bytes),
        FileFormat::Excel => decode_excel(bytes, DEFAULT_SHEET),
    }
}

pub fn decode_csv(bytes: &[u8]) -> Result<RawTable, ServiceError> {
    let mut rdr = csv::Reader::from_reader(bytes);

    let headers = rdr
        .headers()
        .map_err(|e| ServiceError::Decode(format!("invalid CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record =
            record.map_err(|e| ServiceError::Decode(format!("invalid CSV record: {e}")))?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    Ok(RawTable { headers, rows })
}

pub fn decode_excel(bytes: &[u8], sheet: &str) -> Result<RawTable, ServiceError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> =
        Xlsx::new(cursor).map_err(|e| ServiceError::Decode(format!("invalid workbook: {e}")))?;

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| ServiceError::Decode(format!("cannot read sheet '{sheet}': {e}")))?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(row) => row.iter().map(cell_to_string).collect(),
        None => Vec::new(),
    };

    let rows = row_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

/// Whole-number floats render without a fractional part so identifiers like
/// ORIS codes survive the Excel round trip.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_csv() {
        let table = decode_csv(b"GENID,PNAME\n g1 ,Alpha\ng2,Beta\n").unwrap();
        assert_eq!(table.headers, vec!["GENID", "PNAME"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["g1", "Alpha"]);
    }

    #[test]
    fn rejects_non_utf8_csv() {
        let res = decode_csv(&[0x47, 0x45, 0x4e, 0xff, 0xfe, 0x0a, 0x01]);
        assert!(matches!(res, Err(ServiceError::Decode(_))));
    }

    #[test]
    fn rejects_ragged_csv() {
        let res = decode_csv(b"GENID,PNAME\ng1\n");
        assert!(matches!(res, Err(ServiceError::Decode(_))));
    }

    #[test]
    fn rejects_garbage_workbook() {
        let res = decode_excel(b"this is not a zip archive", DEFAULT_SHEET);
        assert!(matches!(res, Err(ServiceError::Decode(_))));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_name("gen23.csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_name("gen23.xlsx").unwrap(), FileFormat::Excel);
        assert!(matches!(
            FileFormat::from_name("gen23.pdf"),
            Err(ServiceError::Validation(_))
        ));
    }
}
