use std::collections::HashSet;

use crate::{domain::CanonicalRecord, error::ServiceError, reader::RawTable};

/// Legacy eGRID GEN column codes and their long-form names.
const LEGACY_TO_LONG: &[(&str, &str)] = &[
    ("SEQGEN23", "Generator file sequence number"),
    ("YEAR", "Data Year"),
    ("PSTATEABB", "Plant state abbreviation"),
    ("PNAME", "Plant name"),
    ("ORISPL", "DOE/EIA ORIS plant or facility code"),
    ("GENID", "Generator ID"),
    ("NUMBLR", "Number of associated boilers"),
    ("GENSTAT", "Generator status"),
    ("PRMVR", "Generator prime mover type"),
    ("FUELG1", "Generator primary fuel"),
    ("NAMEPCAP", "Generator nameplate capacity (MW)"),
    ("CFACT", "Generator capacity factor"),
    ("GENNTAN", "Generator annual net generation (MWh)"),
    ("GENNTOZ", "Generator ozone season net generation (MWh)"),
    ("GENERSRC", "Generation data source"),
    ("GENYRONL", "Generator year on-line"),
    ("GENYRRET", "Generator planned or actual retirement year"),
];

/// Defaults for known optional long-form columns. Applied only to columns
/// that already exist; never invents a column.
const FILL_DEFAULTS: &[(&str, &str)] = &[
    ("Number of associated boilers", "0"),
    ("Generator nameplate capacity (MW)", "0"),
    ("Generator capacity factor", "0"),
    ("Generator annual net generation (MWh)", "0"),
    ("Generator ozone season net generation (MWh)", "0"),
    ("Generator planned or actual retirement year", "0"),
    ("Generator status", "Unknown"),
    ("Generator prime mover type", "Unknown"),
    ("Generator primary fuel", "Unknown"),
    ("Generation data source", "Unknown"),
];

#[derive(Debug, Clone, Copy)]
enum NumericKind {
    Int,
    Float,
}

/// Long-form columns with a declared numeric type.
const NUMERIC_COLUMNS: &[(&str, NumericKind)] = &[
    ("Data Year", NumericKind::Int),
    ("Generator nameplate capacity (MW)", NumericKind::Float),
    ("Generator capacity factor", NumericKind::Float),
    ("Generator annual net generation (MWh)", NumericKind::Float),
    ("Generator ozone season net generation (MWh)", NumericKind::Float),
    ("Generator year on-line", NumericKind::Int),
    ("Generator planned or actual retirement year", NumericKind::Int),
];

/// The five required fields: long-form name and its compact API name.
/// Extraction prefers the long-form column, falling back to the compact one.
const COMPACT_FIELDS: &[(&str, &str)] = &[
    ("Generator ID", "GENID"),
    ("Plant name", "PNAME"),
    ("Plant state abbreviation", "PSTATEABB"),
    ("DOE/EIA ORIS plant or facility code", "ORISPL"),
    ("Generator annual net generation (MWh)", "GENNTAN"),
];

/// Header row for persisted canonical CSV blobs.
pub const COMPACT_HEADERS: [&str; 5] = ["GENID", "PNAME", "PSTATEABB", "ORISPL", "GENNTAN"];

/// Canonical records surviving normalization, plus how many rows were
/// dropped for failing field-level coercion.
#[derive(Debug)]
pub struct NormalizedBatch {
    pub records: Vec<CanonicalRecord>,
    pub dropped_rows: usize,
}

/// Full normalization of an uploaded table: cleaning followed by extraction
/// of the five canonical fields.
pub fn normalize(mut table: RawTable) -> Result<NormalizedBatch, ServiceError> {
    clean_table(&mut table);
    extract_canonical(&table)
}

/// In-place cleaning: legacy header rename, default fill, duplicate-row
/// drop, numeric column coercion. Column matching is exact and
/// case-sensitive throughout.
pub fn clean_table(table: &mut RawTable) {
    rename_legacy_headers(table);
    fill_defaults(table);
    drop_duplicate_rows(table);
    coerce_numeric_columns(table);
}

fn rename_legacy_headers(table: &mut RawTable) {
    let mut renamed = 0usize;
    for header in &mut table.headers {
        if let Some((_, long)) = LEGACY_TO_LONG.iter().find(|(legacy, _)| *legacy == header.as_str()) {
            *header = long.to_string();
            renamed += 1;
        }
    }
    if renamed == 0 {
        tracing::info!("no legacy column codes found; headers appear already long-form");
    }
}

fn fill_defaults(table: &mut RawTable) {
    for (column, default) in FILL_DEFAULTS {
        if let Some(idx) = table.column_index(column) {
            for row in &mut table.rows {
                if let Some(cell) = row.get_mut(idx) {
                    if cell.is_empty() {
                        *cell = default.to_string();
                    }
                }
            }
        }
    }
}

fn drop_duplicate_rows(table: &mut RawTable) {
    let mut seen = HashSet::new();
    table.rows.retain(|row| seen.insert(row.clone()));
}

/// Coerces each declared numeric column, rewriting cells in canonical
/// numeric form. A column with any non-coercible cell is left untouched:
/// malformed optional columns must not abort the row set.
fn coerce_numeric_columns(table: &mut RawTable) {
    for (column, kind) in NUMERIC_COLUMNS {
        let Some(idx) = table.column_index(column) else {
            continue;
        };

        let mut coerced = Vec::with_capacity(table.rows.len());
        let mut ok = true;
        for row in &table.rows {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            match coerce_cell(cell, *kind) {
                Some(value) => coerced.push(value),
                None => {
                    ok = false;
                    break;
                }
            }
        }

        if ok {
            for (row, value) in table.rows.iter_mut().zip(coerced) {
                if let Some(cell) = row.get_mut(idx) {
                    *cell = value;
                }
            }
        } else {
            tracing::warn!(column = *column, "numeric coercion failed; leaving column unconverted");
        }
    }
}

fn coerce_cell(cell: &str, kind: NumericKind) -> Option<String> {
    let value: f64 = cell.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    match kind {
        NumericKind::Int if value.fract() == 0.0 => Some((value as i64).to_string()),
        NumericKind::Int => None,
        NumericKind::Float => Some(value.to_string()),
    }
}

/// Extracts the five canonical fields from a cleaned table.
///
/// A table missing any required field (under either naming scheme) is
/// rejected whole. Individual rows are dropped when `net_generation` does
/// not parse to a finite number or any required value is blank.
pub fn extract_canonical(table: &RawTable) -> Result<NormalizedBatch, ServiceError> {
    let mut indices = [0usize; 5];
    let mut missing = Vec::new();
    for (slot, &(long, compact)) in indices.iter_mut().zip(COMPACT_FIELDS) {
        match table.column_index(long).or_else(|| table.column_index(compact)) {
            Some(idx) => *slot = idx,
            None => missing.push(compact),
        }
    }
    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::with_capacity(table.rows.len());
    let mut dropped_rows = 0usize;
    for row in &table.rows {
        let cell = |i: usize| row.get(indices[i]).map(String::as_str).unwrap_or("");

        let generator_id = cell(0);
        let plant_name = cell(1);
        let plant_state = cell(2);
        let plant_code = cell(3);
        let net_generation: Option<f64> = cell(4).parse().ok().filter(|v: &f64| v.is_finite());

        match net_generation {
            Some(net_generation)
                if !generator_id.is_empty()
                    && !plant_name.is_empty()
                    && !plant_state.is_empty()
                    && !plant_code.is_empty() =>
            {
                records.push(CanonicalRecord {
                    generator_id: generator_id.to_string(),
                    plant_name: plant_name.to_string(),
                    plant_state: plant_state.to_string(),
                    plant_code: plant_code.to_string(),
                    net_generation,
                });
            }
            _ => dropped_rows += 1,
        }
    }

    if dropped_rows > 0 {
        metrics::counter!("normalize_rows_dropped_total").increment(dropped_rows as u64);
    }

    Ok(NormalizedBatch { records, dropped_rows })
}

/// Encodes canonical records as a UTF-8 CSV blob under the compact header
/// row, the persisted format for cleaned uploads.
pub fn to_compact_csv(records: &[CanonicalRecord]) -> Vec<u8> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(COMPACT_HEADERS)
        .expect("write header to in-memory csv");
    for r in records {
        wtr.write_record([
            r.generator_id.as_str(),
            r.plant_name.as_str(),
            r.plant_state.as_str(),
            r.plant_code.as_str(),
            &r.net_generation.to_string(),
        ])
        .expect("write record to in-memory csv");
    }
    wtr.into_inner().expect("flush in-memory csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn renames_only_legacy_headers_present() {
        let mut t = table(&["PNAME", "Plant state abbreviation", "WEIRD"], &[]);
        clean_table(&mut t);
        assert_eq!(
            t.headers,
            vec!["Plant name", "Plant state abbreviation", "WEIRD"]
        );
    }

    #[test]
    fn fills_known_optional_columns_only() {
        let mut t = table(
            &["GENSTAT", "NUMBLR", "PNAME"],
            &[&["", "", ""]],
        );
        clean_table(&mut t);
        // GENSTAT -> Generator status -> "Unknown"; NUMBLR -> boilers -> "0".
        assert_eq!(t.rows[0][0], "Unknown");
        assert_eq!(t.rows[0][1], "0");
        // Plant name has no declared default.
        assert_eq!(t.rows[0][2], "");
    }

    #[test]
    fn drops_exact_duplicate_rows() {
        let mut t = table(
            &["GENID", "PNAME"],
            &[&["g1", "Alpha"], &["g1", "Alpha"], &["g2", "Alpha"]],
        );
        clean_table(&mut t);
        assert_eq!(t.rows.len(), 2);
    }

    #[test]
    fn numeric_coercion_rewrites_convertible_columns() {
        let mut t = table(&["GENYRONL", "CFACT"], &[&["2001.0", "0.50"]]);
        clean_table(&mut t);
        assert_eq!(t.rows[0][0], "2001");
        assert_eq!(t.rows[0][1], "0.5");
    }

    #[test]
    fn numeric_coercion_soft_fails_per_column() {
        let mut t = table(
            &["GENYRONL", "CFACT"],
            &[&["2001", "0.5"], &["n/a", "0.7"]],
        );
        clean_table(&mut t);
        // Year column untouched because one cell failed; CFACT still coerced.
        assert_eq!(t.rows[1][0], "n/a");
        assert_eq!(t.rows[0][1], "0.5");
    }

    #[test]
    fn extract_rejects_missing_required_columns() {
        let t = table(&["GENID", "PNAME", "PSTATEABB", "GENNTAN"], &[]);
        let err = extract_canonical(&t).unwrap_err();
        match err {
            ServiceError::Validation(msg) => assert!(msg.contains("ORISPL")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extract_prefers_long_form_over_compact() {
        let t = table(
            &["Plant name", "PNAME", "GENID", "PSTATEABB", "ORISPL", "GENNTAN"],
            &[&["Long Alpha", "Short Alpha", "g1", "CA", "55", "100"]],
        );
        let batch = extract_canonical(&t).unwrap();
        assert_eq!(batch.records[0].plant_name, "Long Alpha");
    }

    #[test]
    fn drops_rows_failing_field_coercion() {
        let t = table(
            &["GENID", "PNAME", "PSTATEABB", "ORISPL", "GENNTAN"],
            &[
                &["g1", "Alpha", "CA", "55", "100.5"],
                &["g2", "Alpha", "CA", "55", "not-a-number"],
                &["g3", "", "CA", "55", "10"],
                &["g4", "Beta", "CA", "56", "NaN"],
            ],
        );
        let batch = extract_canonical(&t).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.dropped_rows, 3);
        assert_eq!(batch.records[0].net_generation, 100.5);
    }

    #[test]
    fn normalizes_legacy_upload_end_to_end() {
        let t = table(
            &["GENID", "PNAME", "PSTATEABB", "ORISPL", "GENNTAN", "GENSTAT"],
            &[
                &["g1", "Alpha", "CA", "55", "100", ""],
                &["g1", "Alpha", "CA", "55", "100", ""],
                &["g2", "Beta", "NY", "70", "250.5", "OP"],
            ],
        );
        let batch = normalize(t).unwrap();
        // Duplicate row removed during cleaning.
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.dropped_rows, 0);
        assert_eq!(batch.records[1].plant_state, "NY");
    }

    #[test]
    fn compact_csv_round_trips_through_extraction() {
        let records = vec![CanonicalRecord {
            generator_id: "g1".to_string(),
            plant_name: "Alpha".to_string(),
            plant_state: "CA".to_string(),
            plant_code: "55".to_string(),
            net_generation: 150.25,
        }];
        let bytes = to_compact_csv(&records);
        let decoded = crate::reader::decode_csv(&bytes).unwrap();
        let batch = extract_canonical(&decoded).unwrap();
        assert_eq!(batch.records, records);
    }
}
