use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use tracing::warn;

use crate::error::{ReportError, ReportResult};
use crate::types::{Dataset, DeliveryRecord};
use crate::util::{parse_date_cell, parse_f64_safe, parse_fraction_safe};

/// The positional source schema: branch, sub-category, date-or-Total,
/// receivable amount, on-time fraction, sign-rate fraction.
pub const SCHEMA_COLUMNS: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_rows: usize,
    pub total_sentinel_rows: usize,
    pub out_of_range_fractions: usize,
}

/// Load a data file into a `Dataset`, picking the parser by extension.
///
/// A missing or unreadable file is `DataUnavailable`; callers recover by
/// warning and continuing with an empty dataset. A file whose header has
/// fewer than the expected columns is rejected outright rather than
/// silently misread.
pub fn load_dataset(path: &Path) -> ReportResult<(Dataset, LoadReport)> {
    if !path.exists() {
        return Err(ReportError::DataUnavailable(format!(
            "{} not found",
            path.display()
        )));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "csv" => load_csv(path),
        "xlsx" | "xls" => load_excel(path),
        other => Err(ReportError::UnsupportedFormat(other.to_string())),
    }
}

fn load_csv(path: &Path) -> ReportResult<(Dataset, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let header_len = rdr.headers()?.len();
    if header_len < SCHEMA_COLUMNS {
        return Err(ReportError::SchemaMismatch {
            expected: SCHEMA_COLUMNS,
            found: header_len,
        });
    }

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let record = match result {
            Ok(r) => r,
            Err(_) => {
                report.skipped_rows += 1;
                continue;
            }
        };
        let cells: Vec<&str> = record.iter().collect();
        if let Some(rec) = record_from_cells(&cells, report.total_rows, &mut report) {
            records.push(rec);
        }
    }
    Ok((Dataset::new(records), report))
}

fn load_excel(path: &Path) -> ReportResult<(Dataset, LoadReport)> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ReportError::DataUnavailable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReportError::DataUnavailable("workbook has no sheets".to_string()))?
        .map_err(|e| ReportError::DataUnavailable(e.to_string()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| ReportError::DataUnavailable("sheet has no rows".to_string()))?;
    if header.len() < SCHEMA_COLUMNS {
        return Err(ReportError::SchemaMismatch {
            expected: SCHEMA_COLUMNS,
            found: header.len(),
        });
    }

    let mut report = LoadReport::default();
    let mut records = Vec::new();
    for row in rows {
        report.total_rows += 1;
        let cells: Vec<String> = row.iter().map(excel_cell_to_string).collect();
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        if let Some(rec) = record_from_cells(&refs, report.total_rows, &mut report) {
            records.push(rec);
        }
    }
    Ok((Dataset::new(records), report))
}

/// Stringify one Excel cell. Date-typed cells carry an Excel serial
/// number whose `Display` form would never read as a calendar date, so
/// they are converted through chrono first; everything else goes through
/// `Display` and the regular cell parsers.
fn excel_cell_to_string(cell: &Data) -> String {
    match cell {
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string().trim().to_string(),
    }
}

/// Map one positional row to a typed record, counting what was skipped
/// and why. Blank rows and rows with too few columns or an unparsable
/// receivable amount are dropped; everything else loads, with missing
/// rate cells kept as `None`.
fn record_from_cells(cells: &[&str], row: usize, report: &mut LoadReport) -> Option<DeliveryRecord> {
    if cells.iter().all(|c| c.trim().is_empty()) {
        report.skipped_rows += 1;
        return None;
    }
    if cells.len() < SCHEMA_COLUMNS {
        warn!(row, found = cells.len(), "row has too few columns, skipping");
        report.skipped_rows += 1;
        return None;
    }

    let receivable = match parse_f64_safe(Some(cells[3])) {
        Some(v) => v,
        None => {
            warn!(row, value = cells[3], "unparsable receivable amount, skipping row");
            report.skipped_rows += 1;
            return None;
        }
    };

    let date = parse_date_cell(cells[2]);
    if date.is_total() {
        report.total_sentinel_rows += 1;
    }

    let on_time = parse_fraction_safe(Some(cells[4]));
    let sign_rate = parse_fraction_safe(Some(cells[5]));
    for f in [on_time, sign_rate].into_iter().flatten() {
        if !f.in_nominal_range() {
            report.out_of_range_fractions += 1;
            warn!(row, value = f.value(), "rate outside [0,1], keeping as-is");
        }
    }

    report.loaded_rows += 1;
    Some(DeliveryRecord {
        branch: cells[0].trim().to_string(),
        sub_category: cells[1].trim().to_string(),
        date,
        receivable,
        on_time,
        sign_rate,
    })
}
