use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::error::{ReportError, ReportResult};
use crate::types::PivotTable;
use crate::util::format_number;

/// Serialize display rows to CSV in memory. This is the "download"
/// artifact; nothing touches disk unless the caller asks for it.
pub fn export_csv_bytes<T: Serialize>(rows: &[T]) -> ReportResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for r in rows {
        wtr.serialize(r)
            .map_err(|e| ReportError::ExportFailure(e.to_string()))?;
    }
    wtr.into_inner()
        .map_err(|e| ReportError::ExportFailure(e.to_string()))
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> ReportResult<()> {
    let s = serde_json::to_string_pretty(value)
        .map_err(|e| ReportError::ExportFailure(e.to_string()))?;
    std::fs::write(path, s).map_err(|e| ReportError::ExportFailure(e.to_string()))
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no matching rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Pivot tables have a dynamic column set, so they go through the
/// builder instead of a derived `Tabled` row type.
pub fn preview_pivot(table: &PivotTable, max_rows: usize) {
    if table.rows.is_empty() {
        println!("(no matching rows)\n");
        return;
    }
    let mut builder = Builder::default();
    let mut header = vec![table.index_label.clone()];
    header.extend(table.columns.iter().cloned());
    builder.push_record(header);
    for row in table.rows.iter().take(max_rows) {
        let mut cells = vec![row.key.clone()];
        cells.extend(row.values.iter().map(|v| format_number(*v, 2)));
        builder.push_record(cells);
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BranchDayRow;

    #[test]
    fn csv_export_round_trips_headers_and_rows() {
        let rows = vec![BranchDayRow {
            branch: "North".to_string(),
            sub_category: "Central".to_string(),
            date: "2024-01-01".to_string(),
            receivable: "100.50".to_string(),
            on_time: "90%".to_string(),
            sign_rate: "80%".to_string(),
        }];
        let bytes = export_csv_bytes(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Branch,SubCategory,Date,Receivable,OnTime,SignRate"
        );
        assert_eq!(lines.next().unwrap(), "North,Central,2024-01-01,100.50,90%,80%");
    }

    #[test]
    fn empty_export_still_produces_bytes() {
        let rows: Vec<BranchDayRow> = Vec::new();
        let bytes = export_csv_bytes(&rows).unwrap();
        assert!(bytes.is_empty());
    }
}
