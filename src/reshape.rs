// The parameterized reshape pipeline: one implementation behind every
// view the menu offers, instead of a near-duplicate pipeline per view.
use std::collections::{BTreeMap, BTreeSet};

use crate::filter;
use crate::types::{
    BranchDayRow, ChartKind, ChartPoint, ChartSpec, Dataset, DeliveryRecord, FilteredView, Metric,
    PivotRow, PivotTable, Selection, SummaryStats,
};
use crate::util::{format_fraction_pct, format_number, mean};

/// Shape of the table a pipeline run produces.
#[derive(Debug, Clone, Copy)]
pub enum ViewShape {
    /// One display row per matching record.
    Flat,
    /// Sub-category × branch matrix over one metric, mean-aggregated.
    Pivot { metric: Metric, date_in_index: bool },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub selection: Selection,
    pub metrics: Vec<Metric>,
    pub shape: ViewShape,
}

#[derive(Debug)]
pub enum TableOutput {
    Flat(Vec<BranchDayRow>),
    Pivot(PivotTable),
}

#[derive(Debug)]
pub struct PipelineRun {
    pub matched_rows: usize,
    pub table: TableOutput,
    pub charts: Vec<ChartSpec>,
}

/// Run filter → reshape → chart-spec over the dataset. Stateless: every
/// selection change recomputes from the immutable dataset.
pub fn run(dataset: &Dataset, config: &PipelineConfig) -> PipelineRun {
    let view = filter::filter(dataset, &config.selection);
    let matched_rows = view.len();
    match config.shape {
        ViewShape::Flat => {
            let charts = config.metrics.iter().map(|m| line_chart(&view, *m)).collect();
            PipelineRun {
                matched_rows,
                table: TableOutput::Flat(view_rows(&view)),
                charts,
            }
        }
        ViewShape::Pivot { metric, date_in_index } => {
            let table = pivot(&view, metric, date_in_index);
            let mut charts = vec![comparison_bars(&table, metric)];
            charts.push(line_chart(&view, metric));
            PipelineRun {
                matched_rows,
                table: TableOutput::Pivot(table),
                charts,
            }
        }
    }
}

/// Display rows for a filtered view, sorted by branch then date (Total
/// rows sort after dated ones). Percent columns are formatted here; the
/// numeric fields stay untouched on the records for the chart builders.
pub fn view_rows(view: &FilteredView) -> Vec<BranchDayRow> {
    let mut rows: Vec<&DeliveryRecord> = view.rows().to_vec();
    rows.sort_by(|a, b| a.branch.cmp(&b.branch).then(a.date.cmp(&b.date)));
    rows.into_iter()
        .map(|r| BranchDayRow {
            branch: r.branch.clone(),
            sub_category: r.sub_category.clone(),
            date: r.date.to_string(),
            receivable: format_number(r.receivable, 2),
            on_time: format_fraction_pct(r.on_time),
            sign_rate: format_fraction_pct(r.sign_rate),
        })
        .collect()
}

/// Pivot a view to index = sub-category (optionally × date), columns =
/// branch, values = one metric aggregated by mean. Fraction metrics are
/// scaled to percent; missing combinations fill with 0. Keys and columns
/// are emitted in sorted order, so the result is independent of input
/// row order.
pub fn pivot(view: &FilteredView, metric: Metric, date_in_index: bool) -> PivotTable {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    let mut cells: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();

    for r in view.rows() {
        let Some(value) = metric.plot_value(r) else { continue };
        let key = if date_in_index {
            format!("{} | {}", r.sub_category, r.date)
        } else {
            r.sub_category.clone()
        };
        columns.insert(r.branch.clone());
        cells
            .entry(key)
            .or_default()
            .entry(r.branch.clone())
            .or_default()
            .push(value);
    }

    let columns: Vec<String> = columns.into_iter().collect();
    let rows = cells
        .into_iter()
        .map(|(key, by_branch)| PivotRow {
            key,
            values: columns
                .iter()
                .map(|b| by_branch.get(b).map(|v| mean(v)).unwrap_or(0.0))
                .collect(),
        })
        .collect();

    PivotTable {
        index_label: if date_in_index {
            "SubCategory | Date".to_string()
        } else {
            "SubCategory".to_string()
        },
        columns,
        rows,
    }
}

fn y_label(metric: Metric) -> String {
    if metric.is_fraction() {
        "Percent (%)".to_string()
    } else {
        "Amount".to_string()
    }
}

/// Line chart of one metric over time, one series per branch. Aggregate
/// rows have no place on a date axis and are left out.
pub fn line_chart(view: &FilteredView, metric: Metric) -> ChartSpec {
    let mut rows: Vec<&DeliveryRecord> = view
        .rows()
        .iter()
        .copied()
        .filter(|r| !r.date.is_total())
        .collect();
    rows.sort_by(|a, b| a.branch.cmp(&b.branch).then(a.date.cmp(&b.date)));

    let points = rows
        .into_iter()
        .filter_map(|r| {
            metric.plot_value(r).map(|value| ChartPoint {
                category: r.date.to_string(),
                value,
                series: format!("{} - {}", r.branch, metric.label()),
            })
        })
        .collect();

    ChartSpec {
        kind: ChartKind::Line,
        title: format!("{} over time", metric.label()),
        x_label: "Date".to_string(),
        y_label: y_label(metric),
        points,
    }
}

/// Grouped bars over a pivot table: one category per index key, one
/// series per branch column.
pub fn comparison_bars(table: &PivotTable, metric: Metric) -> ChartSpec {
    let mut points = Vec::new();
    for row in &table.rows {
        for (branch, value) in table.columns.iter().zip(&row.values) {
            points.push(ChartPoint {
                category: row.key.clone(),
                value: *value,
                series: branch.clone(),
            });
        }
    }
    ChartSpec {
        kind: ChartKind::GroupedBar,
        title: format!("{} by branch", metric.label()),
        x_label: table.index_label.clone(),
        y_label: y_label(metric),
        points,
    }
}

/// Dataset-level stats for the JSON summary. Averages and the receivable
/// sum run over dated rows only, so aggregate rows are not double-counted.
pub fn summary(dataset: &Dataset) -> SummaryStats {
    let day_rows: Vec<&DeliveryRecord> = dataset
        .records()
        .iter()
        .filter(|r| !r.date.is_total())
        .collect();
    let on_time: Vec<f64> = day_rows
        .iter()
        .filter_map(|r| Metric::OnTime.plot_value(r))
        .collect();
    let sign_rate: Vec<f64> = day_rows
        .iter()
        .filter_map(|r| Metric::SignRate.plot_value(r))
        .collect();

    SummaryStats {
        total_rows: dataset.len(),
        total_branches: dataset.branches().len(),
        total_sub_categories: dataset
            .records()
            .iter()
            .map(|r| r.sub_category.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        total_receivable: day_rows.iter().map(|r| r.receivable).sum(),
        avg_on_time_pct: mean(&on_time),
        avg_sign_rate_pct: mean(&sign_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeliveryRecord, Fraction, Selection};
    use crate::util::parse_date_cell;

    fn rec(branch: &str, sub: &str, date: &str, recv: f64, on_time: f64, sign: f64) -> DeliveryRecord {
        DeliveryRecord {
            branch: branch.to_string(),
            sub_category: sub.to_string(),
            date: parse_date_cell(date),
            receivable: recv,
            on_time: Some(Fraction::new(on_time)),
            sign_rate: Some(Fraction::new(sign)),
        }
    }

    #[test]
    fn pivot_means_and_scales_fractions() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "X", "2024-01-01", 70.0, 0.7, 0.6),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let table = pivot(&view, Metric::OnTime, false);

        assert_eq!(table.columns, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].key, "X");
        assert_eq!(table.rows[0].values, vec![90.0, 70.0]);
    }

    #[test]
    fn pivot_is_independent_of_input_row_order() {
        let mut records = vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "X", "2024-01-01", 70.0, 0.7, 0.6),
            rec("A", "Y", "2024-01-02", 40.0, 0.5, 0.4),
            rec("B", "Y", "2024-01-02", 60.0, 0.6, 0.5),
        ];
        let forward = Dataset::new(records.clone());
        records.reverse();
        let backward = Dataset::new(records);

        let sel = Selection::default();
        let a = pivot(&filter::filter(&forward, &sel), Metric::SignRate, false);
        let b = pivot(&filter::filter(&backward, &sel), Metric::SignRate, false);
        assert_eq!(a, b);
    }

    #[test]
    fn pivot_with_date_in_the_index_keys_by_sub_and_date() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "X", "2024-01-01", 70.0, 0.7, 0.6),
            rec("A", "X", "2024-01-02", 100.0, 0.8, 0.7),
            rec("B", "X", "2024-01-02", 70.0, 0.6, 0.5),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let table = pivot(&view, Metric::OnTime, true);

        assert_eq!(table.index_label, "SubCategory | Date");
        assert_eq!(table.columns, vec!["A".to_string(), "B".to_string()]);
        let keys: Vec<&str> = table.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["X | 2024-01-01", "X | 2024-01-02"]);
        assert_eq!(table.rows[0].values, vec![90.0, 70.0]);
        assert_eq!(table.rows[1].values, vec![80.0, 60.0]);
    }

    #[test]
    fn both_rate_metrics_chart_as_one_series_per_branch_and_metric() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "X", "2024-01-01", 70.0, 0.7, 0.6),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let charts: Vec<ChartSpec> = [Metric::OnTime, Metric::SignRate]
            .iter()
            .map(|m| line_chart(&view, *m))
            .collect();

        let series: BTreeSet<String> = charts
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.series.clone()))
            .collect();
        assert_eq!(
            series,
            BTreeSet::from([
                "A - On-Time Rate".to_string(),
                "A - Sign Rate".to_string(),
                "B - On-Time Rate".to_string(),
                "B - Sign Rate".to_string(),
            ])
        );
    }

    #[test]
    fn pivot_fills_missing_combinations_with_zero() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "Y", "2024-01-01", 70.0, 0.7, 0.6),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let table = pivot(&view, Metric::OnTime, false);

        assert_eq!(table.rows[0].key, "X");
        assert_eq!(table.rows[0].values, vec![90.0, 0.0]);
        assert_eq!(table.rows[1].key, "Y");
        assert_eq!(table.rows[1].values, vec![0.0, 70.0]);
    }

    #[test]
    fn pivot_averages_duplicate_combinations() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.8, 0.8),
            rec("A", "X", "2024-01-02", 100.0, 0.6, 0.6),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let table = pivot(&view, Metric::OnTime, false);
        assert_eq!(table.rows[0].values, vec![70.0]);
    }

    #[test]
    fn display_rows_format_without_touching_numeric_fields() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 1234.5, 0.9, 0.8),
            DeliveryRecord {
                sign_rate: None,
                ..rec("A", "X", "Total", 500.0, 0.85, 0.0)
            },
        ]);
        let view = filter::filter(&data, &Selection::default());
        let rows = view_rows(&view);

        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[0].receivable, "1,234.50");
        assert_eq!(rows[0].on_time, "90%");
        assert_eq!(rows[1].date, "Total");
        assert_eq!(rows[1].sign_rate, "");

        // The chart path still sees numbers after formatting.
        let chart = line_chart(&view, Metric::OnTime);
        assert_eq!(chart.points.len(), 1);
        assert_eq!(chart.points[0].value, 90.0);
    }

    #[test]
    fn line_chart_leaves_aggregate_rows_off_the_date_axis() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("A", "X", "Total", 500.0, 0.85, 0.75),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let chart = line_chart(&view, Metric::SignRate);
        assert_eq!(chart.points.len(), 1);
        assert_eq!(chart.points[0].category, "2024-01-01");
        assert_eq!(chart.points[0].series, "A - Sign Rate");
    }

    #[test]
    fn comparison_bars_emit_one_point_per_cell() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "X", "2024-01-01", 70.0, 0.7, 0.6),
        ]);
        let view = filter::filter(&data, &Selection::default());
        let table = pivot(&view, Metric::OnTime, false);
        let chart = comparison_bars(&table, Metric::OnTime);

        assert_eq!(chart.points.len(), 2);
        assert_eq!(chart.points[0].series, "A");
        assert_eq!(chart.points[0].value, 90.0);
        assert_eq!(chart.points[1].series, "B");
        assert_eq!(chart.points[1].value, 70.0);
    }

    #[test]
    fn pipeline_run_reports_empty_matches_without_error() {
        let data = Dataset::new(vec![rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8)]);
        let config = PipelineConfig {
            selection: Selection {
                branches: vec!["Nowhere".to_string()],
                ..Selection::default()
            },
            metrics: vec![Metric::OnTime],
            shape: ViewShape::Flat,
        };
        let run = run(&data, &config);
        assert_eq!(run.matched_rows, 0);
        match run.table {
            TableOutput::Flat(rows) => assert!(rows.is_empty()),
            TableOutput::Pivot(_) => panic!("expected flat output"),
        }
    }

    #[test]
    fn summary_counts_dated_rows_only_for_averages() {
        let data = Dataset::new(vec![
            rec("A", "X", "2024-01-01", 100.0, 0.9, 0.8),
            rec("B", "X", "2024-01-01", 50.0, 0.7, 0.6),
            rec("A", "X", "Total", 500.0, 0.85, 0.75),
        ]);
        let stats = summary(&data);
        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.total_branches, 2);
        assert_eq!(stats.total_receivable, 150.0);
        assert_eq!(stats.avg_on_time_pct, 80.0);
    }
}
