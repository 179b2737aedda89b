use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// Sentinel value in the date column marking a branch-level aggregate row.
pub const TOTAL_SENTINEL: &str = "Total";

/// A cell of the date column. The column is heterogeneous by contract:
/// every value is either a calendar date or the aggregate sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateCell {
    Day(NaiveDate),
    Total,
}

impl DateCell {
    pub fn is_total(self) -> bool {
        matches!(self, DateCell::Total)
    }
}

impl fmt::Display for DateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateCell::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateCell::Total => f.write_str(TOTAL_SENTINEL),
        }
    }
}

/// A rate stored as a fraction of 1. The unit is part of the type so that
/// formatting and chart scaling never have to guess whether a value is
/// already a percentage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Fraction(f64);

impl Fraction {
    pub fn new(v: f64) -> Self {
        Fraction(v)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn as_percent(self) -> f64 {
        self.0 * 100.0
    }

    /// Whether the value is inside the nominal [0, 1] range. Out-of-range
    /// values are kept and scaled like any other; the loader only warns.
    pub fn in_nominal_range(self) -> bool {
        (0.0..=1.0).contains(&self.0)
    }
}

/// One row of the source table, with the positional columns mapped to
/// named fields at the loader boundary.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub branch: String,
    pub sub_category: String,
    pub date: DateCell,
    pub receivable: f64,
    pub on_time: Option<Fraction>,
    pub sign_rate: Option<Fraction>,
}

/// The loaded table. Immutable after load; every interaction derives
/// views from it rather than mutating it.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<DeliveryRecord>,
}

impl Dataset {
    pub fn new(records: Vec<DeliveryRecord>) -> Self {
        Dataset { records }
    }

    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct branch names, sorted.
    pub fn branches(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.records.iter().map(|r| r.branch.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct sub-categories for one branch, sorted.
    pub fn sub_categories(&self, branch: &str) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .records
            .iter()
            .filter(|r| r.branch == branch)
            .map(|r| r.sub_category.as_str())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }
}

/// Transient per-interaction filter input. All constraints are combined
/// conjunctively; an empty field means "no constraint on this dimension".
#[derive(Debug, Clone)]
pub struct Selection {
    pub branches: Vec<String>,
    pub sub_category: Option<String>,
    pub dates: Option<BTreeSet<NaiveDate>>,
    /// Whether aggregate ("Total") rows pass the filter. The date set
    /// never applies to them; this flag alone decides.
    pub include_totals: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            branches: Vec::new(),
            sub_category: None,
            dates: None,
            include_totals: true,
        }
    }
}

impl Selection {
    pub fn matches(&self, r: &DeliveryRecord) -> bool {
        if !self.branches.is_empty() && !self.branches.iter().any(|b| *b == r.branch) {
            return false;
        }
        if let Some(sub) = &self.sub_category {
            if *sub != r.sub_category {
                return false;
            }
        }
        match r.date {
            DateCell::Total => self.include_totals,
            DateCell::Day(d) => match &self.dates {
                Some(set) => set.contains(&d),
                None => true,
            },
        }
    }
}

/// The subset of a Dataset matching one Selection. Derived per
/// interaction, never persisted.
#[derive(Debug)]
pub struct FilteredView<'a> {
    rows: Vec<&'a DeliveryRecord>,
}

impl<'a> FilteredView<'a> {
    pub fn new(rows: Vec<&'a DeliveryRecord>) -> Self {
        FilteredView { rows }
    }

    pub fn rows(&self) -> &[&'a DeliveryRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The metrics a view can be reshaped or charted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Receivable,
    OnTime,
    SignRate,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Metric::Receivable => "Receivable",
            Metric::OnTime => "On-Time Rate",
            Metric::SignRate => "Sign Rate",
        }
    }

    pub fn is_fraction(self) -> bool {
        !matches!(self, Metric::Receivable)
    }

    /// Value as handed to pivots and charts: fractions scaled to percent,
    /// amounts left as-is.
    pub fn plot_value(self, r: &DeliveryRecord) -> Option<f64> {
        match self {
            Metric::Receivable => Some(r.receivable),
            Metric::OnTime => r.on_time.map(Fraction::as_percent),
            Metric::SignRate => r.sign_rate.map(Fraction::as_percent),
        }
    }
}

/// Display form of one filtered row. Percent columns are presentation
/// strings; the numeric values stay on the `DeliveryRecord` for charts.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BranchDayRow {
    #[serde(rename = "Branch")]
    #[tabled(rename = "Branch")]
    pub branch: String,
    #[serde(rename = "SubCategory")]
    #[tabled(rename = "SubCategory")]
    pub sub_category: String,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Receivable")]
    #[tabled(rename = "Receivable")]
    pub receivable: String,
    #[serde(rename = "OnTime")]
    #[tabled(rename = "OnTime")]
    pub on_time: String,
    #[serde(rename = "SignRate")]
    #[tabled(rename = "SignRate")]
    pub sign_rate: String,
}

/// Cross-branch matrix: one row per index key, one column per branch.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub index_label: String,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub key: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Line,
    GroupedBar,
}

/// One data point handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub category: String,
    pub value: f64,
    pub series: String,
}

/// The full contract to the chart renderer: kind, axis labels and the
/// (category, value, series) triples. Rendering itself lives outside
/// this crate.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub total_branches: usize,
    pub total_sub_categories: usize,
    pub total_receivable: f64,
    pub avg_on_time_pct: f64,
    pub avg_sign_rate_pct: f64,
}
