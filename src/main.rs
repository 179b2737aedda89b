// Entry point and menu flow.
//
// Each menu action is one stateless run of load → filter → reshape →
// present over the dataset held in memory for the session. Chart specs
// are handed to the renderer as JSON files; this binary never draws.
mod error;
mod filter;
mod loader;
mod logging;
mod output;
mod reshape;
mod types;
mod util;

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use once_cell::sync::Lazy;

use reshape::{PipelineConfig, TableOutput, ViewShape};
use types::{Dataset, Metric, Selection};

const DEFAULT_DATA_FILE: &str = "branch_performance.csv";

// In-memory session state: the dataset is loaded once and every
// interaction derives from it.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        data: None,
        last_selection: None,
    })
});

struct AppState {
    data: Option<Dataset>,
    last_selection: Option<Selection>,
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn prompt_yes_no(prompt: &str) -> bool {
    loop {
        match read_line(prompt).to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn current_data() -> Option<Dataset> {
    APP_STATE.lock().unwrap().data.clone()
}

/// Handle option [1]: load the data file into session state.
///
/// Load failure is recoverable by contract: warn and continue with an
/// empty dataset rather than aborting the session.
fn handle_load() {
    let input = read_line(&format!("Data file (.csv/.xlsx) [{}]: ", DEFAULT_DATA_FILE));
    let path = if input.is_empty() {
        DEFAULT_DATA_FILE.to_string()
    } else {
        input
    };
    match loader::load_dataset(Path::new(&path)) {
        Ok((data, report)) => {
            println!(
                "Processing dataset... ({} rows read, {} loaded)",
                util::format_int(report.total_rows as i64),
                util::format_int(report.loaded_rows as i64)
            );
            if report.skipped_rows > 0 {
                println!(
                    "Note: {} rows skipped due to parse/validation errors.",
                    util::format_int(report.skipped_rows as i64)
                );
            }
            if report.total_sentinel_rows > 0 {
                println!(
                    "Info: {} aggregate (Total) rows present.",
                    util::format_int(report.total_sentinel_rows as i64)
                );
            }
            if report.out_of_range_fractions > 0 {
                println!(
                    "Warning: {} rate cells outside [0,1] kept as-is.",
                    util::format_int(report.out_of_range_fractions as i64)
                );
            }
            println!("");
            let mut state = APP_STATE.lock().unwrap();
            state.data = Some(data);
            state.last_selection = None;
        }
        Err(e) => {
            println!("Warning: {}. Continuing with no data.\n", e);
            let mut state = APP_STATE.lock().unwrap();
            state.data = Some(Dataset::default());
            state.last_selection = None;
        }
    }
}

/// Handle option [2]: filter by branch / sub-category / date and show
/// the flat view with per-metric line chart specs.
fn handle_branch_view() {
    let Some(data) = current_data() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    if data.is_empty() {
        println!("Info: the dataset is empty.\n");
        return;
    }

    println!("Branches: {}", data.branches().join(", "));
    let branch = read_line("Branch (blank = all): ");
    if !branch.is_empty() {
        let subs = data.sub_categories(&branch);
        if !subs.is_empty() {
            println!("Sub-categories: {}", subs.join(", "));
        }
    }
    let sub = read_line("Sub-category (blank = all): ");
    let date_input = read_line("Date YYYY-MM-DD (blank = all): ");
    let dates = if date_input.is_empty() {
        None
    } else {
        match NaiveDate::parse_from_str(&date_input, "%Y-%m-%d") {
            Ok(d) => Some(BTreeSet::from([d])),
            Err(_) => {
                println!("Info: '{}' is not a date, ignoring the date filter.", date_input);
                None
            }
        }
    };

    let selection = Selection {
        branches: if branch.is_empty() { Vec::new() } else { vec![branch] },
        sub_category: if sub.is_empty() { None } else { Some(sub) },
        include_totals: dates.is_none(),
        dates,
    };
    let config = PipelineConfig {
        selection: selection.clone(),
        metrics: vec![Metric::Receivable, Metric::OnTime, Metric::SignRate],
        shape: ViewShape::Flat,
    };
    let run = reshape::run(&data, &config);
    if run.matched_rows == 0 {
        println!("Info: no rows match the current selection.\n");
    } else {
        if let TableOutput::Flat(rows) = &run.table {
            output::preview_table_rows(rows, 10);
        }
        match output::write_json("branch_view_charts.json", &run.charts) {
            Ok(()) => println!(
                "({} rows matched; chart specs written to branch_view_charts.json)\n",
                util::format_int(run.matched_rows as i64)
            ),
            Err(e) => println!("Warning: {}\n", e),
        }
    }
    APP_STATE.lock().unwrap().last_selection = Some(selection);
}

/// Handle option [3]: pivot one metric across two branches and emit
/// bar/line chart specs for the comparison.
fn handle_compare() {
    let Some(data) = current_data() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    if data.is_empty() {
        println!("Info: the dataset is empty.\n");
        return;
    }

    println!("Branches: {}", data.branches().join(", "));
    let first = read_line("First branch: ");
    let second = read_line("Second branch: ");
    if first.is_empty() || second.is_empty() || first == second {
        println!("Info: please name two different branches.\n");
        return;
    }
    println!("Metric: [1] On-Time Rate  [2] Sign Rate  [3] Receivable  [4] Both rates");
    let metrics = match read_line("Enter choice: ").as_str() {
        "1" => vec![Metric::OnTime],
        "2" => vec![Metric::SignRate],
        "3" => vec![Metric::Receivable],
        "4" => vec![Metric::OnTime, Metric::SignRate],
        _ => {
            println!("Invalid choice. Please enter 1-4.\n");
            return;
        }
    };
    let by_date = prompt_yes_no("Break the comparison out by date (Y/N): ");

    let selection = Selection {
        branches: vec![first, second],
        include_totals: false,
        ..Selection::default()
    };
    let mut all_charts = Vec::new();
    for metric in &metrics {
        let config = PipelineConfig {
            selection: selection.clone(),
            metrics: vec![*metric],
            shape: ViewShape::Pivot {
                metric: *metric,
                date_in_index: by_date,
            },
        };
        let run = reshape::run(&data, &config);
        if run.matched_rows == 0 {
            println!("Info: no rows for the chosen branches.\n");
            return;
        }
        println!("{} by branch:", metric.label());
        if let TableOutput::Pivot(table) = &run.table {
            output::preview_pivot(table, 10);
        }
        all_charts.extend(run.charts);
    }
    match output::write_json("comparison_charts.json", &all_charts) {
        Ok(()) => println!("(chart specs written to comparison_charts.json)\n"),
        Err(e) => println!("Warning: {}\n", e),
    }
    APP_STATE.lock().unwrap().last_selection = Some(selection);
}

/// Handle option [4]: show the branch-level aggregate rows and write
/// the dataset summary stats.
fn handle_totals() {
    let Some(data) = current_data() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let view = filter::total_rows(&data);
    if view.is_empty() {
        println!("Info: no aggregate (Total) rows in this dataset.\n");
        return;
    }
    println!("Branch aggregate (Total) rows:\n");
    let rows = reshape::view_rows(&view);
    output::preview_table_rows(&rows, 10);
    match output::write_json("summary.json", &reshape::summary(&data)) {
        Ok(()) => println!("Summary stats written to summary.json\n"),
        Err(e) => println!("Warning: {}\n", e),
    }
}

/// Handle option [5]: export the last filtered view as CSV, generated
/// in memory and saved only on request.
fn handle_export() {
    let Some(data) = current_data() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let selection = APP_STATE
        .lock()
        .unwrap()
        .last_selection
        .clone()
        .unwrap_or_default();
    let view = filter::filter(&data, &selection);
    if view.is_empty() {
        println!("Info: the current selection matches no rows; nothing to export.\n");
        return;
    }
    let rows = reshape::view_rows(&view);
    match output::export_csv_bytes(&rows) {
        Ok(bytes) => {
            println!(
                "Export generated in-memory ({} bytes, {} rows).",
                util::format_int(bytes.len() as i64),
                util::format_int(rows.len() as i64)
            );
            if prompt_yes_no("Save to filtered_view.csv (Y/N): ") {
                match std::fs::write("filtered_view.csv", &bytes) {
                    Ok(()) => println!("Saved filtered_view.csv\n"),
                    Err(e) => println!("Warning: write failed: {}\n", e),
                }
            } else {
                println!("");
            }
        }
        Err(e) => println!("Warning: {}\n", e),
    }
}

fn main() {
    logging::init();
    loop {
        println!("Branch Delivery Performance Reports");
        println!("[1] Load data file");
        println!("[2] Branch view");
        println!("[3] Compare two branches");
        println!("[4] Branch totals");
        println!("[5] Export filtered view");
        println!("[0] Exit\n");
        match read_line("Enter choice: ").as_str() {
            "1" => handle_load(),
            "2" => handle_branch_view(),
            "3" => handle_compare(),
            "4" => handle_totals(),
            "5" => handle_export(),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-5.\n"),
        }
    }
}
