use crate::types::{Dataset, FilteredView, Selection};

/// Narrow a dataset to the rows matching every constraint of the
/// selection. Zero matches is a valid result, not an error; the caller
/// shows an informational message.
pub fn filter<'a>(dataset: &'a Dataset, selection: &Selection) -> FilteredView<'a> {
    FilteredView::new(
        dataset
            .records()
            .iter()
            .filter(|r| selection.matches(r))
            .collect(),
    )
}

/// The branch-level aggregate rows (date column equal to the "Total"
/// sentinel), independent of any date filter.
pub fn total_rows(dataset: &Dataset) -> FilteredView<'_> {
    FilteredView::new(
        dataset
            .records()
            .iter()
            .filter(|r| r.date.is_total())
            .collect(),
    )
}
