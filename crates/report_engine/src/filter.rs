use std::collections::BTreeSet;

use models::{
    BillingRecord, Dataset, FilterCriteria, Period, PeriodRange, ServiceCodeSelector,
};
use chrono::Local;
use serde::Serialize;

/// Rows of a dataset selected by a filter. The dataset itself is never touched.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Positions of the selected rows in the underlying dataset.
    pub fn indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn iter(&self) -> ViewIter<'a, '_> {
        ViewIter {
            dataset: self.dataset,
            rows: self.rows.iter(),
        }
    }

    pub fn to_dataset(&self) -> Dataset {
        Dataset::new(self.iter().cloned().collect())
    }
}

pub struct ViewIter<'a, 'v> {
    dataset: &'a Dataset,
    rows: std::slice::Iter<'v, usize>,
}

impl<'a> Iterator for ViewIter<'a, '_> {
    type Item = &'a BillingRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().and_then(|idx| self.dataset.get(*idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<'a, 'v> IntoIterator for &'v FilteredView<'a> {
    type Item = &'a BillingRecord;
    type IntoIter = ViewIter<'a, 'v>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub fn matches(record: &BillingRecord, criteria: &FilterCriteria) -> bool {
    criteria.service.matches(&record.service_code)
        && criteria.statuses.contains(&record.status)
        && criteria.range.contains(record.period)
}

/// Applies the service, status and period predicates. An empty status set or
/// an inverted period range selects nothing.
pub fn filter<'a>(dataset: &'a Dataset, criteria: &FilterCriteria) -> FilteredView<'a> {
    let rows = if criteria.statuses.is_empty() || criteria.range.is_empty() {
        Vec::new()
    } else {
        dataset
            .iter()
            .enumerate()
            .filter(|(_, r)| matches(r, criteria))
            .map(|(idx, _)| idx)
            .collect()
    };

    FilteredView { dataset, rows }
}

/// Choices a caller can offer for each filter, taken from the loaded data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub service_codes: Vec<String>,
    pub statuses: Vec<String>,
    pub periods: Vec<Period>,
}

impl FilterOptions {
    /// Sorted distinct values of each column. `None` when the dataset is empty.
    pub fn from_dataset(dataset: &Dataset) -> Option<Self> {
        if dataset.is_empty() {
            return None;
        }

        let mut codes = BTreeSet::new();
        let mut statuses = BTreeSet::new();
        let mut periods = BTreeSet::new();
        for r in dataset {
            codes.insert(r.service_code.clone());
            statuses.insert(r.status.clone());
            periods.insert(r.period);
        }

        Some(Self {
            service_codes: codes.into_iter().collect(),
            statuses: statuses.into_iter().collect(),
            periods: periods.into_iter().collect(),
        })
    }

    pub fn full_range(&self) -> Option<PeriodRange> {
        Some(PeriodRange::new(*self.periods.first()?, *self.periods.last()?))
    }

    /// Every service, every status, every period.
    pub fn default_criteria(&self) -> Option<FilterCriteria> {
        Some(FilterCriteria::new(
            ServiceCodeSelector::All,
            self.statuses.iter().cloned(),
            self.full_range()?,
        ))
    }
}

/// Filter choices as a caller states them. Anything left out defaults to the
/// full extent of the loaded data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRequest {
    pub service: ServiceCodeSelector,
    pub statuses: Vec<String>,
    pub from: Option<Period>,
    pub to: Option<Period>,
}

impl ReportRequest {
    /// Range handed to sources that filter periods themselves. Only a fully
    /// bounded request is pushed down.
    pub fn pushdown_range(&self) -> Option<PeriodRange> {
        Some(PeriodRange::new(self.from?, self.to?))
    }

    /// Concrete criteria against the loaded data. With no data and no bounds
    /// the range collapses to the current month, which selects nothing.
    pub fn resolve(&self, options: Option<&FilterOptions>) -> FilterCriteria {
        let statuses = match options {
            Some(o) if self.statuses.is_empty() => o.statuses.clone(),
            _ => self.statuses.clone(),
        };

        let full = options.and_then(FilterOptions::full_range);
        let start = self.from.or(full.map(|r| r.start)).or(self.to);
        let end = self.to.or(full.map(|r| r.end)).or(self.from);
        let range = match (start, end) {
            (Some(start), Some(end)) => PeriodRange::new(start, end),
            _ => {
                let now = Period::from_date(Local::now().date_naive());
                PeriodRange::new(now, now)
            }
        };

        FilterCriteria::new(self.service.clone(), statuses, range)
    }
}
