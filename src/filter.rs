use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use tracing::trace;

use crate::column::ColumnDescriptor;
use crate::domain::AdminError;
use crate::record::Record;
use crate::resource::ResourceSchema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DateFilter {
    On(NaiveDate),
    Month { year: i32, month: u32 },
    Before(NaiveDate),
    After(NaiveDate),
}

impl DateFilter {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            DateFilter::On(day) => date == day,
            DateFilter::Month { year, month } => date.year() == year && date.month() == month,
            DateFilter::Before(day) => date < day,
            DateFilter::After(day) => date > day,
        }
    }
}

impl FromStr for DateFilter {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AdminError::Validation(format!("'{s}' is not a date filter"));
        if let Some(rest) = s.strip_prefix('<') {
            return parse_day(rest.trim()).map(DateFilter::Before).ok_or_else(invalid);
        }
        if let Some(rest) = s.strip_prefix('>') {
            return parse_day(rest.trim()).map(DateFilter::After).ok_or_else(invalid);
        }
        if let Some(day) = parse_day(s) {
            return Ok(DateFilter::On(day));
        }
        let first = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").map_err(|_| invalid())?;
        Ok(DateFilter::Month {
            year: first.year(),
            month: first.month(),
        })
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFilter::On(day) => write!(f, "{day}"),
            DateFilter::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            DateFilter::Before(day) => write!(f, "<{day}"),
            DateFilter::After(day) => write!(f, ">{day}"),
        }
    }
}

/// Parse the day part of a stored date. Timestamps are cut to their date.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Search text plus the discrete filters. `None` means no constraint.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterState {
    pub search: String,
    pub status: Option<String>,
    pub category: Option<String>,
    pub date: Option<DateFilter>,
    pub location: Option<String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty()
            && self.status.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.location.is_none()
    }

    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    /// Short summary for the status line, e.g. `status=draft /easter`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(s) = &self.status {
            parts.push(format!("status={s}"));
        }
        if let Some(c) = &self.category {
            parts.push(format!("type={c}"));
        }
        if let Some(d) = &self.date {
            parts.push(format!("date={d}"));
        }
        if let Some(l) = &self.location {
            parts.push(format!("location={l}"));
        }
        if !self.search.trim().is_empty() {
            parts.push(format!("/{}", self.search.trim()));
        }
        parts.join(" ")
    }

    pub fn matches(&self, record: &Record, schema: &ResourceSchema) -> bool {
        let term = self.search.trim().to_lowercase();
        if !term.is_empty()
            && !schema
                .searchable
                .iter()
                .any(|field| record.text(field).to_lowercase().contains(&term))
        {
            return false;
        }
        if !field_equals(record, schema.status_field, self.status.as_deref()) {
            return false;
        }
        if !field_equals(record, schema.category_field, self.category.as_deref()) {
            return false;
        }
        if !field_equals(record, schema.location_field, self.location.as_deref()) {
            return false;
        }
        match (schema.date_field, &self.date) {
            (Some(field), Some(filter)) => parse_day(&record.text(field))
                .map(|d| filter.matches(d))
                .unwrap_or(false),
            _ => true,
        }
    }
}

fn field_equals(record: &Record, field: Option<&str>, wanted: Option<&str>) -> bool {
    match (field, wanted) {
        (Some(field), Some(wanted)) => record.text(field).eq_ignore_ascii_case(wanted),
        _ => true,
    }
}

/// Indices of the records passing `filter`, in collection order.
pub fn apply_filters(records: &[Record], schema: &ResourceSchema, filter: &FilterState) -> Vec<usize> {
    if filter.is_empty() {
        return (0..records.len()).collect();
    }
    let rows: Vec<usize> = records
        .par_iter()
        .enumerate()
        .filter(|(_, r)| filter.matches(r, schema))
        .map(|(idx, _)| idx)
        .collect();
    trace!(
        "Filter {:?} kept {} of {} records",
        filter.describe(),
        rows.len(),
        records.len()
    );
    rows
}

/// Reorder `rows` by the plain rendering of `column`.
///
/// Numbers compare numerically and come before anything that does not parse.
pub fn sort_rows(records: &[Record], rows: &mut [usize], column: &ColumnDescriptor, ascending: bool) {
    let keys: HashMap<usize, (Option<f64>, String)> = rows
        .iter()
        .map(|&idx| {
            let text = column.render(&records[idx]).plain();
            (idx, (finite_number(&text), text.to_lowercase()))
        })
        .collect();
    rows.sort_by(|a, b| {
        let (a, b) = (&keys[a], &keys[b]);
        let ordering = match (a.0, b.0) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => a.1.cmp(&b.1),
        };
        if ascending { ordering } else { ordering.reverse() }
    });
}

/// "NaN", "inf" and overflowing literals are text, not numbers.
fn finite_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

pub fn page_count(len: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 1;
    }
    len.div_ceil(per_page).max(1)
}

/// Row range of `page` (zero based), clamped to the data.
pub fn paginate(len: usize, page: usize, per_page: usize) -> Range<usize> {
    if per_page == 0 {
        return 0..len;
    }
    let page = page.min(page_count(len, per_page) - 1);
    let start = (page * per_page).min(len);
    start..(start + per_page).min(len)
}

/// Values of `field` among `rows`, most frequent first.
pub fn distinct_values(records: &[Record], rows: &[usize], field: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for &idx in rows {
        let value = records[idx].text(field);
        if !value.is_empty() {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<(usize, String)> = counts.into_iter().map(|(k, v)| (v, k)).collect();
    sorted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    sorted.into_iter().map(|(_, v)| v).collect()
}

/// Step a dropdown-style filter through `options`, wrapping back to `None`.
pub fn cycle_option(current: Option<&str>, options: &[String]) -> Option<String> {
    match current {
        None => options.first().cloned(),
        Some(value) => {
            let pos = options.iter().position(|o| o.eq_ignore_ascii_case(value));
            match pos {
                Some(p) if p + 1 < options.len() => Some(options[p + 1].clone()),
                _ => None,
            }
        }
    }
}

/// Sum of a numeric field over `rows`; values that do not parse count as zero.
pub fn total(records: &[Record], rows: &[usize], field: &str) -> f64 {
    rows.iter()
        .filter_map(|&idx| {
            let value = records[idx].get(field)?;
            value.as_f64().or_else(|| finite_number(value.as_str()?))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn articles() -> Vec<Record> {
        vec![
            Record::new("1")
                .with("title", "Easter Sunday")
                .with("author", "Grace")
                .with("category", "news")
                .with("status", "draft")
                .with("date", "2024-03-31"),
            Record::new("2")
                .with("title", "Youth camp")
                .with("author", "Peter")
                .with("category", "events")
                .with("status", "published")
                .with("date", "2024-06-10T09:00:00Z"),
            Record::new("3")
                .with("title", "Harvest")
                .with("author", "easton")
                .with("category", "news")
                .with("status", "published")
                .with("date", "not a date"),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let records = articles();
        let rows = apply_filters(&records, Resource::Articles.schema(), &FilterState::default());
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let records = articles();
        let filter = FilterState {
            search: "EAST".into(),
            ..Default::default()
        };
        // "Easter" in title and "easton" in author
        assert_eq!(apply_filters(&records, Resource::Articles.schema(), &filter), vec![0, 2]);
    }

    #[test]
    fn search_ignores_non_searchable_fields() {
        let records = articles();
        let filter = FilterState {
            search: "2024".into(),
            ..Default::default()
        };
        assert!(apply_filters(&records, Resource::Articles.schema(), &filter).is_empty());
    }

    #[test]
    fn discrete_filters_are_and_combined() {
        let records = articles();
        let filter = FilterState {
            status: Some("Published".into()),
            category: Some("news".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, Resource::Articles.schema(), &filter), vec![2]);
    }

    #[test]
    fn unbound_filters_are_ignored() {
        let records = articles();
        // Articles have no location binding.
        let filter = FilterState {
            location: Some("Lagos".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, Resource::Articles.schema(), &filter).len(), 3);
    }

    #[test]
    fn date_filters() {
        let records = articles();
        let schema = Resource::Articles.schema();
        let month = FilterState {
            date: Some("2024-06".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, schema, &month), vec![1]);

        let before = FilterState {
            date: Some("<2024-04-01".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, schema, &before), vec![0]);

        let on = FilterState {
            date: Some("2024-03-31".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, schema, &on), vec![0]);
        assert!("31/03/2024".parse::<DateFilter>().is_err());
    }

    #[test]
    fn date_filter_display_round_trips() {
        for s in ["2024-03-31", "2024-06", "<2024-01-01", ">2023-12-24"] {
            let filter: DateFilter = s.parse().unwrap();
            assert_eq!(filter.to_string(), s);
        }
    }

    #[test]
    fn sort_puts_numbers_first() {
        let records = vec![
            Record::new("a").with("stock", "n/a"),
            Record::new("b").with("stock", 10),
            Record::new("c").with("stock", 9),
        ];
        let column = ColumnDescriptor::field("Stock", "stock");
        let mut rows = vec![0, 1, 2];
        sort_rows(&records, &mut rows, &column, true);
        assert_eq!(rows, vec![2, 1, 0]);
        sort_rows(&records, &mut rows, &column, false);
        assert_eq!(rows, vec![1, 2, 0]);
    }

    #[test]
    fn sort_treats_nan_and_infinity_as_text() {
        let records: Vec<Record> = (0..200)
            .map(|i| {
                let stock = match i % 3 {
                    0 => "NaN".to_string(),
                    _ => ((i * 37) % 101).to_string(),
                };
                Record::new(i.to_string()).with("stock", stock)
            })
            .chain([Record::new("inf").with("stock", "Infinity")])
            .collect();
        let column = ColumnDescriptor::field("Stock", "stock");
        let mut rows: Vec<usize> = (0..records.len()).collect();
        sort_rows(&records, &mut rows, &column, true);

        let values: Vec<String> = rows.iter().map(|&i| records[i].text("stock")).collect();
        let numbers: Vec<f64> = values.iter().map_while(|v| finite_number(v)).collect();
        assert_eq!(numbers.len(), 133);
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        assert!(values[133..].iter().all(|v| finite_number(v).is_none()));
        assert_eq!(values.last().map(String::as_str), Some("NaN"));
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(paginate(25, 0, 10), 0..10);
        assert_eq!(paginate(25, 2, 10), 20..25);
        assert_eq!(paginate(25, 9, 10), 20..25);
        assert_eq!(paginate(0, 0, 10), 0..0);
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(21, 10), 3);
    }

    #[test]
    fn distinct_values_by_frequency() {
        let records = articles();
        assert_eq!(
            distinct_values(&records, &[0, 1, 2], "status"),
            vec!["published".to_string(), "draft".to_string()]
        );
    }

    #[test]
    fn cycling_returns_to_no_constraint() {
        let options = vec!["draft".to_string(), "published".to_string()];
        let first = cycle_option(None, &options);
        assert_eq!(first.as_deref(), Some("draft"));
        let second = cycle_option(first.as_deref(), &options);
        assert_eq!(second.as_deref(), Some("published"));
        assert_eq!(cycle_option(second.as_deref(), &options), None);
    }

    #[test]
    fn totals_skip_unparseable_values() {
        let records = vec![
            Record::new("1").with("amount", 10.5),
            Record::new("2").with("amount", "4.5"),
            Record::new("3").with("amount", "n/a"),
        ];
        assert_eq!(total(&records, &[0, 1, 2], "amount"), 15.0);
        assert_eq!(total(&records, &[1], "amount"), 4.5);
    }
}
