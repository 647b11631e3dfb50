//! Filtering and paging of the daily detail table.

use calderon_api::observation::DailyRecord;
use calderon_api::payload::YearlyRecords;
use chrono::Datelike;
use serde::Serialize;

pub const ITEMS_PER_PAGE: usize = 20;

/// Records of one year matching the optional month and day.
///
/// With no month or day every record is kept. Once either is set, records
/// whose date cannot be parsed never match.
pub fn filter_records<'a>(
    records: &'a YearlyRecords,
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
) -> Vec<&'a DailyRecord> {
    records
        .records(year)
        .iter()
        .filter(|record| {
            if month.is_none() && day.is_none() {
                return true;
            }
            let Some(date) = record.date() else {
                return false;
            };
            month.map_or(true, |m| date.month() == m) && day.map_or(true, |d| date.day() == d)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// 1-based page number actually served.
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items: Vec<T>,
}

/// Slice out one page. `requested` is clamped to `[1, total_pages]`; an empty
/// input yields page 1 of 0 with no items.
pub fn paginate<T: Clone>(items: &[T], requested: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page);
    let number = requested.clamp(1, total_pages.max(1));
    let start = ((number - 1) * per_page).min(items.len());
    let end = (start + per_page).min(items.len());
    Page {
        number,
        total_pages,
        total_items: items.len(),
        items: items[start..end].to_vec(),
    }
}
