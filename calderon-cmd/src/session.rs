//! View-local state: the last applied payload of a view, guarded against
//! out-of-order responses, plus the selection each view is driven by.

use calderon_api::sequence::{RequestSequencer, RequestTicket};
use log::{debug, warn};
use std::fmt::Display;

/// What `complete` did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A newer request was issued; the result was discarded.
    Stale,
    /// The request failed; previously applied data is kept.
    Failed(String),
}

/// Data of one view and the request that produced it.
#[derive(Debug)]
pub struct ViewSession<T> {
    sequencer: RequestSequencer,
    data: Option<T>,
    error: Option<String>,
    loading: bool,
}

impl<T> Default for ViewSession<T> {
    fn default() -> Self {
        ViewSession {
            sequencer: RequestSequencer::new(),
            data: None,
            error: None,
            loading: false,
        }
    }
}

impl<T> ViewSession<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request. Any request begun earlier becomes stale.
    pub fn begin(&mut self) -> RequestTicket {
        self.loading = true;
        self.sequencer.issue()
    }

    pub fn complete<E: Display>(&mut self, ticket: RequestTicket, result: Result<T, E>) -> Outcome {
        if !self.sequencer.is_current(ticket) {
            debug!("discarding response for superseded request {}", ticket.id());
            return Outcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                Outcome::Applied
            }
            Err(e) => {
                let message = e.to_string();
                warn!("request {} failed: {message}", ticket.id());
                self.error = Some(message.clone());
                Outcome::Failed(message)
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Monthly view: file, then year, then optional month and day, then page.
/// Changing a coarser choice resets the finer ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySelection {
    pub directory: String,
    pub file: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub page: usize,
}

impl MonthlySelection {
    pub fn new(directory: impl Into<String>) -> Self {
        MonthlySelection {
            directory: directory.into(),
            file: None,
            year: None,
            month: None,
            day: None,
            page: 1,
        }
    }

    pub fn select_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
        self.year = None;
        self.month = None;
        self.day = None;
        self.page = 1;
    }

    pub fn select_year(&mut self, year: Option<i32>) {
        self.year = year;
        self.month = None;
        self.day = None;
        self.page = 1;
    }

    pub fn select_month(&mut self, month: Option<u32>) {
        self.month = month;
        self.day = None;
        self.page = 1;
    }

    pub fn select_day(&mut self, day: Option<u32>) {
        self.day = day;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }
}

/// Comparison view: file and the station pair shown in the scatter plot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComparisonSelection {
    pub file: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl ComparisonSelection {
    pub fn select_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
        self.x = None;
        self.y = None;
    }

    /// Fill an unset side of the pair from the first stations not already
    /// chosen.
    pub fn default_pair<S: AsRef<str>>(&mut self, ids: &[S]) {
        let mut unused = ids.iter().map(AsRef::as_ref).filter(|id| {
            self.x.as_deref() != Some(*id) && self.y.as_deref() != Some(*id)
        });
        let first = unused.next().map(str::to_string);
        let second = unused.next().map(str::to_string);
        match (self.x.is_none(), self.y.is_none()) {
            (true, true) => {
                self.x = first;
                self.y = second;
            }
            (true, false) => self.x = first,
            (false, true) => self.y = first,
            (false, false) => {}
        }
    }
}

/// Multiannual view: file and the year compared against the normals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiannualSelection {
    pub file: Option<String>,
    pub year: Option<i32>,
}

impl MultiannualSelection {
    pub fn select_file(&mut self, file: impl Into<String>) {
        self.file = Some(file.into());
        self.year = None;
    }

    /// Keep the chosen year, or fall back to the sheet's last year row.
    pub fn default_year(&mut self, years: &[i32]) {
        if self.year.is_none() {
            self.year = years.last().copied();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut session: ViewSession<Vec<u32>> = ViewSession::new();
        let first = session.begin();
        assert!(session.is_loading());
        assert_eq!(session.complete::<String>(first, Ok(vec![1, 2])), Outcome::Applied);
        assert!(!session.is_loading());

        let second = session.begin();
        let outcome = session.complete(second, Err("HTTP 500: Internal Server Error"));
        assert_eq!(outcome, Outcome::Failed("HTTP 500: Internal Server Error".to_string()));
        assert_eq!(session.data(), Some(&vec![1, 2]));
        assert_eq!(session.error(), Some("HTTP 500: Internal Server Error"));

        let third = session.begin();
        session.complete::<String>(third, Ok(vec![3]));
        assert_eq!(session.error(), None);
        assert_eq!(session.into_data(), Some(vec![3]));
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut session: ViewSession<&str> = ViewSession::new();
        let old = session.begin();
        let new = session.begin();
        assert_eq!(session.complete::<String>(new, Ok("new")), Outcome::Applied);
        assert_eq!(session.complete::<String>(old, Ok("old")), Outcome::Stale);
        assert_eq!(session.data(), Some(&"new"));
        // a stale failure does not clobber anything either
        assert_eq!(session.complete(old, Err("boom")), Outcome::Stale);
        assert_eq!(session.error(), None);
    }

    #[tokio::test]
    async fn test_out_of_order_completion() {
        let mut session: ViewSession<String> = ViewSession::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        // the first filter change answers last
        for (file, delay_ms) in [("a.csv", 50u64), ("b.csv", 25), ("c.csv", 5)] {
            let ticket = session.begin();
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                let _ = tx.send((ticket, file.to_string()));
            });
        }
        drop(tx);
        let mut outcomes = Vec::new();
        while let Some((ticket, file)) = rx.recv().await {
            outcomes.push(session.complete::<String>(ticket, Ok(file)));
        }
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| **o == Outcome::Applied).count(), 1);
        assert_eq!(session.data().map(String::as_str), Some("c.csv"));
    }

    #[test]
    fn test_monthly_selection_resets_finer_choices() {
        let mut selection = MonthlySelection::new("data");
        selection.select_file("lluvia.csv");
        selection.select_year(Some(2020));
        selection.select_month(Some(3));
        selection.select_day(Some(9));
        selection.set_page(4);
        selection.select_month(Some(4));
        assert_eq!(selection.day, None);
        assert_eq!(selection.page, 1);
        selection.select_day(Some(2));
        selection.select_file("otra.csv");
        assert_eq!(selection.year, None);
        assert_eq!(selection.month, None);
        selection.set_page(0);
        assert_eq!(selection.page, 1);
    }

    #[test]
    fn test_comparison_default_pair() {
        let ids = ["M1094", "M0024", "M0003"];
        let mut selection = ComparisonSelection::default();
        selection.default_pair(&ids);
        assert_eq!(selection.x.as_deref(), Some("M1094"));
        assert_eq!(selection.y.as_deref(), Some("M0024"));

        let mut selection = ComparisonSelection {
            x: Some("M1094".to_string()),
            ..Default::default()
        };
        selection.default_pair(&ids);
        assert_eq!(selection.y.as_deref(), Some("M0024"));

        selection.select_file("data3.csv");
        assert_eq!(selection.x, None);
    }

    #[test]
    fn test_multiannual_default_year() {
        let mut selection = MultiannualSelection::default();
        selection.select_file("precip.xlsx");
        selection.default_year(&[1998, 2021, 2005]);
        assert_eq!(selection.year, Some(2005));
        selection.default_year(&[2030]);
        assert_eq!(selection.year, Some(2005));

        let mut empty = MultiannualSelection::default();
        empty.default_year(&[]);
        assert_eq!(empty.year, None);
    }
}
