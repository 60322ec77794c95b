use derive_setters::Setters;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::{debug, trace};

use crate::record::{Record, Value};

pub const DEFAULT_PAGE_SIZE: usize = 30;
pub const DEFAULT_FIELD: &str = "Name";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

/// Settings fixed when a [`ListView`] is created.
#[derive(Debug, Clone, Setters)]
pub struct ListViewConfig {
    pub page_size: usize,
    /// Field matched against the search term.
    #[setters(into)]
    pub search_field: String,
    /// Initial sort field.
    #[setters(into)]
    pub sort_field: String,
    pub sort_direction: SortDirection,
}

impl Default for ListViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_field: DEFAULT_FIELD.to_string(),
            sort_field: DEFAULT_FIELD.to_string(),
            sort_direction: SortDirection::Ascending,
        }
    }
}

// Empty values first, then numbers, then text. Numbers use f64::total_cmp so
// NaN has a fixed place after every other number.
enum SortKey {
    Empty,
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(record: &Record, field: &str) -> Self {
        match record.resolve(field) {
            Some(Value::Number(n)) => SortKey::Number(*n),
            Some(v) => {
                let text = v.to_string().to_lowercase();
                if text.is_empty() {
                    SortKey::Empty
                } else {
                    SortKey::Text(text)
                }
            }
            None => SortKey::Empty,
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Empty, SortKey::Empty) => Ordering::Equal,
            (SortKey::Empty, _) => Ordering::Less,
            (_, SortKey::Empty) => Ordering::Greater,
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        }
    }
}

/// Filter, sort and paginate pipeline over an in-memory record set.
///
/// Search term, sort field, direction and the current page are kept across
/// calls. Every mutation recomputes the filtered and sorted row mapping from
/// the source records, so ties always keep their source order.
pub struct ListView {
    page_size: usize,
    search_field: String,
    records: Vec<Record>,
    rows: Vec<usize>, // Indices into records, filtered and sorted
    search_term: String,
    sort_field: String,
    sort_direction: SortDirection,
    current_page: usize,
}

impl ListView {
    pub fn new(config: ListViewConfig) -> Self {
        ListView {
            page_size: config.page_size.max(1),
            search_field: config.search_field,
            records: Vec::new(),
            rows: Vec::new(),
            search_term: String::new(),
            sort_field: config.sort_field,
            sort_direction: config.sort_direction,
            current_page: 1,
        }
    }

    /// Replaces all records. Search, sort and page are kept; the page is clamped.
    pub fn set_records(&mut self, records: Vec<Record>) {
        debug!("Set {} records", records.len());
        self.records = records;
        self.materialize();
    }

    /// Sets the (lower-cased) search term and jumps back to the first page.
    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_lowercase();
        self.current_page = 1;
        self.materialize();
    }

    /// Sorts by `field`. Repeating the current field without a direction
    /// toggles the direction; a new field starts ascending.
    pub fn set_sort(&mut self, field: &str, direction: Option<SortDirection>) {
        self.sort_direction = match direction {
            Some(d) => d,
            None if field == self.sort_field => self.sort_direction.toggled(),
            None => SortDirection::Ascending,
        };
        self.sort_field = field.to_string();
        self.materialize();
    }

    pub fn next_page(&mut self) {
        if self.current_page < self.total_pages() {
            self.current_page += 1;
        }
    }

    pub fn previous_page(&mut self) {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.total_pages());
    }

    pub fn current_page_records(&self) -> Vec<&Record> {
        self.current_page_indices()
            .iter()
            .map(|&idx| &self.records[idx])
            .collect()
    }

    /// Indices into [`ListView::records`] of the rows on the current page.
    pub fn current_page_indices(&self) -> &[usize] {
        let begin = std::cmp::min((self.current_page - 1) * self.page_size, self.rows.len());
        let end = std::cmp::min(begin + self.page_size, self.rows.len());
        &self.rows[begin..end]
    }

    pub fn total_filtered_count(&self) -> usize {
        self.rows.len()
    }

    pub fn total_pages(&self) -> usize {
        std::cmp::max(1, self.rows.len().div_ceil(self.page_size))
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_pagination(&self) -> bool {
        self.rows.len() > self.page_size
    }

    /// Direction to render next to `field`, if it is the active sort field.
    pub fn sort_indicator(&self, field: &str) -> Option<SortDirection> {
        (self.sort_field == field).then_some(self.sort_direction)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn search_field(&self) -> &str {
        &self.search_field
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    fn materialize(&mut self) {
        let start_time = Instant::now();

        let term = self.search_term.as_str();
        let field = self.search_field.as_str();
        let filtered: Vec<usize> = self
            .records
            .par_iter()
            .enumerate()
            .filter(|(_, r)| term.is_empty() || r.text(field).to_lowercase().contains(term))
            .map(|(idx, _)| idx)
            .collect();

        let sort_field = self.sort_field.as_str();
        let mut keyed: Vec<(usize, SortKey)> = filtered
            .into_par_iter()
            .map(|idx| (idx, SortKey::of(&self.records[idx], sort_field)))
            .collect();

        // slice::sort_by is stable; reversing the result keeps ties in source order.
        let direction = self.sort_direction;
        keyed.sort_by(|(_, a), (_, b)| match direction {
            SortDirection::Ascending => a.compare(b),
            SortDirection::Descending => a.compare(b).reverse(),
        });
        self.rows = keyed.into_iter().map(|(idx, _)| idx).collect();

        let total_pages = self.total_pages();
        if self.current_page > total_pages {
            trace!("Clamping page {} to {}", self.current_page, total_pages);
        }
        self.current_page = self.current_page.clamp(1, total_pages);

        trace!(
            "Materialized {}/{} rows (term: {:?}, sort: {} {:?}) in {}ms",
            self.rows.len(),
            self.records.len(),
            self.search_term,
            self.sort_field,
            self.sort_direction,
            start_time.elapsed().as_millis()
        );
    }
}

impl Default for ListView {
    fn default() -> Self {
        ListView::new(ListViewConfig::default())
    }
}
