//! Search, pagination and totals for the admin list. Everything here is a pure function of a mirror snapshot.

use std::ops::Range;

use crate::model::RsvpRecord;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Case-insensitive substring match against the name or the affiliation. A blank term matches everything.
/// Otherwise the term is used as typed, surrounding whitespace included.
pub fn matches(record: &RsvpRecord, term: &str) -> bool {
    if term.trim().is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    record.name.to_lowercase().contains(&needle)
        || record.affiliation.to_lowercase().contains(&needle)
}

pub fn search<'a>(records: &'a [RsvpRecord], term: &str) -> Vec<&'a RsvpRecord> {
    records
        .iter()
        .filter(|record| matches(record, term))
        .collect()
}

/// Always over the full, unfiltered mirror.
pub fn total_guests(records: &[RsvpRecord]) -> u64 {
    records.iter().map(|record| u64::from(record.guests)).sum()
}

/// Oldest first. Records without a submission time go before everything else, in their existing order.
pub fn sort_by_submitted_at(records: &mut [RsvpRecord]) {
    records.sort_by_key(|record| record.submitted_at);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, count: usize) -> usize {
        count.div_ceil(self.page_size)
    }

    /// Pages are 1-indexed. Page 0 and pages past the end are empty.
    pub fn range(&self, page: usize, count: usize) -> Range<usize> {
        if page == 0 {
            return 0..0;
        }
        let start = (page - 1).saturating_mul(self.page_size).min(count);
        let end = start.saturating_add(self.page_size).min(count);
        start..end
    }

    pub fn page<'a, T>(&self, items: &'a [T], page: usize) -> &'a [T] {
        &items[self.range(page, items.len())]
    }
}

fn first_page() -> usize {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default = "first_page")]
    pub page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            page: first_page(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    /// 1-based position in the filtered list.
    pub sequence: usize,
    #[serde(flatten)]
    pub record: RsvpRecord,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub rows: Vec<ListRow>,
    pub page: usize,
    pub total_pages: usize,
    pub filtered_count: usize,
    pub total_count: usize,
    pub total_guests: u64,
}

impl ListQuery {
    pub fn run(&self, records: &[RsvpRecord], pagination: Pagination) -> ListPage {
        let filtered = search(records, &self.search);
        let range = pagination.range(self.page, filtered.len());
        let rows = filtered[range.clone()]
            .iter()
            .zip(range.start + 1..)
            .map(|(record, sequence)| ListRow {
                sequence,
                record: (*record).clone(),
            })
            .collect();
        ListPage {
            rows,
            page: self.page,
            total_pages: pagination.total_pages(filtered.len()),
            filtered_count: filtered.len(),
            total_count: records.len(),
            total_guests: total_guests(records),
        }
    }
}

/// The admin table's search box and page selector.
/// Changing the search term goes back to page 1, so a narrower search never lands on an empty page.
#[derive(Clone, Debug, Default)]
pub struct AdminListView {
    query: ListQuery,
    pagination: Pagination,
}

impl AdminListView {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            query: ListQuery::default(),
            pagination,
        }
    }

    pub fn search_term(&self) -> &str {
        &self.query.search
    }

    pub fn current_page(&self) -> usize {
        self.query.page
    }

    pub fn set_search(&mut self, term: &str) {
        if self.query.search != term {
            self.query.search = term.to_string();
            self.query.page = first_page();
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.query.page = page.max(1);
    }

    pub fn next_page(&mut self, records: &[RsvpRecord]) {
        let total = self
            .pagination
            .total_pages(search(records, &self.query.search).len());
        if self.query.page < total {
            self.query.page += 1;
        }
    }

    pub fn previous_page(&mut self) {
        self.query.page = self.query.page.saturating_sub(1).max(1);
    }

    pub fn render(&self, records: &[RsvpRecord]) -> ListPage {
        self.query.run(records, self.pagination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize, name: &str, affiliation: &str, guests: u32) -> RsvpRecord {
        RsvpRecord {
            id: format!("id{i:02}"),
            name: name.to_string(),
            affiliation: affiliation.to_string(),
            guests,
            submitted_at: None,
        }
    }

    fn numbered(count: usize) -> Vec<RsvpRecord> {
        (0..count)
            .map(|i| record(i, &format!("Guest {i}"), "SMAN 1", 1))
            .collect()
    }

    #[test]
    fn test_pagination_of_23_records() {
        let records = numbered(23);
        let pagination = Pagination::new(5);
        assert_eq!(pagination.total_pages(records.len()), 5);

        let ids = |page: usize| -> Vec<String> {
            pagination
                .page(&records, page)
                .iter()
                .map(|r| r.id.clone())
                .collect()
        };
        assert_eq!(ids(1), vec!["id00", "id01", "id02", "id03", "id04"]);
        assert_eq!(ids(5), vec!["id20", "id21", "id22"]);
        assert!(ids(6).is_empty());
        assert!(ids(0).is_empty());
    }

    #[test]
    fn test_total_pages_edges() {
        let pagination = Pagination::new(5);
        assert_eq!(pagination.total_pages(0), 0);
        assert_eq!(pagination.total_pages(5), 1);
        assert_eq!(pagination.total_pages(6), 2);
        assert_eq!(Pagination::new(0).page_size(), 1);
    }

    #[test]
    fn test_search_keeps_surrounding_whitespace() {
        let records = vec![
            record(0, "Ahmad", "Bangsa Mulia", 2),
            record(1, "Rahmat", "SMAN Modal Bangsa", 4),
        ];
        let found: Vec<&str> = search(&records, " bangsa").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(found, vec!["Rahmat"]);
        let found: Vec<&str> = search(&records, "bangsa ").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(found, vec!["Ahmad"]);
        assert_eq!(search(&records, "bangsa").len(), 2);
    }

    #[test]
    fn test_search_matches_affiliation_only() {
        let records = vec![
            record(0, "Ahmad", "Dinas Pendidikan", 2),
            record(1, "Dina", "SMAN 1", 1),
            record(2, "Rahmat", "SMAN Modal Bangsa", 4),
        ];
        let found = search(&records, "modal");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Rahmat");
        assert!(!found[0].name.to_lowercase().contains("modal"));

        // either field, case-insensitively
        let found: Vec<&str> = search(&records, "DIN").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(found, vec!["Ahmad", "Dina"]);

        assert_eq!(search(&records, "  ").len(), 3);
    }

    #[test]
    fn test_total_guests_ignores_filter() {
        let records = vec![
            record(0, "Ahmad", "Dinas", 2),
            record(1, "Dina", "SMAN 1", 1),
            record(2, "Rahmat", "SMAN Modal Bangsa", 4),
        ];
        let page = ListQuery {
            search: "rahmat".to_string(),
            page: 1,
        }
        .run(&records, Pagination::new(10));
        assert_eq!(page.filtered_count, 1);
        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_guests, 7);
        assert_eq!(total_guests(&records), 7);
    }

    #[test]
    fn test_list_query_paginates_filtered_rows() {
        let mut records = numbered(12);
        records.push(record(99, "Other", "Elsewhere", 9));
        let page = ListQuery {
            search: "guest".to_string(),
            page: 3,
        }
        .run(&records, Pagination::new(5));

        assert_eq!(page.total_pages, 3);
        assert_eq!(page.filtered_count, 12);
        let sequences: Vec<usize> = page.rows.iter().map(|row| row.sequence).collect();
        assert_eq!(sequences, vec![11, 12]);
        assert_eq!(page.rows[0].record.id, "id10");
    }

    #[test]
    fn test_changing_search_resets_page() {
        let records = numbered(23);
        let mut view = AdminListView::new(Pagination::new(5));
        view.set_page(4);
        assert_eq!(view.current_page(), 4);

        view.set_search("Guest 2");
        assert_eq!(view.current_page(), 1);
        let page = view.render(&records);
        // "Guest 2" and "Guest 20".."Guest 22"
        assert_eq!(page.filtered_count, 4);

        view.set_page(2);
        view.set_search("Guest 2");
        assert_eq!(view.current_page(), 2);
    }

    #[test]
    fn test_next_and_previous_stay_in_bounds() {
        let records = numbered(7);
        let mut view = AdminListView::new(Pagination::new(5));
        view.next_page(&records);
        assert_eq!(view.current_page(), 2);
        view.next_page(&records);
        assert_eq!(view.current_page(), 2);
        view.previous_page();
        view.previous_page();
        assert_eq!(view.current_page(), 1);
    }

    #[test]
    fn test_sort_by_submitted_at() {
        use chrono::TimeZone;
        let mut records = vec![
            record(0, "late", "x", 1),
            record(1, "none", "x", 1),
            record(2, "early", "x", 1),
        ];
        records[0].submitted_at = chrono::Utc.with_ymd_and_hms(2024, 9, 15, 10, 0, 0).single();
        records[2].submitted_at = chrono::Utc.with_ymd_and_hms(2024, 9, 14, 10, 0, 0).single();

        sort_by_submitted_at(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["none", "early", "late"]);
    }
}
