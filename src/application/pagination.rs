//! Offset pagination over in-memory listings.

use serde::Serialize;

/// Number of posts shown per listing page.
pub const PAGE_SIZE: usize = 20;

/// One page of an ordered listing together with its navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub page_count: usize,
}

impl<T> Paged<T> {
    /// Slices `items` to the requested 1-based page. Absent or non-positive page
    /// numbers select the first page; pages past the end come back empty but keep
    /// the requested number and the real page count.
    pub fn new(items: Vec<T>, page: Option<i64>, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let page_number = normalize_page(page);
        let total_items = items.len();
        let page_count = total_items.div_ceil(page_size);

        let skip = (page_number - 1).saturating_mul(page_size);
        let items = items.into_iter().skip(skip).take(page_size).collect();

        Self {
            items,
            page_number,
            page_size,
            total_items,
            page_count,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.page_count
    }

    pub fn previous_page(&self) -> Option<usize> {
        self.has_previous().then(|| self.page_number - 1)
    }

    pub fn next_page(&self) -> Option<usize> {
        self.has_next().then(|| self.page_number + 1)
    }

    /// 1-based position of the first item on this page, or 0 when the page is empty.
    pub fn first_item_on_page(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.page_number - 1) * self.page_size + 1
        }
    }

    pub fn last_item_on_page(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            self.first_item_on_page() + self.items.len() - 1
        }
    }
}

fn normalize_page(page: Option<i64>) -> usize {
    match page {
        Some(value) if value > 0 => usize::try_from(value).unwrap_or(usize::MAX),
        _ => 1,
    }
}
