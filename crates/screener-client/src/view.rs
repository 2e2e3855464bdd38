//! Screener state machine: filter/sort/page state, the rows on screen and the
//! load status, independent of how requests are issued.

use screener_core::query::{normalize_sector, QueryParams, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use screener_core::{DataSource, ScreenerPage, ScreenerRow, SortBy, SortDir};

use crate::error::ClientResult;
use crate::presets::PresetData;

pub const LOAD_ERROR_MESSAGE: &str = "Failed to load data";
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [10, 20, 30, 50];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    /// A request is in flight; the previous rows stay visible.
    Loading,
    Loaded,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ScreenerView {
    params: QueryParams,
    rows: Vec<ScreenerRow>,
    total: usize,
    source: Option<DataSource>,
    status: LoadStatus,
    latest_seq: u64,
}

impl Default for ScreenerView {
    fn default() -> Self {
        Self::new(QueryParams::default())
    }
}

impl ScreenerView {
    pub fn new(params: QueryParams) -> Self {
        Self {
            params,
            rows: Vec::new(),
            total: 0,
            source: None,
            status: LoadStatus::Idle,
            latest_seq: 0,
        }
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn rows(&self) -> &[ScreenerRow] {
        &self.rows
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn source(&self) -> Option<DataSource> {
        self.source
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn page(&self) -> u32 {
        self.params.page
    }

    /// `max(1, ceil(total / pageSize))`
    pub fn pages(&self) -> u32 {
        let size = self.params.page_size.max(1) as usize;
        (self.total.div_ceil(size).max(1)).min(u32::MAX as usize) as u32
    }

    // -----------------------------------------------------------------------
    // Filter and sort changes (each resets to page 1)
    // -----------------------------------------------------------------------

    pub fn set_search(&mut self, search: &str) {
        self.params.filters.search = search.to_string();
        self.params.page = 1;
    }

    /// `None`, blank or `all` clears the sector filter.
    pub fn set_sector(&mut self, sector: Option<&str>) {
        self.params.filters.sector = normalize_sector(sector);
        self.params.page = 1;
    }

    pub fn set_market_cap_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.params.filters.min_market_cap = min;
        self.params.filters.max_market_cap = max;
        self.params.page = 1;
    }

    pub fn set_pe_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.params.filters.min_pe = min;
        self.params.filters.max_pe = max;
        self.params.page = 1;
    }

    /// Clicking the active column flips direction; another column starts
    /// descending.
    pub fn change_sort(&mut self, column: SortBy) {
        let filters = &mut self.params.filters;
        if filters.sort_by == column {
            filters.sort_dir = filters.sort_dir.toggled();
        } else {
            filters.sort_by = column;
            filters.sort_dir = SortDir::Desc;
        }
        self.params.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.params.page_size = page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self.params.page = 1;
    }

    /// Replaces every filter, the sort and the page size.
    pub fn apply_preset(&mut self, preset: &PresetData) {
        self.params = preset.to_params();
        self.set_page_size(self.params.page_size);
    }

    // -----------------------------------------------------------------------
    // Page navigation (filters kept)
    // -----------------------------------------------------------------------

    /// Moves to `page` clamped to `[1, pages]`. Returns whether it moved.
    pub fn set_page(&mut self, page: u32) -> bool {
        let target = page.clamp(1, self.pages());
        let moved = target != self.params.page;
        self.params.page = target;
        moved
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.params.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.params.page.saturating_sub(1))
    }

    // -----------------------------------------------------------------------
    // Request lifecycle
    // -----------------------------------------------------------------------

    /// Issues a new sequence number and enters `Loading`. The caller sends
    /// the returned params and reports back with [`finish_request`].
    ///
    /// [`finish_request`]: ScreenerView::finish_request
    pub fn begin_request(&mut self) -> (u64, QueryParams) {
        self.latest_seq += 1;
        self.status = LoadStatus::Loading;
        (self.latest_seq, self.params.clone())
    }

    /// Applies a response. Anything but the latest request is discarded and
    /// `false` returned.
    pub fn finish_request(&mut self, seq: u64, result: ClientResult<ScreenerPage>) -> bool {
        if seq != self.latest_seq {
            tracing::debug!(seq, latest = self.latest_seq, "Discarding stale screener response");
            return false;
        }

        match result {
            Ok(page) => {
                self.rows = page.data;
                self.total = page.total;
                self.source = Some(page.source);
                self.status = LoadStatus::Loaded;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Screener request failed");
                self.rows.clear();
                self.total = 0;
                self.source = None;
                self.status = LoadStatus::Error(LOAD_ERROR_MESSAGE.to_string());
            }
        }
        true
    }
}
