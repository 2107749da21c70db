use crate::error::WallsError;
use crate::models::{Purity, PurityCycle, SearchPage, Wallpaper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseMode {
    Search,
    CacheBrowse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NoQuery,
    Searching,
    Browsing { page: u32, last_page: u32 },
    CacheBrowsing { index: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub purity: Purity,
    pub page: u32,
}

/// Background work a state transition asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Search(SearchRequest),
    ListCache,
}

/// Interactive state. Only the interaction loop mutates it; background work
/// reports back through completions which are applied here.
#[derive(Debug, Clone)]
pub struct SessionState {
    query: String,
    page: u32,
    last_page: u32,
    total: Option<u64>,
    /// Last successfully loaded page, restored when a request fails. `None`
    /// until a search has succeeded.
    loaded: Option<LoadedPage>,
    purity: Purity,
    mode: BrowseMode,
    results: Vec<Wallpaper>,
    selected: Option<usize>,
    cached: Vec<Wallpaper>,
    cache_index: usize,
    /// A listing has arrived since cache mode was entered.
    cache_listed: bool,
    searching: bool,
    /// Search superseded by a cache listing, re-issued when leaving cache mode.
    interrupted: Option<SearchRequest>,
    status: String,
}

impl SessionState {
    pub fn new(purity: Purity, has_api_key: bool) -> Self {
        let mut status = String::from("Enter a search term and press Enter.");
        if !has_api_key {
            status.push_str(" No API key detected; NSFW results unavailable.");
        }
        Self {
            query: String::new(),
            page: 1,
            last_page: 1,
            total: None,
            loaded: None,
            purity,
            mode: BrowseMode::Search,
            results: Vec::new(),
            selected: None,
            cached: Vec::new(),
            cache_index: 0,
            cache_listed: false,
            searching: false,
            interrupted: None,
            status,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.mode {
            BrowseMode::CacheBrowse => Phase::CacheBrowsing {
                index: self.cache_index,
                count: self.cached.len(),
            },
            BrowseMode::Search if self.searching => Phase::Searching,
            BrowseMode::Search if self.loaded.is_none() => Phase::NoQuery,
            BrowseMode::Search => Phase::Browsing {
                page: self.page,
                last_page: self.last_page,
            },
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn last_page(&self) -> u32 {
        self.last_page
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn purity(&self) -> Purity {
        self.purity
    }

    pub fn mode(&self) -> BrowseMode {
        self.mode
    }

    pub fn results(&self) -> &[Wallpaper] {
        &self.results
    }

    pub fn cached(&self) -> &[Wallpaper] {
        &self.cached
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    pub fn report_error(&mut self, err: &WallsError) {
        self.status = format!("Error: {err}");
    }

    /// Index of the highlighted entry in the active list.
    pub fn selection(&self) -> Option<usize> {
        match self.mode {
            BrowseMode::Search => self.selected,
            BrowseMode::CacheBrowse => (!self.cached.is_empty()).then_some(self.cache_index),
        }
    }

    pub fn selected(&self) -> Option<&Wallpaper> {
        match self.mode {
            BrowseMode::Search => self.selected.and_then(|i| self.results.get(i)),
            BrowseMode::CacheBrowse => self.cached.get(self.cache_index),
        }
    }

    pub fn submit_query(&mut self, text: &str) -> Option<Request> {
        let query = text.trim();
        if query.is_empty() {
            self.status = "Enter a non-empty search query.".into();
            return None;
        }
        self.mode = BrowseMode::Search;
        self.interrupted = None;
        self.query = query.to_string();
        self.page = 1;
        self.last_page = 1;
        self.total = None;
        Some(Request::Search(self.start_search()))
    }

    fn start_search(&mut self) -> SearchRequest {
        self.searching = true;
        self.status = format!("Searching '{}' (page {})...", self.query, self.page);
        self.current_request()
    }

    fn current_request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            purity: self.purity,
            page: self.page,
        }
    }

    /// Apply a finished search. Returns the entry to preview, if any.
    pub fn search_loaded(&mut self, page: SearchPage) -> Option<Wallpaper> {
        self.searching = false;
        self.results = page.wallpapers;
        self.page = page.meta.current_page;
        self.last_page = page.meta.last_page;
        self.total = page.meta.total;
        self.loaded = Some(LoadedPage {
            query: self.query.clone(),
            page: self.page,
            last_page: self.last_page,
            total: self.total,
        });
        self.selected = (!self.results.is_empty()).then_some(0);

        self.status = match self.total {
            Some(total) => format!(
                "Loaded {} results (page {}/{}, total {total}).",
                self.results.len(),
                self.page,
                self.last_page
            ),
            None => format!(
                "Loaded {} results (page {}/{}).",
                self.results.len(),
                self.page,
                self.last_page
            ),
        };
        self.selected().cloned()
    }

    pub fn search_failed(&mut self, err: &WallsError) {
        self.settle();
        self.report_error(err);
    }

    /// The search task died without a result.
    pub fn search_aborted(&mut self, reason: &str) {
        self.settle();
        self.status = format!("Error: search task failed: {reason}");
    }

    /// Return to the last loaded page, or to no query at all.
    fn settle(&mut self) {
        self.searching = false;
        match &self.loaded {
            Some(loaded) => {
                self.query = loaded.query.clone();
                self.page = loaded.page;
                self.last_page = loaded.last_page;
                self.total = loaded.total;
            }
            None => {
                self.page = 1;
                self.last_page = 1;
                self.total = None;
            }
        }
    }

    pub fn next(&mut self) -> NavOutcome {
        match self.mode {
            BrowseMode::Search => self.next_page(),
            BrowseMode::CacheBrowse => self.step_cache(1),
        }
    }

    pub fn previous(&mut self) -> NavOutcome {
        match self.mode {
            BrowseMode::Search => self.previous_page(),
            BrowseMode::CacheBrowse => self.step_cache(-1),
        }
    }

    fn next_page(&mut self) -> NavOutcome {
        if self.loaded.is_none() {
            self.status = "Enter a search term first.".into();
            return NavOutcome::Stay;
        }
        if self.page >= self.last_page {
            self.status = format!("Already at last page ({}).", self.last_page);
            return NavOutcome::Stay;
        }
        self.page += 1;
        NavOutcome::Dispatch(Request::Search(self.start_search()))
    }

    fn previous_page(&mut self) -> NavOutcome {
        if self.loaded.is_none() {
            self.status = "Enter a search term first.".into();
            return NavOutcome::Stay;
        }
        if self.page <= 1 {
            self.status = "Already at first page.".into();
            return NavOutcome::Stay;
        }
        self.page -= 1;
        NavOutcome::Dispatch(Request::Search(self.start_search()))
    }

    fn step_cache(&mut self, delta: isize) -> NavOutcome {
        if self.cached.is_empty() {
            self.status = if self.cache_listed {
                "No cached wallpapers found.".into()
            } else {
                "Loading cached wallpapers...".into()
            };
            return NavOutcome::Stay;
        }
        let last = self.cached.len() - 1;
        match delta {
            d if d > 0 && self.cache_index >= last => {
                self.status = "At last cached wallpaper.".into();
                NavOutcome::Stay
            }
            d if d < 0 && self.cache_index == 0 => {
                self.status = "At first cached wallpaper.".into();
                NavOutcome::Stay
            }
            d => {
                self.cache_index = self.cache_index.saturating_add_signed(d).min(last);
                match self.cached.get(self.cache_index) {
                    Some(wp) => NavOutcome::Preview(wp.clone()),
                    None => NavOutcome::Stay,
                }
            }
        }
    }

    /// Move the highlight within the active list. Returns the newly
    /// highlighted entry when the selection actually changed.
    pub fn highlight(&mut self, index: usize) -> Option<Wallpaper> {
        match self.mode {
            BrowseMode::Search => {
                if index >= self.results.len() || self.selected == Some(index) {
                    return None;
                }
                self.selected = Some(index);
            }
            BrowseMode::CacheBrowse => {
                if index >= self.cached.len() || self.cache_index == index {
                    return None;
                }
                self.cache_index = index;
            }
        }
        self.selected().cloned()
    }

    pub fn toggle_cache_mode(&mut self) -> Option<Request> {
        match self.mode {
            BrowseMode::Search => {
                self.mode = BrowseMode::CacheBrowse;
                if self.searching {
                    self.interrupted = Some(self.current_request());
                    self.searching = false;
                }
                self.cached.clear();
                self.cache_index = 0;
                self.cache_listed = false;
                self.status = "Loading cached wallpapers...".into();
                Some(Request::ListCache)
            }
            BrowseMode::CacheBrowse => {
                self.mode = BrowseMode::Search;
                self.status = "Switched to search mode.".into();
                let request = self.interrupted.take()?;
                self.searching = true;
                self.status = format!("Searching '{}' (page {})...", request.query, request.page);
                Some(Request::Search(request))
            }
        }
    }

    /// Apply a fresh cache listing. Ignored once cache mode has been left.
    pub fn cache_listed(&mut self, listing: Vec<Wallpaper>) -> Option<Wallpaper> {
        if self.mode != BrowseMode::CacheBrowse {
            return None;
        }
        self.cached = listing;
        self.cache_index = 0;
        self.cache_listed = true;
        if self.cached.is_empty() {
            self.status = "No cached wallpapers found.".into();
            return None;
        }
        self.status = format!(
            "Loaded {} cached wallpapers. Use left/right arrows to navigate, Enter to set wallpaper.",
            self.cached.len()
        );
        self.cached.first().cloned()
    }

    pub fn cycle_purity(&mut self, cycle: &PurityCycle) -> Purity {
        self.purity = cycle.next(self.purity);
        self.status = format!(
            "Purity filter set to {} ({}); applies to the next search.",
            self.purity,
            self.purity.label()
        );
        self.purity
    }

    /// Pick the entry to apply and announce the work about to start.
    pub fn begin_apply(&mut self) -> Option<Wallpaper> {
        let Some(wallpaper) = self.selected().cloned() else {
            self.status = "No wallpaper selected.".into();
            return None;
        };
        self.status = match self.mode {
            BrowseMode::Search => format!("Downloading {}...", wallpaper.id),
            BrowseMode::CacheBrowse => format!("Setting wallpaper from cache: {}...", wallpaper.id),
        };
        Some(wallpaper)
    }

    pub fn applied(&mut self, wallpaper: &Wallpaper, from_cache: bool) {
        self.status = if from_cache {
            format!("Wallpaper set to {} (from cache).", wallpaper.id)
        } else {
            format!("Wallpaper set to {}.", wallpaper.id)
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadedPage {
    query: String,
    page: u32,
    last_page: u32,
    total: Option<u64>,
}

/// Result of a next/previous request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// Boundary or nothing to move; the status line explains why.
    Stay,
    Dispatch(Request),
    Preview(Wallpaper),
}
