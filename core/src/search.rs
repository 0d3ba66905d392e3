//! Food search across the user's local foods and the external nutrition database.
//!
//! A [`SearchSession`] owns the cumulative result list and pagination state of
//! one search view. Every fetch is tagged with a [`SearchTicket`]; a response
//! whose ticket belongs to an older generation (the query changed or the view
//! was closed) is discarded instead of merged.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, warn};

use crate::mfds::{ExternalError, ExternalPage, SearchField};
use crate::models::{NutrientRecord, SearchOrigin, SearchResultItem};
use crate::service::{MealStore, NutritionDatabase};

pub const PAGE_SIZE: u32 = 20;
pub const LOCAL_LIMIT: usize = 5;
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Fresh,
    More,
}

/// Identifies one in-flight fetch for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    query: String,
    page: u32,
    kind: FetchKind,
}

/// Everything fetched for one ticket, buffered before merging.
#[derive(Debug)]
pub struct SearchResponse {
    local: Vec<SearchResultItem>,
    by_name: Result<ExternalPage, ExternalError>,
    by_maker: Result<ExternalPage, ExternalError>,
}

#[derive(Debug, Default)]
pub struct SearchSession {
    query: String,
    page: u32,
    has_more: bool,
    seen_ids: HashSet<String>,
    results: Vec<SearchResultItem>,
    generation: u64,
    in_flight: bool,
    notice: Option<ExternalError>,
}

impl SearchSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn results(&self) -> &[SearchResultItem] {
        &self.results
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Last external failure, shown as a non-blocking notice.
    #[must_use]
    pub fn notice(&self) -> Option<&ExternalError> {
        self.notice.as_ref()
    }

    /// Start a new search, superseding anything in flight.
    ///
    /// Returns `None` for queries shorter than [`MIN_QUERY_CHARS`]; the
    /// session is left empty with pagination cleared.
    pub fn begin_search(&mut self, query: &str) -> Option<SearchTicket> {
        self.reset();
        let query = query.trim();
        self.query = query.to_string();
        if query.chars().count() < MIN_QUERY_CHARS {
            return None;
        }
        self.in_flight = true;
        Some(self.ticket(1, FetchKind::Fresh))
    }

    /// Start fetching the next external page. `None` when there is nothing
    /// more to load or a fetch is already running.
    pub fn begin_load_more(&mut self) -> Option<SearchTicket> {
        if !self.has_more || self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(self.ticket(self.page + 1, FetchKind::More))
    }

    /// Drop all results and invalidate in-flight fetches.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.query.clear();
        self.page = 0;
        self.has_more = false;
        self.seen_ids.clear();
        self.results.clear();
        self.in_flight = false;
        self.notice = None;
    }

    /// Closing the view behaves like a reset.
    pub fn close(&mut self) {
        self.reset();
    }

    fn ticket(&self, page: u32, kind: FetchKind) -> SearchTicket {
        SearchTicket {
            generation: self.generation,
            query: self.query.clone(),
            page,
            kind,
        }
    }

    /// Merge a response into the session.
    ///
    /// Returns the items added by this response, or `None` if the ticket is
    /// stale and the response was discarded.
    pub fn apply(
        &mut self,
        ticket: &SearchTicket,
        response: SearchResponse,
    ) -> Option<Vec<SearchResultItem>> {
        if ticket.generation != self.generation {
            debug!(
                query = %ticket.query,
                page = ticket.page,
                "discarding stale search response"
            );
            return None;
        }
        self.in_flight = false;

        let mut added = Vec::new();
        if ticket.kind == FetchKind::Fresh {
            self.results.clear();
            self.seen_ids.clear();
            self.notice = None;
            added.extend(response.local);
        }

        let mut total_count: u64 = 0;
        let mut failed = false;
        for (field, outcome) in [
            (SearchField::Name, response.by_name),
            (SearchField::Maker, response.by_maker),
        ] {
            match outcome {
                Ok(page) => {
                    total_count = total_count.max(page.total_count);
                    for food in page.items {
                        let duplicate = food
                            .id
                            .as_ref()
                            .is_some_and(|id| !self.seen_ids.insert(id.clone()));
                        if duplicate {
                            continue;
                        }
                        added.push(SearchResultItem::external(food.record, food.id));
                    }
                }
                Err(e) => {
                    warn!(field = ?field, error = %e, "external food search failed");
                    failed = true;
                    self.notice = Some(e);
                }
            }
        }

        self.page = ticket.page;
        self.has_more = !failed && u64::from(PAGE_SIZE) * u64::from(self.page) < total_count;
        debug!(
            page = self.page,
            total_count,
            has_more = self.has_more,
            "search page merged"
        );

        self.results.extend(added.iter().cloned());
        Some(added)
    }
}

/// Runs the collaborator queries for a [`SearchSession`].
pub struct FoodSearch<'a> {
    store: &'a dyn MealStore,
    external: &'a dyn NutritionDatabase,
    user_id: &'a str,
}

impl<'a> FoodSearch<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn MealStore,
        external: &'a dyn NutritionDatabase,
        user_id: &'a str,
    ) -> Self {
        Self {
            store,
            external,
            user_id,
        }
    }

    /// Search for `query` from scratch and return the full candidate list.
    pub async fn search(
        &self,
        session: &mut SearchSession,
        query: &str,
    ) -> Vec<SearchResultItem> {
        let Some(ticket) = session.begin_search(query) else {
            return Vec::new();
        };
        let response = self.fetch(&ticket).await;
        session.apply(&ticket, response);
        session.results().to_vec()
    }

    /// Fetch the next external page and return only the newly added items.
    pub async fn load_more(&self, session: &mut SearchSession) -> Vec<SearchResultItem> {
        let Some(ticket) = session.begin_load_more() else {
            return Vec::new();
        };
        let response = self.fetch(&ticket).await;
        session.apply(&ticket, response).unwrap_or_default()
    }

    /// Run every query a ticket needs. The session is not touched, so the
    /// caller may supersede the ticket while this is pending.
    pub async fn fetch(&self, ticket: &SearchTicket) -> SearchResponse {
        match ticket.kind {
            FetchKind::Fresh => {
                let (local, (by_name, by_maker)) = futures::join!(
                    self.local_results(&ticket.query),
                    self.fetch_external(&ticket.query, ticket.page)
                );
                SearchResponse {
                    local,
                    by_name,
                    by_maker,
                }
            }
            FetchKind::More => {
                let (by_name, by_maker) = self.fetch_external(&ticket.query, ticket.page).await;
                SearchResponse {
                    local: Vec::new(),
                    by_name,
                    by_maker,
                }
            }
        }
    }

    async fn fetch_external(
        &self,
        query: &str,
        page: u32,
    ) -> (
        Result<ExternalPage, ExternalError>,
        Result<ExternalPage, ExternalError>,
    ) {
        futures::join!(
            self.external
                .search_by_field(SearchField::Name, query, page, PAGE_SIZE),
            self.external
                .search_by_field(SearchField::Maker, query, page, PAGE_SIZE)
        )
    }

    /// Favorites first, then custom foods, each capped at [`LOCAL_LIMIT`].
    async fn local_results(&self, query: &str) -> Vec<SearchResultItem> {
        let (favorites, custom) = futures::join!(
            self.store.list_favorites(self.user_id),
            self.store.list_custom_foods(self.user_id, query)
        );

        let needle = query.to_lowercase();
        let favorites = degrade("favorites", favorites)
            .into_iter()
            .filter(|r| r.matches(&needle))
            .take(LOCAL_LIMIT)
            .map(|r| SearchResultItem::local(r, SearchOrigin::LocalFavorite));
        let custom = degrade("custom foods", custom)
            .into_iter()
            .take(LOCAL_LIMIT)
            .map(|r| SearchResultItem::local(r, SearchOrigin::LocalCustom));

        favorites.chain(custom).collect()
    }
}

fn degrade(what: &str, result: Result<Vec<NutrientRecord>>) -> Vec<NutrientRecord> {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "local {what} lookup failed");
        Vec::new()
    })
}
