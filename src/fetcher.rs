//! Cursor-driven retrieval of activity pages into an in-memory working set.
//!
//! A fetcher owns one working set, one cursor and one filter set. Views that need
//! independent lists (a main table and a filtered modal, say) each get their own fetcher.
//!
//! Only one request runs at a time: a `load_more` or `refetch` issued while another is in
//! flight is dropped, not queued. Every request is tagged with the filter generation it was
//! issued under, and a response that comes back after the filters changed is thrown away.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, warn};

use crate::error::TallyError;
use crate::models::{ActivityFilters, ActivityPatch, ActivityRecord, Credential, PageCursor};
use crate::store::ActivityStore;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
    Loaded { has_more: bool },
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another request is in flight.
    Busy,
    /// There is no next page to load.
    Exhausted,
    /// Not authenticated; nothing was requested.
    NoCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Merged { fetched: usize },
    Updated,
    Skipped(SkipReason),
    /// The filters changed while the request was in flight; its result was dropped.
    Stale,
    Failed,
}

pub type ErrorHandler = Box<dyn Fn(&TallyError) + Send + Sync>;

struct FetcherState {
    status: FetchStatus,
    records: Vec<ActivityRecord>,
    next_cursor: Option<PageCursor>,
    filters: ActivityFilters,
    credential: Option<Credential>,
    generation: u64,
}

impl FetcherState {
    fn has_more(&self) -> bool {
        self.next_cursor.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Drops the working set and invalidates whatever is in flight.
    fn reset(&mut self) {
        self.generation += 1;
        self.records.clear();
        self.next_cursor = None;
        self.status = FetchStatus::Idle;
    }
}

struct Mutation {
    credential: Credential,
    prior: FetchStatus,
    generation: u64,
}

struct Request {
    generation: u64,
    credential: Credential,
    filters: ActivityFilters,
    cursor: Option<PageCursor>,
    reset: bool,
}

pub struct PaginatedFetcher<S: ActivityStore + ?Sized> {
    store: Arc<S>,
    page_size: usize,
    state: Mutex<FetcherState>,
    on_error: Option<ErrorHandler>,
}

impl<S: ActivityStore + ?Sized> PaginatedFetcher<S> {
    pub fn new(store: Arc<S>, page_size: usize) -> Self {
        Self {
            store,
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
            state: Mutex::new(FetcherState {
                status: FetchStatus::Idle,
                records: Vec::new(),
                next_cursor: None,
                filters: ActivityFilters::default(),
                credential: None,
                generation: 0,
            }),
            on_error: None,
        }
    }

    pub fn with_credential(self, credential: Option<Credential>) -> Self {
        self.state().credential = credential;
        self
    }

    pub fn with_filters(self, filters: ActivityFilters) -> Self {
        self.state().filters = filters;
        self
    }

    /// Called with every fetch or mutation failure.
    pub fn with_error_handler(
        mut self,
        handler: impl Fn(&TallyError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    fn state(&self) -> MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn status(&self) -> FetchStatus {
        self.state().status
    }

    pub fn records(&self) -> Vec<ActivityRecord> {
        self.state().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().records.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more()
    }

    pub fn filters(&self) -> ActivityFilters {
        self.state().filters.clone()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().credential.is_some()
    }

    // -----------------------------------------------------------------------
    // Context changes
    // -----------------------------------------------------------------------

    /// Swapping credentials drops the working set, since it belonged to the previous identity.
    pub fn set_credential(&self, credential: Option<Credential>) {
        let mut state = self.state();
        if state.credential != credential {
            state.credential = credential;
            state.reset();
        }
    }

    /// Replaces the filters. A real change discards the working set and cursor, and any
    /// in-flight response will be dropped on arrival. Returns whether anything changed.
    pub fn set_filters(&self, filters: ActivityFilters) -> bool {
        let mut state = self.state();
        if state.filters == filters {
            return false;
        }
        debug!("filters changed, discarding {} held activities", state.records.len());
        state.filters = filters;
        state.reset();
        true
    }

    /// `set_filters` followed by a refetch from the first page.
    pub async fn apply_filters(
        &self,
        filters: ActivityFilters,
        desired_count: usize,
    ) -> FetchOutcome {
        self.set_filters(filters);
        self.refetch(true, desired_count).await
    }

    // -----------------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------------

    /// Appends the next page. Skipped when there is no next page or a request is in flight.
    pub async fn load_more(&self) -> FetchOutcome {
        let request = match self.begin(false) {
            Ok(request) => request,
            Err(reason) => return FetchOutcome::Skipped(reason),
        };
        self.run(request, self.page_size, true).await
    }

    /// Fetches until at least `desired_count` records have arrived or the store runs out.
    ///
    /// With `reset_to_start` the fetch starts from the first page and the result replaces the
    /// working set; otherwise it continues from the current cursor and appends. A
    /// `desired_count` of zero fetches a single page of the default size.
    pub async fn refetch(&self, reset_to_start: bool, desired_count: usize) -> FetchOutcome {
        let request = match self.begin(reset_to_start) {
            Ok(request) => request,
            Err(reason) => return FetchOutcome::Skipped(reason),
        };
        if desired_count == 0 {
            self.run(request, self.page_size, true).await
        } else {
            self.run(request, desired_count, false).await
        }
    }

    fn begin(&self, reset: bool) -> Result<Request, SkipReason> {
        let mut state = self.state();
        let Some(credential) = state.credential.clone() else {
            return Err(SkipReason::NoCredential);
        };
        if state.status == FetchStatus::Fetching {
            warn!("fetch already in flight, dropping request");
            return Err(SkipReason::Busy);
        }
        if !reset && !state.has_more() {
            return Err(SkipReason::Exhausted);
        }
        state.status = FetchStatus::Fetching;
        Ok(Request {
            generation: state.generation,
            credential,
            filters: state.filters.clone(),
            cursor: if reset { None } else { state.next_cursor.clone() },
            reset,
        })
    }

    async fn run(&self, request: Request, desired: usize, single_page: bool) -> FetchOutcome {
        let mut fetched: Vec<ActivityRecord> = Vec::new();
        let mut cursor = request.cursor.clone();

        loop {
            let want = desired.saturating_sub(fetched.len()).max(1);
            let result = self
                .store
                .retrieve_activities(&request.credential, &request.filters, cursor.as_ref(), want)
                .await;

            if self.is_stale(request.generation) {
                warn!("filters changed during fetch, discarding response");
                return FetchOutcome::Stale;
            }
            match result {
                Ok(page) => {
                    cursor = page.next_cursor.filter(|c| !c.is_empty());
                    fetched.extend(page.records);
                }
                Err(e) => {
                    self.fail(request.generation, e);
                    return FetchOutcome::Failed;
                }
            }
            if single_page || cursor.is_none() || fetched.len() >= desired {
                break;
            }
        }

        let mut state = self.state();
        if state.generation != request.generation {
            return FetchOutcome::Stale;
        }
        let count = fetched.len();
        if request.reset {
            state.records = fetched;
        } else {
            state.records.extend(fetched);
        }
        state.next_cursor = cursor;
        let has_more = state.has_more();
        state.status = FetchStatus::Loaded { has_more };
        debug!("merged {count} activities, holding {}", state.records.len());
        FetchOutcome::Merged { fetched: count }
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.state().generation != generation
    }

    fn fail(&self, generation: u64, err: TallyError) {
        {
            let mut state = self.state();
            if state.generation == generation {
                state.status = FetchStatus::Error;
            }
        }
        error!("error fetching activities: {err}");
        self.report(&err);
    }

    fn report(&self, err: &TallyError) {
        if let Some(handler) = &self.on_error {
            handler(err);
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Claims the busy slot for a store mutation. Fetches issued until `finish_mutation` are
    /// dropped as busy.
    fn begin_mutation(&self) -> Result<Mutation, SkipReason> {
        let mut state = self.state();
        let Some(credential) = state.credential.clone() else {
            return Err(SkipReason::NoCredential);
        };
        if state.status == FetchStatus::Fetching {
            warn!("fetch already in flight, dropping mutation");
            return Err(SkipReason::Busy);
        }
        let prior = state.status;
        state.status = FetchStatus::Fetching;
        Ok(Mutation {
            credential,
            prior,
            generation: state.generation,
        })
    }

    /// Hands the busy slot back, unless the filters changed and already reset the state.
    fn finish_mutation(&self, mutation: &Mutation) {
        let mut state = self.state();
        if state.generation == mutation.generation {
            state.status = mutation.prior;
        }
    }

    /// Deletes a record in the store, then refetches from the top keeping the list the same size.
    pub async fn remove_record(&self, id: &str) -> FetchOutcome {
        let mutation = match self.begin_mutation() {
            Ok(mutation) => mutation,
            Err(reason) => return FetchOutcome::Skipped(reason),
        };
        if let Err(e) = self.store.delete_record(&mutation.credential, id).await {
            self.finish_mutation(&mutation);
            error!("error deleting activity {id}: {e}");
            self.report(&e);
            return FetchOutcome::Failed;
        }

        let (request, keep) = {
            let state = self.state();
            if state.generation != mutation.generation {
                return FetchOutcome::Stale;
            }
            let request = Request {
                generation: state.generation,
                credential: mutation.credential.clone(),
                filters: state.filters.clone(),
                cursor: None,
                reset: true,
            };
            (request, state.records.len().max(self.page_size))
        };
        self.run(request, keep, false).await
    }

    /// Updates a record in the store, then swaps in the updated copy locally.
    pub async fn update_record(&self, id: &str, patch: &ActivityPatch) -> FetchOutcome {
        let mutation = match self.begin_mutation() {
            Ok(mutation) => mutation,
            Err(reason) => return FetchOutcome::Skipped(reason),
        };
        let result = self.store.update_record(&mutation.credential, id, patch).await;
        self.finish_mutation(&mutation);
        if let Err(e) = result {
            error!("error updating activity {id}: {e}");
            self.report(&e);
            return FetchOutcome::Failed;
        }

        let mut state = self.state();
        if state.generation != mutation.generation {
            return FetchOutcome::Stale;
        }
        if let Some(pos) = state.records.iter().position(|r| r.id == id) {
            let updated = state.records[pos].with_patch(patch);
            state.records[pos] = updated;
        }
        FetchOutcome::Updated
    }
}
