//! Paged, search-filtered, incrementally loaded list controller
//!
//! A [`ListController`] owns the search criteria and the accumulated items of
//! one list screen. It issues page fetches through a [`PageFetcher`], appends
//! or replaces items depending on the requested page, and funnels failures to
//! a [`Notifier`].
//!
//! Rules applied to every settled fetch:
//! - only the most recently issued fetch may change state; older results
//!   are dropped (last issued wins);
//! - results arriving after [`ListController::stop`] are dropped;
//! - a failed "next page" fetch rolls the page cursor back, so the next
//!   attempt asks for the same page again.
//!
//! Search form edits are debounced: `debounce` while the text filter holds a
//! value, immediately (on a later runtime turn) otherwise.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use spendbook_config::ListsConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::criteria::{CriteriaUpdate, PageResult, SearchCriteria};
use crate::debounce::{delay_for, Debouncer};
use crate::error::FetchError;
use crate::notify::Notifier;
use crate::types::SortOrder;

/// Callback run once when a `load_next_page` or `refresh` request settles
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Presentation transform applied to the full item list
pub type ViewFn<T, V> = Arc<dyn Fn(&[T]) -> V + Send + Sync>;

/// Source of result pages
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch(&self, criteria: SearchCriteria) -> Result<PageResult<T>, FetchError>;
}

/// Accumulated list state of one screen
#[derive(Debug, Clone)]
pub struct ListState<T> {
    pub items: Vec<T>,
    /// A fetch is outstanding
    pub loading: bool,
    /// Mirrors `last` of the most recent page
    pub last_page_reached: bool,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            last_page_reached: false,
        }
    }
}

/// Point-in-time copy of a controller, for rendering
#[derive(Debug, Clone, Serialize)]
pub struct ListSnapshot<T, V> {
    pub items: Vec<T>,
    pub view: V,
    pub loading: bool,
    pub last_page_reached: bool,
    pub criteria: SearchCriteria,
}

struct ControllerState<T, V> {
    criteria: SearchCriteria,
    list: ListState<T>,
    view: V,
    started: bool,
    /// Bumped by every start and stop; fetches from older sessions are dropped
    session: u64,
    /// Search edits waiting out the debounce delay
    pending: CriteriaUpdate,
    /// Id of the most recently issued fetch
    issued: u64,
    observer: Option<JoinHandle<()>>,
}

struct FetchRequest {
    id: u64,
    session: u64,
    criteria: SearchCriteria,
}

struct Shared<T, V> {
    name: String,
    fetcher: Arc<dyn PageFetcher<T>>,
    notifier: Arc<dyn Notifier>,
    view_fn: ViewFn<T, V>,
    debounce: Duration,
    text_filter: String,
    debouncer: Debouncer,
    feed: Option<watch::Receiver<CriteriaUpdate>>,
    state: Mutex<ControllerState<T, V>>,
    revision: watch::Sender<u64>,
}

/// Builder for [`ListController`]
pub struct ListControllerBuilder<T> {
    name: String,
    sort: SortOrder,
    fetcher: Arc<dyn PageFetcher<T>>,
    notifier: Arc<dyn Notifier>,
    size: usize,
    debounce: Duration,
    text_filter: String,
    feed: Option<watch::Receiver<CriteriaUpdate>>,
}

impl<T> ListControllerBuilder<T>
where
    T: Clone + Send + 'static,
{
    /// `name` is the plural noun used in failure messages ("Could not load <name>")
    pub fn new(
        name: impl Into<String>,
        sort: SortOrder,
        fetcher: Arc<dyn PageFetcher<T>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let defaults = ListsConfig::default();
        Self {
            name: name.into(),
            sort,
            fetcher,
            notifier,
            size: defaults.page_size,
            debounce: Duration::from_millis(defaults.debounce_ms),
            text_filter: defaults.text_filter,
            feed: None,
        }
    }

    /// Take page size, debounce and text filter from configuration
    pub fn settings(mut self, lists: &ListsConfig) -> Self {
        self.size = lists.page_size;
        self.debounce = Duration::from_millis(lists.debounce_ms);
        self.text_filter = lists.text_filter.clone();
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn text_filter(mut self, key: impl Into<String>) -> Self {
        self.text_filter = key.into();
        self
    }

    /// Search form feed observed between `start` and `stop`
    pub fn feed(mut self, feed: watch::Receiver<CriteriaUpdate>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Controller whose view is the item list itself
    pub fn build(self) -> ListController<T, Vec<T>> {
        self.build_with_view(|items: &[T]| items.to_vec())
    }

    /// Controller whose view is recomputed from all items after each page
    pub fn build_with_view<V, F>(self, view_fn: F) -> ListController<T, V>
    where
        V: Clone + Send + 'static,
        F: Fn(&[T]) -> V + Send + Sync + 'static,
    {
        let view_fn: ViewFn<T, V> = Arc::new(view_fn);
        let state = ControllerState {
            criteria: SearchCriteria::new(self.sort, self.size),
            list: ListState::default(),
            view: view_fn(&[]),
            started: false,
            session: 0,
            pending: CriteriaUpdate::default(),
            issued: 0,
            observer: None,
        };
        let (revision, _) = watch::channel(0);

        ListController {
            shared: Arc::new(Shared {
                name: self.name,
                fetcher: self.fetcher,
                notifier: self.notifier,
                view_fn,
                debounce: self.debounce,
                text_filter: self.text_filter,
                debouncer: Debouncer::new(),
                feed: self.feed,
                state: Mutex::new(state),
                revision,
            }),
        }
    }
}

/// Controller for one paged list. Cheap to clone; clones share state.
pub struct ListController<T, V> {
    shared: Arc<Shared<T, V>>,
}

impl<T, V> Clone for ListController<T, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, V> ListController<T, V>
where
    T: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, ControllerState<T, V>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<Shared<T, V>> {
        Arc::downgrade(&self.shared)
    }

    fn upgrade(weak: &Weak<Shared<T, V>>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    // ==================== Lifecycle ====================

    /// Reset the list, fetch the first page and begin observing the feed.
    /// Starting twice is a no-op.
    pub fn start(&self) {
        let request = {
            let mut state = self.lock();
            if state.started {
                log::warn!("{} list already started, ignoring start()", self.shared.name);
                return;
            }
            state.started = true;
            state.session += 1;
            state.list = ListState::default();
            state.view = (self.shared.view_fn)(&[]);
            state.criteria.page = 0;
            state.pending = CriteriaUpdate::default();

            if let Some(feed) = &self.shared.feed {
                let mut feed = feed.clone();
                // edits made before start are not replayed
                feed.borrow_and_update();
                state.observer = Some(self.spawn_observer(feed));
            }

            Self::prepare(&mut state)
        };

        log::info!("Starting {} list", self.shared.name);
        self.publish();
        self.dispatch(request, None);
    }

    /// Stop observing the feed and drop pending search edits. An in-flight
    /// fetch may still complete but its result is dropped, so `loading` is
    /// cleared here.
    pub fn stop(&self) {
        let observer = {
            let mut state = self.lock();
            if !state.started {
                return;
            }
            state.started = false;
            state.session += 1;
            state.list.loading = false;
            state.pending = CriteriaUpdate::default();
            state.observer.take()
        };

        if let Some(observer) = observer {
            observer.abort();
        }
        self.shared.debouncer.cancel();
        self.publish();
        log::info!("Stopped {} list", self.shared.name);
    }

    fn spawn_observer(&self, mut feed: watch::Receiver<CriteriaUpdate>) -> JoinHandle<()> {
        let weak = self.downgrade();
        tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let update = feed.borrow_and_update().clone();
                match Self::upgrade(&weak) {
                    Some(controller) => controller.on_filter_or_sort_changed(update),
                    None => break,
                }
            }
        })
    }

    // ==================== Operations ====================

    /// Merge a form edit into the criteria and fetch the first page, after
    /// the debounce delay. Edits arriving within the delay accumulate.
    /// Ignored while stopped.
    pub fn on_filter_or_sort_changed(&self, update: CriteriaUpdate) {
        let delay = {
            let mut state = self.lock();
            if !state.started {
                log::debug!("{} list stopped, ignoring search edit", self.shared.name);
                return;
            }
            state.pending.merge(update);
            delay_for(
                &state.pending,
                &state.criteria,
                &self.shared.text_filter,
                self.shared.debounce,
            )
        };

        let weak = self.downgrade();
        self.shared.debouncer.schedule(delay, move || {
            if let Some(controller) = Self::upgrade(&weak) {
                controller.apply_pending();
            }
        });
    }

    fn apply_pending(&self) {
        let request = {
            let mut state = self.lock();
            if !state.started {
                return;
            }
            let update = std::mem::take(&mut state.pending);
            state.criteria.apply(&update);
            Self::prepare(&mut state)
        };

        self.publish();
        self.dispatch(request, None);
    }

    /// Fetch the next page and append it. Returns `false` without fetching
    /// when stopped, loading or on the last page; `done` still runs then.
    pub fn load_next_page(&self, done: Option<Completion>) -> bool {
        let request = {
            let mut state = self.lock();
            if !state.started || state.list.loading || state.list.last_page_reached {
                None
            } else {
                state.criteria.page += 1;
                Some(Self::prepare(&mut state))
            }
        };

        self.issue_or_complete(request, done)
    }

    /// Fetch the first page again and replace the items. Returns `false`
    /// without fetching when stopped or loading; `done` still runs then.
    pub fn refresh(&self, done: Option<Completion>) -> bool {
        let request = {
            let mut state = self.lock();
            if !state.started || state.list.loading {
                None
            } else {
                state.criteria.page = 0;
                Some(Self::prepare(&mut state))
            }
        };

        self.issue_or_complete(request, done)
    }

    fn issue_or_complete(&self, request: Option<FetchRequest>, done: Option<Completion>) -> bool {
        match request {
            Some(request) => {
                self.publish();
                self.dispatch(request, done);
                true
            }
            None => {
                if let Some(done) = done {
                    done();
                }
                false
            }
        }
    }

    // ==================== Fetch protocol ====================

    fn prepare(state: &mut ControllerState<T, V>) -> FetchRequest {
        state.criteria.strip_empty_filters();
        state.list.loading = true;
        state.issued += 1;
        FetchRequest {
            id: state.issued,
            session: state.session,
            criteria: state.criteria.clone(),
        }
    }

    fn dispatch(&self, request: FetchRequest, done: Option<Completion>) {
        log::debug!(
            "Fetching {} #{}: {}",
            self.shared.name,
            request.id,
            request.criteria.query_string()
        );

        let controller = self.clone();
        tokio::spawn(async move {
            let outcome = controller.shared.fetcher.fetch(request.criteria.clone()).await;
            controller.settle(request, outcome);
            if let Some(done) = done {
                done();
            }
        });
    }

    fn settle(&self, request: FetchRequest, outcome: Result<PageResult<T>, FetchError>) {
        let failure = {
            let mut state = self.lock();
            if request.session != state.session {
                log::debug!("Dropping {} #{}: list was stopped", self.shared.name, request.id);
                return;
            }
            if request.id != state.issued {
                log::debug!(
                    "Dropping {} #{}: superseded by #{}",
                    self.shared.name,
                    request.id,
                    state.issued
                );
                return;
            }

            match outcome {
                Ok(page) => {
                    state.list.loading = false;
                    if request.criteria.page == 0 {
                        state.list.items = page.content;
                    } else {
                        state.list.items.extend(page.content);
                    }
                    state.list.last_page_reached = page.last;
                    state.view = (self.shared.view_fn)(&state.list.items);
                    log::debug!(
                        "{} page {} loaded, {} items, last={}",
                        self.shared.name,
                        request.criteria.page,
                        state.list.items.len(),
                        page.last
                    );
                    None
                }
                Err(err) => {
                    if request.criteria.page > 0 && state.criteria.page == request.criteria.page {
                        state.criteria.page -= 1;
                    }
                    Some(err)
                }
            }
        };

        // a failure is reported before `loading` clears
        if let Some(err) = failure {
            self.shared
                .notifier
                .notify_failure(&format!("Could not load {}", self.shared.name), &err);

            let mut state = self.lock();
            if request.session == state.session && request.id == state.issued {
                state.list.loading = false;
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.shared.revision.send_modify(|revision| *revision += 1);
    }

    // ==================== Accessors ====================

    /// Receiver bumped whenever visible state changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().list.items.clone()
    }

    pub fn view(&self) -> V {
        self.lock().view.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().list.loading
    }

    pub fn last_page_reached(&self) -> bool {
        self.lock().list.last_page_reached
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// Criteria as last sent (or about to be sent)
    pub fn criteria(&self) -> SearchCriteria {
        self.lock().criteria.clone()
    }

    pub fn state(&self) -> ListState<T> {
        self.lock().list.clone()
    }

    pub fn snapshot(&self) -> ListSnapshot<T, V> {
        let state = self.lock();
        ListSnapshot {
            items: state.list.items.clone(),
            view: state.view.clone(),
            loading: state.list.loading,
            last_page_reached: state.list.last_page_reached,
            criteria: state.criteria.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::notify::RecordingNotifier;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
    }

    fn items(ids: &[u32]) -> Vec<Item> {
        ids.iter().map(|&id| Item { id }).collect()
    }

    enum Reply {
        Page(PageResult<Item>),
        Fail(FetchError),
        Gated(oneshot::Receiver<Result<PageResult<Item>, FetchError>>),
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        calls: Mutex<Vec<SearchCriteria>>,
        replies: Mutex<VecDeque<Reply>>,
    }

    impl ScriptedFetcher {
        fn reply(&self, reply: Reply) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn page(&self, ids: &[u32], last: bool) {
            self.reply(Reply::Page(PageResult::new(items(ids), last)));
        }

        fn gate(&self) -> oneshot::Sender<Result<PageResult<Item>, FetchError>> {
            let (tx, rx) = oneshot::channel();
            self.reply(Reply::Gated(rx));
            tx
        }

        fn calls(&self) -> Vec<SearchCriteria> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher<Item> for ScriptedFetcher {
        async fn fetch(&self, criteria: SearchCriteria) -> Result<PageResult<Item>, FetchError> {
            self.calls.lock().unwrap().push(criteria);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Page(page)) => Ok(page),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Gated(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(FetchError::new("gate dropped"))),
                None => Ok(PageResult::new(vec![], true)),
            }
        }
    }

    struct Fixture {
        fetcher: Arc<ScriptedFetcher>,
        notifier: Arc<RecordingNotifier>,
        controller: ListController<Item, Vec<Item>>,
    }

    fn fixture(size: usize) -> Fixture {
        fixture_with(size, None)
    }

    fn fixture_with(size: usize, feed: Option<watch::Receiver<CriteriaUpdate>>) -> Fixture {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let mut builder = ListControllerBuilder::new(
            "items",
            SortOrder::asc("name"),
            fetcher.clone() as Arc<dyn PageFetcher<Item>>,
            notifier.clone() as Arc<dyn Notifier>,
        )
        .size(size)
        .debounce(Duration::from_millis(400));
        if let Some(feed) = feed {
            builder = builder.feed(feed);
        }
        Fixture {
            fetcher,
            notifier,
            controller: builder.build(),
        }
    }

    /// Let spawned work run; paused time advances once everything is idle
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1_000)).await;
    }

    fn counter() -> (Arc<AtomicUsize>, Completion) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_two_pages() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.page(&[3], true);

        f.controller.start();
        assert!(f.controller.is_loading());
        settle().await;
        assert_eq!(f.controller.items(), items(&[1, 2]));
        assert!(!f.controller.last_page_reached());

        assert!(f.controller.load_next_page(None));
        settle().await;

        let state = f.controller.state();
        assert_eq!(state.items, items(&[1, 2, 3]));
        assert!(state.last_page_reached);
        assert!(!state.loading);

        let calls = f.fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].page, 0);
        assert_eq!(calls[0].size, 2);
        assert_eq!(calls[1].page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accumulation_across_three_pages() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.page(&[3, 4], false);
        f.fetcher.page(&[5], true);

        f.controller.start();
        settle().await;
        f.controller.load_next_page(None);
        settle().await;
        f.controller.load_next_page(None);
        settle().await;

        assert_eq!(f.controller.items(), items(&[1, 2, 3, 4, 5]));
        assert!(f.controller.last_page_reached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_items() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.page(&[3, 4], false);
        f.fetcher.page(&[9, 8], false);

        f.controller.start();
        settle().await;
        f.controller.load_next_page(None);
        settle().await;
        assert_eq!(f.controller.items().len(), 4);

        let (count, done) = counter();
        assert!(f.controller.refresh(Some(done)));
        settle().await;

        assert_eq!(f.controller.items(), items(&[9, 8]));
        assert_eq!(f.controller.criteria().page, 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(f.fetcher.calls().last().unwrap().page, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_next_guarded_on_last_page() {
        let f = fixture(2);
        f.fetcher.page(&[1], true);

        f.controller.start();
        settle().await;
        let before = f.controller.criteria();

        let (count, done) = counter();
        assert!(!f.controller.load_next_page(Some(done)));
        settle().await;

        assert_eq!(f.fetcher.calls().len(), 1);
        assert_eq!(f.controller.criteria(), before);
        assert_eq!(f.controller.items(), items(&[1]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_next_and_refresh_guarded_while_loading() {
        let f = fixture(2);
        let gate = f.fetcher.gate();

        f.controller.start();
        settle().await;
        assert!(f.controller.is_loading());

        assert!(!f.controller.load_next_page(None));
        assert!(!f.controller.refresh(None));
        assert_eq!(f.controller.criteria().page, 0);

        gate.send(Ok(PageResult::new(items(&[1, 2]), false))).unwrap();
        settle().await;

        assert_eq!(f.fetcher.calls().len(), 1);
        assert!(!f.controller.is_loading());
        assert_eq!(f.controller.items(), items(&[1, 2]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_fires_on_success_and_failure() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.page(&[3, 4], false);
        f.fetcher.reply(Reply::Fail(ServiceError::Unavailable.into()));

        f.controller.start();
        settle().await;

        let (ok_count, done) = counter();
        f.controller.load_next_page(Some(done));
        settle().await;
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
        assert!(!f.controller.is_loading());

        let (err_count, done) = counter();
        f.controller.load_next_page(Some(done));
        settle().await;
        assert_eq!(err_count.load(Ordering::SeqCst), 1);
        assert!(!f.controller.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_items_and_rolls_back_page() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.reply(Reply::Fail(FetchError::new("timeout")));
        f.fetcher.page(&[3], true);

        f.controller.start();
        settle().await;

        f.controller.load_next_page(None);
        settle().await;
        assert_eq!(f.controller.items(), items(&[1, 2]));
        assert!(!f.controller.last_page_reached());
        assert_eq!(f.controller.criteria().page, 0);

        let failures = f.notifier.failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            crate::notify::Notification::Failure { message, cause }
                if message == "Could not load items" && cause == "timeout"
        ));

        // retry asks for the same page again
        f.controller.load_next_page(None);
        settle().await;
        assert_eq!(f.fetcher.calls()[2].page, 1);
        assert_eq!(f.controller.items(), items(&[1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_completes_and_keeps_items() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.reply(Reply::Fail(ServiceError::Unavailable.into()));

        f.controller.start();
        settle().await;

        let (count, done) = counter();
        assert!(f.controller.refresh(Some(done)));
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!f.controller.is_loading());
        assert_eq!(f.controller.items(), items(&[1, 2]));
        assert!(!f.controller.last_page_reached());
        assert_eq!(f.controller.criteria().page, 0);
        assert_eq!(f.notifier.failures().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failure_recorded_before_loading_clears() {
        for _ in 0..50 {
            let f = fixture(2);
            f.fetcher.reply(Reply::Fail(FetchError::new("offline")));
            let mut revisions = f.controller.subscribe();

            f.controller.start();
            while f.controller.is_loading() {
                revisions.changed().await.unwrap();
            }
            assert_eq!(f.notifier.failures().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_edit_keeps_debounce_while_searching() {
        let f = fixture(25);
        f.controller.start();
        settle().await;
        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().filter("name", "abc"));
        settle().await;
        assert_eq!(f.fetcher.calls().len(), 2);

        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().sort(SortOrder::desc("name")));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(f.fetcher.calls().len(), 2);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let calls = f.fetcher.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].sort, SortOrder::desc("name"));
        assert_eq!(calls[2].filter("name"), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_within_delay_accumulate() {
        let f = fixture(25);
        f.controller.start();
        settle().await;

        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().filter("name", "rent"));
        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().sort(SortOrder::desc("name")));
        settle().await;

        let calls = f.fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].filter("name"), Some("rent"));
        assert_eq!(calls[1].sort, SortOrder::desc("name"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_text_filter_issues_one_fetch() {
        let f = fixture(25);
        f.controller.start();
        settle().await;

        for text in ["a", "ab", "abc"] {
            f.controller
                .on_filter_or_sort_changed(CriteriaUpdate::new().filter("name", text));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(f.fetcher.calls().len(), 1);

        settle().await;
        let calls = f.fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].filter("name"), Some("abc"));
        assert_eq!(calls[1].page, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_change_applies_without_delay() {
        let f = fixture(25);
        f.controller.start();
        settle().await;

        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().sort(SortOrder::desc("name")));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let calls = f.fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].sort, SortOrder::desc("name"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_resets_page_and_strips_empty_filter() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.page(&[3, 4], false);
        f.fetcher.page(&[7], true);
        f.fetcher.page(&[1, 2], false);

        f.controller.start();
        settle().await;
        f.controller.load_next_page(None);
        settle().await;
        assert_eq!(f.controller.criteria().page, 1);

        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().filter("name", "x"));
        settle().await;
        let calls = f.fetcher.calls();
        assert_eq!(calls[2].page, 0);
        assert_eq!(calls[2].filter("name"), Some("x"));
        assert_eq!(f.controller.items(), items(&[7]));

        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().filter("name", ""));
        settle().await;
        let calls = f.fetcher.calls();
        assert!(!calls[3].filters.contains_key("name"));
        assert!(!f.controller.criteria().filters.contains_key("name"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_issued_fetch_wins() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        let stale = f.fetcher.gate();
        let fresh = f.fetcher.gate();

        f.controller.start();
        settle().await;

        // append in flight, then a filter change overtakes it
        f.controller.load_next_page(None);
        settle().await;
        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().sort(SortOrder::desc("name")));
        settle().await;
        assert_eq!(f.fetcher.calls().len(), 3);

        fresh.send(Ok(PageResult::new(items(&[9]), true))).unwrap();
        settle().await;
        assert_eq!(f.controller.items(), items(&[9]));
        assert!(!f.controller.is_loading());

        stale.send(Ok(PageResult::new(items(&[3, 4]), false))).unwrap();
        settle().await;
        assert_eq!(f.controller.items(), items(&[9]));
        assert!(f.controller.last_page_reached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_after_stop_is_dropped() {
        let f = fixture(2);
        let gate = f.fetcher.gate();

        f.controller.start();
        settle().await;
        let mut revisions = f.controller.subscribe();
        revisions.borrow_and_update();

        f.controller.stop();
        assert!(!f.controller.is_started());
        assert!(!f.controller.is_loading());
        revisions.borrow_and_update();
        gate.send(Err(FetchError::new("late"))).unwrap();
        settle().await;

        assert!(f.controller.items().is_empty());
        assert!(f.notifier.failures().is_empty());
        assert!(!revisions.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop_and_restart_resets() {
        let f = fixture(2);
        f.fetcher.page(&[1, 2], false);
        f.fetcher.page(&[5], true);

        f.controller.start();
        f.controller.start();
        settle().await;
        assert_eq!(f.fetcher.calls().len(), 1);

        f.controller.stop();
        f.controller.start();
        settle().await;
        assert_eq!(f.fetcher.calls().len(), 2);
        assert_eq!(f.controller.items(), items(&[5]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_ignored_while_stopped() {
        let f = fixture(2);
        f.controller
            .on_filter_or_sort_changed(CriteriaUpdate::new().filter("name", "x"));
        assert!(!f.controller.load_next_page(None));
        assert!(!f.controller.refresh(None));
        settle().await;
        assert!(f.fetcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_drives_fetches_until_stop() {
        let (form, feed) = watch::channel(CriteriaUpdate::new());
        form.send(CriteriaUpdate::new().filter("name", "before start")).unwrap();
        let f = fixture_with(2, Some(feed));

        f.controller.start();
        settle().await;
        assert_eq!(f.fetcher.calls().len(), 1);

        form.send(CriteriaUpdate::new().filter("name", "rent")).unwrap();
        settle().await;
        let calls = f.fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].filter("name"), Some("rent"));

        f.controller.stop();
        form.send(CriteriaUpdate::new().filter("name", "ignored")).unwrap();
        settle().await;
        assert_eq!(f.fetcher.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_recomputed_from_all_items() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.page(&[1, 2], false);
        fetcher.page(&[3], true);
        let controller = ListControllerBuilder::new(
            "items",
            SortOrder::asc("name"),
            fetcher.clone() as Arc<dyn PageFetcher<Item>>,
            Arc::new(RecordingNotifier::new()) as Arc<dyn Notifier>,
        )
        .size(2)
        .build_with_view(|items: &[Item]| items.iter().map(|i| i.id).sum::<u32>());

        assert_eq!(controller.view(), 0);
        controller.start();
        settle().await;
        assert_eq!(controller.view(), 3);
        controller.load_next_page(None);
        settle().await;
        assert_eq!(controller.view(), 6);
        assert_eq!(controller.snapshot().items.len(), 3);
    }
}
