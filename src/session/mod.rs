//! A board being viewed: the settings snapshot, the active board, its
//! current classification, and the timers that keep it fresh.

pub mod schedule;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};

use crate::io::index::{ExternalIndex, IndexError};
use crate::io::store::{NoteStore, StoreError};
use crate::model::board::Board;
use crate::model::config::{ConfigError, Settings, SettingsPatch};
use crate::model::note::Note;
use crate::ops::index_adapter::IndexAdapter;
use crate::ops::membership::{Classification, classify, signature};
use crate::ops::rewrite::{self, MoveOutcome, RewriteError};
use crate::ops::scan::scan_notes_by_tags;

pub use schedule::ScheduledTask;

/// Wait between a note write and the refresh that picks it up, so the
/// store's metadata cache can catch up with the write.
pub const REFRESH_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("board not found: {0}")]
    BoardNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Always publishes a new state
    Manual,
    /// Publishes only when the classification changed
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Changed,
    Unchanged,
}

/// The published classification of the active board
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesState {
    pub board_id: Option<String>,
    pub columns: Classification,
    /// Message of the last failed refresh or move, cleared on success
    pub error: Option<String>,
    /// Bumped on every publish
    pub revision: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl NotesState {
    /// Every note on the board, once each, in column order.
    pub fn notes(&self) -> Vec<&Note> {
        let mut seen = HashSet::new();
        self.columns
            .values()
            .flatten()
            .filter(|n| seen.insert(n.path.as_str()))
            .collect()
    }
}

struct Inner<S, I> {
    store: Arc<S>,
    adapter: IndexAdapter<S, I>,
    settings: RwLock<Settings>,
    active_board: RwLock<Option<String>>,
    state: RwLock<NotesState>,
    /// Refreshes run one at a time
    refreshing: tokio::sync::Mutex<()>,
    revisions: watch::Sender<u64>,
}

impl<S: NoteStore, I: ExternalIndex> Inner<S, I> {
    async fn classify_board(
        &self,
        board: &Board,
        settings: &Settings,
    ) -> Result<Classification, SessionError> {
        if settings.use_dataview_queries && self.adapter.is_available() {
            match self.classify_indexed(board).await {
                Ok(columns) => return Ok(columns),
                Err(e) if settings.dataview_fallback => {
                    tracing::warn!(board = %board.id, error = %e, "falling back to vault scan");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.classify_scanned(board).await
    }

    async fn classify_indexed(&self, board: &Board) -> Result<Classification, IndexError> {
        let mut columns = Classification::new();
        for column in board.ordered_columns() {
            let notes = self
                .adapter
                .query_for_column(board.filter_query(), &column.tag)
                .await?;
            columns.insert(column.id.clone(), notes);
        }
        Ok(columns)
    }

    async fn classify_scanned(&self, board: &Board) -> Result<Classification, SessionError> {
        let notes = scan_notes_by_tags(&*self.store, &board.column_tags()).await?;
        Ok(classify(board, &notes))
    }

    async fn refresh(&self, kind: RefreshKind) -> Result<RefreshOutcome, SessionError> {
        let _running = self.refreshing.lock().await;
        let settings = self.settings.read().await.clone();
        let active = self.active_board.read().await.clone();
        let Some(board) = active.as_deref().and_then(|id| settings.board(id)) else {
            return Ok(RefreshOutcome::Unchanged);
        };

        let result = self.classify_board(board, &settings).await;
        let mut state = self.state.write().await;
        let columns = match result {
            Ok(columns) => columns,
            Err(e) => {
                state.error = Some(e.to_string());
                return Err(e);
            }
        };

        if kind == RefreshKind::Auto
            && state.error.is_none()
            && state.board_id.as_deref() == Some(board.id.as_str())
            && signature(&state.columns) == signature(&columns)
        {
            tracing::debug!(board = %board.id, "auto refresh found no changes");
            return Ok(RefreshOutcome::Unchanged);
        }

        state.board_id = Some(board.id.clone());
        state.columns = columns;
        state.error = None;
        state.revision += 1;
        state.refreshed_at = Some(Utc::now());
        self.revisions.send_replace(state.revision);
        tracing::debug!(board = %board.id, revision = state.revision, ?kind, "published board");
        Ok(RefreshOutcome::Changed)
    }

    /// Refresh from a timer; failures are already recorded in the state.
    async fn background_refresh(&self, kind: RefreshKind) {
        if let Err(e) = self.refresh(kind).await {
            tracing::warn!(error = %e, ?kind, "background refresh failed");
        }
    }
}

/// Orchestrates classification of one active board.
///
/// Must be used from within a tokio runtime: moves and auto-refresh spawn
/// timer tasks.
pub struct BoardSession<S, I> {
    inner: Arc<Inner<S, I>>,
    auto_refresh: Mutex<Option<ScheduledTask>>,
    pending_refresh: Mutex<Option<ScheduledTask>>,
}

impl<S: NoteStore, I: ExternalIndex> BoardSession<S, I> {
    pub fn new(store: Arc<S>, index: Arc<I>, settings: Settings) -> Self {
        let active = settings.default_board.clone();
        let (revisions, _) = watch::channel(0);
        BoardSession {
            inner: Arc::new(Inner {
                adapter: IndexAdapter::new(Arc::clone(&store), index),
                store,
                settings: RwLock::new(settings),
                active_board: RwLock::new(active),
                state: RwLock::new(NotesState::default()),
                refreshing: tokio::sync::Mutex::new(()),
                revisions,
            }),
            auto_refresh: Mutex::new(None),
            pending_refresh: Mutex::new(None),
        }
    }

    pub async fn settings(&self) -> Settings {
        self.inner.settings.read().await.clone()
    }

    pub async fn state(&self) -> NotesState {
        self.inner.state.read().await.clone()
    }

    /// Watch the published revision number.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revisions.subscribe()
    }

    pub async fn active_board(&self) -> Option<Board> {
        let active = self.inner.active_board.read().await.clone()?;
        self.inner.settings.read().await.board(&active).cloned()
    }

    /// Switch boards (by id or name) and classify the new one.
    pub async fn set_active_board(&self, key: &str) -> Result<RefreshOutcome, SessionError> {
        let id = self
            .inner
            .settings
            .read()
            .await
            .find_board(key)
            .map(|b| b.id.clone())
            .ok_or_else(|| SessionError::BoardNotFound(key.to_string()))?;
        *self.inner.active_board.write().await = Some(id);
        self.refresh(RefreshKind::Manual).await
    }

    /// Classify a board without publishing anything.
    pub async fn classify_board(&self, board: &Board) -> Result<Classification, SessionError> {
        let settings = self.inner.settings.read().await.clone();
        self.inner.classify_board(board, &settings).await
    }

    pub async fn refresh(&self, kind: RefreshKind) -> Result<RefreshOutcome, SessionError> {
        self.inner.refresh(kind).await
    }

    /// Move a note between columns by renaming its tag. When the note was
    /// rewritten, a refresh follows after `REFRESH_SETTLE_DELAY`; the
    /// published state may lag until then.
    pub async fn move_note(
        &self,
        path: &str,
        from: &str,
        to: &str,
    ) -> Result<MoveOutcome, SessionError> {
        match rewrite::move_note(&*self.inner.store, path, from, to).await {
            Ok(outcome) => {
                self.inner.state.write().await.error = None;
                if matches!(outcome, MoveOutcome::Rewritten { .. }) {
                    self.schedule_refresh(REFRESH_SETTLE_DELAY);
                }
                Ok(outcome)
            }
            Err(e) => {
                self.inner.state.write().await.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Queue a manual refresh. A refresh already queued is replaced.
    fn schedule_refresh(&self, delay: Duration) {
        let inner = Arc::clone(&self.inner);
        let task = ScheduledTask::after(delay, move || async move {
            inner.background_refresh(RefreshKind::Manual).await;
        });
        *self
            .pending_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Start periodic auto-refresh per the current settings. Returns
    /// whether a timer is now running.
    pub async fn start_auto_refresh(&self) -> bool {
        let settings = self.inner.settings.read().await.clone();
        let mut slot = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        if !settings.auto_refresh_enabled {
            return false;
        }
        if let Err(e) = settings.validate() {
            tracing::warn!(error = %e, "auto refresh not started");
            return false;
        }
        let period = Duration::from_secs(settings.auto_refresh_interval);
        let inner = Arc::clone(&self.inner);
        *slot = Some(ScheduledTask::every(period, move || {
            let inner = Arc::clone(&inner);
            async move { inner.background_refresh(RefreshKind::Auto).await }
        }));
        tracing::debug!(seconds = settings.auto_refresh_interval, "auto refresh started");
        true
    }

    pub fn stop_auto_refresh(&self) {
        let stopped = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if stopped.is_some() {
            tracing::debug!("auto refresh stopped");
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Apply a settings patch, producing a new snapshot. A running
    /// auto-refresh is restarted with the new interval.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, SessionError> {
        let next = {
            let mut settings = self.inner.settings.write().await;
            let next = settings.apply(patch)?;
            *settings = next.clone();
            next
        };
        {
            let mut active = self.inner.active_board.write().await;
            if active.as_deref().is_some_and(|id| next.board(id).is_none()) {
                *active = None;
            }
        }
        if self.is_auto_refreshing() {
            self.start_auto_refresh().await;
        }
        Ok(next)
    }

    /// Cancel all timers, waiting for a refresh in progress to finish.
    pub async fn shutdown(&self) {
        let tasks = [
            self.auto_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
            self.pending_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        ];
        for task in tasks.into_iter().flatten() {
            task.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::index::{IndexEntry, IndexHit, LocalIndex, NoIndex};
    use crate::io::store::MemoryStore;
    use crate::model::board::Column;
    use pretty_assertions::assert_eq;

    struct FailingIndex;

    impl ExternalIndex for FailingIndex {
        fn is_available(&self) -> bool {
            true
        }

        async fn query(&self, _query: &str) -> Result<Vec<IndexHit>, IndexError> {
            Err(IndexError::Query("index offline".into()))
        }
    }

    fn board() -> Board {
        let now = Utc::now();
        let column = |id: &str, order| Column {
            id: id.into(),
            name: id.into(),
            tag: id.into(),
            color: None,
            order,
        };
        Board {
            id: "work".into(),
            name: "Work".into(),
            filter: None,
            created_at: now,
            updated_at: now,
            columns: vec![column("todo", 0), column("doing", 1), column("done", 2)],
        }
    }

    fn settings() -> Settings {
        Settings {
            boards: vec![board()],
            default_board: Some("work".into()),
            ..Settings::default()
        }
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_notes([
            ("a.md", "---\ntags: [todo]\n---\n"),
            ("b.md", "#doing"),
            ("c.md", "nothing"),
        ]))
    }

    fn column_paths(state: &NotesState, column: &str) -> Vec<String> {
        state.columns[column].iter().map(|n| n.path.clone()).collect()
    }

    #[tokio::test]
    async fn manual_refresh_always_publishes() {
        let session = BoardSession::new(store(), Arc::new(NoIndex), settings());
        assert_eq!(session.refresh(RefreshKind::Manual).await.unwrap(), RefreshOutcome::Changed);
        assert_eq!(session.refresh(RefreshKind::Manual).await.unwrap(), RefreshOutcome::Changed);
        let state = session.state().await;
        assert_eq!(state.revision, 2);
        assert_eq!(column_paths(&state, "todo"), vec!["a.md"]);
        assert_eq!(column_paths(&state, "doing"), vec!["b.md"]);
        assert!(column_paths(&state, "done").is_empty());
        assert_eq!(state.notes().len(), 2);
    }

    #[tokio::test]
    async fn auto_refresh_reports_no_change() {
        let session = BoardSession::new(store(), Arc::new(NoIndex), settings());
        let mut revisions = session.subscribe();
        session.refresh(RefreshKind::Manual).await.unwrap();
        assert!(revisions.has_changed().unwrap());
        revisions.borrow_and_update();

        assert_eq!(session.refresh(RefreshKind::Auto).await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(session.refresh(RefreshKind::Auto).await.unwrap(), RefreshOutcome::Unchanged);
        assert!(!revisions.has_changed().unwrap());
        assert_eq!(session.state().await.revision, 1);
    }

    #[tokio::test]
    async fn no_active_board_is_unchanged() {
        let mut s = settings();
        s.default_board = None;
        let session = BoardSession::new(store(), Arc::new(NoIndex), s);
        assert_eq!(session.refresh(RefreshKind::Manual).await.unwrap(), RefreshOutcome::Unchanged);
        assert!(matches!(
            session.set_active_board("nope").await,
            Err(SessionError::BoardNotFound(_))
        ));
        assert_eq!(session.set_active_board("WORK").await.unwrap(), RefreshOutcome::Changed);
    }

    #[tokio::test]
    async fn index_path_used_when_enabled() {
        // The index only knows a.md, so b.md is absent from the board.
        let index = LocalIndex::from_entries(vec![IndexEntry {
            path: "a.md".into(),
            name: "a.md".into(),
            tags: vec!["todo".into()],
        }]);
        let mut s = settings();
        s.use_dataview_queries = true;
        let session = BoardSession::new(store(), Arc::new(index), s);
        session.refresh(RefreshKind::Manual).await.unwrap();
        let state = session.state().await;
        assert_eq!(column_paths(&state, "todo"), vec!["a.md"]);
        assert!(column_paths(&state, "doing").is_empty());
    }

    #[tokio::test]
    async fn index_failure_falls_back_to_scan() {
        let mut s = settings();
        s.use_dataview_queries = true;
        let session = BoardSession::new(store(), Arc::new(FailingIndex), s);
        session.refresh(RefreshKind::Manual).await.unwrap();
        let state = session.state().await;
        assert_eq!(column_paths(&state, "doing"), vec!["b.md"]);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn index_failure_without_fallback_is_reported() {
        let mut s = settings();
        s.use_dataview_queries = true;
        s.dataview_fallback = false;
        let session = BoardSession::new(store(), Arc::new(FailingIndex), s);
        let err = session.refresh(RefreshKind::Manual).await.unwrap_err();
        assert!(matches!(err, SessionError::Index(IndexError::Query(_))));
        let state = session.state().await;
        assert!(state.error.unwrap().contains("index query failed"));
        assert_eq!(state.revision, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn move_refreshes_after_settle_delay() {
        let store = store();
        let session = BoardSession::new(Arc::clone(&store), Arc::new(NoIndex), settings());
        session.refresh(RefreshKind::Manual).await.unwrap();

        let outcome = session.move_note("b.md", "doing", "done").await.unwrap();
        assert!(matches!(outcome, MoveOutcome::Rewritten { .. }));
        assert_eq!(store.get("b.md").unwrap(), "#done");

        // Still the pre-move classification until the deferred refresh runs.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = session.state().await;
        assert_eq!(state.revision, 1);
        assert_eq!(column_paths(&state, "doing"), vec!["b.md"]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = session.state().await;
        assert_eq!(state.revision, 2);
        assert!(column_paths(&state, "doing").is_empty());
        assert_eq!(column_paths(&state, "done"), vec!["b.md"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_move_schedules_nothing() {
        let store = store();
        let session = BoardSession::new(Arc::clone(&store), Arc::new(NoIndex), settings());
        session.refresh(RefreshKind::Manual).await.unwrap();
        let outcome = session.move_note("c.md", "todo", "done").await.unwrap();
        assert_eq!(outcome, MoveOutcome::Unchanged);
        assert_eq!(store.write_count(), 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(session.state().await.revision, 1);
    }

    #[tokio::test]
    async fn move_errors_are_recorded() {
        let session = BoardSession::new(store(), Arc::new(NoIndex), settings());
        let err = session.move_note("zzz.md", "todo", "done").await.unwrap_err();
        assert!(matches!(err, SessionError::Rewrite(RewriteError::NotFound(_))));
        assert_eq!(
            session.state().await.error.as_deref(),
            Some("note not found: zzz.md")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_picks_up_external_edits_and_stops() {
        let store = store();
        let session = BoardSession::new(Arc::clone(&store), Arc::new(NoIndex), settings());
        session.refresh(RefreshKind::Manual).await.unwrap();
        assert!(session.start_auto_refresh().await);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(session.state().await.revision, 1);

        store.insert("c.md", "#done");
        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = session.state().await;
        assert_eq!(state.revision, 2);
        assert_eq!(column_paths(&state, "done"), vec!["c.md"]);

        session.stop_auto_refresh();
        assert!(!session.is_auto_refreshing());
        store.insert("c.md", "#todo");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(session.state().await.revision, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_auto_refresh_does_not_start() {
        let mut s = settings();
        s.auto_refresh_enabled = false;
        let session = BoardSession::new(store(), Arc::new(NoIndex), s);
        assert!(!session.start_auto_refresh().await);
        assert!(!session.is_auto_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_interval_does_not_start() {
        let mut s = settings();
        s.auto_refresh_interval = i64::MAX as u64;
        let session = BoardSession::new(store(), Arc::new(NoIndex), s);
        assert!(!session.start_auto_refresh().await);
        assert!(!session.is_auto_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn update_settings_restarts_timer_and_validates() {
        let session = BoardSession::new(store(), Arc::new(NoIndex), settings());
        session.refresh(RefreshKind::Manual).await.unwrap();
        session.start_auto_refresh().await;

        let patch = SettingsPatch {
            auto_refresh_interval: Some(61),
            ..Default::default()
        };
        assert!(matches!(
            session.update_settings(&patch).await,
            Err(SessionError::Config(ConfigError::IntervalOutOfRange(61)))
        ));

        let patch = SettingsPatch {
            auto_refresh_interval: Some(1),
            ..Default::default()
        };
        let next = session.update_settings(&patch).await.unwrap();
        assert_eq!(next.auto_refresh_interval, 1);
        assert!(session.is_auto_refreshing());
        assert_eq!(session.settings().await.auto_refresh_interval, 1);

        let patch = SettingsPatch {
            boards: Some(Vec::new()),
            ..Default::default()
        };
        session.update_settings(&patch).await.unwrap();
        assert!(session.active_board().await.is_none());
        session.shutdown().await;
        assert!(!session.is_auto_refreshing());
    }
}
