use crate::errors::{AppError, AppResult, AuthError};
use crate::models::{LoadState, Priority, Schedule, ScheduleDraft, ScheduleView, Status};
use crate::repository::{encode_fields, ScheduleRepository};
use crate::session::Session;
use crate::validators::{is_non_empty, is_valid_date, is_valid_time};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 500;

struct EngineState {
    raw: Vec<Schedule>,
    search_text: String,
    status_filter: Option<Status>,
    priority_filter: Option<Priority>,
    load: LoadState,
    error: Option<String>,
    /// Tag of the most recently initiated fetch. A finished fetch may
    /// only commit while its tag is still the latest; anything older is
    /// stale and gets dropped.
    issued: u64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            raw: Vec::new(),
            search_text: String::new(),
            status_filter: None,
            priority_filter: None,
            load: LoadState::Idle,
            error: None,
            issued: 0,
        }
    }
}

/// Single owner of the raw schedule list and everything derived from
/// it. Mutations go to the store first and the view only changes after
/// the follow-up fetch confirms what the store now holds.
pub struct ScheduleEngine {
    repository: ScheduleRepository,
    session: Arc<Session>,
    state: Mutex<EngineState>,
    view: watch::Sender<ScheduleView>,
}

impl ScheduleEngine {
    pub fn new(repository: ScheduleRepository, session: Arc<Session>) -> Self {
        let (view, _) = watch::channel(ScheduleView::idle());
        Self {
            repository,
            session,
            state: Mutex::new(EngineState::new()),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ScheduleView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> ScheduleView {
        let state = self.state.lock().expect("engine state mutex");
        build_view(&state)
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.update_state(move |state| state.search_text = text);
    }

    pub fn set_status_filter(&self, filter: Option<Status>) {
        self.update_state(move |state| state.status_filter = filter);
    }

    pub fn set_priority_filter(&self, filter: Option<Priority>) {
        self.update_state(move |state| state.priority_filter = filter);
    }

    /// One load cycle: Loading, then Loaded or Failed. Re-entrant; when
    /// fetches overlap, only the most recently initiated one commits.
    /// Signed out, the view resets to an empty Idle state.
    pub async fn refresh(&self) -> AppResult<()> {
        let Some(owner) = self.session.current_user() else {
            self.update_state(|state| {
                state.raw.clear();
                state.load = LoadState::Idle;
                state.error = None;
            });
            return Ok(());
        };

        let seq = {
            let mut state = self.state.lock().expect("engine state mutex");
            state.issued += 1;
            state.load = LoadState::Loading;
            self.view.send_replace(build_view(&state));
            state.issued
        };

        let result = self.repository.fetch_by_owner(&owner).await;

        let mut state = self.state.lock().expect("engine state mutex");
        if seq != state.issued {
            tracing::debug!(seq, latest = state.issued, "discarding stale fetch result");
            return Ok(());
        }

        match result {
            Ok(records) => {
                state.raw = records;
                state.load = LoadState::Loaded;
                state.error = None;
                self.view.send_replace(build_view(&state));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "schedule fetch failed");
                state.load = LoadState::Failed;
                state.error = Some(err.to_string());
                self.view.send_replace(build_view(&state));
                Err(err)
            }
        }
    }

    pub async fn add_schedule(&self, draft: ScheduleDraft) -> AppResult<String> {
        let owner = self.require_user()?;
        let draft = normalize(draft)?;
        let id = self.repository.create(&draft, &owner).await?;
        tracing::info!(id = %id, "schedule created");
        self.refresh().await?;
        Ok(id)
    }

    pub async fn update_schedule(&self, id: &str, draft: ScheduleDraft) -> AppResult<()> {
        self.require_user()?;
        let draft = normalize(draft)?;
        self.repository
            .update_fields(id, encode_fields(&draft, None))
            .await?;
        self.refresh().await
    }

    /// Always offered, whatever the current status; the only transition
    /// this operation knows is into `completed`.
    pub async fn mark_completed(&self, id: &str) -> AppResult<()> {
        self.require_user()?;
        self.repository
            .update_fields(id, json!({ "status": Status::Completed.as_str() }))
            .await?;
        self.refresh().await
    }

    pub async fn delete_schedule(&self, id: &str) -> AppResult<()> {
        self.require_user()?;
        self.repository.delete(id).await?;
        self.refresh().await
    }

    fn require_user(&self) -> AppResult<String> {
        self.session
            .current_user()
            .ok_or(AppError::Auth(AuthError::NotSignedIn))
    }

    fn update_state(&self, apply: impl FnOnce(&mut EngineState)) {
        let mut state = self.state.lock().expect("engine state mutex");
        apply(&mut state);
        self.view.send_replace(build_view(&state));
    }
}

fn build_view(state: &EngineState) -> ScheduleView {
    ScheduleView {
        load: state.load,
        schedules: apply_filters(
            &state.raw,
            &state.search_text,
            state.status_filter,
            state.priority_filter,
        ),
        total: state.raw.len(),
        error: state.error.clone(),
    }
}

/// Search, then status, then priority. The predicates are independent
/// and conjunctive; the order is fixed only for determinism. Search is
/// a case-insensitive substring match over title, description, and
/// category label.
fn apply_filters(
    raw: &[Schedule],
    search_text: &str,
    status: Option<Status>,
    priority: Option<Priority>,
) -> Vec<Schedule> {
    let mut filtered: Vec<Schedule> = raw.to_vec();

    let needle = search_text.trim().to_lowercase();
    if !needle.is_empty() {
        filtered.retain(|schedule| matches_search(schedule, &needle));
    }
    if let Some(status) = status {
        filtered.retain(|schedule| schedule.status == status);
    }
    if let Some(priority) = priority {
        filtered.retain(|schedule| schedule.priority == priority);
    }
    filtered
}

fn matches_search(schedule: &Schedule, needle: &str) -> bool {
    schedule.title.to_lowercase().contains(needle)
        || schedule.description.to_lowercase().contains(needle)
        || schedule.category.as_str().contains(needle)
}

/// Pre-flight normalization for add/update: trim everything, then
/// reject shapes the store should never see. Runs before any remote
/// call is attempted.
fn normalize(mut draft: ScheduleDraft) -> AppResult<ScheduleDraft> {
    draft.title = draft.title.trim().to_string();
    draft.description = draft.description.trim().to_string();
    draft.date = draft.date.trim().to_string();
    draft.time = draft.time.trim().to_string();

    if !is_non_empty(&draft.title) {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if draft.title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "title must be {} characters or fewer",
            MAX_TITLE_CHARS
        )));
    }
    if draft.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "description must be {} characters or fewer",
            MAX_DESCRIPTION_CHARS
        )));
    }
    if !is_valid_date(&draft.date) {
        return Err(AppError::Validation(
            "date must be in YYYY-MM-DD format".to_string(),
        ));
    }
    if !is_valid_time(&draft.time) {
        return Err(AppError::Validation(
            "time must be empty or in HH:MM format".to_string(),
        ));
    }
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryIdentity;
    use crate::adapters::{Document, IdentityProvider, RemoteStore};
    use crate::models::{AppSettings, Category};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schedule(id: &str, title: &str, status: Status, priority: Priority) -> Schedule {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        Schedule {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            title: title.to_string(),
            description: format!("{} details", title),
            date: "2024-06-01".to_string(),
            time: String::new(),
            priority,
            status,
            category: Category::Work,
            created_at: at,
            updated_at: at,
        }
    }

    fn sample() -> Vec<Schedule> {
        vec![
            schedule("a", "Gym session", Status::Pending, Priority::High),
            schedule("b", "Team standup", Status::InProgress, Priority::Medium),
            schedule("c", "Buy groceries", Status::Pending, Priority::Low),
            schedule("d", "Gym shopping", Status::Completed, Priority::High),
        ]
    }

    #[test]
    fn filter_returns_an_order_preserving_subset() {
        let raw = sample();
        let filtered = apply_filters(&raw, "", Some(Status::Pending), None);
        let ids: Vec<&str> = filtered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        // re-applying the same filters is a no-op
        let again = apply_filters(&filtered, "", Some(Status::Pending), None);
        assert_eq!(again, filtered);
    }

    #[test]
    fn filter_predicates_commute() {
        let raw = sample();
        let forward = apply_filters(&raw, "gym", Some(Status::Pending), Some(Priority::High));

        // priority, then status, then search
        let mut reverse: Vec<Schedule> = raw.clone();
        reverse.retain(|s| s.priority == Priority::High);
        reverse.retain(|s| s.status == Status::Pending);
        reverse.retain(|s| matches_search(s, "gym"));

        assert_eq!(forward, reverse);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].id, "a");
    }

    #[test]
    fn search_is_case_insensitive_over_title_description_and_category() {
        let raw = sample();
        assert_eq!(apply_filters(&raw, "GYM", None, None).len(), 2);
        assert_eq!(apply_filters(&raw, "standup details", None, None).len(), 1);
        assert_eq!(apply_filters(&raw, "work", None, None).len(), 4);
        assert_eq!(apply_filters(&raw, "nothing here", None, None).len(), 0);
    }

    #[test]
    fn search_over_empty_list_is_empty() {
        assert!(apply_filters(&[], "gym", None, None).is_empty());
    }

    #[test]
    fn normalize_trims_and_validates() {
        let draft = ScheduleDraft {
            title: "  Gym  ".to_string(),
            date: "2024-06-01".to_string(),
            time: " 07:30 ".to_string(),
            ..ScheduleDraft::default()
        };
        let normalized = normalize(draft).unwrap();
        assert_eq!(normalized.title, "Gym");
        assert_eq!(normalized.time, "07:30");

        let bad_date = ScheduleDraft {
            title: "Gym".to_string(),
            date: "June first".to_string(),
            ..ScheduleDraft::default()
        };
        assert!(matches!(normalize(bad_date), Err(AppError::Validation(_))));

        let bad_time = ScheduleDraft {
            title: "Gym".to_string(),
            date: "2024-06-01".to_string(),
            time: "7am".to_string(),
            ..ScheduleDraft::default()
        };
        assert!(matches!(normalize(bad_time), Err(AppError::Validation(_))));
    }

    /// Store double that only counts calls; any traffic during a test
    /// that expects local rejection is a failure.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteStore for CountingStore {
        async fn query(&self, _collection: &str, _owner_id: &str) -> AppResult<Vec<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn insert(&self, _collection: &str, _fields: Value) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("id".to_string())
        }

        async fn patch(&self, _collection: &str, _id: &str, _fields: Value) -> AppResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn remove(&self, _collection: &str, _id: &str) -> AppResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    async fn signed_in_session() -> Arc<Session> {
        let identity = Arc::new(MemoryIdentity::new());
        let session = Arc::new(Session::new(identity.clone()));
        session.start();
        identity.sign_up("ana@example.com", "secret1").await.unwrap();
        session
            .subscribe()
            .wait_for(|state| state.user_id.is_some())
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn empty_title_is_rejected_before_any_remote_call() {
        let store = Arc::new(CountingStore::default());
        let session = signed_in_session().await;
        let engine = ScheduleEngine::new(
            ScheduleRepository::new(store.clone(), &AppSettings::default()),
            session,
        );

        let err = engine
            .add_schedule(ScheduleDraft {
                title: "   ".to_string(),
                date: "2024-06-01".to_string(),
                ..ScheduleDraft::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(engine.snapshot().schedules.is_empty());
    }

    #[tokio::test]
    async fn mutations_require_a_signed_in_user() {
        let store = Arc::new(CountingStore::default());
        let identity = Arc::new(MemoryIdentity::new());
        let session = Arc::new(Session::new(identity));
        session.start();
        session
            .subscribe()
            .wait_for(|state| !state.loading)
            .await
            .unwrap();

        let engine = ScheduleEngine::new(
            ScheduleRepository::new(store.clone(), &AppSettings::default()),
            session,
        );

        let err = engine.mark_completed("s1").await.unwrap_err();
        assert_eq!(err, AppError::Auth(AuthError::NotSignedIn));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_while_signed_out_resets_to_idle() {
        let store = Arc::new(CountingStore::default());
        let identity = Arc::new(MemoryIdentity::new());
        let session = Arc::new(Session::new(identity));
        session.start();
        session
            .subscribe()
            .wait_for(|state| !state.loading)
            .await
            .unwrap();

        let engine = ScheduleEngine::new(
            ScheduleRepository::new(store.clone(), &AppSettings::default()),
            session,
        );

        engine.refresh().await.unwrap();
        let view = engine.snapshot();
        assert_eq!(view.load, LoadState::Idle);
        assert!(view.schedules.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}
