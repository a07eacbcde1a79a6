use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use quiz_core::model::{NoteRecord, ResultBundle};
use quiz_core::{Clock, SessionName, current_session_name, next_session_name};
use storage::repository::{AuthToken, KeyValueStore, ResultBackend, SESSION_KEY};

/// What the notepad / session-identity path needs at teardown.
#[derive(Debug, Clone, Default)]
pub struct TeardownRequest {
    pub note: String,
    pub looked_up_words: Vec<String>,
    /// Name the attempt ran under; `None` if it never started.
    pub session_name: Option<SessionName>,
    pub token: Option<AuthToken>,
}

/// Persistence calls still in flight after a session ended.
#[must_use = "dropping PendingSync detaches the tasks; call settle() to wait for them"]
#[derive(Debug, Default)]
pub struct PendingSync {
    handles: Vec<JoinHandle<()>>,
}

impl PendingSync {
    pub(crate) fn extend(&mut self, handles: impl IntoIterator<Item = JoinHandle<()>>) {
        self.handles.extend(handles);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every call to finish. Failures were already logged by the
    /// tasks themselves.
    pub async fn settle(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(%err, "persistence task did not finish");
            }
        }
    }
}

/// Fire-and-forget persistence of batch results and session identity.
///
/// Every request runs in its own task; a failure is logged and has no effect
/// on the others. Nothing is retried.
#[derive(Clone)]
pub struct ResultSync {
    clock: Clock,
    backend: Arc<dyn ResultBackend>,
    store: Arc<dyn KeyValueStore>,
}

impl ResultSync {
    #[must_use]
    pub fn new(clock: Clock, backend: Arc<dyn ResultBackend>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            clock,
            backend,
            store,
        }
    }

    /// Submit the dashboard record, the mistake record (if any) and the
    /// last-session pointer. Anonymous sessions are not recorded.
    pub fn submit_results(
        &self,
        bundle: &ResultBundle,
        token: Option<&AuthToken>,
    ) -> Vec<JoinHandle<()>> {
        let Some(token) = token else {
            tracing::debug!(
                session = %bundle.dashboard.session_name,
                "anonymous session, results not recorded"
            );
            return Vec::new();
        };
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no runtime available, results not recorded");
            return Vec::new();
        };

        let mut handles = Vec::with_capacity(3);

        let backend = Arc::clone(&self.backend);
        let auth = token.clone();
        let record = bundle.dashboard.clone();
        handles.push(runtime.spawn(async move {
            if let Err(err) = backend.post_dashboard(&auth, &record).await {
                tracing::warn!(%err, session = %record.session_name, "dashboard record not saved");
            }
        }));

        if let Some(record) = bundle.mistakes.clone() {
            let backend = Arc::clone(&self.backend);
            let auth = token.clone();
            handles.push(runtime.spawn(async move {
                if let Err(err) = backend.post_mistakes(&auth, &record).await {
                    tracing::warn!(%err, session = %record.session_name, "mistake record not saved");
                }
            }));
        }

        let backend = Arc::clone(&self.backend);
        let auth = token.clone();
        let pointer = bundle.last_session.clone();
        handles.push(runtime.spawn(async move {
            if let Err(err) = backend.post_last_session(&auth, &pointer).await {
                tracing::warn!(%err, session = %pointer.session_name, "last session not saved");
            }
        }));

        handles
    }

    /// Save the notepad entry, then move the stored session name forward.
    ///
    /// The identity is advanced once the note call has settled, whatever its
    /// outcome, and also for anonymous users. The next name is derived from
    /// the stored one only; an empty store yields the day's first session.
    pub fn teardown(&self, request: TeardownRequest) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no runtime available, teardown skipped");
            return None;
        };
        let backend = Arc::clone(&self.backend);
        let store = Arc::clone(&self.store);
        let clock = self.clock;

        Some(runtime.spawn(async move {
            let session_name = match request.session_name {
                Some(name) => name,
                None => {
                    let stored = store.get(SESSION_KEY).await.unwrap_or_else(|err| {
                        tracing::warn!(%err, "could not read session name");
                        None
                    });
                    current_session_name(stored.as_deref(), clock.today())
                }
            };

            if let Some(token) = &request.token {
                let note = NoteRecord::compose(
                    &request.note,
                    &request.looked_up_words,
                    session_name,
                );
                if let Some(note) = note {
                    if let Err(err) = backend.post_note(token, &note).await {
                        tracing::warn!(%err, session = %session_name, "note not saved");
                    }
                }
            }

            let today = clock.today();
            let allocated = store
                .replace_with(
                    SESSION_KEY,
                    Box::new(move |previous| {
                        next_session_name(previous.as_deref(), today).to_string()
                    }),
                )
                .await;
            match allocated {
                Ok(next) => tracing::info!(previous = %session_name, %next, "session advanced"),
                Err(err) => tracing::warn!(%err, "session name not advanced"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        CourseId, DashboardRecord, LastSessionPointer, MistakeRecord, QuestionId, ScoreSummary,
    };
    use quiz_core::time::fixed_clock;
    use storage::repository::{Endpoint, InMemoryKeyValueStore, PostedRecord, RecordingBackend};

    fn name(raw: &str) -> SessionName {
        raw.parse().unwrap()
    }

    fn bundle(with_mistakes: bool) -> ResultBundle {
        let session_name = name("2025-06-01_2");
        ResultBundle {
            summary: ScoreSummary::compute(5, 2, 100, 40),
            dashboard: DashboardRecord {
                total: 5,
                correct: 3,
                time_remaining: 40,
                time_per_question: 20,
                course_id: CourseId::new(1),
                session_name,
            },
            mistakes: with_mistakes.then(|| MistakeRecord {
                wrong_question_ids: vec![QuestionId::new(2)],
                session_name,
            }),
            last_session: LastSessionPointer { session_name },
        }
    }

    fn sync() -> (ResultSync, RecordingBackend, InMemoryKeyValueStore) {
        let backend = RecordingBackend::new();
        let store = InMemoryKeyValueStore::new();
        let sync = ResultSync::new(
            fixed_clock(),
            Arc::new(backend.clone()),
            Arc::new(store.clone()),
        );
        (sync, backend, store)
    }

    async fn settle(handles: Vec<JoinHandle<()>>) {
        let mut pending = PendingSync::default();
        pending.extend(handles);
        pending.settle().await;
    }

    #[tokio::test]
    async fn submits_three_independent_records() {
        let (sync, backend, _store) = sync();
        settle(sync.submit_results(&bundle(true), Some(&AuthToken::new("t")))).await;

        let mut endpoints: Vec<_> = backend
            .posted()
            .unwrap()
            .iter()
            .map(PostedRecord::endpoint)
            .collect();
        endpoints.sort_by_key(|e| e.path());
        assert_eq!(
            endpoints,
            vec![Endpoint::Dashboard, Endpoint::Mistakes, Endpoint::LastSession]
        );
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_others() {
        let (sync, backend, _store) = sync();
        backend.fail_endpoint(Endpoint::Dashboard).unwrap();
        settle(sync.submit_results(&bundle(false), Some(&AuthToken::new("t")))).await;

        let posted = backend.posted().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].endpoint(), Endpoint::LastSession);
    }

    #[tokio::test]
    async fn anonymous_results_are_skipped() {
        let (sync, backend, _store) = sync();
        assert!(sync.submit_results(&bundle(true), None).is_empty());
        assert!(backend.posted().unwrap().is_empty());
    }

    #[tokio::test]
    async fn teardown_posts_note_then_advances_session() {
        let (sync, backend, store) = sync();
        store.set(SESSION_KEY, "2025-06-01_2").await.unwrap();

        let handle = sync
            .teardown(TeardownRequest {
                note: "review particles".into(),
                looked_up_words: vec!["은".into()],
                session_name: Some(name("2025-06-01_2")),
                token: Some(AuthToken::new("t")),
            })
            .unwrap();
        handle.await.unwrap();

        let posted = backend.posted().unwrap();
        assert_eq!(
            posted,
            vec![PostedRecord::Note(NoteRecord {
                note: "review particles\n\n은".into(),
                session_name: name("2025-06-01_2"),
            })]
        );
        assert_eq!(
            store.get(SESSION_KEY).await.unwrap().as_deref(),
            Some("2025-06-01_3")
        );
    }

    #[tokio::test]
    async fn failed_note_still_advances_session() {
        let (sync, backend, store) = sync();
        backend.fail_endpoint(Endpoint::Notepad).unwrap();

        sync.teardown(TeardownRequest {
            note: "x".into(),
            session_name: Some(name("2025-06-01_1")),
            token: Some(AuthToken::new("t")),
            ..TeardownRequest::default()
        })
        .unwrap()
        .await
        .unwrap();

        assert!(backend.posted().unwrap().is_empty());
        assert_eq!(
            store.get(SESSION_KEY).await.unwrap().as_deref(),
            Some("2025-06-01_1")
        );
    }

    #[tokio::test]
    async fn overlapping_teardowns_get_distinct_names() {
        let (sync, _backend, store) = sync();
        store.set(SESSION_KEY, "2025-06-01_1").await.unwrap();

        let first = sync.teardown(TeardownRequest::default()).unwrap();
        let second = sync.teardown(TeardownRequest::default()).unwrap();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(
            store.get(SESSION_KEY).await.unwrap().as_deref(),
            Some("2025-06-01_3")
        );
    }

    #[tokio::test]
    async fn empty_store_allocates_first_session_of_the_day() {
        let (sync, _backend, store) = sync();
        sync.teardown(TeardownRequest {
            session_name: Some(name("2025-06-01_1")),
            ..TeardownRequest::default()
        })
        .unwrap()
        .await
        .unwrap();
        assert_eq!(
            store.get(SESSION_KEY).await.unwrap().as_deref(),
            Some("2025-06-01_1")
        );
    }

    #[tokio::test]
    async fn stale_day_rolls_over() {
        let (sync, _backend, store) = sync();
        store.set(SESSION_KEY, "2025-05-31_7").await.unwrap();
        sync.teardown(TeardownRequest::default())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(
            store.get(SESSION_KEY).await.unwrap().as_deref(),
            Some("2025-06-01_1")
        );
    }
}
