use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rng;
use rand::seq::SliceRandom;
use tokio::sync::broadcast;

use quiz_core::model::{
    Phase, Question, QuizConfigDraft, QuizSession, ResultBundle, SessionError, SessionEvent,
    SessionNotice, SessionSnapshot,
};
use quiz_core::{Clock, current_session_name};
use storage::repository::{
    AUTH_TOKEN_KEY, AuthToken, KeyValueStore, QuestionBank, ResultBackend, SESSION_KEY,
};

use super::result_sync::{PendingSync, ResultSync, TeardownRequest};
use crate::error::QuizError;
use crate::timer::{CountdownTimer, TimerState};

const NOTICE_CAPACITY: usize = 64;

/// Drives one quiz attempt: wires the state machine to the question bank,
/// the countdown timer and result persistence.
///
/// Dropping the engine releases the timer; [`QuizEngine::teardown`] also runs
/// the notepad and session-identity path.
pub struct QuizEngine {
    clock: Clock,
    questions: Arc<dyn QuestionBank>,
    store: Arc<dyn KeyValueStore>,
    sync: ResultSync,
    session: Arc<Mutex<QuizSession>>,
    timer: CountdownTimer,
    notices: broadcast::Sender<SessionNotice>,
    token: Option<AuthToken>,
    shuffle: bool,
    pending: PendingSync,
}

impl QuizEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionBank>,
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn ResultBackend>,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            clock,
            questions,
            sync: ResultSync::new(clock, backend, Arc::clone(&store)),
            store,
            session: Arc::new(Mutex::new(QuizSession::new())),
            timer: CountdownTimer::new(),
            notices,
            token: None,
            shuffle: false,
            pending: PendingSync::default(),
        }
    }

    /// Shuffle the fetched batch before it is asked.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Use a custom tick source, e.g. a shorter period.
    #[must_use]
    pub fn with_timer(mut self, timer: CountdownTimer) -> Self {
        self.timer = timer;
        self
    }

    /// Receive every transition notice from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Set question count, time budget and course.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` if the draft is invalid; a missing course
    /// leaves the engine in `Phase::MissingCourseData` (see [`QuizError::is_missing_course`]).
    pub fn configure(&mut self, draft: QuizConfigDraft) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::Configure(draft)).map(drop)
    }

    /// Leave the missing-course state.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the engine is in `Phase::MissingCourseData`.
    pub fn go_back(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::GoBack).map(drop)
    }

    /// Fetch the batch and start the clock.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` if the engine is not configured (no fetch is
    /// made then), `QuizError::Fetch` if the question bank fails, and
    /// `SessionError::Empty` if it has nothing for the course. In every error
    /// case the engine stays in `Phase::Configuring`.
    pub async fn start(&mut self) -> Result<(), QuizError> {
        let config = {
            let session = self.lock()?;
            if session.phase() != Phase::Configuring {
                return Err(SessionError::InvalidTransition {
                    event: "start",
                    phase: session.phase(),
                }
                .into());
            }
            session.config().cloned().ok_or(SessionError::NotConfigured)?
        };

        self.token = self.read_key(AUTH_TOKEN_KEY).await.map(AuthToken::new);
        let stored = self.read_key(SESSION_KEY).await;
        let session_name = current_session_name(stored.as_deref(), self.clock.today());

        let mut questions = self
            .questions
            .fetch_questions(config.course_id(), config.question_count())
            .await
            .map_err(|err| {
                tracing::warn!(%err, course = %config.course_id(), "question fetch failed");
                QuizError::Fetch(err)
            })?;
        if self.shuffle {
            questions.shuffle(&mut rng());
        }

        self.dispatch(SessionEvent::QuestionsLoaded {
            questions,
            session_name,
        })?;

        let session = Arc::clone(&self.session);
        let notices = self.notices.clone();
        self.timer.start(move || {
            let produced = match session.lock() {
                Ok(mut guard) => guard.dispatch(SessionEvent::Tick),
                Err(_) => {
                    tracing::warn!("session lock poisoned, tick dropped");
                    return;
                }
            };
            for notice in produced.unwrap_or_default() {
                let _ = notices.send(notice);
            }
        })?;

        tracing::info!(
            session = %session_name,
            course = %config.course_id(),
            anonymous = self.token.is_none(),
            "quiz started"
        );
        Ok(())
    }

    /// Feed one event to the state machine and react to what it reports.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` when the event is not valid in the current phase.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Vec<SessionNotice>, QuizError> {
        let notices = self.lock()?.dispatch(event)?;
        for notice in &notices {
            self.react(notice);
            let _ = self.notices.send(notice.clone());
        }
        Ok(notices)
    }

    fn react(&mut self, notice: &SessionNotice) {
        match notice {
            SessionNotice::Paused(reason) => {
                tracing::debug!(%reason, "paused");
                self.timer.pause();
            }
            SessionNotice::Resumed => {
                tracing::debug!("resumed");
                self.timer.resume();
            }
            SessionNotice::Completed => {
                self.timer.stop();
                self.submit_results();
            }
            SessionNotice::Abandoned => {
                tracing::info!("quiz abandoned");
                self.timer.stop();
            }
            SessionNotice::Mistake { index, reason } => {
                tracing::debug!(index, reason = reason.as_str(), "mistake");
            }
            SessionNotice::Started { .. }
            | SessionNotice::Advanced { .. }
            | SessionNotice::Tick { .. } => {}
        }
    }

    fn submit_results(&mut self) {
        let bundle = match self.lock() {
            Ok(session) => session.result_bundle(),
            Err(_) => None,
        };
        let Some(bundle) = bundle else {
            tracing::warn!("completed without a result bundle");
            return;
        };
        tracing::info!(
            session = %bundle.dashboard.session_name,
            score = bundle.summary.score_percent,
            time_used = bundle.summary.time_used_percent,
            "quiz completed"
        );
        let handles = self.sync.submit_results(&bundle, self.token.as_ref());
        self.pending.extend(handles);
    }

    //
    // ─── USER ACTIONS ──────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the session is running.
    pub fn on_correct_answer(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::CorrectAnswer).map(drop)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the session is running.
    pub fn on_wrong_answer(&mut self, reason: impl Into<String>) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::WrongAnswer {
            reason: reason.into(),
        })
        .map(drop)
    }

    /// Called by the per-question timer when it runs out.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the session is running.
    pub fn on_timeout(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::Timeout).map(drop)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the mistake popup is open.
    pub fn continue_after_mistake(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::ContinueAfterMistake).map(drop)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the mistake popup is open.
    pub fn abandon_after_mistake(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::AbandonAfterMistake).map(drop)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn on_focus_lost(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::FocusLost).map(drop)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn on_focus_regained(&mut self) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::FocusRegained).map(drop)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` once the batch is completed.
    pub fn record_word_lookup(&mut self, word: &str) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::WordLookup(word.to_owned()))
            .map(drop)
    }

    /// Replace the free-text note saved at teardown.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn set_note(&mut self, text: impl Into<String>) -> Result<(), QuizError> {
        self.dispatch(SessionEvent::NoteEdited(text.into()))
            .map(drop)
    }

    //
    // ─── READ ACCESS ───────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn snapshot(&self) -> Result<SessionSnapshot, QuizError> {
        Ok(self.lock()?.snapshot())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn phase(&self) -> Result<Phase, QuizError> {
        Ok(self.lock()?.phase())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn current_question(&self) -> Result<Option<Question>, QuizError> {
        Ok(self.lock()?.current_question().cloned())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Poisoned` if the session lock is poisoned.
    pub fn result_bundle(&self) -> Result<Option<ResultBundle>, QuizError> {
        Ok(self.lock()?.result_bundle())
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    /// End the attempt: stop the clock, save the note and advance the stored
    /// session name. Returns the persistence calls still in flight, including
    /// result submissions started at completion.
    pub fn teardown(mut self) -> PendingSync {
        self.timer.stop();
        let request = match self.session.lock() {
            Ok(session) => TeardownRequest {
                note: session.note().to_owned(),
                looked_up_words: session.looked_up_words().to_vec(),
                session_name: session.session_name(),
                token: self.token.clone(),
            },
            Err(_) => TeardownRequest {
                token: self.token.clone(),
                ..TeardownRequest::default()
            },
        };
        let mut pending = std::mem::take(&mut self.pending);
        pending.extend(self.sync.teardown(request));
        pending
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        self.store.get(key).await.unwrap_or_else(|err| {
            tracing::warn!(%err, key, "local store read failed");
            None
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, QuizSession>, QuizError> {
        self.session.lock().map_err(|_| QuizError::Poisoned)
    }
}

impl fmt::Debug for QuizEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizEngine")
            .field("clock", &self.clock)
            .field("timer", &self.timer.state())
            .field("anonymous", &self.token.is_none())
            .field("shuffle", &self.shuffle)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
