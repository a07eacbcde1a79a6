use std::fmt;

use thiserror::Error;

use crate::model::{
    ChoiceIndex, DashboardRecord, LastSessionPointer, MistakeRecord, MistakeTracker, PauseReason,
    PauseReasons, Question, QuizConfig, QuizConfigDraft, QuizConfigError, ResultBundle,
    ScoreSummary,
};
use crate::session_name::SessionName;

/// Reason recorded when the selected choice is wrong.
pub const WRONG_ANSWER_REASON: &str = "Wrong answer";

/// Reason recorded when the per-question timer expires.
pub const TIMEOUT_REASON: &str = "Time Out";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("{event} is not valid while {phase}")]
    InvalidTransition { event: &'static str, phase: Phase },

    #[error("session is not configured")]
    NotConfigured,

    #[error("no questions available for this course")]
    Empty,

    #[error(transparent)]
    Config(#[from] QuizConfigError),
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Externally visible state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    /// Configuration was attempted without a course; only going back is allowed.
    MissingCourseData,
    Running,
    Paused(PauseReasons),
    Completed,
    /// The user left from the mistake popup. Nothing is scored.
    Abandoned,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Configuring => f.write_str("configuring"),
            Phase::MissingCourseData => f.write_str("missing course data"),
            Phase::Running => f.write_str("running"),
            Phase::Paused(reasons) => write!(f, "paused {reasons:?}"),
            Phase::Completed => f.write_str("completed"),
            Phase::Abandoned => f.write_str("abandoned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Configuring,
    MissingCourseData,
    Active,
    Completed,
    Abandoned,
}

//
// ─── EVENTS & NOTICES ──────────────────────────────────────────────────────────
//

/// Inputs to the state machine. Host events (focus, timer ticks, network
/// responses, clicks) are all translated into one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Configure(QuizConfigDraft),
    GoBack,
    QuestionsLoaded {
        questions: Vec<Question>,
        session_name: SessionName,
    },
    /// The user picked a choice; routed to the correct or wrong path.
    Answer(ChoiceIndex),
    CorrectAnswer,
    WrongAnswer {
        reason: String,
    },
    Timeout,
    ContinueAfterMistake,
    AbandonAfterMistake,
    FocusLost,
    FocusRegained,
    ExternalModalOpened,
    ExternalModalClosed,
    WordLookup(String),
    NoteEdited(String),
    Tick,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Configure(_) => "configure",
            SessionEvent::GoBack => "go back",
            SessionEvent::QuestionsLoaded { .. } => "questions loaded",
            SessionEvent::Answer(_) => "answer",
            SessionEvent::CorrectAnswer => "correct answer",
            SessionEvent::WrongAnswer { .. } => "wrong answer",
            SessionEvent::Timeout => "timeout",
            SessionEvent::ContinueAfterMistake => "continue after mistake",
            SessionEvent::AbandonAfterMistake => "abandon after mistake",
            SessionEvent::FocusLost => "focus lost",
            SessionEvent::FocusRegained => "focus regained",
            SessionEvent::ExternalModalOpened => "external modal opened",
            SessionEvent::ExternalModalClosed => "external modal closed",
            SessionEvent::WordLookup(_) => "word lookup",
            SessionEvent::NoteEdited(_) => "note edited",
            SessionEvent::Tick => "tick",
        }
    }
}

/// Transition notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Started { total: usize },
    Advanced { index: usize },
    Mistake { index: usize, reason: String },
    Paused(PauseReason),
    Resumed,
    Tick { remaining: u32 },
    Completed,
    Abandoned,
}

/// Owned copy of the read accessors, handy for UIs and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub current_index: Option<usize>,
    pub total: usize,
    pub remaining_time: u32,
    pub wrong_indices: Vec<usize>,
    pub looked_up_words: Vec<String>,
    pub pending_mistake: Option<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State of one quiz attempt, driven synchronously by [`QuizSession::dispatch`].
///
/// The machine performs no I/O. Fetching questions, ticking the clock and
/// persisting results are left to the caller, which feeds the outcomes back
/// in as events and reacts to the returned notices.
#[derive(Debug, Clone)]
pub struct QuizSession {
    stage: Stage,
    config: Option<QuizConfig>,
    session_name: Option<SessionName>,
    questions: Vec<Question>,
    current_index: Option<usize>,
    remaining_time: u32,
    pause: PauseReasons,
    tracker: MistakeTracker,
    pending_mistake: Option<String>,
    note: String,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: Stage::Configuring,
            config: None,
            session_name: None,
            questions: Vec::new(),
            current_index: None,
            remaining_time: 0,
            pause: PauseReasons::none(),
            tracker: MistakeTracker::new(),
            pending_mistake: None,
            note: String::new(),
        }
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` when the event is not accepted
    /// in the current phase; the state is left untouched in that case.
    /// `Configure` fails with `SessionError::Config`, and a missing course also
    /// moves the session to `Phase::MissingCourseData`.
    /// `QuestionsLoaded` fails with `NotConfigured` or `Empty`.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Vec<SessionNotice>, SessionError> {
        let name = event.name();
        match event {
            SessionEvent::Configure(draft) => self.configure(draft, name),
            SessionEvent::GoBack => self.go_back(name),
            SessionEvent::QuestionsLoaded {
                questions,
                session_name,
            } => self.begin(questions, session_name, name),
            SessionEvent::Answer(choice) => self.answer(choice, name),
            SessionEvent::CorrectAnswer => {
                self.require_running(name)?;
                Ok(self.advance())
            }
            SessionEvent::WrongAnswer { reason } => self.wrong_answer(reason, name),
            SessionEvent::Timeout => self.wrong_answer(TIMEOUT_REASON.to_owned(), name),
            SessionEvent::ContinueAfterMistake => self.continue_after_mistake(name),
            SessionEvent::AbandonAfterMistake => self.abandon_after_mistake(name),
            SessionEvent::FocusLost => Ok(self.hold(PauseReason::FocusLost)),
            SessionEvent::FocusRegained => Ok(self.release(PauseReason::FocusLost)),
            SessionEvent::ExternalModalOpened => Ok(self.hold(PauseReason::ExternalModal)),
            SessionEvent::ExternalModalClosed => Ok(self.release(PauseReason::ExternalModal)),
            SessionEvent::WordLookup(word) => {
                if self.stage == Stage::Completed {
                    return Err(self.invalid(name));
                }
                self.tracker.record_lookup(&word);
                Ok(Vec::new())
            }
            SessionEvent::NoteEdited(text) => {
                self.note = text;
                Ok(Vec::new())
            }
            SessionEvent::Tick => Ok(self.tick()),
        }
    }

    fn configure(
        &mut self,
        draft: QuizConfigDraft,
        name: &'static str,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        if self.stage != Stage::Configuring {
            return Err(self.invalid(name));
        }
        match draft.validate() {
            Ok(config) => {
                self.config = Some(config);
                Ok(Vec::new())
            }
            Err(err) => {
                if err == QuizConfigError::MissingCourse {
                    self.config = None;
                    self.stage = Stage::MissingCourseData;
                }
                Err(err.into())
            }
        }
    }

    fn go_back(&mut self, name: &'static str) -> Result<Vec<SessionNotice>, SessionError> {
        if self.stage != Stage::MissingCourseData {
            return Err(self.invalid(name));
        }
        self.stage = Stage::Configuring;
        Ok(Vec::new())
    }

    fn begin(
        &mut self,
        mut questions: Vec<Question>,
        session_name: SessionName,
        name: &'static str,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        if self.stage != Stage::Configuring {
            return Err(self.invalid(name));
        }
        let config = self.config.as_ref().ok_or(SessionError::NotConfigured)?;
        let limit = usize::try_from(config.question_count()).unwrap_or(usize::MAX);
        questions.truncate(limit);
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }

        self.remaining_time = config.time_budget();
        self.questions = questions;
        self.session_name = Some(session_name);
        self.current_index = Some(0);
        self.stage = Stage::Active;
        Ok(vec![SessionNotice::Started {
            total: self.questions.len(),
        }])
    }

    fn answer(
        &mut self,
        choice: ChoiceIndex,
        name: &'static str,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        self.require_running(name)?;
        let correct = self
            .current_question()
            .is_some_and(|question| question.is_correct(choice));
        if correct {
            Ok(self.advance())
        } else {
            self.wrong_answer(WRONG_ANSWER_REASON.to_owned(), name)
        }
    }

    fn wrong_answer(
        &mut self,
        reason: String,
        name: &'static str,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        self.require_running(name)?;
        let index = self.current_index.unwrap_or_default();
        self.tracker.record_mistake(index);
        self.pause.insert(PauseReason::MistakePopup);
        self.pending_mistake = Some(reason.clone());
        Ok(vec![
            SessionNotice::Mistake { index, reason },
            SessionNotice::Paused(PauseReason::MistakePopup),
        ])
    }

    fn continue_after_mistake(
        &mut self,
        name: &'static str,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        if !self.in_mistake_popup() {
            return Err(self.invalid(name));
        }
        self.pending_mistake = None;
        self.pause.remove(PauseReason::MistakePopup);

        let mut notices = self.advance();
        if self.stage == Stage::Active && self.pause.is_empty() {
            notices.push(SessionNotice::Resumed);
        }
        Ok(notices)
    }

    fn abandon_after_mistake(
        &mut self,
        name: &'static str,
    ) -> Result<Vec<SessionNotice>, SessionError> {
        if !self.in_mistake_popup() {
            return Err(self.invalid(name));
        }
        self.pending_mistake = None;
        self.pause = PauseReasons::none();
        self.stage = Stage::Abandoned;
        Ok(vec![SessionNotice::Abandoned])
    }

    fn advance(&mut self) -> Vec<SessionNotice> {
        let next = self.current_index.map_or(0, |index| index + 1);
        self.current_index = Some(next);
        if next >= self.questions.len() {
            self.stage = Stage::Completed;
            self.pause = PauseReasons::none();
            return vec![SessionNotice::Completed];
        }
        vec![SessionNotice::Advanced { index: next }]
    }

    fn hold(&mut self, reason: PauseReason) -> Vec<SessionNotice> {
        if self.stage != Stage::Active || !self.pause.insert(reason) {
            return Vec::new();
        }
        vec![SessionNotice::Paused(reason)]
    }

    fn release(&mut self, reason: PauseReason) -> Vec<SessionNotice> {
        if self.stage != Stage::Active || !self.pause.remove(reason) {
            return Vec::new();
        }
        if self.pause.is_empty() {
            vec![SessionNotice::Resumed]
        } else {
            Vec::new()
        }
    }

    fn tick(&mut self) -> Vec<SessionNotice> {
        if self.phase() != Phase::Running {
            return Vec::new();
        }
        self.remaining_time = self.remaining_time.saturating_sub(1);
        vec![SessionNotice::Tick {
            remaining: self.remaining_time,
        }]
    }

    fn in_mistake_popup(&self) -> bool {
        self.stage == Stage::Active && self.pause.contains(PauseReason::MistakePopup)
    }

    fn require_running(&self, name: &'static str) -> Result<(), SessionError> {
        if self.phase() == Phase::Running {
            Ok(())
        } else {
            Err(self.invalid(name))
        }
    }

    fn invalid(&self, event: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            event,
            phase: self.phase(),
        }
    }

    //
    // ─── ACCESSORS ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn phase(&self) -> Phase {
        match self.stage {
            Stage::Configuring => Phase::Configuring,
            Stage::MissingCourseData => Phase::MissingCourseData,
            Stage::Active if self.pause.is_empty() => Phase::Running,
            Stage::Active => Phase::Paused(self.pause),
            Stage::Completed => Phase::Completed,
            Stage::Abandoned => Phase::Abandoned,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Completed
    }

    #[must_use]
    pub fn config(&self) -> Option<&QuizConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn session_name(&self) -> Option<SessionName> {
        self.session_name
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Position of the question being asked; `None` before the batch starts.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.stage != Stage::Active {
            return None;
        }
        self.current_index.and_then(|index| self.questions.get(index))
    }

    /// Seconds left of the shared batch budget.
    #[must_use]
    pub fn remaining_time(&self) -> u32 {
        self.remaining_time
    }

    #[must_use]
    pub fn pause_reasons(&self) -> PauseReasons {
        self.pause
    }

    #[must_use]
    pub fn pending_mistake(&self) -> Option<&str> {
        self.pending_mistake.as_deref()
    }

    #[must_use]
    pub fn wrong_indices(&self) -> &[usize] {
        self.tracker.wrong_indices()
    }

    #[must_use]
    pub fn looked_up_words(&self) -> &[String] {
        self.tracker.looked_up_words()
    }

    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            current_index: self.current_index,
            total: self.questions.len(),
            remaining_time: self.remaining_time,
            wrong_indices: self.wrong_indices().to_vec(),
            looked_up_words: self.looked_up_words().to_vec(),
            pending_mistake: self.pending_mistake.clone(),
        }
    }

    /// Records to persist for a completed batch; `None` before completion.
    #[must_use]
    pub fn result_bundle(&self) -> Option<ResultBundle> {
        if self.stage != Stage::Completed {
            return None;
        }
        let config = self.config.as_ref()?;
        let session_name = self.session_name?;

        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let wrong = u32::try_from(self.tracker.mistake_count()).unwrap_or(u32::MAX);
        let summary =
            ScoreSummary::compute(total, wrong, config.time_budget(), self.remaining_time);

        let wrong_question_ids: Vec<_> = self
            .wrong_indices()
            .iter()
            .filter_map(|index| self.questions.get(*index).map(Question::id))
            .collect();
        let mistakes = (!wrong_question_ids.is_empty()).then(|| MistakeRecord {
            wrong_question_ids,
            session_name,
        });

        Some(ResultBundle {
            summary,
            dashboard: DashboardRecord {
                total,
                correct: summary.correct,
                time_remaining: self.remaining_time,
                time_per_question: config.time_per_question(),
                course_id: config.course_id(),
                session_name,
            },
            mistakes,
            last_session: LastSessionPointer { session_name },
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
