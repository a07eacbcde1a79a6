use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{
    ChoiceIndex, CourseId, PauseReason, Phase, Question, QuestionId, QuizConfigDraft,
    SessionNotice,
};
use quiz_core::time::fixed_clock;
use services::{QuizEngine, QuizError, TimerState};
use storage::repository::{
    AUTH_TOKEN_KEY, Endpoint, InMemoryKeyValueStore, InMemoryQuestionBank, KeyValueStore,
    PostedRecord, RecordingBackend, SESSION_KEY,
};

const COURSE: u64 = 7;

struct Fixture {
    bank: InMemoryQuestionBank,
    store: InMemoryKeyValueStore,
    backend: RecordingBackend,
}

impl Fixture {
    async fn signed_in(questions: u64) -> Self {
        let fixture = Self::anonymous(questions);
        fixture.store.set(AUTH_TOKEN_KEY, "token").await.unwrap();
        fixture
    }

    fn anonymous(questions: u64) -> Self {
        let bank = InMemoryQuestionBank::new();
        bank.insert_course(CourseId::new(COURSE), (1..=questions).map(question).collect())
            .unwrap();
        Self {
            bank,
            store: InMemoryKeyValueStore::new(),
            backend: RecordingBackend::new(),
        }
    }

    fn engine(&self) -> QuizEngine {
        QuizEngine::new(
            fixed_clock(),
            Arc::new(self.bank.clone()),
            Arc::new(self.store.clone()),
            Arc::new(self.backend.clone()),
        )
    }

    async fn started(&self, count: u32) -> QuizEngine {
        let mut engine = self.engine();
        engine
            .configure(QuizConfigDraft::new(count, 20).with_course(CourseId::new(COURSE), "Hangul"))
            .unwrap();
        engine.start().await.unwrap();
        engine
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<_> = self
            .backend
            .posted()
            .unwrap()
            .iter()
            .map(PostedRecord::endpoint)
            .collect();
        endpoints.sort_by_key(|e| e.path());
        endpoints
    }
}

fn question(id: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        format!("Question {id}"),
        ["ㄱ", "ㄴ", "ㄷ", "ㄹ"].map(String::from),
        ChoiceIndex::new(2).unwrap(),
    )
}

#[tokio::test]
async fn perfect_batch_completes_and_persists() {
    let fixture = Fixture::signed_in(4).await;
    let mut engine = fixture.started(4).await;

    for _ in 0..4 {
        engine.on_correct_answer().unwrap();
    }

    assert_eq!(engine.phase().unwrap(), Phase::Completed);
    assert_eq!(engine.timer_state(), TimerState::Stopped);
    assert!(engine.snapshot().unwrap().wrong_indices.is_empty());

    engine.teardown().settle().await;
    assert_eq!(
        fixture.endpoints(),
        vec![Endpoint::Dashboard, Endpoint::LastSession]
    );
}

#[tokio::test]
async fn two_mistakes_out_of_five_score_sixty_percent() {
    let fixture = Fixture::signed_in(5).await;
    let mut engine = fixture.started(5).await;

    for step in 0..5 {
        if step == 0 || step == 4 {
            engine
                .dispatch(quiz_core::model::SessionEvent::Answer(ChoiceIndex::new(0).unwrap()))
                .unwrap();
            engine.continue_after_mistake().unwrap();
        } else {
            engine
                .dispatch(quiz_core::model::SessionEvent::Answer(ChoiceIndex::new(2).unwrap()))
                .unwrap();
        }
    }

    let bundle = engine.result_bundle().unwrap().unwrap();
    assert_eq!(bundle.summary.score_percent, 60);
    engine.teardown().settle().await;

    let posted = fixture.backend.posted().unwrap();
    let dashboard = posted
        .iter()
        .find_map(|record| match record {
            PostedRecord::Dashboard(d) => Some(d.clone()),
            _ => None,
        })
        .expect("dashboard posted");
    assert_eq!(dashboard.total, 5);
    assert_eq!(dashboard.correct, 3);
    assert_eq!(dashboard.session_name.to_string(), "2025-06-01_1");

    let mistakes = posted
        .iter()
        .find_map(|record| match record {
            PostedRecord::Mistakes(m) => Some(m.clone()),
            _ => None,
        })
        .expect("mistakes posted");
    assert_eq!(
        mistakes.wrong_question_ids,
        vec![QuestionId::new(1), QuestionId::new(5)]
    );
}

#[tokio::test]
async fn missing_course_never_reaches_the_question_bank() {
    let fixture = Fixture::signed_in(5).await;
    let mut engine = fixture.engine();

    let err = engine.configure(QuizConfigDraft::new(5, 20)).unwrap_err();
    assert!(err.is_missing_course());
    assert_eq!(engine.phase().unwrap(), Phase::MissingCourseData);

    assert!(engine.start().await.is_err());
    assert_eq!(fixture.bank.call_count(), 0);

    engine.go_back().unwrap();
    assert_eq!(engine.phase().unwrap(), Phase::Configuring);
}

#[tokio::test]
async fn fetch_failure_stays_configuring() {
    let fixture = Fixture::signed_in(3).await;
    fixture.bank.set_failing(true);
    let mut engine = fixture.engine();
    engine
        .configure(QuizConfigDraft::new(3, 10).with_course(CourseId::new(COURSE), "Hangul"))
        .unwrap();

    let err = engine.start().await.unwrap_err();
    assert!(matches!(err, QuizError::Fetch(_)));
    assert_eq!(engine.phase().unwrap(), Phase::Configuring);
    assert_eq!(engine.timer_state(), TimerState::Idle);

    fixture.bank.set_failing(false);
    engine.start().await.unwrap();
    assert_eq!(engine.phase().unwrap(), Phase::Running);
}

#[tokio::test]
async fn teardown_mid_batch_saves_note_but_not_results() {
    let fixture = Fixture::signed_in(3).await;
    fixture.store.set(SESSION_KEY, "2025-06-01_4").await.unwrap();
    let mut engine = fixture.started(3).await;

    engine.on_correct_answer().unwrap();
    engine.record_word_lookup(" 학교 ").unwrap();
    engine.set_note("particles").unwrap();

    let pending = engine.teardown();
    assert_eq!(pending.len(), 1);
    pending.settle().await;

    assert_eq!(fixture.endpoints(), vec![Endpoint::Notepad]);
    match &fixture.backend.posted().unwrap()[0] {
        PostedRecord::Note(note) => {
            assert_eq!(note.note, "particles\n\n학교");
            assert_eq!(note.session_name.to_string(), "2025-06-01_4");
        }
        other => panic!("unexpected record {other:?}"),
    }
    assert_eq!(
        fixture.store.get(SESSION_KEY).await.unwrap().as_deref(),
        Some("2025-06-01_5")
    );
}

#[tokio::test]
async fn anonymous_sessions_only_advance_locally() {
    let fixture = Fixture::anonymous(2);
    let mut engine = fixture.started(2).await;
    engine.on_correct_answer().unwrap();
    engine.on_correct_answer().unwrap();
    engine.set_note("not sent").unwrap();
    engine.teardown().settle().await;

    assert!(fixture.backend.posted().unwrap().is_empty());
    assert_eq!(
        fixture.store.get(SESSION_KEY).await.unwrap().as_deref(),
        Some("2025-06-01_1")
    );

    let next = fixture.started(2).await;
    assert_eq!(next.snapshot().unwrap().phase, Phase::Running);
    next.teardown().settle().await;
    assert_eq!(
        fixture.store.get(SESSION_KEY).await.unwrap().as_deref(),
        Some("2025-06-01_2")
    );
}

#[tokio::test]
async fn abandon_after_mistake_skips_results() {
    let fixture = Fixture::signed_in(3).await;
    let mut engine = fixture.started(3).await;
    engine.on_timeout().unwrap();
    assert_eq!(
        engine.snapshot().unwrap().pending_mistake.as_deref(),
        Some("Time Out")
    );
    engine.abandon_after_mistake().unwrap();
    assert_eq!(engine.timer_state(), TimerState::Stopped);

    engine.teardown().settle().await;
    assert!(fixture.backend.posted().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn clock_counts_down_only_while_running() {
    let fixture = Fixture::signed_in(3).await;
    let mut engine = fixture.engine();
    let mut notices = engine.subscribe();
    engine
        .configure(QuizConfigDraft::new(3, 20).with_course(CourseId::new(COURSE), "Hangul"))
        .unwrap();
    engine.start().await.unwrap();

    assert_eq!(notices.recv().await.unwrap(), SessionNotice::Started { total: 3 });
    assert_eq!(notices.recv().await.unwrap(), SessionNotice::Tick { remaining: 59 });
    assert_eq!(notices.recv().await.unwrap(), SessionNotice::Tick { remaining: 58 });

    engine.on_focus_lost().unwrap();
    assert_eq!(engine.timer_state(), TimerState::Paused);
    assert_eq!(
        notices.recv().await.unwrap(),
        SessionNotice::Paused(PauseReason::FocusLost)
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(engine.snapshot().unwrap().remaining_time, 58);

    engine.on_focus_regained().unwrap();
    assert_eq!(notices.recv().await.unwrap(), SessionNotice::Resumed);
    assert_eq!(notices.recv().await.unwrap(), SessionNotice::Tick { remaining: 57 });
}

#[tokio::test]
async fn focus_regain_does_not_resume_over_mistake_popup() {
    let fixture = Fixture::signed_in(3).await;
    let mut engine = fixture.started(3).await;

    engine.on_wrong_answer("Wrong answer").unwrap();
    engine.on_focus_lost().unwrap();
    engine.on_focus_regained().unwrap();

    assert!(matches!(engine.phase().unwrap(), Phase::Paused(r) if r.contains(PauseReason::MistakePopup)));
    assert_eq!(engine.timer_state(), TimerState::Paused);
    assert!(engine.on_correct_answer().is_err());

    engine.continue_after_mistake().unwrap();
    assert_eq!(engine.timer_state(), TimerState::Running);
    assert_eq!(engine.snapshot().unwrap().current_index, Some(1));
}

#[tokio::test]
async fn dropping_the_engine_releases_the_timer() {
    let fixture = Fixture::signed_in(2).await;
    let engine = fixture.started(2).await;
    assert_eq!(engine.timer_state(), TimerState::Running);
    drop(engine);
    // Nothing was torn down, so nothing was persisted and the session stays put.
    assert!(fixture.backend.posted().unwrap().is_empty());
    assert_eq!(fixture.store.get(SESSION_KEY).await.unwrap(), None);
}
