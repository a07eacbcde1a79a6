mod config;
mod ids;
mod pause;
mod question;
mod result;
mod session;
mod tracker;

pub use config::{QuizConfig, QuizConfigDraft, QuizConfigError};
pub use ids::{CourseId, ParseIdError, QuestionId};
pub use pause::{PauseReason, PauseReasons};
pub use question::{CHOICE_COUNT, ChoiceIndex, Question, QuestionError};
pub use result::{
    DashboardRecord, LastSessionPointer, MistakeRecord, NoteRecord, ResultBundle, ScoreSummary,
};
pub use session::{
    Phase, QuizSession, SessionError, SessionEvent, SessionNotice, SessionSnapshot,
    TIMEOUT_REASON, WRONG_ANSWER_REASON,
};
pub use tracker::MistakeTracker;
