use serde::{Deserialize, Serialize};

use crate::model::{CourseId, QuestionId};
use crate::session_name::SessionName;

/// Score and timing of a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub score_percent: u32,
    pub time_budget: u32,
    pub time_remaining: u32,
    pub time_used_percent: u32,
}

impl ScoreSummary {
    /// `wrong` may exceed `total` if the same position was recorded twice;
    /// `correct` saturates at zero in that case.
    #[must_use]
    pub fn compute(total: u32, wrong: u32, time_budget: u32, time_remaining: u32) -> Self {
        let correct = total.saturating_sub(wrong);
        let time_remaining = time_remaining.min(time_budget);
        Self {
            total,
            correct,
            wrong,
            score_percent: rounded_percent(correct, total),
            time_budget,
            time_remaining,
            time_used_percent: rounded_percent(time_budget - time_remaining, time_budget),
        }
    }
}

fn rounded_percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part);
    let whole = u64::from(whole);
    u32::try_from((part * 100 + whole / 2) / whole).unwrap_or(u32::MAX)
}

/// Dashboard summary of one completed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRecord {
    #[serde(rename = "total_question")]
    pub total: u32,
    #[serde(rename = "nb_good")]
    pub correct: u32,
    pub time_remaining: u32,
    pub time_per_question: u32,
    pub course_id: CourseId,
    pub session_name: SessionName,
}

/// Questions answered wrongly in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeRecord {
    #[serde(rename = "questions_wrong_id")]
    pub wrong_question_ids: Vec<QuestionId>,
    pub session_name: SessionName,
}

/// Pointer to the user's most recent session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSessionPointer {
    #[serde(rename = "session")]
    pub session_name: SessionName,
}

/// Free-text notepad entry attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note: String,
    pub session_name: SessionName,
}

impl NoteRecord {
    /// Builds the notepad body from the user's text and the words looked up
    /// during the batch, one word per line after a blank line.
    ///
    /// Returns `None` when there is nothing to save.
    #[must_use]
    pub fn compose(text: &str, words: &[String], session_name: SessionName) -> Option<Self> {
        let text = text.trim();
        let mut note = String::from(text);
        if !words.is_empty() {
            if !note.is_empty() {
                note.push_str("\n\n");
            }
            note.push_str(&words.join("\n"));
        }
        if note.is_empty() {
            return None;
        }
        Some(Self { note, session_name })
    }
}

/// Records produced when a batch completes. Each one is persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBundle {
    pub summary: ScoreSummary,
    pub dashboard: DashboardRecord,
    /// `None` when every answer was right.
    pub mistakes: Option<MistakeRecord>,
    pub last_session: LastSessionPointer,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> SessionName {
        "2025-06-01_1".parse().unwrap()
    }

    #[test]
    fn three_of_five_is_sixty_percent() {
        let summary = ScoreSummary::compute(5, 2, 100, 40);
        assert_eq!(summary.correct, 3);
        assert_eq!(summary.score_percent, 60);
        assert_eq!(summary.time_used_percent, 60);
    }

    #[test]
    fn duplicate_mistakes_do_not_underflow() {
        let summary = ScoreSummary::compute(2, 3, 40, 0);
        assert_eq!(summary.correct, 0);
        assert_eq!(summary.score_percent, 0);
        assert_eq!(summary.time_used_percent, 100);
    }

    #[test]
    fn dashboard_uses_backend_field_names() {
        let record = DashboardRecord {
            total: 5,
            correct: 3,
            time_remaining: 12,
            time_per_question: 20,
            course_id: CourseId::new(4),
            session_name: name(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["total_question"], 5);
        assert_eq!(json["nb_good"], 3);
        assert_eq!(json["course_id"], 4);
        assert_eq!(json["session_name"], "2025-06-01_1");
    }

    #[test]
    fn note_appends_words_after_text() {
        let words = vec!["학교".to_string(), "Run".to_string()];
        let note = NoteRecord::compose(" remember ", &words, name()).unwrap();
        assert_eq!(note.note, "remember\n\n학교\nRun");
        assert!(NoteRecord::compose("  ", &[], name()).is_none());
    }
}
