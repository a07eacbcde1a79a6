//! Built-in question set for playing without a backend.

use quiz_core::model::{CourseId, Question, QuestionError, QuestionId};

pub const DEMO_COURSE_ID: u64 = 1;
pub const DEMO_COURSE_TITLE: &str = "Everyday Korean";

const DEMO_QUESTIONS: &[(&str, [&str; 4], &str)] = &[
    ("학교", ["school", "hospital", "library", "station"], "school"),
    ("물", ["fire", "water", "tree", "stone"], "water"),
    ("고양이", ["dog", "bird", "cat", "horse"], "cat"),
    ("친구", ["teacher", "friend", "sibling", "neighbor"], "friend"),
    ("먹다", ["to sleep", "to walk", "to read", "to eat"], "to eat"),
    ("크다", ["to be big", "to be small", "to be cold", "to be fast"], "to be big"),
    ("책", ["pen", "desk", "book", "bag"], "book"),
    ("바다", ["mountain", "sea", "river", "sky"], "sea"),
    ("오늘", ["yesterday", "tomorrow", "today", "always"], "today"),
    ("가다", ["to go", "to come", "to stop", "to buy"], "to go"),
    ("집", ["house", "car", "door", "window"], "house"),
    ("사랑", ["hate", "love", "fear", "hope"], "love"),
];

#[must_use]
pub fn course_id() -> CourseId {
    CourseId::new(DEMO_COURSE_ID)
}

/// # Errors
///
/// Returns `QuestionError` if a built-in entry is malformed.
pub fn questions() -> Result<Vec<Question>, QuestionError> {
    DEMO_QUESTIONS
        .iter()
        .zip(1_u64..)
        .map(|((word, choices, answer), id)| {
            Question::from_wire(
                QuestionId::new(id),
                format!("What does \"{word}\" mean?"),
                choices.iter().map(|c| (*c).to_string()).collect(),
                answer,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_questions_are_well_formed() {
        let questions = questions().unwrap();
        assert_eq!(questions.len(), DEMO_QUESTIONS.len());
        assert_eq!(questions[1].correct_choice().get(), 1);
    }
}
