use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::QuestionId;

/// Every question offers exactly this many choices.
pub const CHOICE_COUNT: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {id} has {len} choices, expected {}", CHOICE_COUNT)]
    ChoiceCount { id: QuestionId, len: usize },

    #[error("question {id}: right answer is not one of the choices")]
    UnknownRightAnswer { id: QuestionId },

    #[error("choice index {0} is out of range")]
    ChoiceOutOfRange(usize),
}

/// Zero-based position of a choice within a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ChoiceIndex(usize);

impl TryFrom<usize> for ChoiceIndex {
    type Error = QuestionError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<ChoiceIndex> for usize {
    fn from(choice: ChoiceIndex) -> Self {
        choice.0
    }
}

impl ChoiceIndex {
    /// # Errors
    ///
    /// Returns `QuestionError::ChoiceOutOfRange` if `index >= CHOICE_COUNT`.
    pub fn new(index: usize) -> Result<Self, QuestionError> {
        if index >= CHOICE_COUNT {
            return Err(QuestionError::ChoiceOutOfRange(index));
        }
        Ok(Self(index))
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// A multiple-choice question served by the question bank. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    title: String,
    choices: [String; CHOICE_COUNT],
    correct: ChoiceIndex,
}

impl Question {
    #[must_use]
    pub fn new(
        id: QuestionId,
        title: impl Into<String>,
        choices: [String; CHOICE_COUNT],
        correct: ChoiceIndex,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            choices,
            correct,
        }
    }

    /// Build a question from the backend shape, where the right answer is
    /// given as the text of one of the choices.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::ChoiceCount` unless exactly four choices are given,
    /// and `QuestionError::UnknownRightAnswer` if no choice matches `right_answer`.
    pub fn from_wire(
        id: QuestionId,
        title: impl Into<String>,
        choices: Vec<String>,
        right_answer: &str,
    ) -> Result<Self, QuestionError> {
        let len = choices.len();
        let choices: [String; CHOICE_COUNT] = choices
            .try_into()
            .map_err(|_| QuestionError::ChoiceCount { id, len })?;
        let position = choices
            .iter()
            .position(|choice| choice == right_answer)
            .ok_or(QuestionError::UnknownRightAnswer { id })?;
        Ok(Self::new(id, title, choices, ChoiceIndex(position)))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn choices(&self) -> &[String; CHOICE_COUNT] {
        &self.choices
    }

    #[must_use]
    pub fn correct_choice(&self) -> ChoiceIndex {
        self.correct
    }

    #[must_use]
    pub fn is_correct(&self, choice: ChoiceIndex) -> bool {
        self.correct == choice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<String> {
        ["가", "나", "다", "라"].iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn from_wire_locates_right_answer() {
        let q = Question::from_wire(QuestionId::new(1), "Which is 'na'?", choices(), "나").unwrap();
        assert_eq!(q.correct_choice().get(), 1);
        assert!(q.is_correct(ChoiceIndex::new(1).unwrap()));
        assert!(!q.is_correct(ChoiceIndex::new(0).unwrap()));
    }

    #[test]
    fn from_wire_rejects_unknown_answer() {
        let err = Question::from_wire(QuestionId::new(2), "t", choices(), "마").unwrap_err();
        assert_eq!(err, QuestionError::UnknownRightAnswer { id: QuestionId::new(2) });
    }

    #[test]
    fn from_wire_requires_four_choices() {
        let mut three = choices();
        three.pop();
        let err = Question::from_wire(QuestionId::new(3), "t", three, "가").unwrap_err();
        assert_eq!(err, QuestionError::ChoiceCount { id: QuestionId::new(3), len: 3 });
    }

    #[test]
    fn deserialized_question_rejects_out_of_range_answer() {
        let json = r#"{"id": 4, "title": "t", "choices": ["가", "나", "다", "라"], "correct": 7}"#;
        let err = serde_json::from_str::<Question>(json).unwrap_err();
        assert!(err.to_string().contains("choice index 7 is out of range"));

        let ok = r#"{"id": 4, "title": "t", "choices": ["가", "나", "다", "라"], "correct": 2}"#;
        let question: Question = serde_json::from_str(ok).unwrap();
        assert_eq!(question.correct_choice().get(), 2);
    }

    #[test]
    fn choice_index_is_bounded() {
        assert!(ChoiceIndex::new(3).is_ok());
        assert_eq!(ChoiceIndex::new(4), Err(QuestionError::ChoiceOutOfRange(4)));
    }
}
