use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::CourseId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizConfigError {
    #[error("missing course data")]
    MissingCourse,

    #[error("question count must be at least 1")]
    NoQuestions,

    #[error("time per question must be at least 1 second")]
    NoTime,
}

/// Unvalidated quiz settings as collected from the configuration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizConfigDraft {
    pub question_count: u32,
    pub time_per_question: u32,
    pub course_id: Option<CourseId>,
    pub course_title: Option<String>,
}

impl QuizConfigDraft {
    #[must_use]
    pub fn new(question_count: u32, time_per_question: u32) -> Self {
        Self {
            question_count,
            time_per_question,
            course_id: None,
            course_title: None,
        }
    }

    #[must_use]
    pub fn with_course(mut self, course_id: CourseId, title: impl Into<String>) -> Self {
        self.course_id = Some(course_id);
        self.course_title = Some(title.into());
        self
    }

    /// Check the draft and freeze it into a [`QuizConfig`].
    ///
    /// # Errors
    ///
    /// Returns `QuizConfigError::MissingCourse` when no course is attached; this
    /// is checked first so a form without course context always reports it.
    /// Returns `NoQuestions` / `NoTime` for zero counts.
    pub fn validate(self) -> Result<QuizConfig, QuizConfigError> {
        let course_id = self.course_id.ok_or(QuizConfigError::MissingCourse)?;
        if self.question_count == 0 {
            return Err(QuizConfigError::NoQuestions);
        }
        if self.time_per_question == 0 {
            return Err(QuizConfigError::NoTime);
        }
        Ok(QuizConfig {
            question_count: self.question_count,
            time_per_question: self.time_per_question,
            course_id,
            course_title: self.course_title.unwrap_or_default(),
        })
    }
}

/// Settings of one batch. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizConfig {
    question_count: u32,
    time_per_question: u32,
    course_id: CourseId,
    course_title: String,
}

impl QuizConfig {
    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    /// Seconds allotted to each question.
    #[must_use]
    pub fn time_per_question(&self) -> u32 {
        self.time_per_question
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn course_title(&self) -> &str {
        &self.course_title
    }

    /// Shared time budget for the whole batch, in seconds.
    #[must_use]
    pub fn time_budget(&self) -> u32 {
        self.question_count.saturating_mul(self.time_per_question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_course_is_reported_before_counts() {
        let err = QuizConfigDraft::new(0, 0).validate().unwrap_err();
        assert_eq!(err, QuizConfigError::MissingCourse);
    }

    #[test]
    fn valid_draft_computes_budget() {
        let config = QuizConfigDraft::new(5, 20)
            .with_course(CourseId::new(3), "Korean 101")
            .validate()
            .unwrap();
        assert_eq!(config.time_budget(), 100);
        assert_eq!(config.course_title(), "Korean 101");
    }

    #[test]
    fn zero_time_is_rejected() {
        let err = QuizConfigDraft::new(5, 0)
            .with_course(CourseId::new(3), "x")
            .validate()
            .unwrap_err();
        assert_eq!(err, QuizConfigError::NoTime);
    }
}
