use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::model::{
    CourseId, DashboardRecord, LastSessionPointer, MistakeRecord, NoteRecord, Question,
    QuestionId,
};
use storage::repository::{AuthToken, Endpoint, QuestionBank, ResultBackend, StorageError};

use crate::error::BackendError;

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
}

impl BackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Reads `QUIZ_API_URL`; `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZ_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self::new(base_url.trim()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Question bank and result backend over the platform's REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn fetch(&self, course_id: CourseId, count: u32) -> Result<Vec<Question>, BackendError> {
        let url = self.config.url("question/random");
        let response = self
            .client
            .get(url)
            .query(&[("course_id", course_id.value()), ("count", u64::from(count))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::HttpStatus(response.status()));
        }

        let body: Vec<QuestionPayload> = response.json().await?;
        body.into_iter()
            .map(|payload| payload.into_question().map_err(BackendError::from))
            .collect()
    }

    async fn post<T: Serialize + Sync>(
        &self,
        endpoint: Endpoint,
        token: &AuthToken,
        body: &T,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.config.url(endpoint.path()))
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::HttpStatus(response.status()));
        }
        tracing::debug!(%endpoint, "posted");
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for HttpBackend {
    async fn fetch_questions(
        &self,
        course_id: CourseId,
        count: u32,
    ) -> Result<Vec<Question>, StorageError> {
        Ok(self.fetch(course_id, count).await?)
    }
}

#[async_trait]
impl ResultBackend for HttpBackend {
    async fn post_dashboard(
        &self,
        token: &AuthToken,
        record: &DashboardRecord,
    ) -> Result<(), StorageError> {
        Ok(self.post(Endpoint::Dashboard, token, record).await?)
    }

    async fn post_mistakes(
        &self,
        token: &AuthToken,
        record: &MistakeRecord,
    ) -> Result<(), StorageError> {
        Ok(self.post(Endpoint::Mistakes, token, record).await?)
    }

    async fn post_last_session(
        &self,
        token: &AuthToken,
        pointer: &LastSessionPointer,
    ) -> Result<(), StorageError> {
        Ok(self.post(Endpoint::LastSession, token, pointer).await?)
    }

    async fn post_note(&self, token: &AuthToken, note: &NoteRecord) -> Result<(), StorageError> {
        Ok(self.post(Endpoint::Notepad, token, note).await?)
    }
}

#[derive(Debug, Deserialize)]
struct QuestionPayload {
    id: u64,
    title: String,
    choices: Vec<String>,
    right_answer: String,
}

impl QuestionPayload {
    fn into_question(self) -> Result<Question, quiz_core::model::QuestionError> {
        Question::from_wire(
            QuestionId::new(self.id),
            self.title,
            self.choices,
            &self.right_answer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slash() {
        let config = BackendConfig::new("http://localhost:3000/api/");
        assert_eq!(
            config.url(Endpoint::LastSession.path()),
            "http://localhost:3000/api/user/last_session"
        );
        assert_eq!(
            config.url(Endpoint::Mistakes.path()),
            "http://localhost:3000/api/mistakeQuestion"
        );
    }

    #[test]
    fn payload_maps_right_answer_text() {
        let payload: QuestionPayload = serde_json::from_str(
            r#"{"id": 9, "title": "사과?", "choices": ["apple", "pear", "plum", "fig"], "right_answer": "apple"}"#,
        )
        .unwrap();
        let question = payload.into_question().unwrap();
        assert_eq!(question.id(), QuestionId::new(9));
        assert_eq!(question.correct_choice().get(), 0);
    }

    #[test]
    fn bad_payload_becomes_serialization_error() {
        let payload = QuestionPayload {
            id: 1,
            title: "t".into(),
            choices: vec!["a".into()],
            right_answer: "a".into(),
        };
        let err: StorageError = BackendError::from(payload.into_question().unwrap_err()).into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
