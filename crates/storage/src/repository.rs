use async_trait::async_trait;
use quiz_core::model::{
    CourseId, DashboardRecord, LastSessionPointer, MistakeRecord, NoteRecord, Question,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Local store key holding the current session name.
pub const SESSION_KEY: &str = "session";

/// Local store key whose presence marks a signed-in user.
pub const AUTH_TOKEN_KEY: &str = "jstoken";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Bearer token handed out by the auth collaborator. Opaque to the engine.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Source of quiz questions.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Fetch up to `count` questions for a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be reached or returns bad data.
    async fn fetch_questions(
        &self,
        course_id: CourseId,
        count: u32,
    ) -> Result<Vec<Question>, StorageError>;
}

/// Read-modify-write callback for [`KeyValueStore::replace_with`].
pub type ReplaceFn = Box<dyn FnOnce(Option<String>) -> String + Send>;

/// Small persistent string store on the client (session name, auth marker).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the key cannot be removed.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Atomically replace the value under `key` with `f(current)` and return
    /// the new value. Concurrent callers observe each other's writes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read or write fails; nothing is written then.
    async fn replace_with(&self, key: &str, f: ReplaceFn) -> Result<String, StorageError>;
}

/// Backend endpoints that receive batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Dashboard,
    Mistakes,
    LastSession,
    Notepad,
}

impl Endpoint {
    /// Path relative to the backend base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Dashboard => "dashboard",
            Endpoint::Mistakes => "mistakeQuestion",
            Endpoint::LastSession => "user/last_session",
            Endpoint::Notepad => "notepad",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Remote persistence for batch results. Every call stands on its own; there
/// is no transaction across them.
#[async_trait]
pub trait ResultBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record is not accepted.
    async fn post_dashboard(
        &self,
        token: &AuthToken,
        record: &DashboardRecord,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record is not accepted.
    async fn post_mistakes(
        &self,
        token: &AuthToken,
        record: &MistakeRecord,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the pointer is not accepted.
    async fn post_last_session(
        &self,
        token: &AuthToken,
        pointer: &LastSessionPointer,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the note is not accepted.
    async fn post_note(&self, token: &AuthToken, note: &NoteRecord) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTERS ────────────────────────────────────────────────────────
//

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Connection(err.to_string())
}

/// Question bank held in memory, for tests and offline play.
#[derive(Clone, Default)]
pub struct InMemoryQuestionBank {
    courses: Arc<Mutex<HashMap<CourseId, Vec<Question>>>>,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl InMemoryQuestionBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the questions of a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_course(
        &self,
        course_id: CourseId,
        questions: Vec<Question>,
    ) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(course_id, questions);
        Ok(())
    }

    /// Make subsequent fetches fail with a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches attempted so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn fetch_questions(
        &self,
        course_id: CourseId,
        count: u32,
    ) -> Result<Vec<Question>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("question bank unavailable".into()));
        }
        let guard = self.courses.lock().map_err(poisoned)?;
        let limit = usize::try_from(count).unwrap_or(usize::MAX);
        Ok(guard
            .get(&course_id)
            .map(|questions| questions.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Key-value store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.entries.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().map_err(poisoned)?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().map_err(poisoned)?;
        guard.remove(key);
        Ok(())
    }

    async fn replace_with(&self, key: &str, f: ReplaceFn) -> Result<String, StorageError> {
        let mut guard = self.entries.lock().map_err(poisoned)?;
        let next = f(guard.get(key).cloned());
        guard.insert(key.to_owned(), next.clone());
        Ok(next)
    }
}

/// A record accepted by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostedRecord {
    Dashboard(DashboardRecord),
    Mistakes(MistakeRecord),
    LastSession(LastSessionPointer),
    Note(NoteRecord),
}

impl PostedRecord {
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        match self {
            PostedRecord::Dashboard(_) => Endpoint::Dashboard,
            PostedRecord::Mistakes(_) => Endpoint::Mistakes,
            PostedRecord::LastSession(_) => Endpoint::LastSession,
            PostedRecord::Note(_) => Endpoint::Notepad,
        }
    }
}

/// Result backend that keeps everything it receives, optionally refusing
/// selected endpoints.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    posted: Arc<Mutex<Vec<PostedRecord>>>,
    failing: Arc<Mutex<HashSet<Endpoint>>>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `endpoint` reject every call.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn fail_endpoint(&self, endpoint: Endpoint) -> Result<(), StorageError> {
        let mut guard = self.failing.lock().map_err(poisoned)?;
        guard.insert(endpoint);
        Ok(())
    }

    /// Records accepted so far, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn posted(&self) -> Result<Vec<PostedRecord>, StorageError> {
        let guard = self.posted.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    fn accept(&self, record: PostedRecord) -> Result<(), StorageError> {
        let endpoint = record.endpoint();
        if self.failing.lock().map_err(poisoned)?.contains(&endpoint) {
            return Err(StorageError::Connection(format!("{endpoint} rejected")));
        }
        self.posted.lock().map_err(poisoned)?.push(record);
        Ok(())
    }
}

#[async_trait]
impl ResultBackend for RecordingBackend {
    async fn post_dashboard(
        &self,
        _token: &AuthToken,
        record: &DashboardRecord,
    ) -> Result<(), StorageError> {
        self.accept(PostedRecord::Dashboard(record.clone()))
    }

    async fn post_mistakes(
        &self,
        _token: &AuthToken,
        record: &MistakeRecord,
    ) -> Result<(), StorageError> {
        self.accept(PostedRecord::Mistakes(record.clone()))
    }

    async fn post_last_session(
        &self,
        _token: &AuthToken,
        pointer: &LastSessionPointer,
    ) -> Result<(), StorageError> {
        self.accept(PostedRecord::LastSession(pointer.clone()))
    }

    async fn post_note(&self, _token: &AuthToken, note: &NoteRecord) -> Result<(), StorageError> {
        self.accept(PostedRecord::Note(note.clone()))
    }
}
