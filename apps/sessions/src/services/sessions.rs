//! Session reconciler: one in-progress quiz attempt per (user, competence, level).
//!
//! Reads fail loudly because without them there is no way to know whether an
//! attempt already exists. Writes are best effort: a failed answer or
//! finalization write is logged and reported through `WriteOutcome`, and the
//! caller keeps working against its in-memory session.

use std::sync::Arc;

use chrono::Utc;
use ladico_core::{
    select_active, Answer, PassPolicy, Question, Reconciliation, Session, SessionKey,
    SessionStateError,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SessionError, StoreError};
use crate::store::{Body, Document, DocumentStore, Filter};

const DEFAULT_COLLECTION: &str = "sessions";

/// Where sessions live and how they are scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub collection: String,
    pub pass_policy: PassPolicy,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            pass_policy: PassPolicy::default(),
        }
    }
}

/// Session returned by `get_or_create_active_session`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session: Session,
    pub was_created: bool,
}

/// Why a write was not attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The session has no store id yet.
    NotPersisted,
    /// The reconciler has no store handle.
    NoStore,
    /// The session state does not allow the mutation.
    Rejected(SessionStateError),
}

/// Result of a best-effort write. Callers may ignore it.
#[derive(Debug)]
pub enum WriteOutcome<T> {
    Saved(T),
    Skipped(SkipReason),
    Failed(StoreError),
}

impl<T> WriteOutcome<T> {
    /// The saved value, or `None` when nothing was persisted.
    pub fn saved(self) -> Option<T> {
        match self {
            Self::Saved(value) => Some(value),
            Self::Skipped(_) | Self::Failed(_) => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

/// Finds, creates and updates quiz sessions in an injected document store.
#[derive(Clone)]
pub struct SessionReconciler {
    store: Option<Arc<dyn DocumentStore>>,
    settings: ReconcilerSettings,
}

impl SessionReconciler {
    pub fn new(store: Arc<dyn DocumentStore>, settings: ReconcilerSettings) -> Self {
        Self {
            store: Some(store),
            settings,
        }
    }

    /// A reconciler without a store: reads fail and writes are skipped.
    pub fn detached(settings: ReconcilerSettings) -> Self {
        Self {
            store: None,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    fn store(&self) -> Result<&dyn DocumentStore> {
        self.store.as_deref().ok_or(SessionError::StoreUnavailable)
    }

    fn collection(&self) -> &str {
        &self.settings.collection
    }

    /// Resume the active session for `key` or start a new one.
    ///
    /// Finalized sessions are never returned. A stored session whose answer
    /// count differs from `questions` is reset before it is returned. An
    /// unreadable document still holding the active key gives it up and the
    /// insert is retried once.
    ///
    /// # Errors
    ///
    /// Fails when the store is missing or the lookup or insert fails.
    pub async fn get_or_create_active_session(
        &self,
        key: &SessionKey,
        questions: Vec<Question>,
    ) -> Result<ActiveSession> {
        let store = self.store()?;

        let candidates = self.load_for_key(store, key).await?;
        if let Some(session) = self.resume(store, candidates, &questions).await {
            return Ok(ActiveSession {
                session,
                was_created: false,
            });
        }

        let mut session = Session::start(key, questions, Utc::now());
        let id = match self.insert_session(store, &session).await {
            Ok(id) => id,
            Err(StoreError::Conflict(reason)) => {
                let candidates = self.load_for_key(store, key).await?;
                if let Some(existing) = self.resume(store, candidates, &session.questions).await {
                    // Another caller created the active session first.
                    tracing::warn!(
                        "Concurrent session creation for {}/{}/{}: {}",
                        key.user_id,
                        key.competence,
                        key.level,
                        reason
                    );
                    return Ok(ActiveSession {
                        session: existing,
                        was_created: false,
                    });
                }

                self.release_active_key(store, key).await?;
                self.insert_session(store, &session).await?
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            "Created session {} for {}/{}/{}",
            id,
            key.user_id,
            key.competence,
            key.level
        );
        session.id = Some(id);
        Ok(ActiveSession {
            session,
            was_created: true,
        })
    }

    async fn insert_session(
        &self,
        store: &dyn DocumentStore,
        session: &Session,
    ) -> std::result::Result<String, StoreError> {
        store.insert(self.collection(), to_body(session)?).await
    }

    /// Clear the active key on every document holding it.
    ///
    /// Called only after the key lookup found no readable active session, so
    /// the holders are documents that no longer decode.
    async fn release_active_key(&self, store: &dyn DocumentStore, key: &SessionKey) -> Result<()> {
        let token = key.active_key();
        let holders = store
            .query(
                self.collection(),
                &[Filter::eq("activeKey", token.as_str())],
                None,
            )
            .await?;

        for doc in holders {
            tracing::warn!(
                "Releasing active key held by unreadable session {} for {}/{}/{}",
                doc.id,
                key.user_id,
                key.competence,
                key.level
            );
            store
                .update(
                    self.collection(),
                    &doc.id,
                    fields([("activeKey", Value::Null)]),
                )
                .await?;
        }
        Ok(())
    }

    async fn load_for_key(
        &self,
        store: &dyn DocumentStore,
        key: &SessionKey,
    ) -> Result<Vec<Session>> {
        let filters = [
            Filter::eq("userId", key.user_id.as_str()),
            Filter::eq("competence", key.competence.as_str()),
            Filter::eq("level", key.level.as_str()),
        ];
        let documents = store.query(self.collection(), &filters, None).await?;

        Ok(documents
            .into_iter()
            .filter_map(|doc| match decode(doc) {
                Ok(session) => Some(session),
                Err(err) => {
                    tracing::warn!("Skipping unreadable session document: {}", err);
                    None
                }
            })
            .collect())
    }

    async fn resume(
        &self,
        store: &dyn DocumentStore,
        candidates: Vec<Session>,
        questions: &[Question],
    ) -> Option<Session> {
        let active = candidates.iter().filter(|s| s.is_active()).count();
        if active > 1 {
            tracing::warn!(
                "Found {} active sessions for one key, keeping the most advanced",
                active
            );
        }

        let mut session = select_active(candidates)?;
        match session.reconcile(questions.to_vec()) {
            Reconciliation::Reset { stale_len } => {
                tracing::info!(
                    "Question count changed from {} to {}, resetting session {:?}",
                    stale_len,
                    session.answers.len(),
                    session.id
                );
                if let Err(err) = self.persist_reset(store, &session).await {
                    tracing::warn!("Could not persist session reset: {}", err);
                }
            }
            Reconciliation::Clamped { from, to } => {
                tracing::debug!("Clamped question index {} -> {}", from, to);
            }
            Reconciliation::Unchanged => {}
        }
        Some(session)
    }

    async fn persist_reset(
        &self,
        store: &dyn DocumentStore,
        session: &Session,
    ) -> std::result::Result<(), StoreError> {
        let Some(id) = session.id.as_deref() else {
            return Ok(());
        };
        let fields = fields([
            ("answers", to_value(&session.answers)?),
            ("currentQuestionIndex", to_value(&session.current_question_index)?),
            ("score", to_value(&session.score)?),
            ("passed", to_value(&session.passed)?),
            ("endTime", Value::Null),
        ]);
        store.update(self.collection(), id, fields).await
    }

    /// Record an answer and move the session pointer to it.
    ///
    /// Returns `WriteOutcome::Saved` with the updated session when the write
    /// went through. Unsaved sessions, out-of-range indices and store failures
    /// leave the store untouched.
    pub async fn update_session_answer(
        &self,
        session: &Session,
        question_index: usize,
        answer: Answer,
    ) -> WriteOutcome<Session> {
        let (id, store) = match self.write_target(session) {
            Ok(target) => target,
            Err(reason) => return WriteOutcome::Skipped(reason),
        };

        let mut updated = session.clone();
        if let Err(err) = updated.record_answer(question_index, answer) {
            tracing::warn!("Ignoring answer for session {}: {}", id, err);
            return WriteOutcome::Skipped(SkipReason::Rejected(err));
        }

        let result = match answer_fields(&updated) {
            Ok(fields) => store.update(self.collection(), id, fields).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => WriteOutcome::Saved(updated),
            Err(err) => {
                tracing::warn!("Failed to save answer for session {}: {}", id, err);
                WriteOutcome::Failed(err)
            }
        }
    }

    /// Score the session and mark it finished.
    ///
    /// A session that already has an end time is left alone.
    pub async fn complete_session(
        &self,
        session: &Session,
        correct_answers: u32,
    ) -> WriteOutcome<Session> {
        let (id, store) = match self.write_target(session) {
            Ok(target) => target,
            Err(reason) => return WriteOutcome::Skipped(reason),
        };

        let mut finalized = session.clone();
        if let Err(err) =
            finalized.finalize(correct_answers, Utc::now(), &self.settings.pass_policy)
        {
            tracing::warn!("Not finalizing session {}: {}", id, err);
            return WriteOutcome::Skipped(SkipReason::Rejected(err));
        }

        let result = match completion_fields(&finalized) {
            Ok(fields) => store.update(self.collection(), id, fields).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Completed session {}: score {}, passed {}",
                    id,
                    finalized.score,
                    finalized.passed
                );
                WriteOutcome::Saved(finalized)
            }
            Err(err) => {
                tracing::warn!("Failed to save completion for session {}: {}", id, err);
                WriteOutcome::Failed(err)
            }
        }
    }

    fn write_target<'a>(
        &'a self,
        session: &'a Session,
    ) -> std::result::Result<(&'a str, &'a dyn DocumentStore), SkipReason> {
        let id = session.id.as_deref().ok_or(SkipReason::NotPersisted)?;
        let store = self.store.as_deref().ok_or_else(|| {
            tracing::warn!("No session store configured, session {} kept in memory", id);
            SkipReason::NoStore
        })?;
        Ok((id, store))
    }

    /// Fetch a stored session by id, without questions merged in.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let store = self.store()?;
        match store.get(self.collection(), id).await? {
            Some(doc) => decode(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Finished attempts for `key`, most recent first.
    pub async fn session_history(&self, key: &SessionKey) -> Result<Vec<Session>> {
        let store = self.store()?;
        let mut finished: Vec<Session> = self
            .load_for_key(store, key)
            .await?
            .into_iter()
            .filter(|session| !session.is_active())
            .collect();
        finished.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        Ok(finished)
    }

    /// Highest score among finished attempts for `key`.
    pub async fn best_score(&self, key: &SessionKey) -> Result<Option<u32>> {
        Ok(self
            .session_history(key)
            .await?
            .iter()
            .map(|session| session.score)
            .max())
    }
}

fn decode(doc: Document) -> Result<Session> {
    let mut session: Session = serde_json::from_value(Value::Object(doc.body)).map_err(|source| {
        SessionError::InvalidDocument {
            id: doc.id.clone(),
            source,
        }
    })?;
    session.id = Some(doc.id);
    Ok(session)
}

fn to_body<T: Serialize>(value: &T) -> std::result::Result<Body, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(
            format!("expected a JSON object, got {}", other),
        ))),
    }
}

fn to_value<T: Serialize>(value: &T) -> std::result::Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

fn answer_fields(session: &Session) -> std::result::Result<Body, StoreError> {
    Ok(fields([
        ("answers", to_value(&session.answers)?),
        ("currentQuestionIndex", to_value(&session.current_question_index)?),
    ]))
}

fn completion_fields(session: &Session) -> std::result::Result<Body, StoreError> {
    Ok(fields([
        ("score", to_value(&session.score)?),
        ("passed", to_value(&session.passed)?),
        ("endTime", to_value(&session.end_time)?),
        ("activeKey", Value::Null),
    ]))
}

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Body {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
