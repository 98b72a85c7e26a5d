//! Core types for quiz sessions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded answer for one question slot.
///
/// Stored untagged: a single choice is a bare index, a multi-select answer
/// is an array of indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(usize),
    Multiple(BTreeSet<usize>),
}

impl Answer {
    /// Build a multi-select answer from any list of indices.
    pub fn multiple(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::Multiple(indices.into_iter().collect())
    }

    /// The chosen indices as a set.
    pub fn indices(&self) -> BTreeSet<usize> {
        match self {
            Self::Single(index) => BTreeSet::from([*index]),
            Self::Multiple(indices) => indices.clone(),
        }
    }
}

/// Exercise question as supplied by the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub competence: String,
    pub correct_answer: Answer,
}

impl Question {
    /// Whether `answer` selects exactly the correct indices.
    pub fn is_correct(&self, answer: &Answer) -> bool {
        self.correct_answer.indices() == answer.indices()
    }
}

/// Partition key of a session: one user, one competence, one level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub user_id: String,
    pub competence: String,
    pub level: String,
}

impl SessionKey {
    pub fn new(
        user_id: impl Into<String>,
        competence: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            competence: competence.into(),
            level: level.into(),
        }
    }

    /// Uniqueness token held by the active session of this key.
    ///
    /// Encoded as a JSON array so separators inside ids cannot collide.
    pub fn active_key(&self) -> String {
        serde_json::Value::from(vec![
            self.user_id.as_str(),
            self.competence.as_str(),
            self.level.as_str(),
            "active",
        ])
        .to_string()
    }
}

/// One quiz attempt for a (user, competence, level) triple.
///
/// `id` is assigned by the store and `questions` is merged in on every load;
/// neither is part of the persisted body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip)]
    pub id: Option<String>,
    pub user_id: String,
    pub competence: String,
    pub level: String,
    #[serde(skip)]
    pub questions: Vec<Question>,
    pub answers: Vec<Option<Answer>>,
    pub current_question_index: usize,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub active_key: Option<String>,
}

impl Session {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.user_id, &self.competence, &self.level)
    }

    /// Active means not yet finalized.
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Number of slots holding an answer.
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn first_unanswered(&self) -> Option<usize> {
        self.answers.iter().position(Option::is_none)
    }

    /// Count answers matching the merged questions' correct answers.
    pub fn count_correct(&self) -> u32 {
        let correct = self
            .questions
            .iter()
            .zip(&self.answers)
            .filter(|(question, slot)| {
                slot.as_ref()
                    .map_or(false, |answer| question.is_correct(answer))
            })
            .count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    pub fn progress(&self) -> SessionProgress {
        let total = self.answers.len();
        let answered = self.answered_count();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: !self.is_active(),
        }
    }
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}
