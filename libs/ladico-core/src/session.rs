//! Rules that keep a stored quiz attempt consistent with the live question set.
//!
//! Everything here is pure: persistence is the caller's job. The store-backed
//! reconciler applies these rules and then writes the changed fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionStateError};
use crate::types::{Answer, Question, Session, SessionKey};

/// Minimum number of correct answers needed to pass an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassPolicy {
    pub min_correct: u32,
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self { min_correct: 2 }
    }
}

impl PassPolicy {
    pub fn passes(&self, correct: u32) -> bool {
        correct >= self.min_correct
    }
}

/// What `Session::reconcile` had to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Stored answers were kept as they were.
    Unchanged,
    /// The pointer was past the end and was moved back into range.
    Clamped { from: usize, to: usize },
    /// The question count changed, so stored progress was discarded.
    Reset { stale_len: usize },
}

impl Reconciliation {
    /// Only a reset changes persisted fields.
    pub fn needs_persist(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }
}

/// Percentage of correct answers, rounded half up.
pub fn score_percent(correct: u32, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let ratio = f64::from(correct) / total as f64;
    ((ratio * 100.0).round() as u32).min(100)
}

/// Pick the session to resume among stored candidates for one key.
///
/// Finalized sessions are ignored. Several active ones should not exist; when
/// they do, the one with the most answered slots wins and ties keep the
/// earliest candidate.
pub fn select_active(candidates: Vec<Session>) -> Option<Session> {
    candidates
        .into_iter()
        .filter(Session::is_active)
        .fold(None, |best: Option<Session>, candidate| match best {
            Some(current) if current.answered_count() >= candidate.answered_count() => {
                Some(current)
            }
            _ => Some(candidate),
        })
}

impl Session {
    /// A fresh attempt with every slot unanswered.
    pub fn start(key: &SessionKey, questions: Vec<Question>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: key.user_id.clone(),
            competence: key.competence.clone(),
            level: key.level.clone(),
            answers: vec![None; questions.len()],
            questions,
            current_question_index: 0,
            start_time: now,
            end_time: None,
            score: 0,
            passed: false,
            active_key: Some(key.active_key()),
        }
    }

    /// Align stored answer state with `questions` and merge them in.
    ///
    /// A different question count drops all stored answers; otherwise an
    /// out-of-range pointer moves to the first unanswered slot, or the last
    /// slot when everything is answered.
    pub fn reconcile(&mut self, questions: Vec<Question>) -> Reconciliation {
        let len = questions.len();
        let outcome = if self.answers.len() != len {
            let stale_len = self.answers.len();
            self.reset_answers(len);
            Reconciliation::Reset { stale_len }
        } else if self.current_question_index >= len {
            let from = self.current_question_index;
            let to = self
                .first_unanswered()
                .unwrap_or_else(|| len.saturating_sub(1));
            self.current_question_index = to;
            Reconciliation::Clamped { from, to }
        } else {
            Reconciliation::Unchanged
        };

        self.questions = questions;
        outcome
    }

    fn reset_answers(&mut self, len: usize) {
        self.answers = vec![None; len];
        self.current_question_index = 0;
        self.score = 0;
        self.passed = false;
        self.end_time = None;
    }

    /// Store `answer` in slot `index` and point the session at it.
    ///
    /// Re-answering a slot replaces the previous value.
    pub fn record_answer(&mut self, index: usize, answer: Answer) -> Result<()> {
        let len = self.answers.len();
        let slot = self
            .answers
            .get_mut(index)
            .ok_or(SessionStateError::IndexOutOfRange { index, len })?;
        *slot = Some(answer);
        self.current_question_index = index;
        Ok(())
    }

    /// Score the attempt and mark it terminal.
    pub fn finalize(
        &mut self,
        correct_answers: u32,
        now: DateTime<Utc>,
        policy: &PassPolicy,
    ) -> Result<()> {
        if !self.is_active() {
            return Err(SessionStateError::AlreadyCompleted);
        }

        self.score = score_percent(correct_answers, self.answers.len());
        self.passed = policy.passes(correct_answers);
        self.end_time = Some(now);
        self.active_key = None;
        Ok(())
    }
}
