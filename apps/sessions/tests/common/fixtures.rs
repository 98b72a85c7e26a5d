//! Test fixtures and factory functions for creating test data.

use chrono::Utc;
use ladico_core::{Answer, Question, Session, SessionKey};

/// Generate `n` single-choice questions whose correct answer is index 0.
pub fn questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| Question {
            id: format!("q-{}", i + 1),
            competence: "1.1".to_string(),
            correct_answer: Answer::Single(0),
        })
        .collect()
}

pub fn key(user_id: &str) -> SessionKey {
    SessionKey::new(user_id, "1.1", "basico")
}

/// An active session with the first `answered` slots filled in.
pub fn active_session(key: &SessionKey, total: usize, answered: usize) -> Session {
    let mut session = Session::start(key, questions(total), Utc::now());
    for index in 0..answered {
        session
            .record_answer(index, Answer::Single(0))
            .expect("index in range");
    }
    session
}

/// A finished session for history queries.
#[allow(dead_code)]
pub fn finished_session(key: &SessionKey, score: u32, minutes_ago: i64) -> Session {
    let mut session = Session::start(key, questions(3), Utc::now());
    session.end_time = Some(Utc::now() - chrono::Duration::minutes(minutes_ago));
    session.score = score;
    session.passed = score >= 67;
    session.active_key = None;
    session
}
