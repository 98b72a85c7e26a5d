//! Core library for Ladico competency assessments.
//!
//! Provides:
//! - Quiz session types and the rules that keep a stored attempt in step
//!   with the question set being presented
//! - Answer normalization and comparison for free-text, numeric and date input

pub mod error;
pub mod matching;
pub mod session;
pub mod types;

pub use error::{Result, SessionStateError};
pub use matching::{
    check_answer, compare_dates, compare_numbers, compare_text, normalize_text,
    parse_flexible_date, parse_flexible_number, DateInput, ExpectedAnswer, Verdict,
    DEFAULT_TOLERANCE,
};
pub use session::{score_percent, select_active, PassPolicy, Reconciliation};
pub use types::{Answer, Question, Session, SessionKey, SessionProgress};
