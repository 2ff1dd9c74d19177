//! The unlock evaluator: pure decision logic for whether an entry may
//! transition to unlocked right now.
//!
//! The evaluator never mutates anything. Callers that receive
//! [`UnlockOutcome::Unlockable`] are responsible for persisting the
//! transition exactly once (a guarded `is_unlocked = 0` update).

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use pastport_types::models::{Entry, UnlockMode};

use crate::answer;

/// Entry data inconsistent with its declared unlock mode. This is a
/// server-side integrity fault, not a client validation error: the
/// scanner logs it and skips the entry, the API surfaces a 500.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("entry {id} misconfigured: {detail}")]
    Configuration { id: Uuid, detail: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The entry may transition to unlocked now.
    Unlockable,
    /// Idempotent no-op: the entry already transitioned.
    AlreadyUnlocked,
    /// Riddle mode, no answer submitted.
    AnswerRequired,
    /// Riddle mode, wrong answer. No state change; repeatable.
    IncorrectAnswer,
    /// Time mode, `unlock_at` still in the future.
    NotYetUnlockable,
}

impl UnlockOutcome {
    pub fn is_unlockable(&self) -> bool {
        matches!(self, UnlockOutcome::Unlockable)
    }
}

/// Decide whether `entry` should unlock, given an optional submitted
/// answer and the caller's clock.
///
/// Time-locked entries unlock when `now >= unlock_at` (boundary
/// inclusive); any submitted answer is ignored. Riddle entries unlock
/// only on a correct answer, regardless of elapsed time. Mode `none`
/// unlocks on first evaluation.
pub fn evaluate(
    entry: &Entry,
    submitted_answer: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UnlockOutcome, EvalError> {
    if entry.is_unlocked {
        return Ok(UnlockOutcome::AlreadyUnlocked);
    }

    match entry.unlock_mode {
        UnlockMode::Time => {
            let unlock_at = entry.unlock_at.ok_or(EvalError::Configuration {
                id: entry.id,
                detail: "time mode without unlock_at",
            })?;
            if now >= unlock_at {
                Ok(UnlockOutcome::Unlockable)
            } else {
                Ok(UnlockOutcome::NotYetUnlockable)
            }
        }
        UnlockMode::Riddle => {
            let stored_hash =
                entry
                    .riddle_answer_hash
                    .as_deref()
                    .ok_or(EvalError::Configuration {
                        id: entry.id,
                        detail: "riddle mode without answer hash",
                    })?;
            match submitted_answer {
                None => Ok(UnlockOutcome::AnswerRequired),
                Some(a) if answer::verify_answer(a, stored_hash) => Ok(UnlockOutcome::Unlockable),
                Some(_) => Ok(UnlockOutcome::IncorrectAnswer),
            }
        }
        UnlockMode::None => Ok(UnlockOutcome::Unlockable),
    }
}
