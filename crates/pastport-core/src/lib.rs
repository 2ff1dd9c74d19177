pub mod answer;
pub mod evaluate;

pub use evaluate::{evaluate, EvalError, UnlockOutcome};
