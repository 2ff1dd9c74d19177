pub mod auth;
pub mod entries;
pub mod middleware;
pub mod notifications;
pub mod ownership;
pub mod preferences;

pub use auth::{AppState, AppStateInner};
