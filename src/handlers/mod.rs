pub mod admin;
pub mod catalog;
pub mod common;
pub mod search;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
