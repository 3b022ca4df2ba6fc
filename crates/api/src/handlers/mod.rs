pub mod groups;
pub mod operations;
pub mod templates;

pub use crate::AppState;
