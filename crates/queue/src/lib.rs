//! `queue` crate: the fire-and-forget hand-off to the execution subsystem.
//!
//! Every admitted operation produces exactly one [`DispatchRequest`]; the
//! admitter enqueues it and never waits for the executor.

pub mod dispatcher;
pub mod error;
pub mod postgres;
pub mod recording;

pub use dispatcher::{DispatchRequest, Dispatcher};
pub use error::QueueError;
pub use postgres::PgJobDispatcher;
pub use recording::RecordingDispatcher;
