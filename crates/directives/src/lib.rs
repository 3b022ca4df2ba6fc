//! `directives` crate: the directive-factory contract and its implementations.
//!
//! The plan builder in `engine` never constructs directives itself; it asks a
//! [`DirectiveFactory`] to compile one template step against a machine list and
//! links the results as they are produced.

pub mod catalog;
pub mod error;
pub mod mock;
pub mod traits;

pub use catalog::CatalogFactory;
pub use error::FactoryError;
pub use traits::{DirectiveFactory, StepInfo};
