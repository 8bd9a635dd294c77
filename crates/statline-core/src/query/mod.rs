//! Generated queries and the validation gate in front of the executor.
//!
//! The only way to obtain a [`ValidatedQuery`] is [`QueryValidator::validate`].

mod generator;
mod model;
mod rejection;
mod validator;

pub use generator::{GenerationError, GenerationRequest, QueryGenerator, require_subject};
pub use model::{GeneratedQuery, QueryStrategy, ValidatedQuery};
pub use rejection::{REJECTION_USER_MESSAGE, Rejection};
pub use validator::{QueryValidator, ValidatorLimits};
