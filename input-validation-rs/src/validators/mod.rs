//! Validator functions
//!
//! Field-level validators plus the request validator built from them.

pub mod command;
pub mod numeric;
pub mod string;

pub use command::*;
pub use numeric::*;
pub use string::*;

use crate::errors::{ValidationError, ValidationResult};

/// Runs every check and reports all failures together
pub(crate) fn all_of<I>(checks: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = ValidationResult<()>>,
{
    match ValidationError::collect(checks.into_iter().filter_map(Result::err)) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
