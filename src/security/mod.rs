//! Input safety checks applied before any network activity.

pub mod url_validation;

pub use url_validation::{validate_url, ValidatedUrl, ValidationOptions};
