//! Small shared helpers.

mod timing;

pub use timing::{duration_to_ms, elapsed_ms};
