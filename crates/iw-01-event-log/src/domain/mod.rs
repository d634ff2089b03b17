//! Domain layer: the log itself and its correlation index.

pub mod correlation;
pub mod log;

pub use correlation::{Correlation, CorrelationIndex};
pub use log::{BoundedEventLog, DEFAULT_LOG_CAPACITY};
