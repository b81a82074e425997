//! Common infrastructure for the pktx crates.
//!
//! Currently this is the logging bootstrap shared by binaries, examples and
//! tests, together with the error type it reports.

pub mod errors;
pub mod logging;

pub use errors::{Error, Result};
pub use logging::{LoggingConfig, log_welcome, setup_logging};
