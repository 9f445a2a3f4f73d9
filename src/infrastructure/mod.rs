pub mod cancel;
pub mod error;
pub mod logging;

pub use cancel::CancellationToken;
pub use error::{AnalysisError, ErrorCategory, ErrorSeverity, Result};
pub use logging::{setup_logging, LogFormat, LogOutput, LoggingConfig, RunTracker};
