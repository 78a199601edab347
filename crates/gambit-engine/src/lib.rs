//! # Gambit Engine
//!
//! Lifecycle management and a request/response interface for an external,
//! UCI-like chess analyzer subprocess: binary resolution, line-oriented
//! command/reply correlation, `info` frame parsing, and graceful shutdown.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod binary;
mod error;
mod protocol;

pub use adapter::{
    AnalysisLine, AnalysisResult, AnalyzeOptions, EngineAdapter, ANALYZE_SAFETY_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT, SHUTDOWN_GRACE,
};
pub use binary::{current_platform_entry, resolve, PlatformEntry, PLATFORM_TABLE};
pub use error::{EngineError, Result};
pub use protocol::{BestMove, EngineReply, InfoFrame, Score};
