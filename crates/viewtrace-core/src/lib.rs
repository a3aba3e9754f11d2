//! # Viewtrace Core
//!
//! Compile-time instrumentation and run-time checking of declarative view bodies:
//! - Syntax tree for view declarations, with source generation
//! - Instrumentation passes (dependency extraction, expression analysis, body
//!   rewriting, metadata emission) packaged as the `@TrackPerformance` macro
//! - Declaration expansion over in-memory and on-disk source files
//! - Recomputation recorder, tracking shim, reference render host and the
//!   over-render harness
//!
//! The core never parses source text: host adapters lower their parse trees into
//! [`ast::SourceFile`] (or implement [`ast::SyntaxNode`] over their own trees).

#![warn(clippy::all)]

pub mod ast;
pub mod config;
pub mod instrument;
pub mod runtime;
pub mod tracer;

// Re-export commonly used types
pub use ast::{SourceFile, SyntaxNode, ToSource, ViewDecl};
pub use config::{ExpansionMode, HarnessConfig, HostConfig, InstrumentConfig, InvalidationStrategy, Vocabulary};
pub use instrument::{
    instrument_view, Expansion, InstrumentError, ReactiveField, TrackPerformance, TrackedExpressionRecord,
    ViewMetadata,
};
pub use runtime::{
    FieldValue, HarnessError, HarnessReport, HostError, LiveHost, LiveView, OverRenderHarness, ReactiveState,
    Recorder, RecorderError, StateError, TrackRecomputations, Violation,
};
pub use tracer::{FileTracer, ViewTracer};

use tracing_subscriber::EnvFilter;

/// Viewtrace version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for viewtrace components
pub fn init_tracing() {
    init_tracing_with("viewtrace_core=info");
}

/// Initialize tracing with a default directive, overridden by `RUST_LOG` when set
pub fn init_tracing_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    // A subscriber may already be installed (tests, embedding hosts)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Error types for viewtrace operations
#[derive(thiserror::Error, Debug)]
pub enum ViewtraceError {
    #[error("Instrumentation error: {0}")]
    Instrument(#[from] InstrumentError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Harness error: {0}")]
    Harness(#[from] HarnessError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("File error: {0}")]
    File(#[from] anyhow::Error),
}

/// Result type for viewtrace operations
pub type Result<T> = std::result::Result<T, ViewtraceError>;
