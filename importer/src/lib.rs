//! Tracemodel importer: assembles a phase-tagged trace event stream into
//! the structured in-memory model.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

/// Asynchronous slice assembly, nestable and legacy dialects
pub mod async_assembler;
/// Trace container acceptance and top-level key handling
pub mod container;
/// Fatal importer errors
pub mod error;
/// The raw trace event record
pub mod event;
/// Flow event stitching, v1 and v2 dialects
pub mod flow_assembler;
/// The phase dispatcher and import driver
pub mod importer;
/// Memory dump assembly
pub mod memory_dump;
/// Object lifecycle assembly, explicit and implicit
pub mod object_engine;
/// Stack frame table import
pub mod stack_frames;

pub use container::TraceContainer;
pub use error::ImportError;
pub use importer::{ImportOptions, import_trace, import_trace_container};
