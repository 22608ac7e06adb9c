//! Tracemodel model: the structured, queryable in-memory form of a trace.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

/// Tagged union for trace argument bags
pub mod args;
/// Asynchronous slices and their per-thread group
pub mod async_slice;
/// Min/max range accumulator for event and world bounds
pub mod bounds;
/// Stable name-to-color-id hashing
pub mod color;
/// Counters and their series
pub mod counter;
/// Reverse indices built at finalization
pub mod event_index;
/// Flow events linking slices across threads
pub mod flow;
/// Typed import warnings
pub mod import_warning;
/// Instant events at thread, process, and global scope
pub mod instant;
/// Augmented interval tree over flow events
pub mod interval_tree;
/// Global and per-process memory dumps
pub mod memory_dump;
/// The root aggregate and its finalization passes
pub mod model;
/// Object instances and their dated snapshots
pub mod object;
/// Process containers
pub mod process;
/// Trace samples
pub mod sample;
/// Synchronous slices
pub mod slice;
/// Per-thread slice group with the open-slice stack
pub mod slice_group;
/// Stack frame table keyed by fully-qualified id
pub mod stack_frame;
/// Thread containers
pub mod thread;
/// Time units and timestamp conversion
pub mod time;
