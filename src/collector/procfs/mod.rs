//! Readers for the Linux `/proc` filesystem.
//!
//! This module provides parsers and collectors for reading tick counters
//! and process information from the `/proc` virtual filesystem.

pub mod parser;
pub mod process;
pub mod ticks;

pub use process::{ProcessEnumerator, ProcessIterator, ProcessRecord};
pub use ticks::{TickSample, TickSnapshotStore};
