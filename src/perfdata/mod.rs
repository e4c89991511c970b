//! Decoder for the instrumentation buffer format published by monitored VMs.
//!
//! The region starts with a fixed [`Prologue`] that establishes the byte
//! order and version of everything that follows, then carries a stream of
//! variable-length, self-describing counter entries. The producer appends
//! entries and updates values in place without any synchronization, so
//! everything in this module is written to re-read live fields and to
//! treat the buffer as potentially mid-update at all times.

mod types;
pub use types::{Endianness, TypeCode, Units, Variability};

mod prologue;
pub use prologue::{Prologue, PERF_DATA_MAGIC, PROLOGUE_SIZE, SUPPORTED_MAJOR_VERSION};

mod entry;
pub use entry::{Counter, CounterData, CounterKind, CounterSnapshot};

mod scanner;
pub use scanner::{CounterIndex, Scanner};

#[cfg(test)]
pub(crate) mod testbuf;
