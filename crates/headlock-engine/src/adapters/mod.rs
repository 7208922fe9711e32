//! Head client implementations.

pub mod memory;

pub use memory::MemoryLedger;
