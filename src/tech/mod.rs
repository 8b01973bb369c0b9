//! Process-specific implementations.

pub mod sky130;
