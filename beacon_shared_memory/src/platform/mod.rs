//! Platform specific primitives

pub mod linux;

pub use linux::*;
