//! disorder-sim: bounded out-of-order event stream generator
//!
//! Reads a chronologically ordered dataset, re-emits it with controlled
//! positional disorder, and can sort it back for validation. Intended for
//! testing how stream processors cope with late arrivals.

pub mod channel;
pub mod common;
pub mod config;
pub mod loader;
pub mod parser;
pub mod pipeline;
pub mod simulator;
pub mod sink;
pub mod sorter;
