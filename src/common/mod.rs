//! Common data types shared across components
//!
//! This module defines the event record that travels through the pipeline
//! and the payload abstraction that lets one loader serve any dataset
//! layout with a fixed number of payload columns.

use std::fmt;

use crate::parser::format_timestamp;

pub mod cli;
pub use cli::{CommonArgs, RunArgs};

pub mod error;
pub use error::{PipelineError, PipelineResult};

pub mod shutdown;
pub use shutdown::{setup_shutdown, ShutdownReceiver, ShutdownSender};

/// Fixed-arity payload carried behind the timestamp column
///
/// A dataset row is `timestamp,field1,...,fieldN`. The payload owns the
/// `N` trailing fields; extra columns beyond `ARITY` are ignored.
pub trait Payload: fmt::Debug + Clone + PartialEq + Send + 'static {
    /// Number of fields this payload consumes
    const ARITY: usize;

    /// Build from the fields following the timestamp.
    ///
    /// Returns `None` when fewer than `ARITY` fields are present.
    fn from_fields(fields: &[&str]) -> Option<Self>;

    /// Fields in column order, for writing back out
    fn fields(&self) -> Vec<&str>;
}

/// Single-column payload (e.g. the EDGAR log URL)
impl Payload for String {
    const ARITY: usize = 1;

    fn from_fields(fields: &[&str]) -> Option<Self> {
        fields.first().map(|f| (*f).to_string())
    }

    fn fields(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

impl<const N: usize> Payload for [String; N] {
    const ARITY: usize = N;

    fn from_fields(fields: &[&str]) -> Option<Self> {
        if fields.len() < N {
            return None;
        }
        Some(std::array::from_fn(|i| fields[i].to_string()))
    }

    fn fields(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

/// One source record: a millisecond timestamp followed by its payload
///
/// Only well-formed records are ever turned into an `Event`; there is no
/// way to construct one with an undefined timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P = String> {
    timestamp_ms: i64,
    payload: P,
}

impl<P: Payload> Event<P> {
    /// Create a new event
    pub fn new(timestamp_ms: i64, payload: P) -> Self {
        Self {
            timestamp_ms,
            payload,
        }
    }

    /// Source timestamp in milliseconds since the Unix epoch (UTC)
    #[inline]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Opaque payload fields
    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Render as a CSV line (without newline) in the source layout
    pub fn to_csv_line(&self) -> String {
        let mut line = format_timestamp(self.timestamp_ms);
        for field in self.payload.fields() {
            line.push(',');
            line.push_str(field);
        }
        line
    }
}

impl<P: Payload> fmt::Display for Event<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv_line())
    }
}
