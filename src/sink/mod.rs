//! Sinks - final destination of the emitted sequence
//!
//! A sink receives events one at a time in emission order. The CSV sink
//! writes the source format back out (`timestamp,field1,...`, timestamp as
//! UTC `YYYY-MM-DD HH:MM:SS.ffffff`), so its output can be loaded again.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::common::{Event, Payload};

/// Sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sink {0} already closed")]
    Closed(String),
}

/// Append-only event destination
pub trait Sink<P: Payload> {
    /// Append one event
    fn persist(&mut self, event: Event<P>) -> Result<(), SinkError>;

    /// Flush and release the underlying resource; later persists fail
    fn close(&mut self) -> Result<(), SinkError>;
}

/// CSV writer sink
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: Option<BufWriter<W>>,
    target: String,
    written: u64,
}

impl CsvSink<File> {
    /// Create (truncate) `path`, creating parent directories as needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let create_err = |source| SinkError::Create {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(create_err)?;
        }
        let file = File::create(path).map_err(create_err)?;

        info!(path = %path.display(), "Opened output file");
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap any writer; `target` names it in errors and logs
    pub fn new(writer: W, target: impl Into<String>) -> Self {
        Self {
            writer: Some(BufWriter::with_capacity(64 * 1024, writer)),
            target: target.into(),
            written: 0,
        }
    }

    /// Number of events written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write_err(&self, source: std::io::Error) -> SinkError {
        SinkError::Write {
            target: self.target.clone(),
            source,
        }
    }

    /// Close and hand back the inner writer
    pub fn into_inner(mut self) -> Result<W, SinkError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| SinkError::Closed(self.target.clone()))?;
        writer
            .into_inner()
            .map_err(|e| self.write_err(e.into_error()))
    }
}

impl<P: Payload, W: Write> Sink<P> for CsvSink<W> {
    fn persist(&mut self, event: Event<P>) -> Result<(), SinkError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(SinkError::Closed(self.target.clone()));
        };
        let result = writeln!(writer, "{}", event.to_csv_line());
        result.map_err(|e| self.write_err(e))?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| self.write_err(e))?;
            info!(output = %self.target, events = self.written, "Closed output");
        } else {
            debug!(output = %self.target, "Sink already closed");
        }
        Ok(())
    }
}

/// In-memory sink; keeps every event in emission order
#[derive(Debug)]
pub struct MemorySink<P> {
    events: Vec<Event<P>>,
    closed: bool,
}

impl<P> Default for MemorySink<P> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            closed: false,
        }
    }
}

impl<P: Payload> MemorySink<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event<P>] {
        &self.events
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_events(self) -> Vec<Event<P>> {
        self.events
    }
}

impl<P: Payload> Sink<P> for MemorySink<P> {
    fn persist(&mut self, event: Event<P>) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed("memory".to_string()));
        }
        self.events.push(event);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }
}
