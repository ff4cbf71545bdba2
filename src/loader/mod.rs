//! Ordered loader - the producer side of the pipeline
//!
//! Architecture:
//! - Reads the source line by line in file order
//! - Decodes each line as UTF-8, replacing invalid sequences with U+FFFD
//! - Parses each line with [`RecordParser`]; malformed lines are counted and dropped
//! - Enqueues accepted events into the [`EventChannel`](crate::channel), waiting
//!   when the channel is full
//! - Stops at end of source, at the record limit, or on shutdown, then drops
//!   its sender so the consumer sees end of stream
//!
//! The source is assumed to be timestamp-ascending. The loader does not
//! enforce this; it counts violations and warns on the first one.

use std::borrow::Cow;
use std::future::Future;
use std::path::Path;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::channel::{event_channel, EventReceiver, EventSender};
use crate::common::{Payload, PipelineError, PipelineResult, ShutdownReceiver};
use crate::parser::{is_header, RecordParser};

/// Read buffer for source files (10 MiB)
pub const SOURCE_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound on accepted events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordLimit {
    /// Read until the source is exhausted
    #[default]
    Unbounded,
    /// Stop after this many accepted events
    Max(u64),
}

impl RecordLimit {
    #[inline]
    pub fn reached(&self, accepted: u64) -> bool {
        match self {
            RecordLimit::Unbounded => false,
            RecordLimit::Max(max) => accepted >= *max,
        }
    }
}

impl From<Option<u64>> for RecordLimit {
    fn from(limit: Option<u64>) -> Self {
        limit.map_or(RecordLimit::Unbounded, RecordLimit::Max)
    }
}

/// Counters reported when a load finishes
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Lines taken from the source (including header and rejected lines)
    pub lines_read: u64,
    /// Events enqueued
    pub accepted: u64,
    /// Lines dropped as malformed
    pub rejected: u64,
    pub header_skipped: bool,
    /// Lines that were not valid UTF-8 and were decoded lossily
    pub invalid_utf8: u64,
    /// Accepted events whose timestamp is below the previous one
    pub out_of_order: u64,
    /// Load stopped early on a shutdown signal
    pub cancelled: bool,
}

/// Dataset loader contract
///
/// One implementation per dataset layout. The consumer half is taken with
/// [`DataLoader::channel`] before [`DataLoader::run`] consumes the loader.
pub trait DataLoader: Send + Sized + 'static {
    type Payload: Payload;

    /// Take the consumer half of the loader's channel (once)
    fn channel(&mut self) -> Option<EventReceiver<Self::Payload>>;

    /// Load `source` into the channel; returns the final counters
    fn run<R>(
        self,
        source: R,
        limit: RecordLimit,
    ) -> impl Future<Output = PipelineResult<LoadReport>> + Send
    where
        R: AsyncBufRead + Unpin + Send + 'static;
}

/// Open a source file for loading
///
/// Failure to open is fatal and names the path.
pub async fn open_source(path: impl AsRef<Path>) -> PipelineResult<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .map_err(|e| PipelineError::source_unavailable(path, e))?;
    info!(path = %path.display(), "Opened source");
    Ok(BufReader::with_capacity(SOURCE_BUFFER_SIZE, file))
}

/// Loader for comma-delimited `timestamp,payload...` sources
pub struct CsvLoader<P: Payload> {
    parser: RecordParser<P>,
    tx: EventSender<P>,
    rx: Option<EventReceiver<P>>,
    shutdown: Option<ShutdownReceiver>,
}

/// Loader for EDGAR log extracts (`time,url`)
pub type EdgarLoader = CsvLoader<String>;

impl<P: Payload> CsvLoader<P> {
    /// Create a loader with a channel of the given capacity (0 = unbounded)
    pub fn new(channel_capacity: usize) -> Self {
        let (tx, rx) = event_channel(channel_capacity);
        Self {
            parser: RecordParser::new(),
            tx,
            rx: Some(rx),
            shutdown: None,
        }
    }

    /// Stop reading when a shutdown signal arrives
    pub fn with_shutdown(mut self, shutdown: ShutdownReceiver) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}

enum Step {
    /// Bytes appended to the line buffer; 0 is end of source
    Read(std::io::Result<usize>),
    Shutdown,
}

/// Read the next raw line into `buf`, or `Shutdown` if the signal fires first
///
/// Bytes from an interrupted read stay in `buf`, so the read can resume.
async fn next_step<R>(
    source: &mut R,
    buf: &mut Vec<u8>,
    shutdown: &mut Option<ShutdownReceiver>,
) -> Step
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(rx) = shutdown.as_mut() else {
            return Step::Read(source.read_until(b'\n', buf).await);
        };

        let sender_gone = tokio::select! {
            biased;

            signal = rx.recv() => match signal {
                Err(RecvError::Closed) => true,
                _ => return Step::Shutdown,
            },

            read = source.read_until(b'\n', buf) => return Step::Read(read),
        };

        // Nobody can signal any more; keep reading without the receiver
        if sender_gone {
            *shutdown = None;
        }
    }
}

impl<P: Payload> DataLoader for CsvLoader<P> {
    type Payload = P;

    fn channel(&mut self) -> Option<EventReceiver<P>> {
        self.rx.take()
    }

    async fn run<R>(self, mut source: R, limit: RecordLimit) -> PipelineResult<LoadReport>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let Self {
            parser,
            tx,
            rx,
            mut shutdown,
        } = self;
        // An untaken receiver would leave nobody to drain the channel
        drop(rx);

        let mut report = LoadReport::default();
        let mut last_timestamp: Option<i64> = None;
        let mut raw = Vec::with_capacity(512);

        while !limit.reached(report.accepted) {
            raw.clear();
            match next_step(&mut source, &mut raw, &mut shutdown).await {
                Step::Read(Ok(0)) => break,
                Step::Read(Ok(_)) => {}
                Step::Read(Err(err)) => {
                    return Err(PipelineError::SourceRead {
                        line: report.lines_read + 1,
                        source: err,
                    });
                }
                Step::Shutdown => {
                    info!("Loader received shutdown signal");
                    report.cancelled = true;
                    break;
                }
            }
            report.lines_read += 1;

            let decoded = String::from_utf8_lossy(&raw);
            if let Cow::Owned(_) = decoded {
                report.invalid_utf8 += 1;
                debug!(line = report.lines_read, "Replaced invalid UTF-8 in record");
            }
            let line = decoded.trim_end_matches(|c| c == '\r' || c == '\n');

            if report.lines_read == 1 && is_header(line) {
                debug!(header = %line, "Skipped header line");
                report.header_skipped = true;
                continue;
            }

            let event = match parser.parse(line) {
                Ok(event) => event,
                Err(failure) => {
                    report.rejected += 1;
                    debug!(line = report.lines_read, %failure, "Dropped malformed record");
                    continue;
                }
            };

            let ts = event.timestamp_ms();
            if last_timestamp.is_some_and(|prev| ts < prev) {
                if report.out_of_order == 0 {
                    warn!(
                        line = report.lines_read,
                        timestamp_ms = ts,
                        "Source is not timestamp-ascending"
                    );
                }
                report.out_of_order += 1;
            }
            last_timestamp = Some(ts);

            tx.send(event).await?;
            report.accepted += 1;
        }

        info!(
            accepted = report.accepted,
            rejected = report.rejected,
            invalid_utf8 = report.invalid_utf8,
            out_of_order = report.out_of_order,
            cancelled = report.cancelled,
            "Total events read"
        );
        debug!("Loader exiting");
        Ok(report)
    }
}
