//! Pipeline - one end-to-end run
//!
//! Architecture:
//! - Loader task (`tokio::spawn`): source → parser → event channel
//! - Consumer (caller's task): event channel → simulator or sorter → sink
//!
//! The channel is the only state shared between the two. A shutdown signal
//! stops the loader, which drops its sender; the consumer drains what is
//! buffered and the run completes normally with `cancelled` set.

use serde::Serialize;
use tokio::io::AsyncBufRead;
use tracing::{info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::common::{Event, Payload, PipelineError, PipelineResult, ShutdownReceiver};
use crate::config::{Config, RunMode};
use crate::loader::{open_source, DataLoader, EdgarLoader, LoadReport, RecordLimit};
use crate::simulator::{DisorderSimulator, DisorderWindow, SelectionPolicy};
use crate::sink::{CsvSink, Sink};
use crate::sorter::Sorter;

/// Consumer-side parameters of a run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub limit: RecordLimit,
    pub window: DisorderWindow,
    pub policy: SelectionPolicy,
    pub mode: RunMode,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        Ok(Self {
            limit: config.record_limit(),
            window: config.disorder_window()?,
            policy: config.selection_policy(),
            mode: config.disorder.mode,
        })
    }
}

/// Order-sensitive hash of the emitted sequence
///
/// Two runs over the same source with the same window and policy produce
/// the same fingerprint.
#[derive(Debug, Default, Clone)]
pub struct ArrivalFingerprint {
    state: u64,
    events: u64,
}

impl ArrivalFingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update<P: Payload>(&mut self, event: &Event<P>) {
        let hash = xxh64(event.to_csv_line().as_bytes(), 0);
        self.state = self.state.rotate_left(5) ^ hash;
        self.events += 1;
    }

    pub fn finalize(&self) -> u64 {
        self.state ^ self.events
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub window: DisorderWindow,
    pub policy: SelectionPolicy,
    pub load: LoadReport,
    pub emitted: u64,
    pub max_displacement: u64,
    pub forced: u64,
    /// Hex xxh64 fingerprint of the emitted order
    pub arrival_fingerprint: String,
}

/// Run `loader` over `source`, writing the consumer's output to `sink`
///
/// The sink is closed on success. On failure the error is returned and the
/// loader task ends once its channel is dropped.
pub async fn run_with<L, R, S>(
    mut loader: L,
    source: R,
    sink: &mut S,
    options: RunOptions,
) -> PipelineResult<RunReport>
where
    L: DataLoader,
    R: AsyncBufRead + Unpin + Send + 'static,
    S: Sink<L::Payload>,
{
    let rx = loader.channel().ok_or(PipelineError::ReceiverTaken)?;
    let producer = tokio::spawn(loader.run(source, options.limit));

    let mut fingerprint = ArrivalFingerprint::new();
    let mut emitted = 0u64;
    let (max_displacement, forced) = match options.mode {
        RunMode::Disorder => {
            let mut simulator =
                DisorderSimulator::new(rx, options.policy).with_window(options.window);
            while let Some(event) = simulator.next().await {
                fingerprint.update(&event);
                sink.persist(event)?;
                emitted += 1;
            }
            let stats = simulator.stats();
            (stats.max_displacement, stats.forced)
        }
        RunMode::Sorted => {
            for event in Sorter::drain(rx).await {
                fingerprint.update(&event);
                sink.persist(event)?;
                emitted += 1;
            }
            (0, 0)
        }
    };

    let load = producer.await??;
    sink.close()?;

    if emitted != load.accepted {
        // Every accepted event must come out exactly once
        warn!(emitted, accepted = load.accepted, "Emitted count differs from accepted count");
    }
    if max_displacement > options.window.get() as u64 {
        warn!(
            max_displacement,
            window = options.window.get(),
            "Displacement exceeded the disorder window"
        );
    }

    let report = RunReport {
        mode: options.mode,
        window: options.window,
        policy: options.policy,
        load,
        emitted,
        max_displacement,
        forced,
        arrival_fingerprint: format!("{:016x}", fingerprint.finalize()),
    };

    info!(
        mode = ?report.mode,
        emitted = report.emitted,
        max_displacement = report.max_displacement,
        fingerprint = %report.arrival_fingerprint,
        "Run complete"
    );
    Ok(report)
}

/// File-to-file pipeline for EDGAR-style `time,url` datasets
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Validate `config` and build the pipeline
    pub fn new(config: Config) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open source and sink, then run to completion or shutdown
    pub async fn run(&self, shutdown: ShutdownReceiver) -> PipelineResult<RunReport> {
        let options = RunOptions::from_config(&self.config)?;

        info!(
            source = %self.config.source.path.display(),
            sink = %self.config.sink.path.display(),
            limit = ?options.limit,
            window = options.window.get(),
            policy = ?options.policy,
            mode = ?options.mode,
            "Starting pipeline"
        );

        let source = open_source(&self.config.source.path).await?;
        let mut sink = CsvSink::create(&self.config.sink.path)?;
        let loader = EdgarLoader::new(self.config.source.channel_capacity).with_shutdown(shutdown);

        run_with(loader, source, &mut sink, options).await
    }
}
