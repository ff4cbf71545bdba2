//! Disorder simulator - re-emits a source-ordered stream in arrival order
//!
//! The simulator keeps a sliding window of up to `W + 1` events pulled from
//! the event channel in source order. Each emission picks one buffered event
//! and backfills the window with the next event from the channel.
//!
//! # Displacement bound
//!
//! Every event leaves at an emission index `e` with `|e - p| <= W`, where
//! `p` is its source position:
//! - Early: the window never holds positions beyond `e + W`
//! - Late: when the oldest buffered event has been overtaken `W` times
//!   (`e >= p + W`) it is emitted regardless of the policy
//!
//! `W = 0` therefore degenerates to exact passthrough.
//!
//! # Selection policies
//!
//! - `Random { seed }`: uniform choice among buffered events, `StdRng` seeded
//!   per run so output is reproducible
//! - `RoundRobin`: index `cursor % len`, the cursor advancing once per
//!   policy-driven emission (deadline emissions do not move it)

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::channel::EventReceiver;
use crate::common::{Event, Payload};
use crate::config::ConfigError;

/// Maximum positional displacement the simulator may introduce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisorderWindow(usize);

impl DisorderWindow {
    /// No disorder: events leave in source order
    pub const PASSTHROUGH: Self = Self(0);

    /// Validate a window size; negative values are rejected
    pub fn new(window: i64) -> Result<Self, ConfigError> {
        usize::try_from(window).map(Self).map_err(|_| {
            ConfigError::invalid("disorder.window", format!("must be >= 0, got {window}"))
        })
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0
    }

    /// Events held at once: the one leaving plus `W` that may trade places with it
    #[inline]
    fn buffer_len(&self) -> usize {
        self.0.saturating_add(1)
    }
}

/// Rule for picking which buffered event leaves next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum SelectionPolicy {
    Random { seed: u64 },
    RoundRobin,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::Random { seed: 0 }
    }
}

enum Selector {
    Random(StdRng),
    RoundRobin { cursor: usize },
}

impl Selector {
    fn new(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::Random { seed } => Selector::Random(StdRng::seed_from_u64(seed)),
            SelectionPolicy::RoundRobin => Selector::RoundRobin { cursor: 0 },
        }
    }

    fn pick(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        match self {
            Selector::Random(rng) => rng.gen_range(0..len),
            Selector::RoundRobin { cursor } => {
                let idx = *cursor % len;
                *cursor = cursor.wrapping_add(1);
                idx
            }
        }
    }
}

struct Slot<P> {
    position: u64,
    event: Event<P>,
}

/// Emission statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatorStats {
    pub emitted: u64,
    /// Events emitted by the deadline rule rather than the policy
    pub forced: u64,
    /// Largest `|emission index - source position|` observed
    pub max_displacement: u64,
}

/// Bounded-window disorder simulator (the consumer side)
pub struct DisorderSimulator<P: Payload> {
    rx: EventReceiver<P>,
    window: DisorderWindow,
    policy: SelectionPolicy,
    selector: Selector,
    buffer: VecDeque<Slot<P>>,
    next_position: u64,
    stats: SimulatorStats,
    upstream_done: bool,
    initialized: bool,
    finished: bool,
}

impl<P: Payload> DisorderSimulator<P> {
    /// Create a simulator over `rx`; the window starts at passthrough
    pub fn new(rx: EventReceiver<P>, policy: SelectionPolicy) -> Self {
        Self {
            rx,
            window: DisorderWindow::PASSTHROUGH,
            policy,
            selector: Selector::new(policy),
            buffer: VecDeque::new(),
            next_position: 0,
            stats: SimulatorStats::default(),
            upstream_done: false,
            initialized: false,
            finished: false,
        }
    }

    /// Builder form of [`configure`](Self::configure) for an already validated window
    pub fn with_window(mut self, window: DisorderWindow) -> Self {
        self.window = window;
        self
    }

    /// Set the disorder window
    ///
    /// Rejects negative sizes, and any change once [`init`](Self::init) ran.
    pub fn configure(&mut self, window: i64) -> Result<(), ConfigError> {
        let window = DisorderWindow::new(window)?;
        if self.initialized && window != self.window {
            return Err(ConfigError::invalid(
                "disorder.window",
                "cannot change after the window was filled",
            ));
        }
        self.window = window;
        Ok(())
    }

    pub fn window(&self) -> DisorderWindow {
        self.window
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn stats(&self) -> &SimulatorStats {
        &self.stats
    }

    /// Pull one event from the channel into the window
    async fn pull(&mut self) -> bool {
        if self.upstream_done {
            return false;
        }
        match self.rx.recv().await {
            Some(event) => {
                self.buffer.push_back(Slot {
                    position: self.next_position,
                    event,
                });
                self.next_position += 1;
                true
            }
            None => {
                self.upstream_done = true;
                debug!(pulled = self.next_position, "Upstream exhausted, draining window");
                false
            }
        }
    }

    /// Preload the window from the channel
    ///
    /// Called implicitly by the first [`next`](Self::next); calling it again is a no-op.
    pub async fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        while self.buffer.len() < self.window.buffer_len() && self.pull().await {}
        info!(
            window = self.window.get(),
            policy = ?self.policy,
            preloaded = self.buffer.len(),
            "Disorder simulator initialized"
        );
    }

    /// Next event in arrival order; `None` is end of stream (and stays so)
    pub async fn next(&mut self) -> Option<Event<P>> {
        if self.finished {
            return None;
        }
        self.init().await;

        let Some(front) = self.buffer.front() else {
            self.finished = true;
            info!(
                emitted = self.stats.emitted,
                forced = self.stats.forced,
                max_displacement = self.stats.max_displacement,
                "Disorder simulator reached end of stream"
            );
            return None;
        };

        let emission = self.stats.emitted;
        let window = self.window.get() as u64;
        let idx = if emission >= front.position.saturating_add(window) {
            self.stats.forced += 1;
            0
        } else {
            self.selector.pick(self.buffer.len())
        };

        let slot = self.buffer.remove(idx)?;
        self.stats.emitted += 1;
        self.stats.max_displacement = self
            .stats
            .max_displacement
            .max(emission.abs_diff(slot.position));

        self.pull().await;
        Some(slot.event)
    }

    /// Drain the whole stream in arrival order
    pub async fn emit_all(&mut self) -> Vec<Event<P>> {
        let mut out = Vec::new();
        while let Some(event) = self.next().await {
            out.push(event);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::event_channel;

    /// Channel preloaded with events whose timestamp equals their source position
    async fn source(n: u64) -> EventReceiver<String> {
        let (tx, rx) = event_channel(0);
        for i in 0..n {
            tx.send(Event::new(i as i64, format!("e{i}"))).await.unwrap();
        }
        rx
    }

    async fn arrival_positions(n: u64, window: i64, policy: SelectionPolicy) -> Vec<u64> {
        let mut sim = DisorderSimulator::new(source(n).await, policy);
        sim.configure(window).unwrap();
        sim.emit_all()
            .await
            .into_iter()
            .map(|e| e.timestamp_ms() as u64)
            .collect()
    }

    fn assert_bounded_permutation(order: &[u64], window: u64) {
        let mut seen = vec![false; order.len()];
        for (e, &p) in order.iter().enumerate() {
            assert!(!seen[p as usize], "position {p} emitted twice");
            seen[p as usize] = true;
            assert!(
                (e as u64).abs_diff(p) <= window,
                "position {p} emitted at {e} exceeds window {window}"
            );
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_window_rejects_negative() {
        assert!(DisorderWindow::new(-1).is_err());
        assert_eq!(DisorderWindow::new(0).unwrap(), DisorderWindow::PASSTHROUGH);
        assert_eq!(DisorderWindow::new(7).unwrap().get(), 7);
    }

    #[tokio::test]
    async fn test_configure_rejects_negative() {
        let mut sim = DisorderSimulator::new(source(1).await, SelectionPolicy::RoundRobin);
        let err = sim.configure(-3).unwrap_err();
        assert!(err.to_string().contains("disorder.window"));
        assert_eq!(sim.window(), DisorderWindow::PASSTHROUGH);
    }

    #[tokio::test]
    async fn test_configure_after_init_rejected() {
        let mut sim = DisorderSimulator::new(source(4).await, SelectionPolicy::RoundRobin);
        sim.configure(2).unwrap();
        sim.init().await;
        assert!(sim.configure(3).is_err());
        assert!(sim.configure(2).is_ok());
    }

    #[tokio::test]
    async fn test_zero_window_is_passthrough() {
        for policy in [SelectionPolicy::Random { seed: 1 }, SelectionPolicy::RoundRobin] {
            let order = arrival_positions(50, 0, policy).await;
            assert_eq!(order, (0..50).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_round_robin_is_deterministic() {
        let order = arrival_positions(4, 1, SelectionPolicy::RoundRobin).await;
        assert_eq!(order, vec![0, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_displacement_bounded_for_all_windows() {
        for window in [1u64, 2, 3, 5, 10, 64] {
            for seed in 0..20 {
                let policy = SelectionPolicy::Random { seed };
                let order = arrival_positions(200, window as i64, policy).await;
                assert_bounded_permutation(&order, window);
            }
            let order = arrival_positions(200, window as i64, SelectionPolicy::RoundRobin).await;
            assert_bounded_permutation(&order, window);
        }
    }

    #[tokio::test]
    async fn test_random_policy_actually_disorders() {
        let order = arrival_positions(200, 5, SelectionPolicy::Random { seed: 42 }).await;
        assert_ne!(order, (0..200).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_same_seed_same_order() {
        let a = arrival_positions(100, 4, SelectionPolicy::Random { seed: 9 }).await;
        let b = arrival_positions(100, 4, SelectionPolicy::Random { seed: 9 }).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_window_larger_than_stream() {
        let order = arrival_positions(3, 100, SelectionPolicy::Random { seed: 3 }).await;
        assert_bounded_permutation(&order, 100);
        assert_eq!(order.len(), 3);
    }

    #[tokio::test]
    async fn test_end_of_stream_is_idempotent() {
        let mut sim = DisorderSimulator::new(source(2).await, SelectionPolicy::RoundRobin);
        sim.configure(1).unwrap();
        assert!(sim.next().await.is_some());
        assert!(sim.next().await.is_some());
        assert!(sim.next().await.is_none());
        assert!(sim.next().await.is_none());
        assert_eq!(sim.stats().emitted, 2);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut sim = DisorderSimulator::new(source(0).await, SelectionPolicy::default());
        sim.configure(3).unwrap();
        assert!(sim.emit_all().await.is_empty());
        assert!(sim.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stats_track_displacement() {
        let mut sim = DisorderSimulator::new(source(100).await, SelectionPolicy::Random { seed: 5 })
            .with_window(DisorderWindow::new(3).unwrap());
        let out = sim.emit_all().await;
        assert_eq!(out.len(), 100);
        let stats = sim.stats();
        assert_eq!(stats.emitted, 100);
        assert!(stats.max_displacement <= 3);
        assert!(stats.max_displacement > 0);
    }

    #[tokio::test]
    async fn test_concurrent_producer() {
        let (tx, rx) = event_channel(2);
        let producer = tokio::spawn(async move {
            for i in 0..300i64 {
                tx.send(Event::new(i, String::new())).await.unwrap();
            }
        });

        let mut sim = DisorderSimulator::new(rx, SelectionPolicy::Random { seed: 11 });
        sim.configure(6).unwrap();
        let order: Vec<u64> = sim
            .emit_all()
            .await
            .into_iter()
            .map(|e| e.timestamp_ms() as u64)
            .collect();
        producer.await.unwrap();
        assert_bounded_permutation(&order, 6);
    }
}
