//! Examiner: the periodic scan loop
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────────────────────┐
//! │ adapter      │──▶│ quad-tree  │──▶│ sequence ║ hough (scoped)│──▶ combine ──▶ anomalies
//! │ (timeout)    │   │ (rebuild)  │   └──────────────────────────┘
//! └──────────────┘   └────────────┘
//! ```
//!
//! One scan thread runs ticks back to back on a fixed interval, so ticks never
//! overlap. A failed tick (adapter error, adapter timeout) is reported as an
//! [`ExaminerEvent::Error`] and the loop carries on with the next interval. A
//! failed or panicking detector only loses its own patterns for that tick.
//!
//! Events go out on a bounded channel; when nobody drains it, new events are
//! dropped rather than blocking the scan loop.
//!
//! # Example
//!
//! ```
//! use memlens::config::ExaminerConfig;
//! use memlens::examiner::{Examiner, ScanTarget};
//! use memlens::platform::{SyntheticAdapter, SyntheticLayout};
//! use std::sync::Arc;
//!
//! let adapter = Arc::new(SyntheticAdapter::new(SyntheticLayout::Sequential {
//!     count: 128,
//!     block_size: 4096,
//! }));
//! let examiner = Examiner::new(adapter, ExaminerConfig::default(), ScanTarget::System).unwrap();
//!
//! let result = examiner.analyze_once().unwrap();
//! assert_eq!(result.quad_tree_state.stored, 128);
//! assert!(!result.patterns.is_empty());
//! ```

use crate::analysis::{now_ms, AnalysisResult, FileChange};
use crate::anomaly::AnomalyDetector;
use crate::config::ExaminerConfig;
use crate::error::{AdapterError, ExaminerError, Result};
use crate::hough::HoughTransform;
use crate::pattern::{combine_patterns, MemoryPattern};
use crate::platform::PlatformAdapter;
use crate::quadtree::{QuadTree, QuadTreeState};
use crate::region::MemoryInfo;
use crate::sequence::SequenceDetector;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 256;

/// Longest single sleep between stop checks
const STOP_POLL: Duration = Duration::from_millis(10);

/// Which snapshot the adapter is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
    System,
    Process(i64),
}

/// Notifications emitted by the scan loop
#[derive(Debug)]
pub enum ExaminerEvent {
    /// Raw snapshot, before analysis
    MemoryUpdate(MemoryInfo),
    /// Full pipeline output
    Analysis(Box<AnalysisResult>),
    /// A tick failed; the loop keeps running
    Error(ExaminerError),
}

/// Detection stages, rebuilt state lives in the quad-tree
struct Pipeline {
    quad_tree: QuadTree,
    hough: HoughTransform,
    sequence: SequenceDetector,
    anomalies: AnomalyDetector,
}

impl Pipeline {
    fn new(config: &ExaminerConfig) -> Self {
        Self {
            quad_tree: QuadTree::new(config.quad_tree.clone()),
            hough: HoughTransform::new(config.hough.clone()),
            sequence: SequenceDetector::new(config.sequence.clone()),
            anomalies: AnomalyDetector::new(config.anomaly.clone()),
        }
    }
}

/// State shared between the examiner handle and its scan thread
struct Shared {
    adapter: Arc<dyn PlatformAdapter>,
    target: ScanTarget,
    config: ExaminerConfig,
    pipeline: Mutex<Pipeline>,
    events: Sender<ExaminerEvent>,
    file_changes: Receiver<FileChange>,
    latest_state: RwLock<Option<Arc<QuadTreeState>>>,
    ticks: AtomicU64,
    dropped_events: AtomicU64,
    /// Adapter call still running from an earlier tick
    in_flight: Mutex<Option<Receiver<AdapterResult>>>,
}

type AdapterResult = std::result::Result<MemoryInfo, AdapterError>;

impl Shared {
    fn emit(&self, event: ExaminerEvent) {
        if let Err(TrySendError::Full(_)) = self.events.try_send(event) {
            let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(dropped, "Event channel full - event dropped");
        }
    }

    /// Run the adapter on a helper thread, bounded by the configured timeout
    ///
    /// At most one adapter call is in flight. A call that outlives its tick
    /// keeps its slot; later ticks wait on it instead of spawning another,
    /// and take its result once it arrives.
    fn snapshot(&self) -> Result<MemoryInfo> {
        let timeout = self.config.adapter_timeout();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let rx = match in_flight.take() {
            Some(rx) => rx,
            None => self.spawn_adapter_call()?,
        };

        match rx.recv_timeout(timeout) {
            Ok(snapshot) => Ok(snapshot?),
            Err(RecvTimeoutError::Timeout) => {
                *in_flight = Some(rx);
                Err(ExaminerError::AdapterTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(AdapterError::Panicked.into()),
        }
    }

    fn spawn_adapter_call(&self) -> Result<Receiver<AdapterResult>> {
        let (tx, rx) = channel::bounded(1);
        let adapter = Arc::clone(&self.adapter);
        let target = self.target;

        thread::Builder::new()
            .name("memlens-adapter".to_string())
            .spawn(move || {
                let snapshot = match target {
                    ScanTarget::System => adapter.memory_info(),
                    ScanTarget::Process(pid) => adapter.process_memory_info(pid),
                };
                let _ = tx.send(snapshot);
            })
            .map_err(|e| ExaminerError::Spawn(e.to_string()))?;
        Ok(rx)
    }

    fn tick(&self, on_snapshot: impl FnOnce(&MemoryInfo)) -> Result<AnalysisResult> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        let info = self.snapshot()?;
        on_snapshot(&info);

        let result = self.analyze(info, tick);
        tracing::debug!(
            tick,
            adapter = self.adapter.name(),
            regions = result.memory_info.regions.len(),
            patterns = result.patterns.len(),
            anomalies = result.anomalies.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan tick complete"
        );
        Ok(result)
    }

    fn analyze(&self, info: MemoryInfo, tick: u64) -> AnalysisResult {
        let mut pipeline = self.pipeline.lock().unwrap_or_else(PoisonError::into_inner);

        let mut regions = info.regions.clone();
        pipeline.quad_tree.update(&mut regions);
        let state = pipeline.quad_tree.state();

        let (sequence, geometric) = {
            let sequence_detector = &pipeline.sequence;
            let hough = &pipeline.hough;
            let regions = &regions;
            thread::scope(|s| {
                let sequence = s.spawn(move || sequence_detector.detect(regions));
                let geometric = s.spawn(move || hough.detect_patterns(regions));
                (sequence.join(), geometric.join())
            })
        };

        let sequence = match sequence {
            Ok(Ok(patterns)) => patterns,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Sequence detector failed; no sequence patterns this tick");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!("Sequence detector panicked; no sequence patterns this tick");
                Vec::new()
            }
        };
        let geometric: Vec<MemoryPattern> = geometric.unwrap_or_else(|_| {
            tracing::warn!("Line detector panicked; no geometric patterns this tick");
            Vec::new()
        });

        let timestamp_ms = now_ms();
        let patterns = combine_patterns(sequence, geometric);
        let anomalies = pipeline.anomalies.detect(&patterns, timestamp_ms);
        drop(pipeline);

        let file_changes: Vec<FileChange> = self.file_changes.try_iter().collect();

        let mut memory_info = info;
        memory_info.regions = regions;

        *self
            .latest_state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(state.clone()));

        AnalysisResult {
            tick,
            timestamp_ms,
            memory_info,
            patterns,
            anomalies,
            file_changes,
            quad_tree_state: state,
        }
    }

    fn run(self: Arc<Self>, running: Arc<AtomicBool>) {
        let interval = self.config.scan_interval();
        while running.load(Ordering::SeqCst) {
            let started = Instant::now();

            match self.tick(|info| self.emit(ExaminerEvent::MemoryUpdate(info.clone()))) {
                Ok(result) => self.emit(ExaminerEvent::Analysis(Box::new(result))),
                Err(e) => {
                    tracing::warn!(error = %e, "Scan tick failed; retrying next interval");
                    self.emit(ExaminerEvent::Error(e));
                }
            }

            while running.load(Ordering::SeqCst) {
                let elapsed = started.elapsed();
                if elapsed >= interval {
                    break;
                }
                thread::sleep((interval - elapsed).min(STOP_POLL));
            }
        }
    }
}

/// Owner of one scan loop
pub struct Examiner {
    shared: Arc<Shared>,
    events: Receiver<ExaminerEvent>,
    file_change_tx: Sender<FileChange>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Examiner {
    pub fn new(
        adapter: Arc<dyn PlatformAdapter>,
        config: ExaminerConfig,
        target: ScanTarget,
    ) -> Result<Self> {
        config.validate()?;

        let (events_tx, events_rx) = channel::bounded(EVENT_CAPACITY);
        let (file_change_tx, file_change_rx) = channel::unbounded();

        let shared = Arc::new(Shared {
            adapter,
            target,
            pipeline: Mutex::new(Pipeline::new(&config)),
            config,
            events: events_tx,
            file_changes: file_change_rx,
            latest_state: RwLock::new(None),
            ticks: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        });

        Ok(Self {
            shared,
            events: events_rx,
            file_change_tx,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn config(&self) -> &ExaminerConfig {
        &self.shared.config
    }

    pub fn target(&self) -> ScanTarget {
        self.shared.target
    }

    /// Start the scan loop; returns false if it was already running
    pub fn start(&mut self) -> Result<bool> {
        if self.handle.is_some() {
            return Ok(false);
        }
        self.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("memlens-scan".to_string())
            .spawn(move || shared.run(running))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ExaminerError::Spawn(e.to_string())
            })?;

        tracing::debug!(
            interval_ms = self.shared.config.scan_interval_ms,
            adapter = self.shared.adapter.name(),
            "Examiner started"
        );
        self.handle = Some(handle);
        Ok(true)
    }

    /// Stop the scan loop and wait for the current tick; returns false if it
    /// was not running
    pub fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => {
                let _ = handle.join();
                tracing::debug!(ticks = self.tick_count(), "Examiner stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Run one tick synchronously without emitting events
    pub fn analyze_once(&self) -> Result<AnalysisResult> {
        self.shared.tick(|_| {})
    }

    /// Receiver for scan loop events
    pub fn events(&self) -> Receiver<ExaminerEvent> {
        self.events.clone()
    }

    /// Sender whose file changes are attached to the next analysis
    pub fn file_change_sender(&self) -> Sender<FileChange> {
        self.file_change_tx.clone()
    }

    /// Quad-tree snapshot from the most recent successful tick
    pub fn latest_state(&self) -> Option<Arc<QuadTreeState>> {
        self.shared
            .latest_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ticks started so far, successful or not
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    /// Events discarded because the channel was full
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped_events.load(Ordering::Relaxed)
    }
}

impl Drop for Examiner {
    fn drop(&mut self) {
        self.stop();
    }
}
