//! Single-flight compute dispatch
//!
//! At most one field computation is in flight per dispatcher. Requests that
//! arrive while it runs overwrite a single pending slot, so only the latest
//! one is computed once the current job finishes. A watchdog writes off a job
//! whose completion never arrives; anything it reports afterwards is stale
//! and dropped. A written-off request with no successor is kept for the
//! owner to resubmit.

use crate::config::BackendPreference;
use crate::error::EngineError;
use crate::gpu::GpuFieldBackend;
use crate::params::SimulationParameters;
use crate::snapshot::FieldSnapshot;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Parameters and time of one requested field evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRequest {
    pub params: SimulationParameters,
    pub time: f64,
    /// Parameter revision of the engine that issued the request
    pub revision: u64,
}

/// A request tagged with the id the dispatcher tracks it by
#[derive(Debug, Clone)]
pub struct FieldJob {
    pub id: u64,
    pub request: FieldRequest,
}

/// Result of a launched job, sent back from whichever thread finished it
#[derive(Debug)]
pub struct FieldCompletion {
    pub job_id: u64,
    pub request: FieldRequest,
    pub result: Result<FieldSnapshot, EngineError>,
}

pub type CompletionSink = Sender<FieldCompletion>;

/// A parallel compute unit that can evaluate a field asynchronously
pub trait ComputeBackend {
    fn name(&self) -> &'static str;

    /// Start evaluating `job`. Must not block; the result goes to `sink`.
    fn launch(&mut self, job: FieldJob, sink: CompletionSink) -> Result<(), EngineError>;

    /// Called at the start of every dispatcher poll so the backend can make
    /// progress on outstanding work.
    fn maintain(&mut self) {}
}

/// Evaluates fields on the rayon thread pool
#[derive(Debug, Default)]
pub struct CpuFieldBackend;

impl ComputeBackend for CpuFieldBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn launch(&mut self, job: FieldJob, sink: CompletionSink) -> Result<(), EngineError> {
        rayon::spawn(move || {
            let snapshot = FieldSnapshot::evaluate(&job.request.params, job.request.time);
            // The dispatcher owns the receiver for its whole life.
            let _ = sink.send(FieldCompletion {
                job_id: job.id,
                request: job.request,
                result: Ok(snapshot),
            });
        });
        Ok(())
    }
}

/// Build the backend named by `preference`.
///
/// `device` lets the GPU backend share an existing device (the viewer's);
/// without one a headless device is requested. `Auto` falls back to the
/// CPU when the GPU cannot be brought up, `Gpu` reports the failure.
pub fn select_backend(
    preference: BackendPreference,
    device: Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)>,
) -> Result<Box<dyn ComputeBackend>, EngineError> {
    let gpu = || match device.clone() {
        Some((device, queue)) => GpuFieldBackend::new(device, queue),
        None => GpuFieldBackend::headless(),
    };

    match preference {
        BackendPreference::Cpu => Ok(Box::new(CpuFieldBackend)),
        BackendPreference::Gpu => Ok(Box::new(gpu()?)),
        BackendPreference::Auto => match gpu() {
            Ok(backend) => Ok(Box::new(backend)),
            Err(err) => {
                log::warn!("GPU compute unavailable ({err}); evaluating fields on the CPU");
                Ok(Box::new(CpuFieldBackend))
            }
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Busy { job_id: u64, deadline: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchEvent {
    Completed(u64),
    TimedOut,
}

/// Running counters, mostly for diagnostics and tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub launched: u64,
    pub completed: u64,
    /// Pending requests overwritten by a newer one before launch
    pub coalesced: u64,
    pub timed_out: u64,
    /// Completions that arrived after their job was written off
    pub stale: u64,
    pub failed: u64,
}

pub struct ComputeDispatcher {
    backend: Box<dyn ComputeBackend>,
    state: DispatchState,
    /// Request behind the job in `Busy`
    in_flight: Option<FieldRequest>,
    pending: Option<FieldRequest>,
    /// Last job the watchdog gave up on with nothing pending to replace it
    written_off: Option<FieldRequest>,
    watchdog: Duration,
    next_job: u64,
    sink: CompletionSink,
    completions: Receiver<FieldCompletion>,
    stats: DispatchStats,
}

impl ComputeDispatcher {
    pub fn new(backend: Box<dyn ComputeBackend>, watchdog: Duration) -> Self {
        let (sink, completions) = mpsc::channel();
        log::info!("compute dispatcher using {} backend", backend.name());
        Self {
            backend,
            state: DispatchState::Idle,
            in_flight: None,
            pending: None,
            written_off: None,
            watchdog,
            next_job: 0,
            sink,
            completions,
            stats: DispatchStats::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, DispatchState::Busy { .. })
    }

    pub fn pending(&self) -> Option<&FieldRequest> {
        self.pending.as_ref()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Take the request of a job the watchdog wrote off.
    ///
    /// Only set when nothing was pending at the timeout, i.e. when no newer
    /// request took its place. The owner decides whether to resubmit it.
    pub fn take_written_off(&mut self) -> Option<FieldRequest> {
        self.written_off.take()
    }

    /// Submit a request without blocking.
    ///
    /// Returns `true` when the request was launched immediately. While a job
    /// is in flight the request replaces whatever was pending and `false` is
    /// returned; it launches once the current job completes or times out.
    pub fn submit(&mut self, request: FieldRequest) -> bool {
        self.submit_at(request, Instant::now())
    }

    pub fn submit_at(&mut self, request: FieldRequest, now: Instant) -> bool {
        if self.is_busy() {
            if self.pending.replace(request).is_some() {
                self.stats.coalesced += 1;
            }
            log::debug!("compute busy; request held as pending");
            return false;
        }
        self.launch(request, now)
    }

    /// Drain finished work, handing each snapshot to `on_complete` before the
    /// dispatcher goes idle and launches any pending request.
    ///
    /// Returns the number of snapshots delivered.
    pub fn poll<F>(&mut self, on_complete: F) -> usize
    where
        F: FnMut(FieldRequest, FieldSnapshot),
    {
        self.poll_at(Instant::now(), on_complete)
    }

    pub fn poll_at<F>(&mut self, now: Instant, mut on_complete: F) -> usize
    where
        F: FnMut(FieldRequest, FieldSnapshot),
    {
        self.backend.maintain();

        let mut delivered = 0;
        while let Ok(completion) = self.completions.try_recv() {
            let current = match self.state {
                DispatchState::Busy { job_id, .. } => job_id == completion.job_id,
                DispatchState::Idle => false,
            };
            if !current {
                self.stats.stale += 1;
                log::warn!("dropping stale completion for job {}", completion.job_id);
                continue;
            }

            match completion.result {
                Ok(snapshot) => {
                    self.stats.completed += 1;
                    delivered += 1;
                    on_complete(completion.request, snapshot);
                }
                Err(err) => {
                    self.stats.failed += 1;
                    log::error!("job {} failed on {}: {err}", completion.job_id, self.backend.name());
                }
            }
            self.transition(DispatchEvent::Completed(completion.job_id), now);
        }

        if let DispatchState::Busy { job_id, deadline } = self.state {
            if now >= deadline {
                log::warn!(
                    "job {job_id} exceeded the {:?} watchdog; treating it as lost",
                    self.watchdog
                );
                self.transition(DispatchEvent::TimedOut, now);
            }
        }

        delivered
    }

    // Busy -> Idle on whichever of completion or timeout comes first.
    fn transition(&mut self, event: DispatchEvent, now: Instant) {
        match (self.state, event) {
            (DispatchState::Busy { job_id, .. }, DispatchEvent::Completed(id)) if id == job_id => {
                self.in_flight = None;
            }
            (DispatchState::Busy { .. }, DispatchEvent::TimedOut) => {
                self.stats.timed_out += 1;
                let lost = self.in_flight.take();
                if self.pending.is_none() {
                    self.written_off = lost;
                }
            }
            _ => return,
        }
        self.state = DispatchState::Idle;

        if let Some(next) = self.pending.take() {
            self.launch(next, now);
        }
    }

    fn launch(&mut self, request: FieldRequest, now: Instant) -> bool {
        let job_id = self.next_job;
        self.next_job += 1;
        let tracked = request.clone();

        match self.backend.launch(FieldJob { id: job_id, request }, self.sink.clone()) {
            Ok(()) => {
                self.stats.launched += 1;
                self.in_flight = Some(tracked);
                self.written_off = None;
                self.state = DispatchState::Busy {
                    job_id,
                    deadline: now + self.watchdog,
                };
                true
            }
            Err(err) => {
                self.stats.failed += 1;
                log::error!("{} backend rejected job {job_id}: {err}", self.backend.name());
                false
            }
        }
    }
}
