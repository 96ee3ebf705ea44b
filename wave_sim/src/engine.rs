//! Simulation engine
//!
//! Owns the parameters, the animation clock, the snapshot cache and the
//! compute dispatcher. Time advances lazily: `tick` only marks the engine
//! dirty and the field is evaluated when a snapshot is next asked for.

use crate::cache::StateCache;
use crate::config::EngineConfig;
use crate::dispatch::{self, ComputeBackend, ComputeDispatcher, CpuFieldBackend, FieldRequest};
use crate::error::EngineError;
use crate::observables::Observables;
use crate::params::SimulationParameters;
use crate::physics;
use crate::snapshot::FieldSnapshot;
use std::sync::Arc;

/// Outcome of `SimulationEngine::schedule`
#[derive(Debug, Clone)]
pub enum Scheduled {
    /// Served from the cache
    Ready(Arc<FieldSnapshot>),
    /// Launched on the compute backend
    Submitted,
    /// Held as the dispatcher's pending request behind a running job
    Coalesced,
    /// The backend refused the job; the engine stays dirty and retries
    Rejected,
}

pub struct SimulationEngine {
    params: SimulationParameters,
    config: EngineConfig,
    cache: StateCache,
    dispatcher: ComputeDispatcher,
    time: f64,
    animating: bool,
    dirty: bool,
    /// Bumped on every parameter change; completions from older revisions are not cached
    revision: u64,
    latest: Option<Arc<FieldSnapshot>>,
    evaluations: u64,
}

impl SimulationEngine {
    pub fn new(
        params: SimulationParameters,
        config: EngineConfig,
        backend: Box<dyn ComputeBackend>,
    ) -> Result<Self, EngineError> {
        params.validate()?;
        config.validate()?;

        log::info!(
            "engine: {} n={} on {} grid points",
            params.system.name(),
            params.energy_level,
            params.grid_points
        );

        Ok(Self {
            cache: StateCache::new(config.cache_capacity, config.time_step),
            dispatcher: ComputeDispatcher::new(backend, config.watchdog_timeout),
            params,
            config,
            time: 0.0,
            animating: false,
            dirty: true,
            revision: 0,
            latest: None,
            evaluations: 0,
        })
    }

    /// Engine whose asynchronous path runs on the rayon pool
    pub fn with_cpu(params: SimulationParameters, config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(params, config, Box::new(CpuFieldBackend))
    }

    /// Engine on the backend named by `config.backend`, optionally sharing a GPU device
    pub fn from_config(
        params: SimulationParameters,
        config: EngineConfig,
        device: Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)>,
    ) -> Result<Self, EngineError> {
        let backend = dispatch::select_backend(config.backend, device)?;
        Self::new(params, config, backend)
    }

    pub fn parameters(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &ComputeDispatcher {
        &self.dispatcher
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of field evaluations actually performed, synchronous or asynchronous
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Most recently accepted snapshot, if any
    pub fn latest(&self) -> Option<&Arc<FieldSnapshot>> {
        self.latest.as_ref()
    }

    /// Replace the parameters.
    ///
    /// Returns `Ok(false)` when nothing changed. Any change drops every
    /// cached snapshot and the derived wavelength.
    pub fn set_parameters(&mut self, params: SimulationParameters) -> Result<bool, EngineError> {
        params.validate()?;
        if params == self.params {
            return Ok(false);
        }

        self.cache.invalidate_all();
        self.params = params;
        self.revision += 1;
        self.latest = None;
        self.dirty = true;
        log::debug!(
            "parameters changed (revision {}): {} n={}",
            self.revision,
            self.params.system.name(),
            self.params.energy_level
        );
        Ok(true)
    }

    pub fn set_time(&mut self, time: f64) {
        if time != self.time {
            self.time = time;
            self.dirty = true;
        }
    }

    pub fn set_animating(&mut self, animating: bool) {
        self.animating = animating;
    }

    /// Advance by one configured step if animating. Returns whether time moved.
    pub fn tick(&mut self) -> bool {
        if !self.animating {
            return false;
        }
        self.advance_time(self.config.time_step);
        true
    }

    pub fn advance_time(&mut self, dt: f64) {
        self.time += dt;
        self.dirty = true;
    }

    /// Snapshot at `time`, from the cache or evaluated on the calling thread.
    ///
    /// `time` is snapped to the cache's step first, so every time within one
    /// tick gets the same field and the snapshot carries the snapped time.
    pub fn request_snapshot(&mut self, time: f64) -> Arc<FieldSnapshot> {
        let time = self.cache.quantize(time);
        if let Some(hit) = self.cache.get(time) {
            return hit;
        }
        let snapshot = Arc::new(FieldSnapshot::evaluate(&self.params, time));
        self.evaluations += 1;
        self.cache.put(time, snapshot.clone());
        snapshot
    }

    /// Snapshot at the current time, recomputed only if the engine is dirty
    pub fn current_snapshot(&mut self) -> Arc<FieldSnapshot> {
        match &self.latest {
            Some(latest) if !self.dirty => latest.clone(),
            _ => {
                let snapshot = self.request_snapshot(self.time);
                self.latest = Some(snapshot.clone());
                self.dirty = false;
                snapshot
            }
        }
    }

    /// Asynchronous counterpart of `current_snapshot`.
    ///
    /// A cache hit is returned straight away; otherwise the current time is
    /// handed to the dispatcher and the result arrives through `poll`.
    pub fn schedule(&mut self) -> Scheduled {
        if let Some(hit) = self.cache.get(self.time) {
            self.latest = Some(hit.clone());
            self.dirty = false;
            return Scheduled::Ready(hit);
        }

        let request = FieldRequest {
            params: self.params.clone(),
            time: self.cache.quantize(self.time),
            revision: self.revision,
        };
        if self.dispatcher.submit(request) {
            self.dirty = false;
            Scheduled::Submitted
        } else if self.dispatcher.is_busy() {
            self.dirty = false;
            Scheduled::Coalesced
        } else {
            Scheduled::Rejected
        }
    }

    /// Drain asynchronous completions.
    ///
    /// Snapshots computed for the current parameter revision are cached,
    /// become `latest` and are handed to `on_snapshot` in completion order.
    /// A job the watchdog wrote off for the current revision and time marks
    /// the engine dirty again so the next `schedule` retries it.
    /// Returns how many were accepted.
    pub fn poll<F>(&mut self, mut on_snapshot: F) -> usize
    where
        F: FnMut(&Arc<FieldSnapshot>),
    {
        let Self {
            dispatcher,
            cache,
            revision,
            latest,
            evaluations,
            time,
            dirty,
            ..
        } = self;

        let mut accepted = 0;
        dispatcher.poll(|request, snapshot| {
            *evaluations += 1;
            if request.revision != *revision {
                log::debug!(
                    "discarding snapshot from revision {} (current {})",
                    request.revision,
                    revision
                );
                return;
            }
            let snapshot = Arc::new(snapshot);
            cache.put(request.time, snapshot.clone());
            *latest = Some(snapshot.clone());
            accepted += 1;
            on_snapshot(&snapshot);
        });

        if let Some(lost) = dispatcher.take_written_off() {
            if lost.revision == *revision && cache.key(lost.time) == cache.key(*time) {
                log::warn!("evaluation at t={:e} was lost; rescheduling", lost.time);
                *dirty = true;
            }
        }
        accepted
    }

    pub fn probability_grid(&mut self) -> Vec<f64> {
        self.current_snapshot().probability.clone()
    }

    pub fn phase_grid(&mut self) -> Vec<f64> {
        self.current_snapshot().phase.clone()
    }

    /// Real and imaginary parts at the current time
    pub fn wave_function_components(&mut self) -> (Vec<f64>, Vec<f64>) {
        let snapshot = self.current_snapshot();
        (snapshot.real.clone(), snapshot.imag.clone())
    }

    /// Grid positions (m)
    pub fn positions(&self) -> Vec<f64> {
        self.params.positions()
    }

    /// Characteristic wavelength of the configured state, cached until the parameters change
    pub fn wavelength(&mut self) -> f64 {
        if let Some(wavelength) = self.cache.cached_wavelength() {
            return wavelength;
        }
        let wavelength = physics::characteristic_wavelength(&self.params);
        self.cache.store_wavelength(wavelength);
        wavelength
    }

    /// Closed-form energy of the configured level (J)
    pub fn energy(&self) -> f64 {
        physics::energy(&self.params)
    }

    /// Expectation values at the current time; `None` for a vanishing field
    pub fn observables(&mut self) -> Option<Observables> {
        let snapshot = self.current_snapshot();
        Observables::measure(&snapshot, &self.params)
    }

    pub fn position_expectation(&mut self) -> Option<f64> {
        self.observables().map(|o| o.position)
    }

    pub fn momentum_expectation(&mut self) -> Option<f64> {
        self.observables().map(|o| o.momentum)
    }

    pub fn position_uncertainty(&mut self) -> Option<f64> {
        self.observables().map(|o| o.position_uncertainty)
    }

    pub fn momentum_uncertainty(&mut self) -> Option<f64> {
        self.observables().map(|o| o.momentum_uncertainty)
    }

    pub fn uncertainty_product(&mut self) -> Option<f64> {
        self.observables().map(|o| o.uncertainty_product())
    }

    pub fn expected_energy(&mut self) -> Option<f64> {
        self.observables().map(|o| o.expected_energy())
    }
}
