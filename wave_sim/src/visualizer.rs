//! Front door for UI collaborators
//!
//! `WaveVisualizer` ties the engine to the mesh pipeline. Callers push
//! parameter and time changes in, call `update` once per frame, and read the
//! published mesh and physics readouts back out. Mesh failures are logged and
//! leave the previous frame on screen.

use crate::config::EngineConfig;
use crate::dispatch::ComputeBackend;
use crate::engine::{Scheduled, SimulationEngine};
use crate::error::EngineError;
use crate::mesh::{ColorScheme, MeshBuilder, MeshExchange, VisualizationMode};
use crate::observables::Observables;
use crate::params::{SimulationParameters, SystemType};
use crate::snapshot::FieldSnapshot;
use std::f32::consts::TAU;
use std::sync::Arc;

pub struct WaveVisualizer {
    engine: SimulationEngine,
    mesh: MeshBuilder,
    exchange: Arc<MeshExchange>,
    /// View-only yaw forwarded to the camera
    rotation: f32,
}

impl WaveVisualizer {
    pub fn new(engine: SimulationEngine) -> Self {
        let mesh = MeshBuilder::new(engine.config().mesh);
        Self {
            engine,
            mesh,
            exchange: Arc::new(MeshExchange::new()),
            rotation: 0.0,
        }
    }

    pub fn with_backend(
        params: SimulationParameters,
        config: EngineConfig,
        backend: Box<dyn ComputeBackend>,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(SimulationEngine::new(params, config, backend)?))
    }

    /// Visualizer on the backend named by `config.backend`
    pub fn from_config(
        params: SimulationParameters,
        config: EngineConfig,
        device: Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)>,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(SimulationEngine::from_config(params, config, device)?))
    }

    /// Change the physical setup.
    ///
    /// Switching system reframes the domain for the new system; other fields
    /// keep their current values. Returns whether anything changed.
    pub fn set_parameters(
        &mut self,
        system: SystemType,
        energy_level: u32,
        mass: f64,
        potential_height: f64,
    ) -> Result<bool, EngineError> {
        let current = self.engine.parameters();
        let base = if current.system == system {
            current.clone()
        } else {
            SimulationParameters::for_system(system)
        };
        let params = base
            .with_energy_level(energy_level)
            .with_mass(mass)
            .with_potential_height(potential_height);
        self.replace_parameters(params)
    }

    /// Replace every parameter at once
    pub fn replace_parameters(&mut self, params: SimulationParameters) -> Result<bool, EngineError> {
        let changed = self.engine.set_parameters(params)?;
        if changed {
            self.mesh.invalidate();
        }
        Ok(changed)
    }

    pub fn set_time(&mut self, time: f64) {
        self.engine.set_time(time);
    }

    pub fn set_animating(&mut self, animating: bool) {
        self.engine.set_animating(animating);
    }

    pub fn is_animating(&self) -> bool {
        self.engine.is_animating()
    }

    /// Rotate the view; has no effect on the simulation
    pub fn rotate(&mut self, angle: f32) {
        self.rotation = (self.rotation + angle).rem_euclid(TAU);
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_color_scheme(&mut self, scheme: ColorScheme) {
        self.mesh.set_scheme(scheme);
        self.republish();
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.mesh.scheme()
    }

    /// Choose which field array the ribbon shows; rebuilt like a scheme change
    pub fn set_visualization_mode(&mut self, mode: VisualizationMode) {
        self.mesh.set_mode(mode);
        self.republish();
    }

    pub fn visualization_mode(&self) -> VisualizationMode {
        self.mesh.mode()
    }

    // Rebuild from the snapshot already on screen; no new physics is needed.
    fn republish(&mut self) {
        if let Some(latest) = self.engine.latest().cloned() {
            publish_mesh(&mut self.mesh, &latest, &self.exchange);
        }
    }

    /// Per-frame step: advance the clock, accept finished snapshots into the
    /// mesh and schedule the next evaluation if the field is stale.
    ///
    /// Returns the number of meshes published.
    pub fn update(&mut self) -> usize {
        self.engine.tick();

        let Self {
            engine,
            mesh,
            exchange,
            ..
        } = self;

        let mut published = 0;
        engine.poll(|snapshot| {
            if publish_mesh(mesh, snapshot, exchange) {
                published += 1;
            }
        });

        if engine.is_dirty() {
            match engine.schedule() {
                Scheduled::Ready(snapshot) => {
                    if publish_mesh(mesh, &snapshot, exchange) {
                        published += 1;
                    }
                }
                Scheduled::Rejected => log::warn!("field evaluation rejected; retrying next frame"),
                Scheduled::Submitted | Scheduled::Coalesced => {}
            }
        }
        published
    }

    /// Shared handle for the render path
    pub fn exchange(&self) -> Arc<MeshExchange> {
        self.exchange.clone()
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SimulationEngine {
        &mut self.engine
    }

    pub fn parameters(&self) -> &SimulationParameters {
        self.engine.parameters()
    }

    pub fn probability_density_grid(&mut self) -> Vec<f64> {
        self.displayed_snapshot().probability.clone()
    }

    pub fn wave_function_components(&mut self) -> (Vec<f64>, Vec<f64>) {
        let snapshot = self.displayed_snapshot();
        (snapshot.real.clone(), snapshot.imag.clone())
    }

    pub fn phase_grid(&mut self) -> Vec<f64> {
        self.displayed_snapshot().phase.clone()
    }

    pub fn energy(&self) -> f64 {
        self.engine.energy()
    }

    pub fn wavelength(&mut self) -> f64 {
        self.engine.wavelength()
    }

    pub fn observables(&mut self) -> Option<Observables> {
        let snapshot = self.displayed_snapshot();
        Observables::measure(&snapshot, self.engine.parameters())
    }

    // Readouts follow what is on screen; before anything has been accepted
    // they fall back to a synchronous evaluation.
    fn displayed_snapshot(&mut self) -> Arc<FieldSnapshot> {
        match self.engine.latest() {
            Some(latest) => latest.clone(),
            None => self.engine.current_snapshot(),
        }
    }
}

fn publish_mesh(mesh: &mut MeshBuilder, snapshot: &FieldSnapshot, exchange: &MeshExchange) -> bool {
    match mesh.build(snapshot, exchange) {
        Ok(published) => published,
        Err(err) => {
            log::warn!("keeping previous mesh: {err}");
            false
        }
    }
}
