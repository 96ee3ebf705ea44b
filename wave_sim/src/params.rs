//! Simulation parameters
//!
//! A `SimulationParameters` value fully determines the field at any given
//! time. The engine treats any change to it as invalidating every cached
//! snapshot.

use crate::constants::{ELECTRON_MASS, HBAR};
use crate::error::EngineError;
use crate::physics;
use serde::{Deserialize, Serialize};

/// Highest supported energy level. Beyond this the oscillator's Hermite
/// values overflow single precision on the GPU path.
pub const MAX_ENERGY_LEVEL: u32 = 20;

/// Largest supported spatial grid
pub const MAX_GRID_POINTS: u32 = 16_384;

/// Grid size used by `for_system`
pub const DEFAULT_GRID_POINTS: u32 = 1024;

/// The built-in quantum systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemType {
    FreeParticle,
    PotentialWell,
    HarmonicOscillator,
    HydrogenAtom,
}

impl SystemType {
    pub const ALL: [SystemType; 4] = [
        SystemType::FreeParticle,
        SystemType::PotentialWell,
        SystemType::HarmonicOscillator,
        SystemType::HydrogenAtom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemType::FreeParticle => "Free particle",
            SystemType::PotentialWell => "Infinite potential well",
            SystemType::HarmonicOscillator => "Harmonic oscillator",
            SystemType::HydrogenAtom => "Hydrogen atom (radial)",
        }
    }
}

/// Everything that determines the field apart from time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub system: SystemType,
    /// Principal quantum number n (>= 1)
    pub energy_level: u32,
    /// Angular quantum number l, hydrogen only
    pub angular_momentum: u32,
    /// Particle mass (kg)
    pub particle_mass: f64,
    /// Barrier height for the free particle (J)
    pub potential_height: f64,
    /// Sampled interval (m)
    pub domain: (f64, f64),
    pub grid_points: u32,
    /// Infinite-well width L; the well occupies `[0, L]`
    pub well_width: f64,
    /// Oscillator angular frequency ω (rad/s)
    pub angular_frequency: f64,
    /// Initial free-particle packet width σ₀ (m)
    pub packet_width: f64,
    /// Carrier wave number per energy level (1/m)
    pub wave_number: f64,
    /// Width of the rectangular barrier centred in the domain (m)
    pub barrier_width: f64,
}

impl SimulationParameters {
    /// Reference parameters for a system: an electron, no barrier, ground state.
    pub fn for_system(system: SystemType) -> Self {
        let well_width = 20e-9;
        let mut params = Self {
            system,
            energy_level: 1,
            angular_momentum: 0,
            particle_mass: ELECTRON_MASS,
            potential_height: 0.0,
            domain: (0.0, 0.0),
            grid_points: DEFAULT_GRID_POINTS,
            well_width,
            // Characteristic length sqrt(ħ/mω) of one nanometre
            angular_frequency: HBAR / (ELECTRON_MASS * 1e-18),
            packet_width: 5e-9,
            wave_number: 1e9,
            barrier_width: 1e-9,
        };
        params.domain = physics::default_domain(&params);
        params
    }

    pub fn with_energy_level(mut self, level: u32) -> Self {
        self.energy_level = level;
        self
    }

    pub fn with_angular_momentum(mut self, l: u32) -> Self {
        self.angular_momentum = l;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.particle_mass = mass;
        self
    }

    pub fn with_potential_height(mut self, height: f64) -> Self {
        self.potential_height = height;
        self
    }

    pub fn with_grid_points(mut self, points: u32) -> Self {
        self.grid_points = points;
        self
    }

    pub fn with_domain(mut self, start: f64, end: f64) -> Self {
        self.domain = (start, end);
        self
    }

    /// Well width, keeping the domain framed around the new well
    pub fn with_well_width(mut self, width: f64) -> Self {
        self.well_width = width;
        if self.system == SystemType::PotentialWell {
            self.domain = physics::default_domain(&self);
        }
        self
    }

    /// Distance between neighbouring grid points
    pub fn grid_spacing(&self) -> f64 {
        (self.domain.1 - self.domain.0) / (self.grid_points.max(2) - 1) as f64
    }

    /// Position of grid point `i`
    pub fn x_at(&self, i: usize) -> f64 {
        self.domain.0 + i as f64 * self.grid_spacing()
    }

    /// All grid positions
    pub fn positions(&self) -> Vec<f64> {
        (0..self.grid_points as usize).map(|i| self.x_at(i)).collect()
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::InvalidParameters(msg));

        if self.energy_level == 0 || self.energy_level > MAX_ENERGY_LEVEL {
            return fail(format!(
                "energy level must be in 1..={MAX_ENERGY_LEVEL}, got {}",
                self.energy_level
            ));
        }
        if !(self.particle_mass.is_finite() && self.particle_mass > 0.0) {
            return fail(format!("particle mass must be positive, got {}", self.particle_mass));
        }
        if !(self.potential_height.is_finite() && self.potential_height >= 0.0) {
            return fail(format!(
                "potential height must be non-negative, got {}",
                self.potential_height
            ));
        }
        let (start, end) = self.domain;
        if !(start.is_finite() && end.is_finite() && start < end) {
            return fail(format!("domain must be an increasing interval, got ({start}, {end})"));
        }
        if self.grid_points < 2 || self.grid_points > MAX_GRID_POINTS {
            return fail(format!(
                "grid points must be in 2..={MAX_GRID_POINTS}, got {}",
                self.grid_points
            ));
        }
        for (name, value) in [
            ("well width", self.well_width),
            ("angular frequency", self.angular_frequency),
            ("packet width", self.packet_width),
            ("wave number", self.wave_number),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return fail(format!("{name} must be positive, got {value}"));
            }
        }
        if !(self.barrier_width.is_finite() && self.barrier_width >= 0.0) {
            return fail(format!("barrier width must be non-negative, got {}", self.barrier_width));
        }
        Ok(())
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self::for_system(SystemType::PotentialWell)
    }
}
