//! Quantum State Engine
//!
//! Computes time-dependent wavefunctions for four canonical systems and turns
//! the resulting probability density into GPU-ready geometry:
//!
//! - **Physics**: closed-form fields for the free particle, infinite well,
//!   harmonic oscillator and hydrogen radial states
//! - **Cache**: bounded, tick-keyed store of computed field snapshots
//! - **Dispatch**: single-flight compute submission with watchdog recovery,
//!   backed by the rayon pool or a wgpu compute kernel
//! - **Mesh**: ribbon geometry of the probability, real part, imaginary part
//!   or phase with selectable color schemes, published to the renderer
//!   through a double buffer

pub mod complex;
pub mod config;
pub mod error;
pub mod params;
pub mod physics;
pub mod snapshot;
pub mod cache;
pub mod observables;
pub mod engine;
pub mod dispatch;
pub mod gpu;
pub mod mesh;
pub mod renderer;
pub mod visualizer;

pub use cache::{StateCache, TimeKey};
pub use complex::ComplexSample;
pub use config::{BackendPreference, EngineConfig, MeshConfig};
pub use dispatch::{ComputeBackend, ComputeDispatcher, CpuFieldBackend, FieldRequest};
pub use engine::SimulationEngine;
pub use error::EngineError;
pub use gpu::GpuFieldBackend;
pub use mesh::{ColorScheme, MeshBuilder, MeshExchange, MeshVertex, VisualizationMode};
pub use params::{SimulationParameters, SystemType};
pub use snapshot::FieldSnapshot;
pub use visualizer::WaveVisualizer;

/// Physical constants (SI units)
pub mod constants {
    /// Reduced Planck constant (J·s)
    pub const HBAR: f64 = 1.054_571_817e-34;

    /// Planck constant (J·s)
    pub const PLANCK: f64 = 6.626_070_15e-34;

    /// Electron mass (kg)
    pub const ELECTRON_MASS: f64 = 9.109_383_701_5e-31;

    /// Bohr radius (m)
    pub const BOHR_RADIUS: f64 = 5.291_772_109_03e-11;

    /// Rydberg energy (J)
    pub const RYDBERG_ENERGY: f64 = 2.179_872_361_103_5e-18;

    /// One electron-volt (J)
    pub const ELECTRON_VOLT: f64 = 1.602_176_634e-19;

    /// Elementary charge (C)
    pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

    /// Coulomb constant 1/(4πε₀) (N·m²/C²)
    pub const COULOMB_CONSTANT: f64 = 8.987_551_792_3e9;

    /// Speed of light (m/s)
    pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
}
