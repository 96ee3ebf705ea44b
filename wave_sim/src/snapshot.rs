//! Field snapshots: one fully evaluated time slice

use crate::complex::ComplexSample;
use crate::params::SimulationParameters;
use crate::physics::FieldCoefficients;
use rayon::prelude::*;

/// An immutable, fully computed field at one time value
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub time: f64,
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
    /// |ψ|² normalized to sum to 1, or all zeros for a vanishing field
    pub probability: Vec<f64>,
    pub phase: Vec<f64>,
}

impl FieldSnapshot {
    /// Evaluate `params` on its grid at `time`, spreading points over the rayon pool
    pub fn evaluate(params: &SimulationParameters, time: f64) -> Self {
        let coefficients = FieldCoefficients::new(params, time);
        let start = params.domain.0;
        let dx = params.grid_spacing();

        let samples: Vec<ComplexSample> = (0..params.grid_points as usize)
            .into_par_iter()
            .map(|i| coefficients.sample(start + i as f64 * dx))
            .collect();

        let (real, imag) = samples.iter().map(|s| (s.real, s.imag)).unzip();
        Self::from_components(time, real, imag)
    }

    /// Build a snapshot from raw field components, deriving probability and phase
    pub fn from_components(time: f64, real: Vec<f64>, imag: Vec<f64>) -> Self {
        debug_assert_eq!(real.len(), imag.len());

        let density: Vec<f64> = real
            .iter()
            .zip(&imag)
            .map(|(re, im)| re * re + im * im)
            .collect();
        let total: f64 = density.iter().sum();

        let probability = if total > 0.0 && total.is_finite() {
            density.iter().map(|d| d / total).collect()
        } else {
            vec![0.0; density.len()]
        };
        debug_assert!(probability.iter().all(|p| *p >= 0.0));

        let phase = real
            .iter()
            .zip(&imag)
            .map(|(re, im)| im.atan2(*re))
            .collect();

        Self {
            time,
            real,
            imag,
            probability,
            phase,
        }
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    /// True when the raw field is identically zero
    pub fn is_degenerate(&self) -> bool {
        self.probability.iter().all(|p| *p == 0.0)
    }

    /// Complex value at grid point `i`
    pub fn sample(&self, i: usize) -> ComplexSample {
        ComplexSample::new(self.real[i], self.imag[i])
    }

    /// Largest normalized probability, used to scale the mesh
    pub fn peak_probability(&self) -> f64 {
        self.probability.iter().copied().fold(0.0, f64::max)
    }
}
