//! Expectation values measured on a snapshot
//!
//! Derivatives are central differences on the raw field and are taken as
//! zero at both boundary points.

use crate::constants::HBAR;
use crate::params::SimulationParameters;
use crate::physics;
use crate::snapshot::FieldSnapshot;
use nalgebra::DVector;

/// Position, momentum and energy statistics of one snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observables {
    /// ⟨x⟩ (m)
    pub position: f64,
    /// Δx (m)
    pub position_uncertainty: f64,
    /// ⟨p⟩ (kg·m/s)
    pub momentum: f64,
    /// Δp (kg·m/s)
    pub momentum_uncertainty: f64,
    /// ⟨p²⟩/2m (J)
    pub kinetic_energy: f64,
    /// ⟨V⟩ (J)
    pub potential_energy: f64,
}

impl Observables {
    /// Measure `snapshot`, which must have been produced from `params`.
    ///
    /// Returns `None` for a vanishing field or a grid mismatch.
    pub fn measure(snapshot: &FieldSnapshot, params: &SimulationParameters) -> Option<Self> {
        let n = snapshot.len();
        if n < 3 || n != params.grid_points as usize || snapshot.is_degenerate() {
            return None;
        }

        let dx = params.grid_spacing();
        let x = DVector::from_vec(params.positions());
        let p = DVector::from_column_slice(&snapshot.probability);
        let re = DVector::from_column_slice(&snapshot.real);
        let im = DVector::from_column_slice(&snapshot.imag);

        let mean_x = p.dot(&x);
        let mean_x2 = p.dot(&x.component_mul(&x));

        let d_re = central_difference(&re, dx);
        let d_im = central_difference(&im, dx);
        let norm = re.dot(&re) + im.dot(&im);

        // Im(ψ* ψ') = re·im' − im·re'
        let mean_p = HBAR * (re.dot(&d_im) - im.dot(&d_re)) / norm;
        let mean_p2 = HBAR * HBAR * (d_re.dot(&d_re) + d_im.dot(&d_im)) / norm;

        let potential_energy = x
            .iter()
            .zip(p.iter())
            .filter(|(_, prob)| **prob > 0.0)
            .map(|(xi, prob)| prob * physics::potential_energy(params, *xi))
            .sum();

        Some(Self {
            position: mean_x,
            position_uncertainty: (mean_x2 - mean_x * mean_x).max(0.0).sqrt(),
            momentum: mean_p,
            momentum_uncertainty: (mean_p2 - mean_p * mean_p).max(0.0).sqrt(),
            kinetic_energy: mean_p2 / (2.0 * params.particle_mass),
            potential_energy,
        })
    }

    /// ⟨H⟩ = ⟨T⟩ + ⟨V⟩
    pub fn expected_energy(&self) -> f64 {
        self.kinetic_energy + self.potential_energy
    }

    /// Δx·Δp, bounded below by ħ/2 for a well-resolved state
    pub fn uncertainty_product(&self) -> f64 {
        self.position_uncertainty * self.momentum_uncertainty
    }
}

fn central_difference(values: &DVector<f64>, dx: f64) -> DVector<f64> {
    let n = values.len();
    DVector::from_fn(n, |i, _| {
        if i == 0 || i + 1 == n {
            0.0
        } else {
            (values[i + 1] - values[i - 1]) / (2.0 * dx)
        }
    })
}
