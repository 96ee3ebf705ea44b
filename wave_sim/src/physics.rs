//! Closed-form wavefunctions for the built-in systems
//!
//! Every branch over `SystemType` lives in this module: per-snapshot
//! coefficients, energies, potentials, framing and characteristic
//! wavelengths. The rest of the crate only sees `FieldCoefficients`, whose
//! `sample` is mirrored one-to-one by the WGSL kernel in `shaders/field.wgsl`.
//!
//! Coefficients are computed in `f64` once per snapshot and expressed in a
//! per-system length scale, so the per-point work stays dimensionless and fits
//! in single precision on the GPU.

use crate::complex::ComplexSample;
use crate::constants::{
    BOHR_RADIUS, COULOMB_CONSTANT, ELEMENTARY_CHARGE, HBAR, PLANCK, RYDBERG_ENERGY,
    SPEED_OF_LIGHT,
};
use crate::params::{SimulationParameters, SystemType};
use std::f64::consts::{PI, TAU};

/// Rectangular barrier in scaled coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierProfile {
    pub start: f64,
    pub end: f64,
    /// κ·length_scale, with κ = sqrt(2m(V−E))/ħ
    pub decay: f64,
    /// Amplitude factor sqrt(E/V) past the barrier
    pub transmitted: f64,
}

impl BarrierProfile {
    /// Amplitude multiplier at scaled position `xs`.
    ///
    /// This is a visual tunneling model, not a scattering solution: the
    /// packet decays exponentially inside the barrier and comes out reduced
    /// by sqrt(E/V).
    pub fn attenuation(&self, xs: f64) -> f64 {
        if xs < self.start {
            1.0
        } else if xs <= self.end {
            (-self.decay * (xs - self.start)).exp()
        } else {
            self.transmitted
        }
    }
}

/// Spatial form of the field in scaled coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldShape {
    /// Spreading Gaussian packet; `center` and `spread` already include time
    WavePacket {
        center: f64,
        spread: f64,
        wave_number: f64,
        barrier: Option<BarrierProfile>,
    },
    /// sin(nπx/L) on `[0, 1]` in units of L
    Well { quantum_number: u32 },
    /// H_degree(ξ)·exp(−ξ²/2)
    Oscillator { degree: u32 },
    /// exp(−ρ/2)·ρ^l·L_degree^order(ρ) for ρ ≥ 0
    Radial { degree: u32, order: u32, angular: u32 },
    /// Degenerate quantum numbers; the field is identically zero
    Vanishing,
}

/// Everything needed to evaluate one snapshot, computed once per (params, t)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldCoefficients {
    pub shape: FieldShape,
    /// Positions are divided by this before evaluating `shape`
    pub length_scale: f64,
    pub amplitude: f64,
    /// Global time phase, wrapped into [0, 2π)
    pub phase: f64,
}

impl FieldCoefficients {
    pub fn new(params: &SimulationParameters, t: f64) -> Self {
        let n = params.energy_level;
        if n == 0 {
            return Self::vanishing();
        }
        let m = params.particle_mass;

        match params.system {
            SystemType::FreeParticle => {
                let sigma0 = params.packet_width;
                let k0 = n as f64 * params.wave_number;
                let spread = (1.0 + (HBAR * t / (m * sigma0 * sigma0)).powi(2)).sqrt();
                let sigma_t = sigma0 * spread;
                let velocity = HBAR * k0 / m;
                let omega = HBAR * k0 * k0 / (2.0 * m);
                let x0 = packet_origin(params);

                Self {
                    shape: FieldShape::WavePacket {
                        center: (x0 + velocity * t) / sigma0,
                        spread,
                        wave_number: k0 * sigma0,
                        barrier: barrier_profile(params, sigma0),
                    },
                    length_scale: sigma0,
                    amplitude: (2.0 * PI * sigma_t * sigma_t).powf(-0.25),
                    phase: wrap_phase(-omega * t),
                }
            }
            SystemType::PotentialWell => {
                let l = params.well_width;
                Self {
                    shape: FieldShape::Well { quantum_number: n },
                    length_scale: l,
                    amplitude: (2.0 / l).sqrt(),
                    phase: wrap_phase(-energy(params) * t / HBAR),
                }
            }
            SystemType::HarmonicOscillator => {
                let omega = params.angular_frequency;
                let alpha = m * omega / HBAR;
                let degree = n - 1;
                let norm = (2f64.powi(degree as i32) * factorial(degree) * PI.sqrt()).sqrt();
                Self {
                    shape: FieldShape::Oscillator { degree },
                    length_scale: 1.0 / alpha.sqrt(),
                    amplitude: alpha.powf(0.25) / norm,
                    phase: wrap_phase(-omega * (degree as f64 + 0.5) * t),
                }
            }
            SystemType::HydrogenAtom => {
                let l = params.angular_momentum;
                if l >= n {
                    return Self::vanishing();
                }
                let nf = n as f64;
                let scale = 2.0 / (nf * BOHR_RADIUS);
                let norm = (scale.powi(3) * factorial(n - l - 1) / (2.0 * nf * factorial(n + l))).sqrt();
                Self {
                    shape: FieldShape::Radial {
                        degree: n - l - 1,
                        order: 2 * l + 1,
                        angular: l,
                    },
                    length_scale: 1.0 / scale,
                    amplitude: norm,
                    phase: wrap_phase(-energy(params) * t / HBAR),
                }
            }
        }
    }

    fn vanishing() -> Self {
        Self {
            shape: FieldShape::Vanishing,
            length_scale: 1.0,
            amplitude: 0.0,
            phase: 0.0,
        }
    }

    /// Field value at position `x` (metres)
    pub fn sample(&self, x: f64) -> ComplexSample {
        let xs = x / self.length_scale;
        match self.shape {
            FieldShape::WavePacket {
                center,
                spread,
                wave_number,
                barrier,
            } => {
                let d = xs - center;
                let mut magnitude = self.amplitude * (-(d * d) / (2.0 * spread * spread)).exp();
                if let Some(barrier) = barrier {
                    magnitude *= barrier.attenuation(xs);
                }
                ComplexSample::from_polar(magnitude, wave_number * xs + self.phase)
            }
            FieldShape::Well { quantum_number } => {
                if !(0.0..=1.0).contains(&xs) {
                    return ComplexSample::ZERO;
                }
                let value = self.amplitude * (quantum_number as f64 * PI * xs).sin();
                ComplexSample::from_polar(value, self.phase)
            }
            FieldShape::Oscillator { degree } => {
                let value = self.amplitude * hermite(degree, xs) * (-0.5 * xs * xs).exp();
                ComplexSample::from_polar(value, self.phase)
            }
            FieldShape::Radial {
                degree,
                order,
                angular,
            } => {
                if xs < 0.0 {
                    return ComplexSample::ZERO;
                }
                let value = self.amplitude
                    * (-0.5 * xs).exp()
                    * xs.powi(angular as i32)
                    * assoc_laguerre(degree, order as f64, xs);
                ComplexSample::from_polar(value, self.phase)
            }
            FieldShape::Vanishing => ComplexSample::ZERO,
        }
    }

    pub fn is_vanishing(&self) -> bool {
        matches!(self.shape, FieldShape::Vanishing)
    }
}

/// Field value of `params`' system at position `x` and time `t`.
///
/// Degenerate quantum numbers (hydrogen l ≥ n) yield the zero sample.
pub fn evaluate(params: &SimulationParameters, x: f64, t: f64) -> ComplexSample {
    FieldCoefficients::new(params, t).sample(x)
}

/// Closed-form energy of the configured level (J)
pub fn energy(params: &SimulationParameters) -> f64 {
    level_energy(params, params.energy_level)
}

/// Closed-form energy of level `n` for `params`' system (J)
pub fn level_energy(params: &SimulationParameters, n: u32) -> f64 {
    let nf = n as f64;
    let m = params.particle_mass;
    match params.system {
        SystemType::FreeParticle => {
            let k0 = nf * params.wave_number;
            HBAR * HBAR * k0 * k0 / (2.0 * m)
        }
        SystemType::PotentialWell => {
            let l = params.well_width;
            (nf * PI * HBAR).powi(2) / (2.0 * m * l * l)
        }
        SystemType::HarmonicOscillator => {
            HBAR * params.angular_frequency * (nf.max(1.0) - 0.5)
        }
        SystemType::HydrogenAtom => {
            if n == 0 {
                return f64::NEG_INFINITY;
            }
            -RYDBERG_ENERGY / (nf * nf)
        }
    }
}

/// Potential energy at `x` (J).
///
/// The infinite well reports `f64::INFINITY` outside `[0, L]`, where the
/// field vanishes; hydrogen reports 0 at the singular origin.
pub fn potential_energy(params: &SimulationParameters, x: f64) -> f64 {
    match params.system {
        SystemType::FreeParticle => {
            let center = 0.5 * (params.domain.0 + params.domain.1);
            if params.barrier_width > 0.0 && (x - center).abs() <= 0.5 * params.barrier_width {
                params.potential_height
            } else {
                0.0
            }
        }
        SystemType::PotentialWell => {
            if (0.0..=1.0).contains(&(x / params.well_width)) {
                0.0
            } else {
                f64::INFINITY
            }
        }
        SystemType::HarmonicOscillator => {
            let omega = params.angular_frequency;
            0.5 * params.particle_mass * omega * omega * x * x
        }
        SystemType::HydrogenAtom => {
            if x > 0.0 {
                -COULOMB_CONSTANT * ELEMENTARY_CHARGE * ELEMENTARY_CHARGE / x
            } else {
                0.0
            }
        }
    }
}

/// Sampled interval that frames `params`' system
pub fn default_domain(params: &SimulationParameters) -> (f64, f64) {
    match params.system {
        SystemType::FreeParticle => {
            let half = 10.0 * params.packet_width;
            (-half, half)
        }
        SystemType::PotentialWell => {
            let l = params.well_width;
            (-0.1 * l, 1.1 * l)
        }
        SystemType::HarmonicOscillator => {
            let length = (HBAR / (params.particle_mass * params.angular_frequency)).sqrt();
            (-10.0 * length, 10.0 * length)
        }
        SystemType::HydrogenAtom => (0.0, 75.0 * BOHR_RADIUS),
    }
}

/// Length that characterizes the configured state (m)
pub fn characteristic_wavelength(params: &SimulationParameters) -> f64 {
    let n = params.energy_level.max(1) as f64;
    match params.system {
        SystemType::FreeParticle => TAU / (n * params.wave_number),
        SystemType::PotentialWell => 2.0 * params.well_width / n,
        SystemType::HarmonicOscillator | SystemType::HydrogenAtom => {
            de_broglie_wavelength(energy(params), params.particle_mass)
        }
    }
}

/// Energy released moving from level `from` to level `to` (J); negative when absorbed
pub fn transition_energy(params: &SimulationParameters, from: u32, to: u32) -> f64 {
    level_energy(params, from) - level_energy(params, to)
}

/// Starting centre of the free-particle packet
pub fn packet_origin(params: &SimulationParameters) -> f64 {
    let (start, end) = params.domain;
    start + 0.25 * (end - start)
}

fn barrier_profile(params: &SimulationParameters, length_scale: f64) -> Option<BarrierProfile> {
    let v = params.potential_height;
    if v <= 0.0 || params.barrier_width <= 0.0 {
        return None;
    }
    let e = energy(params);
    if e >= v {
        return None;
    }
    let center = 0.5 * (params.domain.0 + params.domain.1);
    let half = 0.5 * params.barrier_width;
    let kappa = (2.0 * params.particle_mass * (v - e)).sqrt() / HBAR;
    Some(BarrierProfile {
        start: (center - half) / length_scale,
        end: (center + half) / length_scale,
        decay: kappa * length_scale,
        transmitted: (e / v).sqrt(),
    })
}

fn wrap_phase(phase: f64) -> f64 {
    phase.rem_euclid(TAU)
}

/// n! as a float
pub fn factorial(n: u32) -> f64 {
    let mut result = 1.0;
    for i in 2..=n {
        result *= i as f64;
    }
    result
}

/// Physicists' Hermite polynomial H_n(x) via H_{k+1} = 2xH_k − 2kH_{k−1}
pub fn hermite(n: u32, x: f64) -> f64 {
    if n == 0 {
        return 1.0;
    }
    let mut h0 = 1.0;
    let mut h1 = 2.0 * x;
    for k in 1..n {
        let h2 = 2.0 * x * h1 - 2.0 * k as f64 * h0;
        h0 = h1;
        h1 = h2;
    }
    h1
}

/// Associated Laguerre polynomial L_n^alpha(x) via its three-term recurrence
pub fn assoc_laguerre(n: u32, alpha: f64, x: f64) -> f64 {
    if n == 0 {
        return 1.0;
    }
    let mut l0 = 1.0;
    let mut l1 = 1.0 + alpha - x;
    for k in 1..n {
        let k = k as f64;
        let l2 = ((2.0 * k + 1.0 + alpha - x) * l1 - (k + alpha) * l0) / (k + 1.0);
        l0 = l1;
        l1 = l2;
    }
    l1
}

/// E = hf
pub fn energy_to_frequency(energy: f64) -> f64 {
    energy.abs() / PLANCK
}

pub fn frequency_to_energy(frequency: f64) -> f64 {
    PLANCK * frequency
}

/// Wavelength of a photon carrying `energy` (m)
pub fn photon_wavelength(energy: f64) -> f64 {
    if energy == 0.0 {
        return f64::INFINITY;
    }
    PLANCK * SPEED_OF_LIGHT / energy.abs()
}

/// λ = h / sqrt(2m|E|)
pub fn de_broglie_wavelength(energy: f64, mass: f64) -> f64 {
    let momentum = (2.0 * mass * energy.abs()).sqrt();
    if momentum == 0.0 {
        return f64::INFINITY;
    }
    PLANCK / momentum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factorial_small_values() {
        assert_eq!(factorial(0), 1.0);
        assert_eq!(factorial(1), 1.0);
        assert_eq!(factorial(5), 120.0);
        assert_eq!(factorial(10), 3_628_800.0);
    }

    #[test]
    fn hermite_matches_explicit_forms() {
        let x = 0.7;
        assert!((hermite(2, x) - (4.0 * x * x - 2.0)).abs() < 1e-12);
        assert!((hermite(3, x) - (8.0 * x.powi(3) - 12.0 * x)).abs() < 1e-12);
        assert!((hermite(4, x) - (16.0 * x.powi(4) - 48.0 * x * x + 12.0)).abs() < 1e-12);
    }

    #[test]
    fn laguerre_matches_explicit_forms() {
        let (a, x) = (3.0, 1.3);
        assert!((assoc_laguerre(1, a, x) - (1.0 + a - x)).abs() < 1e-12);
        let l2 = 0.5 * (x * x - 2.0 * (a + 2.0) * x + (a + 1.0) * (a + 2.0));
        assert!((assoc_laguerre(2, a, x) - l2).abs() < 1e-12);
    }

    #[test]
    fn barrier_attenuation_regions() {
        let barrier = BarrierProfile {
            start: 1.0,
            end: 2.0,
            decay: 3.0,
            transmitted: 0.4,
        };
        assert_eq!(barrier.attenuation(0.5), 1.0);
        assert!((barrier.attenuation(1.5) - (-1.5f64).exp()).abs() < 1e-12);
        assert_eq!(barrier.attenuation(2.5), 0.4);
    }

    #[test]
    fn wrapped_phase_stays_in_range() {
        for raw in [-1e6, -7.0, 0.0, 3.0, 1e9] {
            let p = wrap_phase(raw);
            assert!((0.0..TAU).contains(&p), "{raw} -> {p}");
        }
    }
}
