// tests/physics.rs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use wave_sim::constants::{ELECTRON_MASS, ELECTRON_VOLT, HBAR, RYDBERG_ENERGY, SPEED_OF_LIGHT};
use wave_sim::physics;
use wave_sim::{FieldSnapshot, SimulationParameters, SystemType};

fn well(level: u32) -> SimulationParameters {
    SimulationParameters::for_system(SystemType::PotentialWell).with_energy_level(level)
}

// Real parts are exact at t = 0 because every time phase starts at zero.
fn sign_changes(values: &[f64]) -> usize {
    let signs: Vec<bool> = values.iter().filter(|v| **v != 0.0).map(|v| *v > 0.0).collect();
    signs.windows(2).filter(|w| w[0] != w[1]).count()
}

#[test]
fn test_probability_is_normalized_across_random_parameters() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..60 {
        let system = SystemType::ALL[rng.gen_range(0..4)];
        let level = rng.gen_range(1..=10);
        let mass = ELECTRON_MASS * rng.gen_range(0.5..5.0);
        let potential = if rng.gen_bool(0.5) { rng.gen_range(0.0..2.0) * ELECTRON_VOLT } else { 0.0 };
        let time = rng.gen_range(0.0..1e-14);

        let params = SimulationParameters::for_system(system)
            .with_energy_level(level)
            .with_mass(mass)
            .with_potential_height(potential);
        let snapshot = FieldSnapshot::evaluate(&params, time);

        if snapshot.is_degenerate() {
            continue;
        }
        let total: f64 = snapshot.probability.iter().sum();
        assert!(
            (total - 1.0).abs() < 1e-9,
            "{:?} n={level} t={time:e}: probability sums to {total}",
            system
        );
        assert!(snapshot.probability.iter().all(|p| *p >= 0.0));
    }
}

#[test]
fn test_well_field_vanishes_outside_support() {
    for level in 1..=5 {
        let params = well(level);
        let snapshot = FieldSnapshot::evaluate(&params, 3e-15);

        for (x, p) in params.positions().iter().zip(&snapshot.probability) {
            if *x < 0.0 || *x > params.well_width {
                assert_eq!(*p, 0.0, "n={level}: probability {p} at x={x:e} outside the well");
            }
        }
    }
}

#[test]
fn test_well_second_level_matches_closed_form() {
    let params = well(2);
    let l = params.well_width;
    let snapshot = FieldSnapshot::evaluate(&params, 0.0);

    for (i, x) in params.positions().iter().enumerate() {
        let expected = if (0.0..=l).contains(x) {
            (2.0 / l).sqrt() * (2.0 * PI * x / l).sin()
        } else {
            0.0
        };
        let sample = snapshot.sample(i);
        assert!(
            (sample.real - expected).abs() <= 1e-9 * (2.0 / l).sqrt(),
            "x={x:e}: got {} expected {expected}",
            sample.real
        );
        assert_eq!(sample.imag, 0.0);
    }

    let total: f64 = snapshot.probability.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);

    // One peak in each half of the well
    let dx = params.grid_spacing();
    let positions = params.positions();
    let peak_in = |lo: f64, hi: f64| {
        positions
            .iter()
            .zip(&snapshot.probability)
            .filter(|(x, _)| **x >= lo && **x <= hi)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(x, _)| *x)
            .unwrap()
    };
    assert!((peak_in(0.0, l / 2.0) - l / 4.0).abs() <= 2.0 * dx);
    assert!((peak_in(l / 2.0, l) - 3.0 * l / 4.0).abs() <= 2.0 * dx);
}

#[test]
fn test_oscillator_nodes_follow_level() {
    let ground = SimulationParameters::for_system(SystemType::HarmonicOscillator);
    let ground_snapshot = FieldSnapshot::evaluate(&ground, 0.0);
    assert_eq!(sign_changes(&ground_snapshot.real), 0, "ground state must not change sign");

    let first = ground.clone().with_energy_level(2);
    let first_snapshot = FieldSnapshot::evaluate(&first, 0.0);
    assert_eq!(sign_changes(&first_snapshot.real), 1, "n=2 must have exactly one node");

    let third = ground.with_energy_level(4);
    assert_eq!(sign_changes(&FieldSnapshot::evaluate(&third, 0.0).real), 3);
}

#[test]
fn test_oscillator_ground_state_is_gaussian() {
    let params = SimulationParameters::for_system(SystemType::HarmonicOscillator);
    let alpha = params.particle_mass * params.angular_frequency / HBAR;
    let amplitude = (alpha / PI).powf(0.25);

    for x in [-2e-9, -0.5e-9, 0.0, 0.7e-9, 3e-9] {
        let value = physics::evaluate(&params, x, 0.0);
        let expected = amplitude * (-0.5 * alpha * x * x).exp();
        assert!((value.norm() - expected).abs() <= 1e-9 * amplitude, "x={x:e}");
    }
}

#[test]
fn test_energy_levels_increase() {
    for n in 1..10 {
        let p = well(1);
        let (e_n, e_next) = (physics::level_energy(&p, n), physics::level_energy(&p, n + 1));
        assert!(e_next > e_n);
        let ratio = e_next / e_n;
        let expected = ((n + 1) as f64 / n as f64).powi(2);
        assert!((ratio - expected).abs() < 1e-12, "well ratio {ratio} vs {expected}");

        let h = SimulationParameters::for_system(SystemType::HydrogenAtom);
        let (e_n, e_next) = (physics::level_energy(&h, n), physics::level_energy(&h, n + 1));
        assert!(e_next > e_n, "hydrogen levels must rise toward zero");
        assert!(e_n.abs() > e_next.abs());
        assert!((e_n * (n * n) as f64 + RYDBERG_ENERGY).abs() < 1e-30);
    }
}

#[test]
fn test_hydrogen_degenerate_quantum_numbers_give_zero_field() {
    let params = SimulationParameters::for_system(SystemType::HydrogenAtom)
        .with_energy_level(2)
        .with_angular_momentum(2);

    for x in params.positions() {
        assert!(physics::evaluate(&params, x, 1e-15).is_zero());
    }
    let snapshot = FieldSnapshot::evaluate(&params, 0.0);
    assert!(snapshot.is_degenerate());
    assert!(snapshot.probability.iter().all(|p| *p == 0.0));
}

#[test]
fn test_hydrogen_radial_nodes() {
    // n=3, l=0 has n - l - 1 = 2 radial nodes
    let params = SimulationParameters::for_system(SystemType::HydrogenAtom).with_energy_level(3);
    let snapshot = FieldSnapshot::evaluate(&params, 0.0);
    assert_eq!(sign_changes(&snapshot.real), 2);
}

#[test]
fn test_barrier_attenuates_transmitted_packet() {
    let free = SimulationParameters::for_system(SystemType::FreeParticle);
    let energy = physics::energy(&free);
    let height = 0.5 * ELECTRON_VOLT;
    assert!(energy < height);
    let blocked = free.clone().with_potential_height(height);

    let beyond = 5e-9;
    let ratio = physics::evaluate(&blocked, beyond, 0.0).norm() / physics::evaluate(&free, beyond, 0.0).norm();
    assert!((ratio - (energy / height).sqrt()).abs() < 1e-9, "transmitted ratio {ratio}");

    let inside = physics::evaluate(&blocked, 0.0, 0.0).norm() / physics::evaluate(&free, 0.0, 0.0).norm();
    assert!(inside > 0.0 && inside < 1.0);

    let before = -10e-9;
    let ratio = physics::evaluate(&blocked, before, 0.0).norm() / physics::evaluate(&free, before, 0.0).norm();
    assert!((ratio - 1.0).abs() < 1e-12);

    // A barrier below the packet energy is ignored
    let low = free.clone().with_potential_height(0.5 * energy);
    assert_eq!(physics::evaluate(&low, beyond, 0.0), physics::evaluate(&free, beyond, 0.0));
}

#[test]
fn test_free_packet_spreads_and_moves() {
    let params = SimulationParameters::for_system(SystemType::FreeParticle);
    let start = FieldSnapshot::evaluate(&params, 0.0);
    let later = FieldSnapshot::evaluate(&params, 5e-15);
    let positions = params.positions();

    let mean = |s: &FieldSnapshot| positions.iter().zip(&s.probability).map(|(x, p)| x * p).sum::<f64>();
    let spread = |s: &FieldSnapshot| {
        let m = mean(s);
        positions.iter().zip(&s.probability).map(|(x, p)| p * (x - m).powi(2)).sum::<f64>().sqrt()
    };

    let velocity = HBAR * params.wave_number / params.particle_mass;
    let moved = mean(&later) - mean(&start);
    assert!((moved - velocity * 5e-15).abs() < 0.01 * velocity * 5e-15, "moved {moved:e}");
    assert!(spread(&later) > spread(&start));
    assert!((mean(&start) - physics::packet_origin(&params)).abs() < params.grid_spacing());
}

#[test]
fn test_conversions() {
    let frequency = 5e14;
    let energy = physics::frequency_to_energy(frequency);
    assert!((physics::energy_to_frequency(energy) - frequency).abs() < 1e-3);
    assert!((physics::photon_wavelength(energy) - SPEED_OF_LIGHT / frequency).abs() < 1e-18);
    assert!(physics::photon_wavelength(0.0).is_infinite());
    assert!(physics::de_broglie_wavelength(0.0, ELECTRON_MASS).is_infinite());

    // Lyman alpha
    let hydrogen = SimulationParameters::for_system(SystemType::HydrogenAtom);
    let released = physics::transition_energy(&hydrogen, 2, 1);
    assert!((released - 0.75 * RYDBERG_ENERGY).abs() < 1e-30);
    let lyman = physics::photon_wavelength(released);
    assert!((lyman - 121.5e-9).abs() < 0.2e-9, "Lyman alpha at {lyman:e}");
    assert!(physics::transition_energy(&hydrogen, 1, 2) < 0.0);
}

#[test]
fn test_characteristic_wavelength() {
    let well2 = well(2);
    assert!((physics::characteristic_wavelength(&well2) - well2.well_width).abs() < 1e-20);

    let free = SimulationParameters::for_system(SystemType::FreeParticle).with_energy_level(2);
    let expected = 2.0 * PI / (2.0 * free.wave_number);
    assert!((physics::characteristic_wavelength(&free) - expected).abs() < 1e-20);
}

#[test]
fn test_potential_energy_profiles() {
    let params = well(1);
    assert_eq!(physics::potential_energy(&params, 0.5 * params.well_width), 0.0);
    assert!(physics::potential_energy(&params, -1e-9).is_infinite());
    assert!(physics::potential_energy(&params, 1.01 * params.well_width).is_infinite());

    let h = SimulationParameters::for_system(SystemType::HydrogenAtom);
    assert_eq!(physics::potential_energy(&h, 0.0), 0.0);
    assert!(physics::potential_energy(&h, 1e-10) < 0.0);

    let barrier = SimulationParameters::for_system(SystemType::FreeParticle).with_potential_height(ELECTRON_VOLT);
    assert_eq!(physics::potential_energy(&barrier, 0.0), ELECTRON_VOLT);
    assert_eq!(physics::potential_energy(&barrier, -10e-9), 0.0);
}
