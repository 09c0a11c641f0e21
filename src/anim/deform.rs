//! Deformation functions: pure, deterministic displacement of a point
//! by position and time.
//!
//! Both strategies are continuous in all three inputs and carry no state;
//! the same function drives the GPU shader (via uniform parameters) and the
//! CPU buffer rewrites, which is what keeps surface and particles visually
//! coherent.

use crate::config::{FieldWaveParameters, WaveParameters};

/// A pure displacement function of (x, z, t).
///
/// Parameters are validated at configuration time
/// ([`crate::config::SimulationConfig::validate`]); construction from config
/// assumes finite values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deformation {
    /// Single-axis traveling wave: `amplitude * sin(frequency*x + t)`
    Travelling { amplitude: f32, frequency: f32 },
    /// Two-axis combined wave:
    /// `ax*sin(fx*x + t) + az*cos(fz*z + t)`
    CrossWave {
        amplitude_x: f32,
        frequency_x: f32,
        amplitude_z: f32,
        frequency_z: f32,
    },
}

impl Deformation {
    pub fn travelling(params: &WaveParameters) -> Self {
        Deformation::Travelling {
            amplitude: params.amplitude,
            frequency: params.frequency,
        }
    }

    pub fn cross_wave(params: &FieldWaveParameters) -> Self {
        Deformation::CrossWave {
            amplitude_x: params.amplitude_x,
            frequency_x: params.frequency_x,
            amplitude_z: params.amplitude_z,
            frequency_z: params.frequency_z,
        }
    }

    /// Scalar displacement of the point (x, z) at time t.
    pub fn displacement(&self, x: f32, z: f32, t: f32) -> f32 {
        match *self {
            Deformation::Travelling {
                amplitude,
                frequency,
            } => amplitude * (frequency * x + t).sin(),
            Deformation::CrossWave {
                amplitude_x,
                frequency_x,
                amplitude_z,
                frequency_z,
            } => {
                amplitude_x * (frequency_x * x + t).sin()
                    + amplitude_z * (frequency_z * z + t).cos()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn travelling(amplitude: f32, frequency: f32) -> Deformation {
        Deformation::Travelling {
            amplitude,
            frequency,
        }
    }

    fn cross(a: f32, f: f32) -> Deformation {
        Deformation::CrossWave {
            amplitude_x: a,
            frequency_x: f,
            amplitude_z: a,
            frequency_z: f,
        }
    }

    #[test]
    fn test_travelling_matches_formula() {
        let wave = travelling(0.3, 4.0);
        for i in 0..50 {
            let x = i as f32 * 0.17 - 4.0;
            let t = i as f32 * 0.02;
            let expected = 0.3 * (4.0 * x + t).sin();
            assert!((wave.displacement(x, 99.0, t) - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_travelling_ignores_z() {
        let wave = travelling(1.0, 2.0);
        let a = wave.displacement(0.7, -3.0, 1.0);
        let b = wave.displacement(0.7, 42.0, 1.0);
        assert!((a - b).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cross_wave_matches_formula() {
        let wave = cross(2.0, 0.5);
        for i in 0..50 {
            let x = i as f32 * 0.31 - 7.0;
            let z = i as f32 * 0.13 - 3.0;
            let t = i as f32 * 0.05;
            let expected = 2.0 * (0.5 * x + t).sin() + 2.0 * (0.5 * z + t).cos();
            assert!((wave.displacement(x, z, t) - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_deterministic() {
        let wave = cross(0.3, 1.5);
        assert_eq!(
            wave.displacement(1.2, -0.4, 3.0).to_bits(),
            wave.displacement(1.2, -0.4, 3.0).to_bits()
        );
    }

    #[test]
    fn test_continuity_in_time() {
        // |d(x,z,t+eps) - d(x,z,t)| shrinks with eps
        let wave = cross(2.0, 0.5);
        let (x, z, t) = (3.7, -1.2, 5.0);
        let base = wave.displacement(x, z, t);
        let mut previous = f32::MAX;
        for exp in 1..6 {
            let eps = 10f32.powi(-exp);
            let delta = (wave.displacement(x, z, t + eps) - base).abs();
            assert!(delta <= previous + 1e-7, "not shrinking at eps={}", eps);
            previous = delta;
        }
        assert!(previous < 1e-3);
    }

    #[test]
    fn test_continuity_in_space() {
        let wave = travelling(0.3, 4.0);
        let base = wave.displacement(1.0, 0.0, 2.0);
        let near = wave.displacement(1.0 + 1e-5, 0.0, 2.0);
        assert!((near - base).abs() < 1e-3);
    }

    #[test]
    fn test_amplitude_bounds_output() {
        let wave = cross(2.0, 0.5);
        for i in 0..200 {
            let x = i as f32 * 0.37;
            let z = i as f32 * 0.53;
            let d = wave.displacement(x, z, i as f32 * 0.1);
            assert!(d.abs() <= 4.0 + 1e-5);
        }
    }
}
