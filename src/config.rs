//! Configuration module for the wavefield animation.
//!
//! Defines the parameter structures for surface geometry, deformation,
//! particles, the animation clock, and video capture, along with JSON
//! load/save and a validation pass that must succeed before the render
//! loop is allowed to start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which surface topology the scene animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Tessellated plane deformed in the vertex shader via the time uniform.
    Plane,
    /// Raw line grid of sample points, deformed CPU-side each tick.
    Grid,
}

/// Parameters for the tessellated plane surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceParameters {
    /// Which surface variant to build
    #[serde(default = "default_surface_kind")]
    pub kind: SurfaceKind,

    /// Side length of the plane in world units
    pub size: f32,

    /// Subdivision count per side (size x size plane becomes (n+1)^2 vertices)
    pub subdivisions: u32,
}

fn default_surface_kind() -> SurfaceKind {
    SurfaceKind::Plane
}

impl Default for SurfaceParameters {
    fn default() -> Self {
        Self {
            kind: SurfaceKind::Plane,
            size: 5.0,
            subdivisions: 100,
        }
    }
}

/// Parameters for the line-grid surface variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridParameters {
    /// Spacing between sample points
    pub step: f32,

    /// Half-extent of the square domain; samples run from -extent to +extent
    pub extent: f32,
}

impl Default for GridParameters {
    fn default() -> Self {
        Self {
            step: 0.5,
            extent: 50.0,
        }
    }
}

/// Single-axis traveling wave: `amplitude * sin(frequency * x + t)`.
///
/// Drives the GPU-side vertex displacement of the plane surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveParameters {
    pub amplitude: f32,
    pub frequency: f32,
}

impl Default for WaveParameters {
    fn default() -> Self {
        Self {
            amplitude: 0.3,
            frequency: 4.0,
        }
    }
}

/// Two-axis combined wave used for the grid and particle height fields:
/// `ax*sin(fx*x + t) + az*cos(fz*z + t)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldWaveParameters {
    pub amplitude_x: f32,
    pub frequency_x: f32,
    pub amplitude_z: f32,
    pub frequency_z: f32,
}

impl Default for FieldWaveParameters {
    fn default() -> Self {
        Self {
            amplitude_x: 0.3,
            frequency_x: 1.5,
            amplitude_z: 0.3,
            frequency_z: 1.5,
        }
    }
}

/// Per-particle color selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleColor {
    /// Stylized: full red and green, random blue per particle
    Random,
    /// Thematic: every particle uses the same RGB triple
    Fixed([f32; 3]),
}

/// Parameters for the particle cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleParameters {
    /// Number of particles
    pub count: u32,

    /// Color policy
    #[serde(default = "default_particle_color")]
    pub color: ParticleColor,

    /// Rotation of the whole field around Y, radians per tick
    #[serde(default = "default_spin")]
    pub spin: f32,

    /// Constant height offset so particles float above the surface
    #[serde(default = "default_lift")]
    pub lift: f32,

    /// PRNG seed for reproducible clouds
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_particle_color() -> ParticleColor {
    ParticleColor::Random
}

fn default_spin() -> f32 {
    0.002
}

fn default_lift() -> f32 {
    1.0
}

fn default_seed() -> u64 {
    88172645463325252
}

impl Default for ParticleParameters {
    fn default() -> Self {
        Self {
            count: 200,
            color: default_particle_color(),
            spin: default_spin(),
            lift: default_lift(),
            seed: default_seed(),
        }
    }
}

/// Animation clock policy. A clock uses exactly one policy for its whole
/// lifetime; fixed-step is deterministic and capture-friendly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockPolicy {
    /// Time advances by a constant step per tick
    FixedStep { dt: f32 },
    /// Time sampled from a monotonic high-resolution timer each tick
    WallClock,
}

impl Default for ClockPolicy {
    fn default() -> Self {
        ClockPolicy::FixedStep { dt: 0.02 }
    }
}

/// Output video container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoContainer {
    Webm,
    Mp4,
}

impl VideoContainer {
    pub fn extension(self) -> &'static str {
        match self {
            VideoContainer::Webm => "webm",
            VideoContainer::Mp4 => "mp4",
        }
    }
}

/// What `start` does when a session is already recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Reject with a state error
    Error,
    /// Silently keep the running session
    Ignore,
    /// Treat the second start as a stop request
    Toggle,
}

impl Default for StartPolicy {
    fn default() -> Self {
        StartPolicy::Error
    }
}

/// How recording sessions are triggered. All three observed policies are
/// configuration choices; the recorder itself is trigger-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// User press starts, auto-stop after a fixed duration in seconds
    PressWithTimeout { duration: f32 },
    /// User press alternates start/stop
    Toggle,
    /// Auto-start after a delay from loop start, auto-stop after a duration
    AutoStart { delay: f32, duration: f32 },
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::PressWithTimeout { duration: 5.0 }
    }
}

/// Parameters for the capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureParameters {
    /// Target framerate of the encoded output; frames are not individually
    /// timestamped, so this alone determines playback timing
    pub framerate: u32,

    /// Output container format
    #[serde(default = "default_container")]
    pub container: VideoContainer,

    /// Directory receiving encoded artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default)]
    pub trigger: TriggerPolicy,

    #[serde(default)]
    pub start_policy: StartPolicy,
}

fn default_container() -> VideoContainer {
    VideoContainer::Webm
}

fn default_output_dir() -> String {
    "captures".to_string()
}

impl Default for CaptureParameters {
    fn default() -> Self {
        Self {
            framerate: 60,
            container: default_container(),
            output_dir: default_output_dir(),
            trigger: TriggerPolicy::default(),
            start_policy: StartPolicy::default(),
        }
    }
}

/// Complete configuration combining all parameter groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Surface geometry
    #[serde(default)]
    pub surface: SurfaceParameters,

    /// Line-grid variant geometry
    #[serde(default)]
    pub grid: GridParameters,

    /// Single-axis wave for the plane shader
    #[serde(default)]
    pub wave: WaveParameters,

    /// Two-axis wave for grid and particle height fields
    #[serde(default)]
    pub field: FieldWaveParameters,

    /// Particle cloud
    #[serde(default)]
    pub particles: ParticleParameters,

    /// Animation clock policy
    #[serde(default)]
    pub clock: ClockPolicy,

    /// Video capture
    #[serde(default)]
    pub capture: CaptureParameters,
}

impl SimulationConfig {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|error| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            error,
        })?;
        serde_json::from_str(&contents).map_err(|error| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            error,
        })
    }

    /// Save configuration to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents =
            serde_json::to_string_pretty(self).map_err(|error| ConfigError::Serialize { error })?;
        fs::write(path.as_ref(), contents).map_err(|error| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            error,
        })
    }

    /// Validate all parameters. A failure here is fatal at setup: the render
    /// loop refuses to start on an invalid configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be finite, got {}", value),
                })
            }
        }
        fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
            finite(field, value)?;
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {}", value),
                })
            }
        }

        finite("wave.amplitude", self.wave.amplitude)?;
        finite("wave.frequency", self.wave.frequency)?;
        finite("field.amplitude_x", self.field.amplitude_x)?;
        finite("field.frequency_x", self.field.frequency_x)?;
        finite("field.amplitude_z", self.field.amplitude_z)?;
        finite("field.frequency_z", self.field.frequency_z)?;
        finite("particles.spin", self.particles.spin)?;
        finite("particles.lift", self.particles.lift)?;

        positive("surface.size", self.surface.size)?;
        positive("grid.step", self.grid.step)?;
        positive("grid.extent", self.grid.extent)?;

        if self.surface.subdivisions == 0 {
            return Err(ConfigError::Invalid {
                field: "surface.subdivisions",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.particles.count == 0 {
            return Err(ConfigError::Invalid {
                field: "particles.count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.capture.framerate == 0 {
            return Err(ConfigError::Invalid {
                field: "capture.framerate",
                reason: "must be at least 1".to_string(),
            });
        }
        if let ClockPolicy::FixedStep { dt } = self.clock {
            positive("clock.dt", dt)?;
        }
        match self.capture.trigger {
            TriggerPolicy::PressWithTimeout { duration } => {
                positive("capture.trigger.duration", duration)?;
            }
            TriggerPolicy::AutoStart { delay, duration } => {
                finite("capture.trigger.delay", delay)?;
                positive("capture.trigger.duration", duration)?;
            }
            TriggerPolicy::Toggle => {}
        }

        Ok(())
    }
}

/// Error types for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error when reading or writing configuration files
    Io {
        path: std::path::PathBuf,
        error: std::io::Error,
    },
    /// JSON parsing error
    Parse {
        path: std::path::PathBuf,
        error: serde_json::Error,
    },
    /// JSON serialization error
    Serialize { error: serde_json::Error },
    /// A parameter failed validation
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, error } => {
                write!(
                    formatter,
                    "Failed to read/write config file '{}': {}",
                    path.display(),
                    error
                )
            }
            ConfigError::Parse { path, error } => {
                write!(
                    formatter,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    error
                )
            }
            ConfigError::Serialize { error } => {
                write!(formatter, "Failed to serialize config: {}", error)
            }
            ConfigError::Invalid { field, reason } => {
                write!(formatter, "Invalid configuration '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { error, .. } => Some(error),
            ConfigError::Parse { error, .. } => Some(error),
            ConfigError::Serialize { error } => Some(error),
            ConfigError::Invalid { .. } => None,
        }
    }
}
