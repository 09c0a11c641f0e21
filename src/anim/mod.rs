//! Procedural animation modules
//!
//! Contains the deterministic animation core:
//! - Deform: pure position+time displacement functions
//! - Clock: per-tick monotonic time source
//! - Surface: plane mesh and line-grid generation
//! - Particles: randomized point cloud with per-frame height derivation
//! - Scene: live buffers updated once per tick

pub mod clock;
pub mod deform;
pub mod particles;
pub mod scene;
pub mod surface;

pub use clock::AnimationClock;
pub use deform::Deformation;
pub use particles::ParticleCloud;
pub use scene::Scene;
pub use surface::{LineGrid, PlaneMesh, SurfaceVertex};
