//! Wavefield
//!
//! Continuously animated 3D wave surface with a particle field and
//! on-demand recording of rendered frames into a video file:
//! - Procedural deformation driving both GPU (shader uniform) and CPU
//!   (in-place buffer rewrite) animation paths
//! - Tick-driven render loop with an injectable draw target
//! - Frame-capture state machine synchronized with the loop

pub mod anim;
pub mod capture;
pub mod config;
pub mod export;
pub mod render;
pub mod runloop;

pub use config::SimulationConfig;
