//! GPU rendering modules
//!
//! Contains wgpu-based rendering infrastructure:
//! - Pipeline: windowed surface + particle rendering
//! - Camera: orbit camera with resize-driven aspect updates
//! - Shaders: WGSL wave displacement and coloring
//! - Headless: offscreen rendering for automated testing

pub mod camera;
pub mod headless;
pub mod pipeline;

pub use camera::Camera;
pub use headless::HeadlessRenderPipeline;
pub use pipeline::RenderPipeline;
