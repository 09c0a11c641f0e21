//! Export modules
//!
//! PNG export of rendered frames (screenshots).

pub mod image_export;

pub use image_export::export_frame;
