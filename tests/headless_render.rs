//! Headless rendering smoke tests.
//!
//! These render the real pipeline into an offscreen texture. They skip
//! (pass vacuously) when no GPU adapter is available, e.g. on bare CI
//! runners.

use wavefield::anim::Scene;
use wavefield::config::{SimulationConfig, SurfaceKind};
use wavefield::render::HeadlessRenderPipeline;
use wavefield::runloop::DrawTarget;

fn headless(config: &SimulationConfig, scene: &Scene) -> Option<HeadlessRenderPipeline> {
    pollster::block_on(HeadlessRenderPipeline::new(64, 64, config, scene))
}

#[test]
fn test_render_produces_full_frame() {
    let config = SimulationConfig::default();
    let mut scene = Scene::new(&config);
    let Some(mut pipeline) = headless(&config, &scene) else {
        eprintln!("No GPU adapter, skipping");
        return;
    };

    scene.update(0.0);
    let frame = pipeline.draw(&mut scene, true).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (64, 64));
    assert_eq!(frame.pixels.len(), 64 * 64 * 4);
    // The clear color is opaque; so is everything drawn over it
    assert!(frame.pixels.chunks_exact(4).all(|px| px[3] == 255));
}

#[test]
fn test_uncaptured_draw_skips_readback() {
    let config = SimulationConfig::default();
    let mut scene = Scene::new(&config);
    let Some(mut pipeline) = headless(&config, &scene) else {
        eprintln!("No GPU adapter, skipping");
        return;
    };

    scene.update(0.0);
    assert!(pipeline.draw(&mut scene, false).unwrap().is_none());
}

#[test]
fn test_animation_changes_rendered_pixels() {
    let config = SimulationConfig::default();
    let mut scene = Scene::new(&config);
    let Some(mut pipeline) = headless(&config, &scene) else {
        eprintln!("No GPU adapter, skipping");
        return;
    };

    scene.update(0.0);
    let first = pipeline.draw(&mut scene, true).unwrap().unwrap();
    scene.update(1.5);
    let second = pipeline.draw(&mut scene, true).unwrap().unwrap();
    assert_ne!(first.pixels, second.pixels);
}

#[test]
fn test_grid_surface_renders() {
    let mut config = SimulationConfig::default();
    config.surface.kind = SurfaceKind::Grid;
    // Keep the grid small for test speed
    config.grid.step = 0.5;
    config.grid.extent = 5.0;
    let mut scene = Scene::new(&config);
    let Some(mut pipeline) = headless(&config, &scene) else {
        eprintln!("No GPU adapter, skipping");
        return;
    };

    scene.update(0.25);
    let frame = pipeline.draw(&mut scene, true).unwrap().unwrap();
    // Something must be visible over the near-black clear color
    assert!(frame
        .pixels
        .chunks_exact(4)
        .any(|px| px[0] > 16 || px[1] > 16 || px[2] > 16));
}

#[test]
fn test_resize_changes_output_dimensions() {
    let config = SimulationConfig::default();
    let mut scene = Scene::new(&config);
    let Some(mut pipeline) = headless(&config, &scene) else {
        eprintln!("No GPU adapter, skipping");
        return;
    };

    pipeline.set_viewport_size(128, 96);
    scene.update(0.0);
    let frame = pipeline.draw(&mut scene, true).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (128, 96));
}
