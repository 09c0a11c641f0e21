//! Scene: the live animation state owned by the render loop.
//!
//! Holds the surface (plane mesh or line grid), the particle cloud, and the
//! deformation strategies. `update` is called exactly once per tick with the
//! clock's new time and performs every CPU-side buffer rewrite before the
//! draw call, so a capturing draw always observes a fully updated frame.

use crate::anim::deform::Deformation;
use crate::anim::particles::ParticleCloud;
use crate::anim::surface::{LineGrid, PlaneMesh};
use crate::config::{SimulationConfig, SurfaceKind};

/// The surface variant being animated.
pub enum Surface {
    /// GPU-deformed plane; the shader consumes the time uniform
    Plane(PlaneMesh),
    /// CPU-deformed line grid, rewritten in place each tick
    Grid(LineGrid),
}

/// Live animation state: static topologies plus mutable position buffers.
pub struct Scene {
    pub surface: Surface,
    pub particles: ParticleCloud,
    /// Drives the plane shader (uniform parameters)
    pub surface_wave: Deformation,
    /// Drives grid and particle height fields CPU-side
    pub field_wave: Deformation,
    /// Current animation time, mirrored into the shader uniform
    pub time: f32,
    /// Set by `update`, cleared by the draw target after upload
    dirty: bool,
}

impl Scene {
    /// Build the initial geometry from a validated configuration.
    pub fn new(config: &SimulationConfig) -> Self {
        let surface = match config.surface.kind {
            SurfaceKind::Plane => Surface::Plane(PlaneMesh::new(
                config.surface.size,
                config.surface.subdivisions,
            )),
            SurfaceKind::Grid => Surface::Grid(LineGrid::new(config.grid.step, config.grid.extent)),
        };

        let half_size = match config.surface.kind {
            SurfaceKind::Plane => config.surface.size / 2.0,
            SurfaceKind::Grid => config.grid.extent,
        };
        let particles = ParticleCloud::new(&config.particles, half_size, 2.0);

        Self {
            surface,
            particles,
            surface_wave: Deformation::travelling(&config.wave),
            field_wave: Deformation::cross_wave(&config.field),
            time: 0.0,
            dirty: true,
        }
    }

    /// Advance all mutable buffers to time t. In-place rewrites only; no
    /// buffer is reallocated, so downstream uploads can reuse GPU buffers.
    pub fn update(&mut self, t: f32) {
        self.time = t;

        if let Surface::Grid(grid) = &mut self.surface {
            grid.displace(&self.field_wave, t);
        }
        self.particles.animate(&self.field_wave, t);
        self.dirty = true;
    }

    /// Whether mutable buffers changed since the last upload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called by the draw target once updated buffers are uploaded.
    pub fn mark_uploaded(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    #[test]
    fn test_plane_scene_from_default_config() {
        let config = SimulationConfig::default();
        let scene = Scene::new(&config);
        match &scene.surface {
            Surface::Plane(mesh) => assert_eq!(mesh.vertex_count(), 101 * 101),
            Surface::Grid(_) => panic!("default surface should be a plane"),
        }
        assert_eq!(scene.particles.count(), 200);
        assert!(scene.is_dirty());
    }

    #[test]
    fn test_grid_scene_updates_heights() {
        let mut config = SimulationConfig::default();
        config.surface.kind = SurfaceKind::Grid;
        config.grid.step = 1.0;
        config.grid.extent = 2.0;
        let mut scene = Scene::new(&config);

        scene.update(1.5);
        assert!((scene.time - 1.5).abs() < f32::EPSILON);
        match &scene.surface {
            Surface::Grid(grid) => {
                for p in &grid.positions {
                    let expected = scene.field_wave.displacement(p[0], p[2], 1.5);
                    assert!((p[1] - expected).abs() < 1e-5);
                }
            }
            Surface::Plane(_) => panic!("expected grid surface"),
        }
    }

    #[test]
    fn test_dirty_flag_cycle() {
        let config = SimulationConfig::default();
        let mut scene = Scene::new(&config);
        scene.mark_uploaded();
        assert!(!scene.is_dirty());
        scene.update(0.02);
        assert!(scene.is_dirty());
    }

    #[test]
    fn test_plane_topology_untouched_by_update() {
        // The plane deforms in the shader; CPU update must leave it alone
        let config = SimulationConfig::default();
        let mut scene = Scene::new(&config);
        scene.update(3.0);
        if let Surface::Plane(mesh) = &scene.surface {
            assert!(mesh.vertices.iter().all(|v| v.position[1] == 0.0));
        }
    }
}
