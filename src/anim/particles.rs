//! Particle cloud: N randomized points whose height is re-derived each
//! frame from the same deformation function as the surface.
//!
//! The cloud's topology is fixed at creation; animation rewrites the vertex
//! buffer in place. The whole field spins slowly around Y, and each
//! particle's y is computed from the deformation at its rotated world
//! position plus a constant lift, so the particles ride the same wave the
//! surface shows.

use bytemuck::{Pod, Zeroable};

use crate::anim::deform::Deformation;
use crate::config::{ParticleColor, ParticleParameters};

/// Per-particle vertex data for GPU rendering.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl ParticleVertex {
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ParticleVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Color
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Xorshift64 PRNG, seeded for reproducible clouds.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    /// Random f32 in [0, 1).
    fn next_f32(&mut self) -> f32 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.state = s;
        // Upper bits for better distribution
        ((s >> 40) as f32) / ((1u64 << 24) as f32)
    }
}

/// Point cloud floating above the surface.
pub struct ParticleCloud {
    /// Rest positions inside the bounding box; never mutated after init
    base: Vec<[f32; 3]>,
    /// Live vertex buffer, rewritten in place each frame
    pub vertices: Vec<ParticleVertex>,
    /// Accumulated field rotation around Y, radians
    rotation: f32,
    spin: f32,
    lift: f32,
}

impl ParticleCloud {
    /// Generate `params.count` particles uniformly inside a box spanning
    /// `half_size` in x/z and [0, height] in y.
    pub fn new(params: &ParticleParameters, half_size: f32, height: f32) -> Self {
        let mut rng = XorShift64::new(params.seed);
        let count = params.count as usize;
        let mut base = Vec::with_capacity(count);
        let mut vertices = Vec::with_capacity(count);

        for _ in 0..count {
            let x = (rng.next_f32() - 0.5) * 2.0 * half_size;
            let y = rng.next_f32() * height;
            let z = (rng.next_f32() - 0.5) * 2.0 * half_size;
            let color = match params.color {
                ParticleColor::Random => [1.0, 1.0, rng.next_f32()],
                ParticleColor::Fixed(rgb) => rgb,
            };
            base.push([x, y, z]);
            vertices.push(ParticleVertex {
                position: [x, y, z],
                color,
            });
        }

        Self {
            base,
            vertices,
            rotation: 0.0,
            spin: params.spin,
            lift: params.lift,
        }
    }

    /// Advance the field rotation and re-derive every particle's position
    /// for time t. Same indexing every frame; values only.
    pub fn animate(&mut self, wave: &Deformation, t: f32) {
        self.rotation += self.spin;
        let (sin_r, cos_r) = self.rotation.sin_cos();

        for (vertex, rest) in self.vertices.iter_mut().zip(&self.base) {
            let x = rest[0] * cos_r + rest[2] * sin_r;
            let z = -rest[0] * sin_r + rest[2] * cos_r;
            vertex.position = [x, wave.displacement(x, z, t) + self.lift, z];
        }
    }

    pub fn count(&self) -> usize {
        self.vertices.len()
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
