//! Surface generation: tessellated plane mesh and line-grid sampling.
//!
//! Both variants produce an immutable topology (index buffer) and a position
//! buffer whose layout is stable across frames. The plane is deformed on the
//! GPU via the time uniform; the line grid is rewritten in place CPU-side by
//! [`LineGrid::displace`] each tick, never reallocated.

use bytemuck::{Pod, Zeroable};

use crate::anim::deform::Deformation;

/// Vertex data for the plane surface.
///
/// UVs span [0,1] across the plane for shader-side parametrization.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SurfaceVertex {
    /// 3D position; y is zero at rest, displaced in the vertex shader
    pub position: [f32; 3],
    /// UV coordinates across the plane
    pub uv: [f32; 2],
}

impl SurfaceVertex {
    /// Returns the vertex buffer layout for wgpu
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SurfaceVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // UV
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Tessellated plane in the XZ plane, centered at the origin.
pub struct PlaneMesh {
    pub vertices: Vec<SurfaceVertex>,
    /// Triangle-list indices, 3 per triangle
    pub indices: Vec<u32>,
    pub size: f32,
    pub subdivisions: u32,
}

impl PlaneMesh {
    /// Create a size x size plane with `subdivisions` quads per side,
    /// i.e. (subdivisions+1)^2 vertices.
    pub fn new(size: f32, subdivisions: u32) -> Self {
        let n = subdivisions;
        let verts_per_side = n + 1;
        let mut vertices = Vec::with_capacity((verts_per_side * verts_per_side) as usize);
        let mut indices = Vec::with_capacity((n * n * 6) as usize);

        for row in 0..verts_per_side {
            let v = row as f32 / n as f32;
            let z = (v - 0.5) * size;
            for col in 0..verts_per_side {
                let u = col as f32 / n as f32;
                let x = (u - 0.5) * size;
                vertices.push(SurfaceVertex {
                    position: [x, 0.0, z],
                    uv: [u, v],
                });
            }
        }

        for row in 0..n {
            for col in 0..n {
                let current = row * verts_per_side + col;
                let next = current + verts_per_side;

                indices.push(current);
                indices.push(next);
                indices.push(current + 1);

                indices.push(current + 1);
                indices.push(next);
                indices.push(next + 1);
            }
        }

        Self {
            vertices,
            indices,
            size,
            subdivisions,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get vertex data as bytes for GPU buffer creation
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes for GPU buffer creation
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Raw line grid of sample points over a square domain, spaced at a fixed
/// step, connected as polylines along rows and columns.
pub struct LineGrid {
    /// Sample positions, row-major; y rewritten in place each tick
    pub positions: Vec<[f32; 3]>,
    /// Line-list indices, 2 per segment
    pub indices: Vec<u32>,
    pub step: f32,
    /// Samples per side
    pub side: u32,
}

impl LineGrid {
    /// Sample the square [-extent, +extent]^2 at `step` spacing.
    pub fn new(step: f32, extent: f32) -> Self {
        let side = (2.0 * extent / step).round() as u32 + 1;
        let mut positions = Vec::with_capacity((side * side) as usize);

        for row in 0..side {
            let z = -extent + row as f32 * step;
            for col in 0..side {
                let x = -extent + col as f32 * step;
                positions.push([x, 0.0, z]);
            }
        }

        let mut indices = Vec::with_capacity((2 * 2 * side * (side - 1)) as usize);
        for row in 0..side {
            for col in 0..side - 1 {
                let i = row * side + col;
                indices.push(i);
                indices.push(i + 1);
            }
        }
        for col in 0..side {
            for row in 0..side - 1 {
                let i = row * side + col;
                indices.push(i);
                indices.push(i + side);
            }
        }

        Self {
            positions,
            indices,
            step,
            side,
        }
    }

    /// Rewrite every sample's y from the deformation at time t. In-place:
    /// the buffer never grows, shrinks, or reorders.
    pub fn displace(&mut self, wave: &Deformation, t: f32) {
        for p in &mut self.positions {
            p[1] = wave.displacement(p[0], p[2], t);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
