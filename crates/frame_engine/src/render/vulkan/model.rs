//! Vertex format and GPU meshes

use std::collections::HashMap;

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::buffer::{create_device_local_buffer, Buffer};
use crate::render::vulkan::context::VulkanContext;

/// Vertex layout shared by every mesh pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position (location 0)
    pub position: [f32; 3],
    /// Vertex color (location 1)
    pub color: [f32; 3],
    /// Object-space normal (location 2)
    pub normal: [f32; 3],
    /// Texture coordinate (location 3)
    pub uv: [f32; 2],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// One interleaved binding at slot 0
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    /// Position, color, normal and uv at locations 0 to 3
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        let attribute = |location: u32, format: vk::Format, offset: usize| {
            vk::VertexInputAttributeDescription {
                binding: 0,
                location,
                format,
                offset: offset as u32,
            }
        };
        vec![
            attribute(0, vk::Format::R32G32B32_SFLOAT, 0),
            attribute(1, vk::Format::R32G32B32_SFLOAT, 12),
            attribute(2, vk::Format::R32G32B32_SFLOAT, 24),
            attribute(3, vk::Format::R32G32_SFLOAT, 36),
        ]
    }

    fn key(&self) -> [u32; 11] {
        let mut key = [0u32; 11];
        let floats = self
            .position
            .iter()
            .chain(&self.color)
            .chain(&self.normal)
            .chain(&self.uv);
        for (slot, value) in key.iter_mut().zip(floats) {
            *slot = value.to_bits();
        }
        key
    }
}

/// CPU-side mesh; an empty index list means non-indexed drawing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelData {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl ModelData {
    /// Collapse a triangle soup into unique vertices plus indices
    pub fn from_triangles(triangles: &[Vertex]) -> Self {
        let mut unique: HashMap<[u32; 11], u32> = HashMap::new();
        let mut data = Self::default();

        for vertex in triangles {
            let next = data.vertices.len() as u32;
            let index = *unique.entry(vertex.key()).or_insert_with(|| {
                data.vertices.push(*vertex);
                next
            });
            data.indices.push(index);
        }
        data
    }

    /// Unit cube centred on the origin with one color per face
    pub fn cube() -> Self {
        // (normal, tangent u, tangent v, color)
        let faces: [([f32; 3], [f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.9, 0.9, 0.9]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [0.8, 0.8, 0.1]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.9, 0.6, 0.1]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.8, 0.1, 0.1]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.1, 0.1, 0.8]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.1, 0.8, 0.1]),
        ];

        let mut data = Self::default();
        for (normal, u, v, color) in faces {
            let base = data.vertices.len() as u32;
            for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                let position = [
                    normal[0] * 0.5 + u[0] * su + v[0] * sv,
                    normal[1] * 0.5 + u[1] * su + v[1] * sv,
                    normal[2] * 0.5 + u[2] * su + v[2] * sv,
                ];
                data.vertices.push(Vertex {
                    position,
                    color,
                    normal,
                    uv: [su + 0.5, sv + 0.5],
                });
            }
            data.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        data
    }

    /// Square in the XZ plane, facing up (-Y)
    pub fn plane(size: f32, color: [f32; 3]) -> Self {
        let half = size * 0.5;
        let corners = [(-half, -half), (half, -half), (half, half), (-half, half)];
        let vertices = corners
            .iter()
            .map(|&(x, z)| Vertex {
                position: [x, 0.0, z],
                color,
                normal: [0.0, -1.0, 0.0],
                uv: [x / size + 0.5, z / size + 0.5],
            })
            .collect();
        Self {
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Whether the mesh is drawn with an index buffer
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }
}

/// Mesh uploaded to device-local memory
pub struct Model {
    device: Device,
    vertex_buffer: Buffer,
    vertex_count: u32,
    index_buffer: Option<Buffer>,
    index_count: u32,
}

impl Model {
    /// Upload `data`
    ///
    /// Fails with [`RenderError::InvalidOperation`] for fewer than three
    /// vertices.
    pub fn new(context: &VulkanContext, data: &ModelData) -> RenderResult<Self> {
        if data.vertices.len() < 3 {
            return Err(RenderError::InvalidOperation {
                reason: format!("model needs at least 3 vertices, got {}", data.vertices.len()),
            });
        }

        let vertex_buffer = create_device_local_buffer(
            context,
            bytemuck::cast_slice(&data.vertices),
            std::mem::size_of::<Vertex>() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = if data.is_indexed() {
            Some(create_device_local_buffer(
                context,
                bytemuck::cast_slice(&data.indices),
                std::mem::size_of::<u32>() as vk::DeviceSize,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?)
        } else {
            None
        };

        log::debug!(
            "Uploaded model: {} vertices, {} indices",
            data.vertices.len(),
            data.indices.len()
        );

        Ok(Self {
            device: context.device().clone(),
            vertex_buffer,
            vertex_count: data.vertices.len() as u32,
            index_buffer,
            index_count: data.indices.len() as u32,
        })
    }

    /// Bind vertex and index buffers
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );
            if let Some(index_buffer) = &self.index_buffer {
                self.device.cmd_bind_index_buffer(
                    command_buffer,
                    index_buffer.handle(),
                    0,
                    vk::IndexType::UINT32,
                );
            }
        }
    }

    /// Record the draw; call after [`Self::bind`]
    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            if self.index_buffer.is_some() {
                self.device
                    .cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
            } else {
                self.device.cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
            }
        }
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, zero when not indexed
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
