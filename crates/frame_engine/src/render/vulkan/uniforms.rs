//! Per-frame global uniform buffers

use ash::vk;

use crate::render::backend::MAX_FRAMES_IN_FLIGHT;
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame::GlobalUbo;
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::descriptor::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter,
};

/// One mapped [`GlobalUbo`] buffer and descriptor set per frame in flight
///
/// Frame `i` only touches buffer `i`, so the CPU can fill the next frame while
/// the GPU still reads the previous one.
pub struct GlobalUniforms {
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
    buffers: Vec<Buffer>,
    sets: Vec<vk::DescriptorSet>,
}

impl GlobalUniforms {
    /// Create the buffers, the set layout (binding 0, all graphics stages)
    /// and one set per frame
    pub fn new(context: &VulkanContext) -> RenderResult<Self> {
        let device = context.device();
        let frames = MAX_FRAMES_IN_FLIGHT as u32;

        let pool = DescriptorPoolBuilder::new()
            .max_sets(frames)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, frames)
            .build(device)?;

        let layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
            .build(device)?;

        let min_alignment = context
            .physical_device()
            .properties
            .limits
            .min_uniform_buffer_offset_alignment;

        let mut buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let mut buffer = Buffer::new(
                context,
                std::mem::size_of::<GlobalUbo>() as vk::DeviceSize,
                1,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE,
                min_alignment,
            )?;
            buffer.map()?;

            let set = DescriptorWriter::new(&layout)
                .write_buffer(0, buffer.descriptor_info())
                .build(&pool)?;

            buffers.push(buffer);
            sets.push(set);
        }

        log::debug!(
            "Created {} global uniform buffers (alignment {})",
            buffers.len(),
            min_alignment
        );

        Ok(Self {
            pool,
            layout,
            buffers,
            sets,
        })
    }

    /// Copy `ubo` into the buffer of `frame_index` and flush it
    pub fn write(&mut self, frame_index: usize, ubo: &GlobalUbo) -> RenderResult<()> {
        let buffer = self
            .buffers
            .get_mut(frame_index)
            .ok_or_else(|| RenderError::InvalidOperation {
                reason: format!("frame index {} out of range", frame_index),
            })?;
        buffer.write_to_buffer(ubo.as_bytes(), 0)?;
        buffer.flush()
    }

    /// Descriptor set of `frame_index`
    ///
    /// # Panics
    /// If `frame_index >= MAX_FRAMES_IN_FLIGHT`.
    pub fn descriptor_set(&self, frame_index: usize) -> vk::DescriptorSet {
        self.sets[frame_index]
    }

    /// Layout of the global set, for building pipeline layouts
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout.handle()
    }

    /// Pool the sets were allocated from
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}
