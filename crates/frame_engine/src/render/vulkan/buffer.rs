//! GPU buffers with optional persistent mapping

use std::ffi::c_void;

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};
use crate::render::vulkan::context::VulkanContext;

/// Buffer wrapper with memory management
///
/// The buffer holds `instance_count` elements of `instance_size` bytes, each
/// starting on a multiple of the alignment given at creation.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut c_void,
    buffer_size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new buffer with memory allocation
    pub fn new(
        context: &VulkanContext,
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> RenderResult<Self> {
        let device = context.device().clone();
        let alignment_size = aligned_size(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * vk::DeviceSize::from(instance_count);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(buffer_size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index =
            match context.find_memory_type(mem_requirements.memory_type_bits, properties) {
                Ok(index) => index,
                Err(e) => {
                    unsafe { device.destroy_buffer(buffer, None) };
                    return Err(e);
                }
            };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        let buffer = Self {
            device,
            buffer,
            memory,
            mapped: std::ptr::null_mut(),
            buffer_size,
        };
        unsafe { buffer.device.bind_buffer_memory(buffer.buffer, buffer.memory, 0)? };

        Ok(buffer)
    }

    /// Map the whole buffer; it stays mapped until [`Self::unmap`] or drop
    pub fn map(&mut self) -> RenderResult<()> {
        if self.mapped.is_null() {
            self.mapped = unsafe {
                self.device.map_memory(
                    self.memory,
                    0,
                    vk::WHOLE_SIZE,
                    vk::MemoryMapFlags::empty(),
                )?
            };
        }
        Ok(())
    }

    /// Unmap memory
    pub fn unmap(&mut self) {
        if !self.mapped.is_null() {
            unsafe { self.device.unmap_memory(self.memory) };
            self.mapped = std::ptr::null_mut();
        }
    }

    /// Copy `data` into the mapped buffer at `offset`
    pub fn write_to_buffer(&mut self, data: &[u8], offset: vk::DeviceSize) -> RenderResult<()> {
        if self.mapped.is_null() {
            return Err(RenderError::InvalidOperation {
                reason: "Cannot write to an unmapped buffer".to_string(),
            });
        }
        if offset + data.len() as vk::DeviceSize > self.buffer_size {
            return Err(RenderError::InvalidOperation {
                reason: format!(
                    "Write of {} bytes at {} overflows buffer of {} bytes",
                    data.len(),
                    offset,
                    self.buffer_size
                ),
            });
        }
        unsafe {
            let dst = (self.mapped as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    /// Make host writes visible to the device (needed for non-coherent memory)
    pub fn flush(&self) -> RenderResult<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe {
            self.device
                .flush_mapped_memory_ranges(&[range.build()])
                .map_err(RenderError::from)
        }
    }

    /// Descriptor info covering the whole buffer
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Total size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer_size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Upload `data` into a new device-local buffer through a staging buffer
pub fn create_device_local_buffer(
    context: &VulkanContext,
    data: &[u8],
    element_size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
) -> RenderResult<Buffer> {
    let element_count = (data.len() as vk::DeviceSize / element_size) as u32;

    let mut staging = Buffer::new(
        context,
        element_size,
        element_count,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        1,
    )?;
    staging.map()?;
    staging.write_to_buffer(data, 0)?;

    let buffer = Buffer::new(
        context,
        element_size,
        element_count,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        1,
    )?;
    context.copy_buffer(staging.handle(), buffer.handle(), buffer.size())?;
    Ok(buffer)
}

/// Round `instance_size` up to a multiple of `min_offset_alignment`
///
/// An alignment of zero or one leaves the size unchanged. Vulkan alignments
/// are powers of two.
pub fn aligned_size(instance_size: vk::DeviceSize, min_offset_alignment: vk::DeviceSize) -> vk::DeviceSize {
    if min_offset_alignment > 1 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}
