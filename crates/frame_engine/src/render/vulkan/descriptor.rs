//! Descriptor set layouts, pools and writes

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};

/// Builder for [`DescriptorSetLayout`]
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single uniform buffer at `binding`
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags, 1)
    }

    /// Add an arbitrary binding
    ///
    /// # Panics
    /// If `binding` is already in use.
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        assert!(
            self.bindings.iter().all(|existing| existing.binding != binding),
            "Binding {} already in use",
            binding
        );
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Create the layout
    pub fn build(self, device: &Device) -> RenderResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(RenderError::Api)?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout with RAII cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Descriptor type declared at `binding`
    pub fn binding_type(&self, binding: u32) -> Option<vk::DescriptorType> {
        self.bindings
            .iter()
            .find(|b| b.binding == binding)
            .map(|b| b.descriptor_type)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Builder for [`DescriptorPool`]
pub struct DescriptorPoolBuilder {
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl Default for DescriptorPoolBuilder {
    fn default() -> Self {
        Self {
            pool_sizes: Vec::new(),
            max_sets: 1000,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }
}

impl DescriptorPoolBuilder {
    /// Start an empty pool description
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `count` descriptors of `descriptor_type`
    pub fn add_pool_size(mut self, descriptor_type: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(vk::DescriptorPoolSize {
            ty: descriptor_type,
            descriptor_count: count,
        });
        self
    }

    /// Upper bound on allocated sets
    pub fn max_sets(mut self, count: u32) -> Self {
        self.max_sets = count;
        self
    }

    /// Pool creation flags
    pub fn flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Create the pool
    pub fn build(self, device: &Device) -> RenderResult<DescriptorPool> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(self.flags)
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(RenderError::Api)?;

        Ok(DescriptorPool {
            pool,
            device: device.clone(),
        })
    }
}

/// Descriptor pool with RAII cleanup
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Allocate one set of `layout`
    pub fn allocate_descriptor_set(
        &self,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(RenderError::Api)?;
        Ok(sets[0])
    }

    /// Return every set to the pool
    pub fn reset(&self) -> RenderResult<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(RenderError::Api)
    }

    /// Pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Collects buffer writes for one descriptor set and applies them together
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    buffer_writes: Vec<(u32, vk::DescriptorType, vk::DescriptorBufferInfo)>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start writing sets of `layout`
    pub fn new(layout: &'a DescriptorSetLayout) -> Self {
        Self {
            layout,
            buffer_writes: Vec::new(),
        }
    }

    /// Point `binding` at `buffer_info`
    ///
    /// # Panics
    /// If the layout has no such binding.
    pub fn write_buffer(mut self, binding: u32, buffer_info: vk::DescriptorBufferInfo) -> Self {
        let descriptor_type = self
            .layout
            .binding_type(binding)
            .unwrap_or_else(|| panic!("Layout does not contain binding {}", binding));
        self.buffer_writes.push((binding, descriptor_type, buffer_info));
        self
    }

    /// Apply the writes to an existing set
    pub fn overwrite(&self, set: vk::DescriptorSet) {
        let infos: Vec<[vk::DescriptorBufferInfo; 1]> = self
            .buffer_writes
            .iter()
            .map(|(_, _, info)| [*info])
            .collect();
        let writes: Vec<vk::WriteDescriptorSet> = self
            .buffer_writes
            .iter()
            .zip(&infos)
            .map(|((binding, descriptor_type, _), info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*descriptor_type)
                    .buffer_info(info)
                    .build()
            })
            .collect();

        unsafe {
            self.layout.device.update_descriptor_sets(&writes, &[]);
        }
    }

    /// Allocate a set from `pool` and apply the writes
    pub fn build(&self, pool: &DescriptorPool) -> RenderResult<vk::DescriptorSet> {
        let set = pool.allocate_descriptor_set(self.layout.handle())?;
        self.overwrite(set);
        Ok(set)
    }
}
