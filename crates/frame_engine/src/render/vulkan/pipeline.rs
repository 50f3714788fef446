//! Shader modules and graphics pipelines
//!
//! [`PipelineConfigInfo`] holds every fixed-function setting as owned data.
//! Viewport and scissor are dynamic, so a pipeline survives swap chain
//! recreation as long as the render pass stays compatible.

use std::ffi::CStr;
use std::path::Path;

use ash::{vk, Device};

use crate::render::error::{RenderError, RenderResult};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, bytes: &[u8]) -> RenderResult<Self> {
        let code = ash::util::read_spv(&mut std::io::Cursor::new(bytes))?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(RenderError::Api)?;

        Ok(Self { device, module })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            RenderError::InitializationFailed(format!(
                "Failed to read shader {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(device, &bytes)
    }

    /// Shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Fixed-function state of a graphics pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfigInfo {
    /// Vertex buffer bindings; empty for pipelines that generate vertices
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive assembly
    pub topology: vk::PrimitiveTopology,
    /// Fill, line or point rasterization
    pub polygon_mode: vk::PolygonMode,
    /// Faces to discard
    pub cull_mode: vk::CullModeFlags,
    /// Winding of front faces
    pub front_face: vk::FrontFace,
    /// Compare against the depth buffer
    pub depth_test: bool,
    /// Write passing fragments to the depth buffer
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare_op: vk::CompareOp,
    /// Color blend state of the single color attachment
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    /// State supplied while recording
    pub dynamic_states: Vec<vk::DynamicState>,
    /// Layout the pipeline is created against
    pub pipeline_layout: vk::PipelineLayout,
    /// Render pass the pipeline is compatible with
    pub render_pass: vk::RenderPass,
    /// Subpass index within the render pass
    pub subpass: u32,
}

impl PipelineConfigInfo {
    /// Opaque triangles with depth testing, no culling, and dynamic
    /// viewport and scissor
    ///
    /// `pipeline_layout` and `render_pass` start null and must be filled in.
    pub fn default_config() -> Self {
        Self {
            binding_descriptions: Vec::new(),
            attribute_descriptions: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            color_blend_attachment: vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build(),
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            pipeline_layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }

    /// Switch the color attachment to straight alpha blending
    pub fn enable_alpha_blending(&mut self) {
        self.color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();
    }
}

/// Graphics pipeline wrapper with RAII cleanup
///
/// The pipeline layout is borrowed from the config and stays owned by the
/// caller.
pub struct Pipeline {
    device: Device,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Build a pipeline from SPIR-V files on disk
    pub fn new<P: AsRef<Path>>(
        device: &Device,
        vertex_path: P,
        fragment_path: P,
        config: &PipelineConfigInfo,
    ) -> RenderResult<Self> {
        if config.pipeline_layout == vk::PipelineLayout::null() {
            return Err(RenderError::InvalidOperation {
                reason: "no pipeline layout in pipeline config".to_string(),
            });
        }
        if config.render_pass == vk::RenderPass::null() {
            return Err(RenderError::InvalidOperation {
                reason: "no render pass in pipeline config".to_string(),
            });
        }

        let vertex_shader = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), fragment_path)?;

        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&config.binding_descriptions)
            .vertex_attribute_descriptions(&config.attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(false);

        // Counts only; the values come from the dynamic state at record time
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.polygon_mode)
            .line_width(1.0)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [config.color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&config.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(config.pipeline_layout)
            .render_pass(config.render_pass)
            .subpass(config.subpass);

        let pipelines = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info.build()],
                None,
            )
        }
        .map_err(|(_, err)| RenderError::Api(err))?;

        Ok(Self {
            device: device.clone(),
            pipeline: pipelines[0],
        })
    }

    /// Bind for drawing
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// Pipeline layout wrapper with RAII cleanup
pub struct PipelineLayout {
    device: Device,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Layout with the given descriptor set layouts and one push constant range
    pub fn new(
        device: &Device,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_range: Option<vk::PushConstantRange>,
    ) -> RenderResult<Self> {
        let ranges: Vec<vk::PushConstantRange> = push_constant_range.into_iter().collect();
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(&ranges);

        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(RenderError::Api)?;

        Ok(Self {
            device: device.clone(),
            layout,
        })
    }

    /// Layout handle
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Push constant range covering `T` for the given stages
pub fn push_constant_range<T>(stage_flags: vk::ShaderStageFlags) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags,
        offset: 0,
        size: std::mem::size_of::<T>() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The default config draws opaque, depth-tested, unculled triangles
    #[test]
    fn test_default_config() {
        let config = PipelineConfigInfo::default_config();
        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.cull_mode, vk::CullModeFlags::NONE);
        assert!(config.depth_test && config.depth_write);
        assert_eq!(config.color_blend_attachment.blend_enable, vk::FALSE);
        assert_eq!(
            config.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(config.pipeline_layout, vk::PipelineLayout::null());
        assert!(config.binding_descriptions.is_empty());
    }

    /// Alpha blending only touches the blend attachment
    #[test]
    fn test_enable_alpha_blending() {
        let mut config = PipelineConfigInfo::default_config();
        config.enable_alpha_blending();
        let blend = config.color_blend_attachment;
        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(blend.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert!(config.depth_test);
    }

    /// Push constant ranges span the whole block
    #[test]
    fn test_push_constant_range() {
        let range = push_constant_range::<[f32; 32]>(vk::ShaderStageFlags::VERTEX);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 128);
    }
}
