//! Lit mesh rendering

use std::path::Path;

use ash::{vk, Device};

use crate::foundation::math::Mat4;
use crate::render::error::RenderResult;
use crate::render::frame::FrameInfo;
use crate::render::game_object::GameObject;
use crate::render::systems::DrawableSystem;
use crate::render::vulkan::model::Vertex;
use crate::render::vulkan::pipeline::{
    push_constant_range, Pipeline, PipelineConfigInfo, PipelineLayout,
};

/// Per-object push constants
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplePushConstantData {
    /// Object to world
    pub model_matrix: Mat4,
    /// Inverse transpose of the model matrix, upper 3x3 used
    pub normal_matrix: Mat4,
}

unsafe impl bytemuck::Pod for SimplePushConstantData {}
unsafe impl bytemuck::Zeroable for SimplePushConstantData {}

impl SimplePushConstantData {
    /// Push constants for `object`
    pub fn for_object(object: &GameObject) -> Self {
        Self {
            model_matrix: object.transform.mat4(),
            normal_matrix: object.transform.normal_matrix(),
        }
    }
}

const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Draws every game object that has a model
pub struct SimpleRenderSystem {
    device: Device,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
}

impl SimpleRenderSystem {
    /// Build the pipeline from `simple_shader.vert.spv` and
    /// `simple_shader.frag.spv` in `shader_dir`
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RenderResult<Self> {
        let pipeline_layout = PipelineLayout::new(
            device,
            &[global_set_layout],
            Some(push_constant_range::<SimplePushConstantData>(STAGES)),
        )?;

        let mut config = PipelineConfigInfo::default_config();
        config.binding_descriptions = Vertex::binding_descriptions();
        config.attribute_descriptions = Vertex::attribute_descriptions();
        config.render_pass = render_pass;
        config.pipeline_layout = pipeline_layout.handle();

        let pipeline = Pipeline::new(
            device,
            shader_dir.join("simple_shader.vert.spv"),
            shader_dir.join("simple_shader.frag.spv"),
            &config,
        )?;

        Ok(Self {
            device: device.clone(),
            pipeline,
            pipeline_layout,
        })
    }
}

impl DrawableSystem for SimpleRenderSystem {
    fn name(&self) -> &str {
        "simple_render"
    }

    fn render(&mut self, frame: &FrameInfo<'_>) -> RenderResult<()> {
        let command_buffer = frame.command_buffer;
        self.pipeline.bind(command_buffer);

        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout.handle(),
                0,
                &[frame.global_descriptor_set],
                &[],
            );
        }

        for object in frame.game_objects.iter() {
            let Some(model) = &object.model else {
                continue;
            };
            let push = SimplePushConstantData::for_object(object);
            unsafe {
                self.device.cmd_push_constants(
                    command_buffer,
                    self.pipeline_layout.handle(),
                    STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }
            model.bind(command_buffer);
            model.draw(command_buffer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::game_object::GameObjectRegistry;

    /// Two mat4s fit the guaranteed 128 byte push constant budget
    #[test]
    fn test_push_constant_size() {
        assert_eq!(std::mem::size_of::<SimplePushConstantData>(), 128);
        assert_eq!(push_constant_range::<SimplePushConstantData>(STAGES).size, 128);
    }

    /// Push constants carry the object transform
    #[test]
    fn test_push_constants_from_transform() {
        let mut registry = GameObjectRegistry::new();
        let object = registry.spawn();
        object.transform.translation = Vec3::new(1.0, 2.0, 3.0);
        object.transform.scale = Vec3::new(2.0, 2.0, 2.0);

        let push = SimplePushConstantData::for_object(object);
        assert_eq!(push.model_matrix, object.transform.mat4());
        assert_eq!(push.model_matrix[(0, 3)], 1.0);
        assert!((push.normal_matrix[(0, 0)] - 0.5).abs() < 1e-6);
        assert_eq!(push.normal_matrix[(3, 3)], 1.0);
    }
}
