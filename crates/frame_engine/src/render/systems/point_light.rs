//! Point light animation and billboards

use std::path::Path;

use ash::{vk, Device};
use nalgebra::{Rotation3, Unit};

use crate::foundation::math::{Vec3, Vec4};
use crate::render::error::RenderResult;
use crate::render::frame::{FrameInfo, GlobalUbo, PointLightUniform, MAX_LIGHTS};
use crate::render::game_object::GameObjectRegistry;
use crate::render::systems::DrawableSystem;
use crate::render::vulkan::pipeline::{
    push_constant_range, Pipeline, PipelineConfigInfo, PipelineLayout,
};

/// Per-light push constants
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightPushConstants {
    /// World position, w unused
    pub position: Vec4,
    /// RGB color, intensity in w
    pub color: Vec4,
    /// Billboard radius
    pub radius: f32,
    _padding: [f32; 3],
}

unsafe impl bytemuck::Pod for PointLightPushConstants {}
unsafe impl bytemuck::Zeroable for PointLightPushConstants {}

const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Spin every point light about -Y by `frame_time` radians and copy the
/// lights into `ubo`
///
/// # Panics
/// If the scene has more than [`MAX_LIGHTS`] point lights.
pub fn update_point_lights(objects: &mut GameObjectRegistry, frame_time: f32, ubo: &mut GlobalUbo) {
    let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(Vec3::new(0.0, -1.0, 0.0)), frame_time);

    let mut light_index = 0;
    for object in objects.iter_mut() {
        let Some(light) = object.point_light else {
            continue;
        };
        assert!(light_index < MAX_LIGHTS, "Point lights exceed maximum specified");

        object.transform.translation = rotation * object.transform.translation;

        let position = object.transform.translation;
        ubo.point_lights[light_index] = PointLightUniform {
            position: Vec4::new(position.x, position.y, position.z, 1.0),
            color: Vec4::new(object.color.x, object.color.y, object.color.z, light.light_intensity),
        };
        light_index += 1;
    }
    ubo.num_lights = light_index as i32;
}

/// Draws a camera-facing disc for every point light
pub struct PointLightSystem {
    device: Device,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
}

impl PointLightSystem {
    /// Build the pipeline from `point_light.vert.spv` and
    /// `point_light.frag.spv` in `shader_dir`
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RenderResult<Self> {
        let pipeline_layout = PipelineLayout::new(
            device,
            &[global_set_layout],
            Some(push_constant_range::<PointLightPushConstants>(STAGES)),
        )?;

        // Vertices are generated in the shader
        let mut config = PipelineConfigInfo::default_config();
        config.enable_alpha_blending();
        config.render_pass = render_pass;
        config.pipeline_layout = pipeline_layout.handle();

        let pipeline = Pipeline::new(
            device,
            shader_dir.join("point_light.vert.spv"),
            shader_dir.join("point_light.frag.spv"),
            &config,
        )?;

        Ok(Self {
            device: device.clone(),
            pipeline,
            pipeline_layout,
        })
    }
}

impl DrawableSystem for PointLightSystem {
    fn name(&self) -> &str {
        "point_light"
    }

    fn update(&mut self, frame: &mut FrameInfo<'_>, ubo: &mut GlobalUbo) {
        update_point_lights(frame.game_objects, frame.frame_time, ubo);
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
            let Some(light) = object.point_light else {
                continue;
            };
            let translation = object.transform.translation;
            let push = PointLightPushConstants {
                position: Vec4::new(translation.x, translation.y, translation.z, 1.0),
                color: Vec4::new(object.color.x, object.color.y, object.color.z, light.light_intensity),
                radius: object.light_radius(),
                _padding: [0.0; 3],
            };
            unsafe {
                self.device.cmd_push_constants(
                    command_buffer,
                    self.pipeline_layout.handle(),
                    STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
                self.device.cmd_draw(command_buffer, 6, 1, 0, 0);
            }
        }
        Ok(())
    }
}
