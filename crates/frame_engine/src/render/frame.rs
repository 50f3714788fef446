//! Per-frame data handed to render systems

use ash::vk;

use crate::foundation::math::{Mat4, Vec4};
use crate::render::camera::Camera;
use crate::render::game_object::GameObjectRegistry;

/// Capacity of the point light array in [`GlobalUbo`]
pub const MAX_LIGHTS: usize = 10;

/// Point light as laid out in the global uniform buffer
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointLightUniform {
    /// World position (w unused)
    pub position: Vec4,
    /// RGB color, intensity in w
    pub color: Vec4,
}

/// Uniform block bound at set 0, binding 0 for every pipeline
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalUbo {
    /// Camera projection
    pub projection: Mat4,
    /// World to view
    pub view: Mat4,
    /// View to world, used for the camera position in specular lighting
    pub inverse_view: Mat4,
    /// RGB ambient color, intensity in w
    pub ambient_light_color: Vec4,
    /// Active lights occupy the first `num_lights` slots
    pub point_lights: [PointLightUniform; MAX_LIGHTS],
    /// Number of valid entries in `point_lights`
    pub num_lights: i32,
    _padding: [i32; 3],
}

unsafe impl bytemuck::Pod for PointLightUniform {}
unsafe impl bytemuck::Zeroable for PointLightUniform {}

unsafe impl bytemuck::Pod for GlobalUbo {}
unsafe impl bytemuck::Zeroable for GlobalUbo {}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            inverse_view: Mat4::identity(),
            ambient_light_color: Vec4::new(1.0, 1.0, 1.0, 0.02),
            point_lights: [PointLightUniform::default(); MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

impl GlobalUbo {
    /// Copy the camera matrices into the block
    pub fn set_camera(&mut self, camera: &Camera) {
        self.projection = *camera.projection();
        self.view = *camera.view();
        self.inverse_view = *camera.inverse_view();
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Everything a render system needs to record one frame
pub struct FrameInfo<'a> {
    /// Frame slot, `0..MAX_FRAMES_IN_FLIGHT`
    pub frame_index: usize,
    /// Seconds since the previous frame, clamped
    pub frame_time: f32,
    /// Command buffer being recorded
    pub command_buffer: vk::CommandBuffer,
    /// Camera of this frame
    pub camera: &'a Camera,
    /// Descriptor set holding this frame's [`GlobalUbo`]
    pub global_descriptor_set: vk::DescriptorSet,
    /// Scene contents
    pub game_objects: &'a mut GameObjectRegistry,
}
