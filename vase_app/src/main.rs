//! Two vases on a floor, lit by a ring of orbiting point lights
//!
//! WASD/QE move the camera, the arrow keys look around, Escape quits.
//! The window can be resized or minimized at any time.

mod keyboard_controller;
mod vase;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use frame_engine::foundation::logging;
use frame_engine::prelude::*;
use frame_engine::render::vulkan::WindowError;
use thiserror::Error;

use keyboard_controller::KeyboardInputController;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const SHADER_DIR: &str = concat!(env!("OUT_DIR"), "/shaders");

const FIELD_OF_VIEW_DEGREES: f32 = 50.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;

const LIGHT_COLORS: [[f32; 3]; 6] = [
    [1.0, 0.1, 0.1],
    [0.1, 0.1, 1.0],
    [0.1, 1.0, 0.1],
    [1.0, 1.0, 0.1],
    [0.1, 1.0, 1.0],
    [1.0, 1.0, 1.0],
];

#[derive(Error, Debug)]
enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

// Field order is drop order: GPU resources first, then the context, then
// the window the surface belongs to.
struct VaseApp {
    systems: SystemSchedule,
    uniforms: GlobalUniforms,
    game_objects: GameObjectRegistry,
    renderer: Renderer<VulkanContext>,
    context: Rc<VulkanContext>,
    window: Window,
    config: ApplicationConfig,
}

impl VaseApp {
    fn new(config: ApplicationConfig) -> Result<Self, AppError> {
        log::info!("Creating window...");
        let mut window = Window::new(&config.window)?;

        log::info!("Creating Vulkan context...");
        let context = Rc::new(VulkanContext::new(&mut window, &config.renderer)?);
        let renderer = Renderer::new(context.clone(), &mut window)?;

        let uniforms = GlobalUniforms::new(&context)?;

        let shader_dir = Path::new(SHADER_DIR);
        let mut systems = SystemSchedule::new();
        systems.add(SimpleRenderSystem::new(
            context.device(),
            renderer.swap_chain_render_pass(),
            uniforms.layout(),
            shader_dir,
        )?);
        systems.add(PointLightSystem::new(
            context.device(),
            renderer.swap_chain_render_pass(),
            uniforms.layout(),
            shader_dir,
        )?);

        let game_objects = load_game_objects(&context)?;
        log::info!("Scene ready with {} game objects", game_objects.len());

        Ok(Self {
            systems,
            uniforms,
            game_objects,
            renderer,
            context,
            window,
            config,
        })
    }

    fn run(&mut self) -> Result<(), AppError> {
        let controller = KeyboardInputController::default();
        let mut camera = Camera::new();
        let mut viewer = TransformComponent::default();
        viewer.translation.z = -2.5;

        let mut clock = FrameClock::new(self.config.engine.max_frame_time);

        while !self.window.should_close() {
            self.window.poll_events();

            let frame_time = clock.tick();
            let window = &self.window;
            controller.move_in_plane_xz(|key| window.is_key_pressed(key), frame_time, &mut viewer);
            camera.set_view_yxz(viewer.translation, viewer.rotation);

            let aspect = self.renderer.aspect_ratio();
            camera.set_perspective_projection(
                FIELD_OF_VIEW_DEGREES.to_radians(),
                aspect,
                NEAR_PLANE,
                FAR_PLANE,
            );

            let Some(command_buffer) = self.renderer.begin_frame(&mut self.window)? else {
                continue;
            };
            let frame_index = self.renderer.frame_index();

            let mut frame = FrameInfo {
                frame_index,
                frame_time,
                command_buffer,
                camera: &camera,
                global_descriptor_set: self.uniforms.descriptor_set(frame_index),
                game_objects: &mut self.game_objects,
            };

            let mut ubo = GlobalUbo::default();
            ubo.set_camera(&camera);
            self.systems.update_all(&mut frame, &mut ubo);
            self.uniforms.write(frame_index, &ubo)?;

            self.renderer.begin_swap_chain_render_pass(command_buffer);
            self.systems.render_all(&frame)?;
            self.renderer.end_swap_chain_render_pass(command_buffer);
            self.renderer.end_frame(&mut self.window)?;
        }

        log::info!("Window closed after {} frames", clock.frame_count());
        self.context.wait_idle()?;
        Ok(())
    }
}

fn load_game_objects(context: &VulkanContext) -> Result<GameObjectRegistry, AppError> {
    let mut objects = GameObjectRegistry::new();

    let flat_vase = Rc::new(Model::new(
        context,
        &vase::lathe(&vase::VASE_PROFILE, 24, [0.8, 0.8, 0.8], false),
    )?);
    let object = objects.spawn();
    object.model = Some(flat_vase);
    object.transform.translation = Vec3::new(-0.5, 0.5, 0.0);
    object.transform.scale = Vec3::new(3.0, 1.5, 3.0);

    let smooth_vase = Rc::new(Model::new(
        context,
        &vase::lathe(&vase::VASE_PROFILE, 48, [0.8, 0.8, 0.8], true),
    )?);
    let object = objects.spawn();
    object.model = Some(smooth_vase);
    object.transform.translation = Vec3::new(0.5, 0.5, 0.0);
    object.transform.scale = Vec3::new(3.0, 1.5, 3.0);

    let floor = Rc::new(Model::new(context, &ModelData::plane(1.0, [0.5, 0.5, 0.5]))?);
    let object = objects.spawn();
    object.model = Some(floor);
    object.transform.translation = Vec3::new(0.0, 0.5, 0.0);
    object.transform.scale = Vec3::new(3.0, 1.0, 3.0);

    let cube = Rc::new(Model::new(context, &ModelData::cube())?);
    let object = objects.spawn();
    object.model = Some(cube);
    object.transform.translation = Vec3::new(0.0, 0.3, 1.2);
    object.transform.scale = Vec3::new(0.4, 0.4, 0.4);
    object.transform.rotation.y = 0.6;

    for (position, color) in light_ring(LIGHT_COLORS.len()).into_iter().zip(LIGHT_COLORS) {
        let light = objects.spawn_point_light(0.2, 0.1, Vec3::from(color));
        light.transform.translation = position;
    }

    Ok(objects)
}

/// `count` positions evenly spaced on a ring above the floor
fn light_ring(count: usize) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = i as f32 * std::f32::consts::TAU / count as f32;
            // Turning (-1, -1, -1) about -Y
            let (sin, cos) = angle.sin_cos();
            Vec3::new(sin - cos, -1.0, -sin - cos)
        })
        .collect()
}

fn load_config() -> Result<(ApplicationConfig, PathBuf), ConfigError> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = ApplicationConfig::load_or_default(&path)?;
    config.validate()?;
    Ok((config, path))
}

fn main() {
    let (config, path) = match load_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init_with_level("info");
            log::error!("{}", AppError::from(e));
            std::process::exit(1);
        }
    };

    logging::init_with_level(&config.engine.log_level);
    log::info!("Starting vase demo (config: {})", path.display());

    let result = VaseApp::new(config).and_then(|mut app| app.run());
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
    log::info!("Vase demo finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lights sit on one ring at equal spacing
    #[test]
    fn test_light_ring() {
        let ring = light_ring(6);
        assert_eq!(ring.len(), 6);
        assert!((ring[0] - Vec3::new(-1.0, -1.0, -1.0)).norm() < 1e-6);

        let radius = Vec3::new(ring[0].x, 0.0, ring[0].z).norm();
        for pair in ring.windows(2) {
            assert_eq!(pair[0].y, -1.0);
            let r = Vec3::new(pair[1].x, 0.0, pair[1].z).norm();
            assert!((r - radius).abs() < 1e-5);
            let chord = (pair[1] - pair[0]).norm();
            assert!((chord - radius).abs() < 1e-5);
        }
    }
}
