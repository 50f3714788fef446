//! Fly-style camera movement on the XZ plane

use std::f32::consts::TAU;

use frame_engine::prelude::{TransformComponent, Vec3};
use glfw::Key;

/// Key bindings for [`KeyboardInputController`]
#[derive(Debug, Clone, Copy)]
pub struct KeyMappings {
    pub move_left: Key,
    pub move_right: Key,
    pub move_forward: Key,
    pub move_backward: Key,
    pub move_up: Key,
    pub move_down: Key,
    pub look_left: Key,
    pub look_right: Key,
    pub look_up: Key,
    pub look_down: Key,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: Key::A,
            move_right: Key::D,
            move_forward: Key::W,
            move_backward: Key::S,
            move_up: Key::E,
            move_down: Key::Q,
            look_left: Key::Left,
            look_right: Key::Right,
            look_up: Key::Up,
            look_down: Key::Down,
        }
    }
}

/// Moves a transform from held keys; yaw turns, pitch is clamped
#[derive(Debug, Clone, Copy)]
pub struct KeyboardInputController {
    pub keys: KeyMappings,
    /// Units per second
    pub move_speed: f32,
    /// Radians per second
    pub look_speed: f32,
}

impl Default for KeyboardInputController {
    fn default() -> Self {
        Self {
            keys: KeyMappings::default(),
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

/// Pitch limit in radians, just short of straight up or down
pub const MAX_PITCH: f32 = 1.5;

impl KeyboardInputController {
    /// Apply one frame of input to `transform`
    ///
    /// `is_pressed` reports whether a key is held, normally
    /// `|key| window.is_key_pressed(key)`.
    pub fn move_in_plane_xz<F>(&self, is_pressed: F, dt: f32, transform: &mut TransformComponent)
    where
        F: Fn(Key) -> bool,
    {
        let axis = |positive: Key, negative: Key| {
            (is_pressed(positive) as i32 - is_pressed(negative) as i32) as f32
        };

        let rotate = Vec3::new(
            axis(self.keys.look_up, self.keys.look_down),
            axis(self.keys.look_right, self.keys.look_left),
            0.0,
        );
        if rotate.dot(&rotate) > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }

        transform.rotation.x = transform.rotation.x.clamp(-MAX_PITCH, MAX_PITCH);
        transform.rotation.y = transform.rotation.y.rem_euclid(TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let move_dir = forward * axis(self.keys.move_forward, self.keys.move_backward)
            + right * axis(self.keys.move_right, self.keys.move_left)
            + up * axis(self.keys.move_up, self.keys.move_down);
        if move_dir.dot(&move_dir) > f32::EPSILON {
            transform.translation += self.move_speed * dt * move_dir.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(keys: &'static [Key]) -> impl Fn(Key) -> bool {
        move |key| keys.contains(&key)
    }

    fn assert_vec_near(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).norm() < 1e-5,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    /// No keys, no movement
    #[test]
    fn test_idle() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[]), 1.0, &mut transform);
        assert_eq!(transform, TransformComponent::default());
    }

    /// W moves along +Z at zero yaw
    #[test]
    fn test_forward() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[Key::W]), 0.5, &mut transform);
        assert_vec_near(transform.translation, Vec3::new(0.0, 0.0, 1.5));
    }

    /// Diagonal movement is not faster than straight movement
    #[test]
    fn test_diagonal_is_normalized() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[Key::W, Key::D]), 1.0, &mut transform);
        assert!((transform.translation.norm() - 3.0).abs() < 1e-5);
        assert!(transform.translation.x > 0.0 && transform.translation.z > 0.0);
    }

    /// E moves up, which is -Y
    #[test]
    fn test_vertical() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[Key::E]), 1.0, &mut transform);
        assert_vec_near(transform.translation, Vec3::new(0.0, -3.0, 0.0));
    }

    /// Opposite keys cancel
    #[test]
    fn test_opposites_cancel() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[Key::A, Key::D, Key::Left, Key::Right]), 1.0, &mut transform);
        assert_eq!(transform, TransformComponent::default());
    }

    /// Pitch stops at the limit
    #[test]
    fn test_pitch_clamped() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[Key::Up]), 10.0, &mut transform);
        assert_eq!(transform.rotation.x, MAX_PITCH);
        controller.move_in_plane_xz(held(&[Key::Down]), 10.0, &mut transform);
        assert_eq!(transform.rotation.x, -MAX_PITCH);
    }

    /// Yaw wraps into [0, 2π)
    #[test]
    fn test_yaw_wraps() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(held(&[Key::Left]), 1.0, &mut transform);
        assert!((transform.rotation.y - (TAU - 1.5)).abs() < 1e-5);
    }

    /// Movement follows the current yaw
    #[test]
    fn test_forward_follows_yaw() {
        let controller = KeyboardInputController::default();
        let mut transform = TransformComponent::default();
        transform.rotation.y = std::f32::consts::FRAC_PI_2;
        controller.move_in_plane_xz(held(&[Key::W]), 1.0, &mut transform);
        assert_vec_near(transform.translation, Vec3::new(3.0, 0.0, 0.0));
    }
}
