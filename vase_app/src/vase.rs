//! Procedural vase meshes built by spinning a profile around the Y axis

use std::f32::consts::TAU;

use frame_engine::prelude::{ModelData, Vec3};
use frame_engine::render::vulkan::Vertex;

/// Radius and height of the vase outline, bottom to top; -Y is up
pub const VASE_PROFILE: [(f32, f32); 9] = [
    (0.10, 0.00),
    (0.16, -0.05),
    (0.20, -0.15),
    (0.18, -0.28),
    (0.11, -0.38),
    (0.08, -0.46),
    (0.09, -0.52),
    (0.13, -0.58),
    (0.14, -0.60),
];

fn ring_point(radius: f32, height: f32, segment: usize, segments: usize) -> Vec3 {
    let angle = TAU * (segment % segments) as f32 / segments as f32;
    Vec3::new(radius * angle.cos(), height, radius * angle.sin())
}

fn vertex(position: Vec3, normal: Vec3, color: [f32; 3], u: f32, v: f32) -> Vertex {
    Vertex {
        position: position.into(),
        color,
        normal: normal.into(),
        uv: [u, v],
    }
}

/// Outward normal of the profile at point `j`, in (radial, height) space
fn profile_normal(profile: &[(f32, f32)], j: usize) -> (f32, f32) {
    let prev = profile[j.saturating_sub(1)];
    let next = profile[(j + 1).min(profile.len() - 1)];
    let (dr, dy) = (next.0 - prev.0, next.1 - prev.1);
    let (nr, ny) = if dy <= 0.0 { (-dy, dr) } else { (dy, -dr) };
    let len = (nr * nr + ny * ny).sqrt();
    if len > f32::EPSILON {
        (nr / len, ny / len)
    } else {
        (1.0, 0.0)
    }
}

/// Surface of revolution of `profile` with `segments` slices
///
/// Flat shading gives every quad its own normal; smooth shading shares
/// normals between neighbouring quads. The result is indexed either way.
///
/// # Panics
/// If the profile has fewer than two points or `segments < 3`.
pub fn lathe(profile: &[(f32, f32)], segments: usize, color: [f32; 3], smooth: bool) -> ModelData {
    assert!(profile.len() >= 2, "profile needs at least two points");
    assert!(segments >= 3, "need at least three segments");

    let smooth_normal = |j: usize, k: usize| {
        let (nr, ny) = profile_normal(profile, j);
        let radial = ring_point(1.0, 0.0, k, segments);
        Vec3::new(radial.x * nr, ny, radial.z * nr)
    };

    let mut triangles = Vec::with_capacity((profile.len() - 1) * segments * 6);
    for j in 0..profile.len() - 1 {
        let (r0, y0) = profile[j];
        let (r1, y1) = profile[j + 1];
        for k in 0..segments {
            let corners = [
                (j, k, ring_point(r0, y0, k, segments)),
                (j, k + 1, ring_point(r0, y0, k + 1, segments)),
                (j + 1, k + 1, ring_point(r1, y1, k + 1, segments)),
                (j + 1, k, ring_point(r1, y1, k, segments)),
            ];

            let flat_normal = {
                let normal = (corners[2].2 - corners[0].2)
                    .cross(&(corners[3].2 - corners[1].2))
                    .normalize();
                let outward = (corners[0].2 + corners[2].2).component_mul(&Vec3::new(1.0, 0.0, 1.0));
                if normal.dot(&outward) < 0.0 {
                    -normal
                } else {
                    normal
                }
            };

            let quad: Vec<Vertex> = corners
                .iter()
                .map(|&(pj, pk, position)| {
                    let normal = if smooth { smooth_normal(pj, pk) } else { flat_normal };
                    let u = pk as f32 / segments as f32;
                    let v = pj as f32 / (profile.len() - 1) as f32;
                    vertex(position, normal, color, u, v)
                })
                .collect();

            triangles.extend_from_slice(&[quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]);
        }
    }

    ModelData::from_triangles(&triangles)
}
