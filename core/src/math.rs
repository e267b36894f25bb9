//! Math helpers for fullscreen and stereo rendering.
//!
//! Built on [`glam`]. The conventions here follow the D3D/Metal/wgpu model:
//! `[0, 1]` clip-space depth and a top-left framebuffer origin. Targets that
//! are sampled later as textures have their Y axis flipped relative to
//! targets presented directly; every helper that depends on orientation takes
//! an explicit `flipped_y` flag rather than guessing from context.

pub use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

// ============================================================================
// Fullscreen triangle
// ============================================================================

/// Clip-space corners of the single oversized triangle used by fullscreen
/// passes (tonemap, bloom, mirror blit). The triangle covers the viewport
/// with vertices at clip X/Y of (-1, 1), (3, 1) and (-1, -3); the parts
/// outside `[-1, 1]` are clipped away.
pub const FULLSCREEN_TRIANGLE_CORNERS: [Vec4; 3] = [
    Vec4::new(-1.0, 1.0, 1.0, 1.0),
    Vec4::new(3.0, 1.0, 1.0, 1.0),
    Vec4::new(-1.0, -3.0, 1.0, 1.0),
];

/// World-space view ray through one corner of the fullscreen triangle.
///
/// Used to reconstruct world-space positions from depth in fullscreen
/// shaders: the three corner rays are interpolated across the triangle, so a
/// fragment's ray times its linear eye depth gives its world offset from the
/// camera.
///
/// The returned vector is a direction (camera translation removed), not
/// normalized.
///
/// # Panics
///
/// Panics if `index` is not `0..3`.
pub fn frustum_corner(
    index: usize,
    world_to_view: Mat4,
    view_to_clip: Mat4,
    flipped_y: bool,
) -> Vec3 {
    assert!(
        index < 3,
        "fullscreen triangle has exactly 3 corners, got index {index}"
    );
    let mut clip = FULLSCREEN_TRIANGLE_CORNERS[index];
    if flipped_y {
        clip.y = -clip.y;
    }
    let h = view_to_clip.inverse() * clip;
    let view_dir = h.truncate() / h.w;
    // transform_vector3 applies rotation/scale only, dropping the camera
    // translation so the result is a pure direction.
    world_to_view.inverse().transform_vector3(view_dir)
}

// ============================================================================
// Projection
// ============================================================================

/// Adjust a projection matrix for the orientation of the target it renders
/// into. Flipped-Y targets (offscreen textures sampled later) get their clip
/// Y axis negated; presented targets pass through unchanged.
pub fn gpu_projection(view_to_clip: Mat4, flipped_y: bool) -> Mat4 {
    if flipped_y {
        Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * view_to_clip
    } else {
        view_to_clip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_covers_viewport() {
        // Edges at x=3 and y=-3 leave the whole [-1, 1] square inside.
        let min_x = FULLSCREEN_TRIANGLE_CORNERS.iter().map(|c| c.x).fold(f32::MAX, f32::min);
        let max_x = FULLSCREEN_TRIANGLE_CORNERS.iter().map(|c| c.x).fold(f32::MIN, f32::max);
        let min_y = FULLSCREEN_TRIANGLE_CORNERS.iter().map(|c| c.y).fold(f32::MAX, f32::min);
        let max_y = FULLSCREEN_TRIANGLE_CORNERS.iter().map(|c| c.y).fold(f32::MIN, f32::max);
        assert!(min_x <= -1.0 && max_x >= 1.0);
        assert!(min_y <= -1.0 && max_y >= 1.0);
        for c in FULLSCREEN_TRIANGLE_CORNERS {
            assert_eq!(c.w, 1.0);
        }
    }

    #[test]
    fn test_frustum_corner_identity() {
        let dir = frustum_corner(0, Mat4::IDENTITY, Mat4::IDENTITY, false);
        assert_eq!(dir, Vec3::new(-1.0, 1.0, 1.0));
    }

    #[test]
    fn test_frustum_corner_flip_negates_y() {
        let plain = frustum_corner(0, Mat4::IDENTITY, Mat4::IDENTITY, false);
        let flipped = frustum_corner(0, Mat4::IDENTITY, Mat4::IDENTITY, true);
        assert_eq!(flipped, Vec3::new(plain.x, -plain.y, plain.z));
    }

    #[test]
    fn test_frustum_corner_perspective_points_forward() {
        let proj = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
        for index in 0..3 {
            let dir = frustum_corner(index, Mat4::IDENTITY, proj, false);
            // Right-handed camera looks down -Z.
            assert!(dir.z < 0.0, "corner {index} ray should point forward, got {dir:?}");
        }
    }

    #[test]
    fn test_frustum_corner_ignores_camera_translation() {
        let view = Mat4::from_translation(Vec3::new(10.0, -5.0, 3.0));
        let with_translation = frustum_corner(1, view, Mat4::IDENTITY, false);
        let without = frustum_corner(1, Mat4::IDENTITY, Mat4::IDENTITY, false);
        assert!((with_translation - without).length() < 1e-5);
    }

    #[test]
    #[should_panic]
    fn test_frustum_corner_rejects_out_of_range_index() {
        let _ = frustum_corner(3, Mat4::IDENTITY, Mat4::IDENTITY, false);
    }

    #[test]
    fn test_gpu_projection_flips_y() {
        let proj = Mat4::perspective_rh(1.2, 1.0, 0.1, 50.0);
        let p = Vec4::new(0.3, 0.7, -2.0, 1.0);

        let plain = gpu_projection(proj, false) * p;
        let flipped = gpu_projection(proj, true) * p;

        assert_eq!(plain.x, flipped.x);
        assert_eq!(plain.y, -flipped.y);
        assert_eq!(plain.z, flipped.z);
        assert_eq!(plain.w, flipped.w);
    }

    #[test]
    fn test_gpu_projection_unflipped_is_identity_transform() {
        let proj = Mat4::perspective_rh(1.2, 1.0, 0.1, 50.0);
        assert_eq!(gpu_projection(proj, false), proj);
    }
}
