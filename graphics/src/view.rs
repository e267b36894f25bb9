//! Per-view render data.
//!
//! A *view* is one rendered image: a monocular camera produces one view, a
//! stereo camera produces a single view covering both eyes (rendered with
//! instancing or multiview, never two sequential passes). Views are
//! collected once per frame, are read-only for render features, and the
//! view list itself is pooled so its allocation survives frames.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec4};
use static_assertions::const_assert_eq;

use kaiju_core::math::{frustum_corner, gpu_projection};

use crate::graph::resource::ResourceHandle;
use crate::host::{CullingParameters, CullingResults, RenderTargetDesc};

// ============================================================================
// Stereo
// ============================================================================

/// How both eyes of a stereo view are produced in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoMode {
    /// Monocular rendering.
    None,
    /// Each draw is duplicated with an instance multiplier of 2; the vertex
    /// shader routes instances to eye layers.
    Instancing,
    /// The GPU broadcasts each draw to both layers of an array target.
    Multiview,
}

impl StereoMode {
    /// Factor applied to instance counts; 2 only for instanced stereo.
    #[inline]
    pub fn instance_multiplier(&self) -> u32 {
        match self {
            Self::Instancing => 2,
            Self::None | Self::Multiview => 1,
        }
    }

    /// Shader keyword enabling the stereo path, if any.
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Instancing => Some("STEREO_INSTANCING_ON"),
            Self::Multiview => Some("STEREO_MULTIVIEW_ON"),
        }
    }
}

/// Where a camera comes from; non-game cameras always render monocularly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    Game,
    SceneView,
    Preview,
}

/// What a camera wants done with its target before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraClearFlags {
    Nothing,
    SolidColor([f32; 4]),
    Skybox,
}

// ============================================================================
// Camera input
// ============================================================================

/// View and projection of one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeTransforms {
    pub world_to_view: Mat4,
    pub view_to_clip: Mat4,
}

impl EyeTransforms {
    pub const IDENTITY: EyeTransforms = EyeTransforms {
        world_to_view: Mat4::IDENTITY,
        view_to_clip: Mat4::IDENTITY,
    };
}

/// Host-supplied camera description, snapshotted for one frame.
#[derive(Debug, Clone)]
pub struct CameraData {
    pub id: u64,
    pub kind: CameraKind,
    pub near: f32,
    pub far: f32,
    pub tan_half_fov: f32,
    pub transforms: EyeTransforms,
    pub pixel_size: UVec2,
    pub target: RenderTargetDesc,
    /// Whether the camera opts into stereo when a display is present.
    pub stereo_enabled: bool,
    pub layer_mask: u32,
    pub clear_flags: CameraClearFlags,
    /// `None` when the host cannot derive a frustum (degenerate camera);
    /// such cameras are skipped, not an error.
    pub culling: Option<CullingParameters>,
}

impl CameraData {
    pub fn new(id: u64, kind: CameraKind, target: RenderTargetDesc) -> Self {
        Self {
            id,
            kind,
            near: 0.1,
            far: 1000.0,
            tan_half_fov: 1.0,
            transforms: EyeTransforms::IDENTITY,
            pixel_size: UVec2::new(1920, 1080),
            target,
            stereo_enabled: true,
            layer_mask: u32::MAX,
            clear_flags: CameraClearFlags::Skybox,
            culling: Some(CullingParameters::default()),
        }
    }
}

// ============================================================================
// View
// ============================================================================

/// Everything a view feature needs to know about the view it renders.
#[derive(Debug, Clone)]
pub struct ViewRenderData {
    pub camera_id: u64,
    pub camera_kind: CameraKind,
    pub view_size: UVec2,
    pub near: f32,
    pub far: f32,
    pub tan_half_fov: f32,
    /// Per-eye transforms; both entries equal for monocular views.
    pub eyes: [EyeTransforms; 2],
    pub culling: CullingParameters,
    pub target: RenderTargetDesc,
    /// Whether targets for this view need an eye layer dimension.
    pub vr_usage: bool,
    pub stereo_mode: StereoMode,
    pub clear_flags: CameraClearFlags,
}

impl ViewRenderData {
    #[inline]
    pub fn instance_multiplier(&self) -> u32 {
        self.stereo_mode.instance_multiplier()
    }

    /// Array layers of this view's render targets: one per eye.
    #[inline]
    pub fn layer_count(&self) -> u32 {
        if self.vr_usage {
            2
        } else {
            1
        }
    }
}

// ============================================================================
// Registry payloads
// ============================================================================

/// Frame time, published by the frame clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeData {
    /// Seconds since host start.
    pub time: f64,
    /// Seconds since the previous frame.
    pub delta: f64,
}

/// Size of the view being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewInfo {
    pub view_size: UVec2,
}

/// Culling output of the current view.
#[derive(Debug, Clone, PartialEq)]
pub struct CullingResultsData(pub CullingResults);

/// Handle of the view's depth attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraDepth(pub ResourceHandle);

/// Handle of the view's HDR color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraTarget(pub ResourceHandle);

/// Handle of the view's bloom texture, present when bloom ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraBloom(pub ResourceHandle);

/// Handle of the persistent precomputed DFG lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecomputedDfg(pub ResourceHandle);

/// The view's built uniform block, published for passes that bind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewData {
    pub uniforms: ViewUniforms,
}

/// GPU-visible per-view constants. Layout is `#[repr(C)]` and mirrored by
/// shader code; the size assertion below guards accidental field edits.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    /// World-to-clip matrix per eye, column-major.
    pub world_to_clip: [[f32; 16]; 2],
    /// World-space eye position per eye.
    pub eye_position: [[f32; 4]; 2],
    /// Direction the sun shines in; w is intensity.
    pub sun_direction: [f32; 4],
    /// Sun color; w unused.
    pub sun_color: [f32; 4],
    /// Fullscreen-triangle corner rays, 3 per eye.
    pub frustum_corners: [[f32; 4]; 6],
    /// x,y = view size in pixels, z = tan(fov/2), w = frame time.
    pub resolution: [f32; 4],
    /// x = frame index, y = near, z = far, w unused.
    pub frame_params: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<ViewUniforms>(), 320);

impl ViewUniforms {
    /// Build the uniform block for a view. Matrix and corner orientation
    /// follow the output target's `flipped_y`.
    pub fn build(view: &ViewRenderData, sun: Option<(Vec4, Vec4)>, time: f32, frame_index: f32) -> Self {
        let flipped = view.target.flipped_y;
        let mut uniforms = ViewUniforms::zeroed();
        for eye in 0..2 {
            let transforms = &view.eyes[eye];
            let world_to_clip =
                gpu_projection(transforms.view_to_clip, flipped) * transforms.world_to_view;
            uniforms.world_to_clip[eye] = world_to_clip.to_cols_array();
            uniforms.eye_position[eye] = transforms
                .world_to_view
                .inverse()
                .w_axis
                .to_array();
            for corner in 0..3 {
                let ray = frustum_corner(
                    corner,
                    transforms.world_to_view,
                    transforms.view_to_clip,
                    flipped,
                );
                uniforms.frustum_corners[eye * 3 + corner] = ray.extend(0.0).to_array();
            }
        }
        if let Some((direction, color)) = sun {
            uniforms.sun_direction = direction.to_array();
            uniforms.sun_color = color.to_array();
        }
        uniforms.resolution = [
            view.view_size.x as f32,
            view.view_size.y as f32,
            view.tan_half_fov,
            time,
        ];
        uniforms.frame_params = [frame_index, view.near, view.far, 0.0];
        uniforms
    }
}
