//! XR display interface and stereo view collection.
//!
//! The XR runtime is a host-side collaborator behind the [`XrDisplay`]
//! trait. Once per frame [`collect_views`] turns the host's camera list into
//! [`ViewRenderData`] entries: game cameras go stereo when a display is
//! active, scene-view and preview cameras always render monocularly with
//! their own culling parameters.

use glam::{Mat4, UVec2};

use crate::graph::RenderGraph;
use crate::host::{CullingParameters, RenderTargetDesc};
use crate::view::{CameraData, CameraKind, EyeTransforms, StereoMode, ViewRenderData};

// ============================================================================
// Display interface
// ============================================================================

/// One render pass the display wants rendered (typically a single pass
/// covering both eyes of an array swapchain).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrRenderPassDesc {
    /// Swapchain target the pass renders into.
    pub render_target: RenderTargetDesc,
    /// Which of the display's culling passes applies.
    pub culling_pass_index: u32,
    /// Eye texture extent after the runtime's resolution scale.
    pub scaled_size: UVec2,
    /// Targets for this pass need an eye layer dimension.
    pub vr_usage: bool,
}

/// Eye transforms handed out by the display runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrRenderParameter {
    pub world_to_view: Mat4,
    pub view_to_clip: Mat4,
}

/// Host XR display runtime.
pub trait XrDisplay {
    /// Number of passes the display wants this frame; 0 while the headset
    /// is idle.
    fn render_pass_count(&self) -> usize;

    fn render_pass(&self, index: usize) -> XrRenderPassDesc;

    /// Per-eye transforms for a camera; `eye` is 0 (left) or 1 (right).
    fn render_parameter(&self, camera_id: u64, eye: usize) -> XrRenderParameter;

    /// Culling parameters covering both eyes of a camera.
    fn culling_parameters(&self, camera_id: u64, culling_pass_index: u32) -> CullingParameters;

    /// Depth range shared by everything the display composites.
    fn depth_range(&self) -> (f32, f32);

    /// Widen the shared depth range (compositor reprojection needs the
    /// union across all stereo cameras).
    fn set_depth_range(&mut self, near: f32, far: f32);
}

/// GPU capabilities that affect stereo mode selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCaps {
    /// Single-pass multiview rendering into array layers.
    pub supports_multiview: bool,
}

/// Registry entry describing the active display's pass; absent when no
/// display is rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrDisplayData {
    pub pass: XrRenderPassDesc,
}

// ============================================================================
// View collection
// ============================================================================

/// Collect the frame's views from the host camera list.
///
/// Appends to `out` in camera order. Cameras without culling parameters are
/// skipped silently; a camera list that produces zero views is a valid
/// (empty) frame.
pub fn collect_views(
    graph: &mut RenderGraph,
    cameras: &[CameraData],
    display: Option<&mut dyn XrDisplay>,
    caps: &DeviceCaps,
    out: &mut Vec<ViewRenderData>,
) {
    match display {
        Some(display) if display.render_pass_count() > 0 => {
            let pass = display.render_pass(0);
            graph.set_resource(XrDisplayData { pass });
            for camera in cameras {
                if camera.kind == CameraKind::Game && camera.stereo_enabled {
                    out.push(stereo_view(camera, display, &pass, caps));
                } else if let Some(view) = mono_view(camera) {
                    out.push(view);
                }
            }
        }
        _ => {
            // No display rendering this frame; stale display data must not
            // linger from a previous frame.
            graph.clear_resource::<XrDisplayData>();
            out.extend(cameras.iter().filter_map(mono_view));
        }
    }
    log::trace!("collected {} views from {} cameras", out.len(), cameras.len());
}

fn stereo_view(
    camera: &CameraData,
    display: &mut dyn XrDisplay,
    pass: &XrRenderPassDesc,
    caps: &DeviceCaps,
) -> ViewRenderData {
    // The compositor reprojects with one depth range for everything it
    // composites, so it gets the union across stereo cameras.
    let (near, far) = display.depth_range();
    display.set_depth_range(near.min(camera.near), far.max(camera.far));

    let eyes = [0, 1].map(|eye| {
        let parameter = display.render_parameter(camera.id, eye);
        EyeTransforms {
            world_to_view: parameter.world_to_view,
            view_to_clip: parameter.view_to_clip,
        }
    });

    let stereo_mode = if caps.supports_multiview {
        StereoMode::Multiview
    } else {
        StereoMode::Instancing
    };

    ViewRenderData {
        camera_id: camera.id,
        camera_kind: camera.kind,
        view_size: pass.scaled_size,
        near: camera.near,
        far: camera.far,
        tan_half_fov: camera.tan_half_fov,
        eyes,
        culling: display.culling_parameters(camera.id, pass.culling_pass_index),
        target: pass.render_target,
        vr_usage: pass.vr_usage,
        stereo_mode,
        clear_flags: camera.clear_flags,
    }
}

fn mono_view(camera: &CameraData) -> Option<ViewRenderData> {
    let Some(culling) = camera.culling else {
        log::debug!("camera {} has no culling parameters, skipping", camera.id);
        return None;
    };
    Some(ViewRenderData {
        camera_id: camera.id,
        camera_kind: camera.kind,
        view_size: camera.pixel_size,
        near: camera.near,
        far: camera.far,
        tan_half_fov: camera.tan_half_fov,
        eyes: [camera.transforms; 2],
        culling,
        target: camera.target,
        vr_usage: false,
        stereo_mode: StereoMode::None,
        clear_flags: camera.clear_flags,
    })
}
