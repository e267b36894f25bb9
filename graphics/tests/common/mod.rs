//! Shared fakes for pipeline integration tests.
//!
//! The pipeline is driven end to end against [`TestHost`], which records
//! every submitted command buffer, and optionally [`TestDisplay`], a
//! minimal XR runtime with one render pass.

use glam::{Mat4, UVec2, Vec3};

use kaiju_graphics::error::GraphicsError;
use kaiju_graphics::host::{
    Command, CommandBuffer, CullingParameters, CullingResults, HostContext, LightKind,
    MaterialId, RenderTargetDesc, RenderTargetId, VisibleLight, VisibleObject,
};
use kaiju_graphics::view::{CameraData, CameraKind};
use kaiju_graphics::xr::{XrDisplay, XrRenderParameter, XrRenderPassDesc};

/// Target id the fake display's swapchain reports.
pub const DISPLAY_TARGET: RenderTargetId = RenderTargetId::new(100);

/// One-pass XR display with a 1024x1024 array swapchain.
pub struct TestDisplay {
    depth_range: (f32, f32),
}

impl TestDisplay {
    pub fn new() -> Self {
        Self {
            depth_range: (f32::MAX, f32::MIN),
        }
    }
}

impl XrDisplay for TestDisplay {
    fn render_pass_count(&self) -> usize {
        1
    }

    fn render_pass(&self, _index: usize) -> XrRenderPassDesc {
        XrRenderPassDesc {
            render_target: RenderTargetDesc::new(DISPLAY_TARGET).with_flipped_y(true),
            culling_pass_index: 0,
            scaled_size: UVec2::new(1024, 1024),
            vr_usage: true,
        }
    }

    fn render_parameter(&self, _camera_id: u64, eye: usize) -> XrRenderParameter {
        XrRenderParameter {
            world_to_view: Mat4::from_translation(Vec3::new(eye as f32 * 0.064, 0.0, 0.0)),
            view_to_clip: Mat4::perspective_rh(1.7, 1.0, 0.1, 100.0),
        }
    }

    fn culling_parameters(&self, _camera_id: u64, _pass: u32) -> CullingParameters {
        CullingParameters::default()
    }

    fn depth_range(&self) -> (f32, f32) {
        self.depth_range
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.depth_range = (near, far);
    }
}

/// Host fake: fixed culling results, sequential material ids, recorded
/// submissions.
pub struct TestHost {
    pub submits: Vec<CommandBuffer>,
    pub display: Option<TestDisplay>,
    pub opaque_objects: usize,
    pub transparent_objects: usize,
    pub now: f64,
    next_material: u32,
}

impl TestHost {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            submits: Vec::new(),
            display: None,
            opaque_objects: 3,
            transparent_objects: 1,
            now: 1.0,
            next_material: 0,
        }
    }

    pub fn with_display() -> Self {
        let mut host = Self::new();
        host.display = Some(TestDisplay::new());
        host
    }

    /// The single command buffer of the last rendered frame.
    pub fn last_submit(&self) -> &CommandBuffer {
        self.submits.last().expect("no frame was submitted")
    }
}

impl HostContext for TestHost {
    fn time_seconds(&self) -> f64 {
        self.now
    }

    fn cull(&mut self, _params: &CullingParameters) -> CullingResults {
        let mut objects = Vec::new();
        for i in 0..self.opaque_objects {
            objects.push(VisibleObject {
                id: i as u64,
                queue: 2000,
                layer: 1,
                distance: i as f32,
            });
        }
        for i in 0..self.transparent_objects {
            objects.push(VisibleObject {
                id: (1000 + i) as u64,
                queue: 3000,
                layer: 1,
                distance: i as f32,
            });
        }
        CullingResults {
            objects,
            lights: vec![VisibleLight {
                kind: LightKind::Directional,
                direction: Vec3::new(0.0, -1.0, 0.0),
                color: Vec3::new(1.0, 0.95, 0.9),
                intensity: 3.0,
            }],
        }
    }

    fn shader_material(&mut self, _shader: &str) -> Result<MaterialId, GraphicsError> {
        self.next_material += 1;
        Ok(MaterialId::new(self.next_material))
    }

    fn display(&mut self) -> Option<&mut dyn XrDisplay> {
        self.display
            .as_mut()
            .map(|display| display as &mut dyn XrDisplay)
    }

    fn submit(&mut self, commands: CommandBuffer) {
        self.submits.push(commands);
    }
}

/// A game camera rendering to the window backbuffer.
pub fn game_camera(id: u64) -> CameraData {
    CameraData::new(
        id,
        CameraKind::Game,
        RenderTargetDesc::new(RenderTargetId::BACKBUFFER),
    )
}

/// Strip render-pass structure, keeping only the commands that describe
/// what gets drawn and with which state.
#[allow(dead_code)]
pub fn drawn_commands(commands: &CommandBuffer) -> Vec<Command> {
    commands
        .commands()
        .iter()
        .filter(|c| {
            !matches!(
                c,
                Command::BeginRenderPass { .. }
                    | Command::NextSubpass
                    | Command::EndRenderPass
                    | Command::Barrier
                    | Command::PushDebugGroup(_)
                    | Command::PopDebugGroup
            )
        })
        .cloned()
        .collect()
}
