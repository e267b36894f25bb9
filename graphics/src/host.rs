//! Host engine interface.
//!
//! The pipeline never talks to a GPU or a scene directly; everything crosses
//! this seam. The host supplies culling, material lookup and the XR display,
//! and receives one recorded [`CommandBuffer`] per frame via `submit`.
//! Commands are plain data, which is also what the tests assert on.

use glam::{Mat4, Vec3, Vec4};

use crate::error::GraphicsError;
use crate::graph::compile::AttachmentBinding;
use crate::graph::resource::ResourceHandle;
use crate::xr::XrDisplay;

// ============================================================================
// Ids and targets
// ============================================================================

/// Host-side material (shader + state) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(u32);

impl MaterialId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Identifier of a render target owned by the host (window backbuffer, XR
/// swapchain texture, editor preview target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(u64);

impl RenderTargetId {
    /// The main window's backbuffer.
    pub const BACKBUFFER: RenderTargetId = RenderTargetId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// An external target together with its orientation. Targets sampled later
/// as textures report `flipped_y`; orientation-sensitive math keys off this
/// flag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub id: RenderTargetId,
    pub flipped_y: bool,
}

impl RenderTargetDesc {
    pub fn new(id: RenderTargetId) -> Self {
        Self {
            id,
            flipped_y: false,
        }
    }

    pub fn with_flipped_y(mut self, flipped_y: bool) -> Self {
        self.flipped_y = flipped_y;
        self
    }
}

// ============================================================================
// Culling
// ============================================================================

/// Inclusive material queue range selecting which visible objects a pass
/// draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderQueueRange {
    pub min: u16,
    pub max: u16,
}

impl RenderQueueRange {
    pub const OPAQUE: RenderQueueRange = RenderQueueRange { min: 0, max: 2500 };
    pub const TRANSPARENT: RenderQueueRange = RenderQueueRange { min: 2501, max: 5000 };

    #[inline]
    pub fn contains(&self, queue: u16) -> bool {
        self.min <= queue && queue <= self.max
    }
}

/// Draw ordering within a queue range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    FrontToBack,
    BackToFront,
}

/// Frustum and filtering inputs for a cull request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingParameters {
    /// World-space frustum planes as `(normal, distance)`.
    pub frustum_planes: [Vec4; 6],
    /// Bitmask of scene layers to include.
    pub layer_mask: u32,
    /// View origin, used for distance sorting.
    pub origin: Vec3,
}

impl Default for CullingParameters {
    fn default() -> Self {
        Self {
            frustum_planes: [Vec4::ZERO; 6],
            layer_mask: u32::MAX,
            origin: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// One light that survived culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleLight {
    pub kind: LightKind,
    /// Direction the light shines in (directional lights).
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// One renderer that survived culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleObject {
    pub id: u64,
    pub queue: u16,
    pub layer: u32,
    /// Distance from the view origin, for sorting.
    pub distance: f32,
}

/// Output of a cull request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CullingResults {
    pub objects: Vec<VisibleObject>,
    pub lights: Vec<VisibleLight>,
}

impl CullingResults {
    /// Number of visible objects inside a queue range.
    pub fn count_in_queue(&self, range: RenderQueueRange) -> u32 {
        self.objects.iter().filter(|o| range.contains(o.queue)).count() as u32
    }

    /// The first directional light, by convention the sun.
    pub fn sun(&self) -> Option<&VisibleLight> {
        self.lights.iter().find(|l| l.kind == LightKind::Directional)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A texture argument for a shader binding: either graph-managed or a host
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureArg {
    Graph(ResourceHandle),
    External(RenderTargetId),
}

/// One recorded GPU operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass {
        width: u32,
        height: u32,
        layers: u32,
        subpasses: u32,
        attachments: Vec<AttachmentBinding>,
    },
    NextSubpass,
    EndRenderPass,
    /// Memory/layout transition between execution units.
    Barrier,
    PushDebugGroup(String),
    PopDebugGroup,
    SetRenderTarget(RenderTargetId),
    SetFloat {
        name: &'static str,
        value: f32,
    },
    SetVector {
        name: &'static str,
        value: Vec4,
    },
    SetVectorArray {
        name: &'static str,
        values: Vec<Vec4>,
    },
    SetMatrixArray {
        name: &'static str,
        values: Vec<Mat4>,
    },
    SetTexture {
        name: &'static str,
        texture: TextureArg,
    },
    EnableKeyword(&'static str),
    DisableKeyword(&'static str),
    SetInstanceMultiplier(u32),
    DrawProcedural {
        material: MaterialId,
        material_pass: u32,
        vertex_count: u32,
    },
    DrawObjects {
        queue: RenderQueueRange,
        sort: SortOrder,
        count: u32,
    },
}

/// Ordered list of recorded commands for one frame.
///
/// Recording order is execution order; there is no reordering downstream.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    // Convenience recorders, one per command the features use.

    pub fn set_render_target(&mut self, target: RenderTargetId) {
        log::trace!("set render target {:?}", target);
        self.record(Command::SetRenderTarget(target));
    }

    pub fn set_float(&mut self, name: &'static str, value: f32) {
        self.record(Command::SetFloat { name, value });
    }

    pub fn set_vector(&mut self, name: &'static str, value: Vec4) {
        self.record(Command::SetVector { name, value });
    }

    pub fn set_vector_array(&mut self, name: &'static str, values: Vec<Vec4>) {
        self.record(Command::SetVectorArray { name, values });
    }

    pub fn set_matrix_array(&mut self, name: &'static str, values: Vec<Mat4>) {
        self.record(Command::SetMatrixArray { name, values });
    }

    pub fn set_texture(&mut self, name: &'static str, texture: TextureArg) {
        self.record(Command::SetTexture { name, texture });
    }

    pub fn enable_keyword(&mut self, keyword: &'static str) {
        log::trace!("enable keyword {keyword}");
        self.record(Command::EnableKeyword(keyword));
    }

    pub fn disable_keyword(&mut self, keyword: &'static str) {
        log::trace!("disable keyword {keyword}");
        self.record(Command::DisableKeyword(keyword));
    }

    pub fn set_instance_multiplier(&mut self, multiplier: u32) {
        self.record(Command::SetInstanceMultiplier(multiplier));
    }

    pub fn draw_procedural(&mut self, material: MaterialId, material_pass: u32, vertex_count: u32) {
        log::trace!(
            "draw procedural: material {:?} pass {} with {} vertices",
            material,
            material_pass,
            vertex_count
        );
        self.record(Command::DrawProcedural {
            material,
            material_pass,
            vertex_count,
        });
    }

    pub fn draw_objects(&mut self, queue: RenderQueueRange, sort: SortOrder, count: u32) {
        log::trace!("draw {} objects in queue {:?}", count, queue);
        self.record(Command::DrawObjects { queue, sort, count });
    }
}

// ============================================================================
// Host context
// ============================================================================

/// Services the host engine provides to the pipeline.
pub trait HostContext {
    /// Monotonic time in seconds, sampled once per frame by the frame clock.
    fn time_seconds(&self) -> f64;

    /// Cull the scene against the given parameters.
    fn cull(&mut self, params: &CullingParameters) -> CullingResults;

    /// Look up a material by shader name. Failure is a configuration error
    /// surfaced at pipeline construction.
    fn shader_material(&mut self, shader: &str) -> Result<MaterialId, GraphicsError>;

    /// The active XR display, if a headset is connected.
    fn display(&mut self) -> Option<&mut dyn XrDisplay>;

    /// Accept the frame's recorded commands. Called exactly once per frame,
    /// with an empty buffer when the frame was aborted.
    fn submit(&mut self, commands: CommandBuffer);
}
