//! Frame render graph.
//!
//! The graph is rebuilt from scratch every frame:
//!
//! ```text
//!  frame features ──┐
//!                   ├─ declare passes + allocate textures + publish registry
//!  view features  ──┘                 │
//!                                     ▼
//!                               compile()          lifetimes, aliasing,
//!                                     │            load/store, fusion
//!                                     ▼
//!                               execute()          run deferred callbacks,
//!                                     │            record one CommandBuffer
//!                                     ▼
//!                               end_frame()        reset for the next frame
//! ```
//!
//! Layer responsibilities:
//!
//! | Layer | Responsibility |
//! |-------|----------------|
//! | [`resource`] | texture handles, transient/persistent allocation |
//! | [`pass`] | pass declarations and the scoped builder guard |
//! | [`registry`] | typed data exchange between features |
//! | [`compile`] | the execution plan |
//! | this module | orchestration, phases, per-frame reset |
//!
//! Any [`GraphError`] raised while building or compiling aborts the frame:
//! the caller resets the graph, nothing is submitted, and the next frame
//! starts clean.

pub mod compile;
pub mod pass;
pub mod registry;
pub mod resource;

use glam::UVec2;

use crate::error::GraphError;
use crate::graph::compile::{AttachmentBinding, CompiledGraph};
use crate::graph::pass::{PassBuilder, RenderPass};
use crate::graph::registry::{ResourceRegistry, ResourceScope};
use crate::graph::resource::{ResourceHandle, RtHandleAllocator, TextureDesc};
use crate::host::{Command, CommandBuffer};

/// Which stage of the frame is currently declaring work. Determines the
/// scope of registry writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Frame,
    View,
}

/// Per-frame render graph: pass list, texture allocator and typed registry.
pub struct RenderGraph {
    passes: Vec<RenderPass>,
    allocator: RtHandleAllocator,
    registry: ResourceRegistry,
    phase: Phase,
    frame_index: u64,
    use_native_pass: bool,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            allocator: RtHandleAllocator::new(),
            registry: ResourceRegistry::new(),
            phase: Phase::Frame,
            frame_index: 0,
            use_native_pass: true,
        }
    }

    /// Enable or disable subpass fusion at compile time.
    pub fn with_native_pass(mut self, enabled: bool) -> Self {
        self.use_native_pass = enabled;
        self
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    // ------------------------------------------------------------------
    // Pass declaration
    // ------------------------------------------------------------------

    /// Open a pass declaration. The pass joins the frame when the returned
    /// builder goes out of scope.
    pub fn add_pass(&mut self, name: impl Into<String>) -> PassBuilder<'_> {
        PassBuilder::new(self, name)
    }

    pub(crate) fn push_pass(&mut self, pass: RenderPass) {
        self.passes.push(pass);
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Allocate a transient texture for this frame.
    pub fn texture(&mut self, desc: TextureDesc) -> ResourceHandle {
        self.allocator.texture(desc)
    }

    /// Allocate a texture that survives across frames until released.
    pub fn persistent_texture(&mut self, desc: TextureDesc) -> ResourceHandle {
        self.allocator.persistent_texture(desc)
    }

    /// Schedule a persistent texture for destruction after `frame_delay`
    /// further frames.
    pub fn release_texture(
        &mut self,
        handle: ResourceHandle,
        frame_delay: u32,
    ) -> Result<(), GraphError> {
        self.allocator.release(handle, frame_delay)
    }

    pub fn set_screen_size(&mut self, size: UVec2) {
        self.allocator.set_screen_size(size);
    }

    #[inline]
    pub fn screen_size(&self) -> UVec2 {
        self.allocator.screen_size()
    }

    pub fn resolve_size(&self, handle: ResourceHandle) -> Result<UVec2, GraphError> {
        self.allocator.resolve_size(handle)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Publish a value scoped to the current phase: view features produce
    /// view-scoped entries, frame features frame-scoped ones. Per-view data
    /// therefore cannot leak into the next view.
    pub fn set_resource<T: 'static>(&mut self, value: T) {
        let scope = match self.phase {
            Phase::Frame => ResourceScope::Frame,
            Phase::View => ResourceScope::View,
        };
        self.registry.set(value, scope);
    }

    /// Publish a value that survives frames until explicitly cleared.
    pub fn set_persistent_resource<T: 'static>(&mut self, value: T) {
        self.registry.set(value, ResourceScope::Persistent);
    }

    pub fn get_resource<T: 'static>(&self) -> Result<&T, GraphError> {
        self.registry.get::<T>()
    }

    pub fn try_get_resource<T: 'static>(&self) -> Option<&T> {
        self.registry.try_get::<T>()
    }

    pub fn clear_resource<T: 'static>(&mut self) -> bool {
        self.registry.clear::<T>()
    }

    // ------------------------------------------------------------------
    // Frame lifecycle
    // ------------------------------------------------------------------

    /// Enter a view: subsequent registry writes are view-scoped and
    /// screen-relative allocations resolve against the view's size.
    pub fn begin_view(&mut self, view_size: UVec2) {
        self.phase = Phase::View;
        self.allocator.set_screen_size(view_size);
    }

    /// Leave the current view, dropping its registry entries.
    pub fn end_view(&mut self) {
        self.registry.end_view();
        self.phase = Phase::Frame;
    }

    /// Compile the declared passes into an execution plan.
    pub fn compile(&self) -> Result<CompiledGraph, GraphError> {
        compile::compile(&self.passes, &self.allocator, self.use_native_pass)
    }

    /// Run the deferred pass callbacks and record the frame's commands.
    ///
    /// When the plan fails native-pass validation the error is logged and
    /// the frame re-plans without fusion; the frame still renders.
    pub fn execute(&mut self, compiled: &CompiledGraph) -> Result<CommandBuffer, GraphError> {
        if self.use_native_pass {
            if let Err(reason) = compile::validate_native(compiled, &self.passes) {
                log::error!("native pass validation failed, rendering unfused: {reason}");
                let unfused = compile::compile(&self.passes, &self.allocator, false)?;
                return Ok(self.record(&unfused));
            }
        }
        Ok(self.record(compiled))
    }

    fn record(&mut self, compiled: &CompiledGraph) -> CommandBuffer {
        let mut cmd = CommandBuffer::new();
        for (group_index, group) in compiled.groups.iter().enumerate() {
            let attachments = self.merged_bindings(compiled, group.passes.as_slice());
            let has_attachments = !attachments.is_empty();

            if group_index > 0 {
                cmd.record(Command::Barrier);
            }
            if has_attachments {
                cmd.record(Command::BeginRenderPass {
                    width: group.width,
                    height: group.height,
                    layers: group.layers,
                    subpasses: group.passes.len() as u32,
                    attachments,
                });
            }
            for (subpass, &index) in group.passes.iter().enumerate() {
                if subpass > 0 {
                    cmd.record(Command::NextSubpass);
                }
                let name = self.passes[index].name.clone();
                log::trace!("executing pass '{name}'");
                cmd.record(Command::PushDebugGroup(name));
                if let Some(render_fn) = self.passes[index].render_fn.take() {
                    render_fn(&mut cmd);
                }
                cmd.record(Command::PopDebugGroup);
            }
            if has_attachments {
                cmd.record(Command::EndRenderPass);
            }
        }
        cmd
    }

    /// Attachment set of a group: load actions from the group's first pass,
    /// store actions from its last.
    fn merged_bindings(&self, compiled: &CompiledGraph, group: &[usize]) -> Vec<AttachmentBinding> {
        let first = group[0];
        let last = group[group.len() - 1];
        compiled.bindings[first]
            .iter()
            .map(|binding| {
                let mut merged = binding.clone();
                if let Some(end) = compiled.bindings[last]
                    .iter()
                    .find(|b| b.handle == binding.handle)
                {
                    merged.store = end.store;
                }
                merged
            })
            .collect()
    }

    /// End-of-frame reset: drop declared passes, frame/view registry
    /// entries and transient textures. Runs for aborted frames too.
    pub fn end_frame(&mut self) {
        self.passes.clear();
        self.registry.end_frame();
        self.allocator.end_frame();
        self.phase = Phase::Frame;
        self.frame_index += 1;
    }

    /// Reset after a failed frame. Identical cleanup to [`end_frame`];
    /// the distinction is that nothing was submitted.
    ///
    /// [`end_frame`]: RenderGraph::end_frame
    pub fn abort_frame(&mut self) {
        log::trace!("frame {} graph state discarded", self.frame_index);
        self.end_frame();
    }
}
