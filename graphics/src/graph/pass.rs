//! Render pass declarations.
//!
//! A [`RenderPass`] is a declaration of intent: which attachments it writes,
//! which resources it samples, which registry entries it depends on, and a
//! deferred callback that records the actual commands. Nothing executes at
//! declaration time; the graph compiles the full frame's pass list first so
//! load/store actions, aliasing, and subpass fusion can be resolved from
//! global knowledge.

use bitflags::bitflags;

use crate::graph::resource::ResourceHandle;
use crate::graph::RenderGraph;
use crate::host::{CommandBuffer, RenderTargetId};

// ============================================================================
// Load / store actions
// ============================================================================

/// What happens to an attachment's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadAction {
    /// Preserve previous contents.
    #[default]
    Load,
    /// Clear to the resource's clear policy.
    Clear,
    /// Contents are undefined; cheapest option when fully overwritten.
    DontCare,
}

/// What happens to an attachment's contents when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreAction {
    /// Write results back to memory.
    #[default]
    Store,
    /// Results may be dropped; used when nothing reads them later.
    Discard,
}

bitflags! {
    /// Modifiers on a depth attachment write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WriteFlags: u32 {
        /// Depth is tested but not written.
        const READ_ONLY_DEPTH = 1 << 0;
        /// Stencil is tested but not written.
        const READ_ONLY_STENCIL = 1 << 1;
    }
}

impl WriteFlags {
    /// A fully read-only depth/stencil binding counts as a read, not a
    /// write, for load/store resolution.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.contains(Self::READ_ONLY_DEPTH)
    }
}

/// One attachment written by a pass, with its declared actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentWrite {
    pub handle: ResourceHandle,
    pub load: LoadAction,
    pub store: StoreAction,
    pub flags: WriteFlags,
}

// ============================================================================
// Pass
// ============================================================================

/// Deferred command-recording callback of a pass.
pub type RenderFn = Box<dyn FnOnce(&mut CommandBuffer)>;

/// A single declared render pass.
pub struct RenderPass {
    pub(crate) name: String,
    pub(crate) color_writes: Vec<AttachmentWrite>,
    pub(crate) depth_write: Option<AttachmentWrite>,
    pub(crate) reads: Vec<(&'static str, ResourceHandle)>,
    pub(crate) data_reads: Vec<&'static str>,
    pub(crate) external_writes: Vec<RenderTargetId>,
    pub(crate) render_fn: Option<RenderFn>,
}

impl RenderPass {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_writes: Vec::new(),
            depth_write: None,
            reads: Vec::new(),
            data_reads: Vec::new(),
            external_writes: Vec::new(),
            render_fn: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the pass declares nothing at all. Caught at compile time as
    /// [`GraphError::EmptyPass`](crate::error::GraphError::EmptyPass).
    pub(crate) fn is_empty_declaration(&self) -> bool {
        self.color_writes.is_empty()
            && self.depth_write.is_none()
            && self.reads.is_empty()
            && self.data_reads.is_empty()
            && self.external_writes.is_empty()
    }

    /// All attachment writes (colors, then depth), in declaration order.
    pub(crate) fn attachment_writes(&self) -> impl Iterator<Item = &AttachmentWrite> {
        self.color_writes.iter().chain(self.depth_write.iter())
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("name", &self.name)
            .field("color_writes", &self.color_writes)
            .field("depth_write", &self.depth_write)
            .field("reads", &self.reads)
            .field("data_reads", &self.data_reads)
            .field("external_writes", &self.external_writes)
            .field("has_render_fn", &self.render_fn.is_some())
            .finish()
    }
}

// ============================================================================
// Builder guard
// ============================================================================

/// Scoped pass registration guard returned by
/// [`RenderGraph::add_pass`](crate::graph::RenderGraph::add_pass).
///
/// The pass is appended to the graph when the builder goes out of scope, so
/// a feature that bails out early after opening a pass still registers what
/// it declared up to that point.
pub struct PassBuilder<'g> {
    graph: &'g mut RenderGraph,
    pass: Option<RenderPass>,
}

impl<'g> PassBuilder<'g> {
    pub(crate) fn new(graph: &'g mut RenderGraph, name: impl Into<String>) -> Self {
        Self {
            graph,
            pass: Some(RenderPass::new(name)),
        }
    }

    fn pass_mut(&mut self) -> &mut RenderPass {
        // Only taken in Drop, so always present during the builder's life.
        self.pass.as_mut().unwrap_or_else(|| unreachable!())
    }

    /// Declare a color attachment write.
    pub fn write_color(
        &mut self,
        handle: ResourceHandle,
        load: LoadAction,
        store: StoreAction,
    ) -> &mut Self {
        self.pass_mut().color_writes.push(AttachmentWrite {
            handle,
            load,
            store,
            flags: WriteFlags::empty(),
        });
        self
    }

    /// Declare the depth/stencil attachment. Read-only flags make the
    /// binding count as a read for load/store resolution.
    pub fn write_depth(
        &mut self,
        handle: ResourceHandle,
        load: LoadAction,
        store: StoreAction,
        flags: WriteFlags,
    ) -> &mut Self {
        self.pass_mut().depth_write = Some(AttachmentWrite {
            handle,
            load,
            store,
            flags,
        });
        self
    }

    /// Declare a sampled read under the given shader binding name.
    pub fn read(&mut self, binding: &'static str, handle: ResourceHandle) -> &mut Self {
        self.pass_mut().reads.push((binding, handle));
        self
    }

    /// Declare a dependency on a registry entry of type `T`, recorded by
    /// type name for diagnostics.
    pub fn read_data<T: 'static>(&mut self) -> &mut Self {
        self.pass_mut().data_reads.push(std::any::type_name::<T>());
        self
    }

    /// Declare a write to an external (non-graph) render target, e.g. the
    /// XR swapchain or the window backbuffer.
    pub fn write_external(&mut self, target: RenderTargetId) -> &mut Self {
        self.pass_mut().external_writes.push(target);
        self
    }

    /// Attach the deferred command-recording callback.
    pub fn set_render_fn(&mut self, f: impl FnOnce(&mut CommandBuffer) + 'static) -> &mut Self {
        self.pass_mut().render_fn = Some(Box::new(f));
        self
    }
}

impl Drop for PassBuilder<'_> {
    fn drop(&mut self) {
        if let Some(pass) = self.pass.take() {
            log::trace!("registered pass '{}'", pass.name);
            self.graph.push_pass(pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resource::{TextureDesc, TextureFormat};

    #[test]
    fn test_builder_registers_on_drop() {
        let mut graph = RenderGraph::new();
        let handle = graph.texture(TextureDesc::new(TextureFormat::Rgba8Unorm));

        {
            let mut pass = graph.add_pass("Test Pass");
            pass.write_color(handle, LoadAction::Clear, StoreAction::Store);
        }

        assert_eq!(graph.pass_count(), 1);
    }

    #[test]
    fn test_builder_registers_on_early_return() {
        fn build(graph: &mut RenderGraph, handle: ResourceHandle, bail: bool) {
            let mut pass = graph.add_pass("Maybe Partial");
            pass.read("Input", handle);
            if bail {
                return;
            }
            pass.write_color(handle, LoadAction::Load, StoreAction::Store);
        }

        let mut graph = RenderGraph::new();
        let handle = graph.texture(TextureDesc::new(TextureFormat::Rgba8Unorm));
        build(&mut graph, handle, true);
        assert_eq!(graph.pass_count(), 1);
    }

    #[test]
    fn test_empty_declaration_detection() {
        let pass = RenderPass::new("Empty");
        assert!(pass.is_empty_declaration());

        let mut pass = RenderPass::new("Data Only");
        pass.data_reads.push("SomeType");
        assert!(!pass.is_empty_declaration());
    }

    #[test]
    fn test_read_only_flags() {
        assert!(WriteFlags::READ_ONLY_DEPTH.is_read_only());
        assert!((WriteFlags::READ_ONLY_DEPTH | WriteFlags::READ_ONLY_STENCIL).is_read_only());
        assert!(!WriteFlags::empty().is_read_only());
        assert!(!WriteFlags::READ_ONLY_STENCIL.is_read_only());
    }

    #[test]
    fn test_defaults_are_load_and_store() {
        assert_eq!(LoadAction::default(), LoadAction::Load);
        assert_eq!(StoreAction::default(), StoreAction::Store);
    }
}
