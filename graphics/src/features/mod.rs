//! Render features: the composable units the pipeline is built from.
//!
//! A feature declares passes, allocates textures and exchanges data through
//! the graph's registry; it never records GPU commands directly (that
//! happens in the deferred pass callbacks). Features run in list order and
//! that order is the contract: feature N's registry writes are visible to
//! feature N+1, and pass declaration order is execution order.
//!
//! Frame features run once per frame before view collection; view features
//! run once per collected view.

pub mod bloom;
pub mod clock;
pub mod dfg;
pub mod lighting;
pub mod mirror;
pub mod opaque;
pub mod sky;
pub mod tonemap;
pub mod transparent;

pub use bloom::{Bloom, BloomSettings};
pub use clock::FrameClock;
pub use dfg::PrecomputeDfg;
pub use lighting::SetupLighting;
pub use mirror::MirrorBlit;
pub use opaque::DrawOpaque;
pub use sky::DrawSky;
pub use tonemap::{Tonemap, TonemapSettings};
pub use transparent::DrawTransparent;

use crate::error::GraphError;
use crate::graph::RenderGraph;
use crate::host::HostContext;
use crate::view::ViewRenderData;

/// A unit of per-frame work (time keeping, one-off precomputation).
pub trait FrameRenderFeature {
    fn name(&self) -> &str;

    /// Declare this feature's contribution to the frame. Errors abort the
    /// frame.
    fn render(
        &mut self,
        graph: &mut RenderGraph,
        host: &mut dyn HostContext,
    ) -> Result<(), GraphError>;

    /// Release owned graph resources; called when the pipeline shuts down.
    fn teardown(&mut self, _graph: &mut RenderGraph) {}
}

/// A unit of per-view work (culling, drawing, post-processing).
pub trait ViewRenderFeature {
    fn name(&self) -> &str;

    /// Declare this feature's contribution to one view. Errors abort the
    /// frame.
    fn render(
        &mut self,
        graph: &mut RenderGraph,
        host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError>;

    /// Release owned graph resources; called when the pipeline shuts down.
    fn teardown(&mut self, _graph: &mut RenderGraph) {}
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Frame feature defined by a closure, for one-off pipeline extensions that
/// do not warrant a named type.
pub struct GenericFrameFeature<F> {
    name: String,
    render_fn: F,
}

impl<F> GenericFrameFeature<F>
where
    F: FnMut(&mut RenderGraph, &mut dyn HostContext) -> Result<(), GraphError>,
{
    pub fn new(name: impl Into<String>, render_fn: F) -> Self {
        Self {
            name: name.into(),
            render_fn,
        }
    }
}

impl<F> FrameRenderFeature for GenericFrameFeature<F>
where
    F: FnMut(&mut RenderGraph, &mut dyn HostContext) -> Result<(), GraphError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        host: &mut dyn HostContext,
    ) -> Result<(), GraphError> {
        (self.render_fn)(graph, host)
    }
}

/// View feature defined by a closure.
pub struct GenericViewFeature<F> {
    name: String,
    render_fn: F,
}

impl<F> GenericViewFeature<F>
where
    F: FnMut(&mut RenderGraph, &mut dyn HostContext, &ViewRenderData) -> Result<(), GraphError>,
{
    pub fn new(name: impl Into<String>, render_fn: F) -> Self {
        Self {
            name: name.into(),
            render_fn,
        }
    }
}

impl<F> ViewRenderFeature for GenericViewFeature<F>
where
    F: FnMut(&mut RenderGraph, &mut dyn HostContext, &ViewRenderData) -> Result<(), GraphError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        (self.render_fn)(graph, host, view)
    }
}
