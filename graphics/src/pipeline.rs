//! The stereo render pipeline.
//!
//! [`VrRenderPipeline`] owns the render graph and the feature lists, and
//! drives one frame end to end:
//!
//! ```text
//!  frame features → collect views → per view: view features → compile
//!       → execute → submit
//! ```
//!
//! Exactly one `submit` reaches the host per [`render`] call. A failed
//! frame submits an empty command buffer after the graph state is
//! discarded, so a single bad frame never poisons the next one.
//!
//! [`render`]: RenderPipeline::render

use crate::error::{GraphError, GraphicsError};
use crate::features::{
    Bloom, BloomSettings, DrawOpaque, DrawSky, DrawTransparent, FrameClock, FrameRenderFeature,
    MirrorBlit, PrecomputeDfg, SetupLighting, Tonemap, TonemapSettings, ViewRenderFeature,
};
use crate::graph::RenderGraph;
use crate::host::{CommandBuffer, HostContext};
use crate::view::{CameraData, ViewInfo, ViewRenderData};
use crate::xr::{collect_views, DeviceCaps};
use kaiju_core::pool::Pooled;

/// A pipeline the host can hand its camera list to, once per frame.
pub trait RenderPipeline {
    fn render(&mut self, host: &mut dyn HostContext, cameras: &[CameraData]);
}

/// Pipeline configuration, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub bloom: BloomSettings,
    pub tonemap: TonemapSettings,
    /// Fuse compatible adjacent passes into native subpasses.
    pub use_native_render_pass: bool,
    /// Sky shader name; `None` disables the sky pass.
    pub sky_shader: Option<String>,
    /// Editor hosts get the desktop mirror of the headset view.
    pub is_editor_host: bool,
}

impl PipelineSettings {
    pub fn with_bloom(mut self, bloom: BloomSettings) -> Self {
        self.bloom = bloom;
        self
    }

    pub fn with_tonemap(mut self, tonemap: TonemapSettings) -> Self {
        self.tonemap = tonemap;
        self
    }

    pub fn with_native_render_pass(mut self, enabled: bool) -> Self {
        self.use_native_render_pass = enabled;
        self
    }

    pub fn with_sky_shader(mut self, shader: impl Into<String>) -> Self {
        self.sky_shader = Some(shader.into());
        self
    }

    pub fn with_editor_host(mut self, is_editor_host: bool) -> Self {
        self.is_editor_host = is_editor_host;
        self
    }
}

/// The standard forward pipeline: lighting, opaque, sky, transparent, bloom,
/// tonemapping and the XR mirror, over the stereo view collection.
pub struct VrRenderPipeline {
    graph: RenderGraph,
    caps: DeviceCaps,
    frame_features: Vec<Box<dyn FrameRenderFeature>>,
    view_features: Vec<Box<dyn ViewRenderFeature>>,
    /// Collected views; pooled so the list's allocation survives frames.
    views: Pooled<Vec<ViewRenderData>>,
}

impl VrRenderPipeline {
    /// Build the pipeline and its features. Fails when the host is missing
    /// one of the pipeline's shaders.
    pub fn new(
        host: &mut dyn HostContext,
        settings: PipelineSettings,
        caps: DeviceCaps,
    ) -> Result<Self, GraphicsError> {
        let mut graph = RenderGraph::new().with_native_pass(settings.use_native_render_pass);
        let bloom = settings.bloom.sanitized();

        let frame_features: Vec<Box<dyn FrameRenderFeature>> = vec![
            Box::new(FrameClock::new()),
            Box::new(PrecomputeDfg::new(&mut graph, host)?),
        ];
        let view_features: Vec<Box<dyn ViewRenderFeature>> = vec![
            Box::new(SetupLighting::new()),
            Box::new(DrawOpaque::new()),
            Box::new(DrawSky::new(host, settings.sky_shader.as_deref())?),
            Box::new(DrawTransparent::new()),
            Box::new(Bloom::new(host, bloom)?),
            Box::new(Tonemap::new(host, settings.tonemap, bloom.strength)?),
            Box::new(MirrorBlit::new(host, settings.is_editor_host)?),
        ];

        Ok(Self {
            graph,
            caps,
            frame_features,
            view_features,
            views: Pooled::default(),
        })
    }

    /// Append a custom frame feature; it runs after the built-in ones.
    pub fn add_frame_feature(&mut self, feature: Box<dyn FrameRenderFeature>) {
        self.frame_features.push(feature);
    }

    /// Append a custom view feature; it runs after the built-in ones.
    pub fn add_view_feature(&mut self, feature: Box<dyn ViewRenderFeature>) {
        self.view_features.push(feature);
    }

    #[inline]
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    fn render_frame(
        &mut self,
        host: &mut dyn HostContext,
        cameras: &[CameraData],
    ) -> Result<CommandBuffer, GraphError> {
        let Self {
            graph,
            caps,
            frame_features,
            view_features,
            views,
        } = self;

        for feature in frame_features.iter_mut() {
            log::trace!("frame feature '{}'", feature.name());
            feature.render(graph, host)?;
        }

        let views = views.activate();
        collect_views(graph, cameras, host.display(), caps, views);

        for view in views.iter() {
            graph.begin_view(view.view_size);
            graph.set_resource(ViewInfo {
                view_size: view.view_size,
            });
            for feature in view_features.iter_mut() {
                log::trace!("view {}: feature '{}'", view.camera_id, feature.name());
                feature.render(graph, host, view)?;
            }
            graph.end_view();
        }

        let compiled = graph.compile()?;
        let commands = graph.execute(&compiled)?;
        graph.end_frame();
        Ok(commands)
    }
}

impl RenderPipeline for VrRenderPipeline {
    fn render(&mut self, host: &mut dyn HostContext, cameras: &[CameraData]) {
        match self.render_frame(host, cameras) {
            Ok(commands) => {
                self.views.release();
                host.submit(commands);
            }
            Err(error) => {
                log::error!("frame {} aborted: {error}", self.graph.frame_index());
                self.graph.abort_frame();
                self.views.release();
                host.submit(CommandBuffer::new());
            }
        }
    }
}

impl Drop for VrRenderPipeline {
    fn drop(&mut self) {
        let Self {
            graph,
            frame_features,
            view_features,
            ..
        } = self;
        for feature in frame_features.iter_mut() {
            feature.teardown(graph);
        }
        for feature in view_features.iter_mut() {
            feature.teardown(graph);
        }
    }
}
