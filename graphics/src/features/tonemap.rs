//! Tonemapping and final composition to the view's output target.

use crate::error::{GraphError, GraphicsError};
use crate::features::ViewRenderFeature;
use crate::graph::RenderGraph;
use crate::host::{HostContext, MaterialId, TextureArg};
use crate::view::{CameraBloom, CameraTarget, ViewRenderData};

/// Composition shader.
pub const TONEMAP_SHADER: &str = "Hidden/Tonemap";

/// HDR output and tonemapping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonemapSettings {
    /// Output to an HDR display; enables the paper-white mapping.
    pub hdr: bool,
    /// Apply the tonemapping curve (off = raw exposure passthrough).
    pub tonemap: bool,
    /// Luminance of diffuse white on HDR displays, in nits.
    pub paper_white: f32,
    pub min_luminance: f32,
    pub max_luminance: f32,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        Self {
            hdr: false,
            tonemap: true,
            paper_white: 200.0,
            min_luminance: 0.0,
            max_luminance: 1000.0,
        }
    }
}

/// Fullscreen pass resolving the HDR camera target (plus bloom, when
/// present) into the view's output target.
pub struct Tonemap {
    material: MaterialId,
    settings: TonemapSettings,
    bloom_strength: f32,
}

impl Tonemap {
    pub fn new(
        host: &mut dyn HostContext,
        settings: TonemapSettings,
        bloom_strength: f32,
    ) -> Result<Self, GraphicsError> {
        Ok(Self {
            material: host.shader_material(TONEMAP_SHADER)?,
            settings,
            bloom_strength,
        })
    }
}

impl ViewRenderFeature for Tonemap {
    fn name(&self) -> &str {
        "Tonemapping"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        let color = graph.get_resource::<CameraTarget>()?.0;
        let bloom = graph.try_get_resource::<CameraBloom>().map(|b| b.0);
        let target = view.target.id;
        let stereo = view.stereo_mode;
        let material = self.material;
        let settings = self.settings;
        let bloom_strength = self.bloom_strength;

        let mut pass = graph.add_pass("Tonemapping");
        pass.read("Input", color);
        if let Some(bloom) = bloom {
            pass.read("Bloom", bloom);
        }
        pass.write_external(target).set_render_fn(move |cmd| {
            cmd.set_render_target(target);
            cmd.set_texture("Input", TextureArg::Graph(color));
            if let Some(bloom) = bloom {
                cmd.set_texture("Bloom", TextureArg::Graph(bloom));
                cmd.set_float("BloomStrength", bloom_strength);
            } else {
                cmd.set_float("BloomStrength", 0.0);
            }
            cmd.set_float("Tonemap", if settings.tonemap { 1.0 } else { 0.0 });
            cmd.set_float("MinLuminance", settings.min_luminance);
            cmd.set_float("MaxLuminance", settings.max_luminance);
            if settings.hdr {
                cmd.set_float("PaperWhite", settings.paper_white);
            }
            if let Some(keyword) = stereo.keyword() {
                cmd.enable_keyword(keyword);
            }
            cmd.draw_procedural(material, 0, 3 * stereo.instance_multiplier());
            if let Some(keyword) = stereo.keyword() {
                cmd.disable_keyword(keyword);
            }
        });
        Ok(())
    }
}
