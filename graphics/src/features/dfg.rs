//! One-time precomputation of the DFG lookup table used by the BRDF.

use crate::error::{GraphError, GraphicsError};
use crate::features::FrameRenderFeature;
use crate::graph::pass::{LoadAction, StoreAction};
use crate::graph::resource::{ClearPolicy, TextureDesc, TextureFormat};
use crate::graph::RenderGraph;
use crate::host::{HostContext, MaterialId};
use crate::view::PrecomputedDfg;

/// Shader that integrates the DFG terms into the lookup table.
pub const DFG_SHADER: &str = "Hidden/PrecomputeDfg";

/// Side length of the lookup table; roughness/NoV resolution beyond 32px
/// has no visible effect.
pub const DFG_SIZE: u32 = 32;

/// Bakes the DFG lookup table into a persistent texture on the first frame
/// and publishes its handle for material passes to sample.
#[derive(Debug)]
pub struct PrecomputeDfg {
    material: MaterialId,
    texture: crate::graph::resource::ResourceHandle,
    baked: bool,
}

impl PrecomputeDfg {
    /// Allocates the persistent texture and publishes [`PrecomputedDfg`].
    /// Fails if the host cannot provide the bake shader.
    pub fn new(graph: &mut RenderGraph, host: &mut dyn HostContext) -> Result<Self, GraphicsError> {
        let material = host.shader_material(DFG_SHADER)?;
        let texture = graph.persistent_texture(
            TextureDesc::new(TextureFormat::Rg16Unorm)
                .with_exact_size(DFG_SIZE, DFG_SIZE)
                .with_clear(ClearPolicy::Color([0.0; 4])),
        );
        graph.set_persistent_resource(PrecomputedDfg(texture));
        Ok(Self {
            material,
            texture,
            baked: false,
        })
    }

    #[inline]
    pub fn texture(&self) -> crate::graph::resource::ResourceHandle {
        self.texture
    }
}

impl FrameRenderFeature for PrecomputeDfg {
    fn name(&self) -> &str {
        "Precompute DFG"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
    ) -> Result<(), GraphError> {
        if self.baked {
            return Ok(());
        }
        self.baked = true;

        let material = self.material;
        let mut pass = graph.add_pass("Precompute DFG");
        pass.write_color(self.texture, LoadAction::DontCare, StoreAction::Store)
            .set_render_fn(move |cmd| {
                cmd.draw_procedural(material, 0, 3);
            });
        Ok(())
    }

    fn teardown(&mut self, graph: &mut RenderGraph) {
        graph.clear_resource::<PrecomputedDfg>();
        // One frame of grace for GPU work still sampling the table.
        if let Err(error) = graph.release_texture(self.texture, 1) {
            log::error!("failed to release DFG lookup table: {error}");
        }
    }
}
