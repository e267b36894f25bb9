//! Sky rendering behind already-drawn geometry.

use crate::error::{GraphError, GraphicsError};
use crate::features::ViewRenderFeature;
use crate::graph::pass::{LoadAction, StoreAction, WriteFlags};
use crate::graph::RenderGraph;
use crate::host::{HostContext, MaterialId};
use crate::view::{CameraClearFlags, CameraDepth, CameraTarget, ViewData, ViewRenderData};

/// Fullscreen sky pass drawn after opaques: depth testing against the
/// opaque depth buffer (read-only) leaves only the uncovered background.
pub struct DrawSky {
    material: Option<MaterialId>,
}

impl DrawSky {
    /// `shader` is the configured sky shader; with `None` the feature is
    /// inert.
    pub fn new(host: &mut dyn HostContext, shader: Option<&str>) -> Result<Self, GraphicsError> {
        let material = match shader {
            Some(shader) => Some(host.shader_material(shader)?),
            None => None,
        };
        Ok(Self { material })
    }
}

impl ViewRenderFeature for DrawSky {
    fn name(&self) -> &str {
        "Draw Sky"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        let Some(material) = self.material else {
            return Ok(());
        };
        if view.clear_flags != CameraClearFlags::Skybox {
            return Ok(());
        }

        let depth = graph.get_resource::<CameraDepth>()?.0;
        let color = graph.get_resource::<CameraTarget>()?.0;
        let stereo = view.stereo_mode;

        let mut pass = graph.add_pass("Draw Sky");
        pass.write_color(color, LoadAction::Load, StoreAction::Store)
            .write_depth(
                depth,
                LoadAction::Load,
                StoreAction::Store,
                WriteFlags::READ_ONLY_DEPTH | WriteFlags::READ_ONLY_STENCIL,
            )
            .read_data::<ViewData>()
            .set_render_fn(move |cmd| {
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
