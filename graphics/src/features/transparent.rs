//! Transparent geometry pass.

use crate::error::GraphError;
use crate::features::ViewRenderFeature;
use crate::graph::pass::{LoadAction, StoreAction, WriteFlags};
use crate::graph::RenderGraph;
use crate::host::{HostContext, RenderQueueRange, SortOrder};
use crate::view::{CameraDepth, CameraTarget, CullingResultsData, ViewData, ViewRenderData};

/// Draws the transparent queue back-to-front over the opaque result, depth
/// testing without depth writes.
#[derive(Debug, Default)]
pub struct DrawTransparent;

impl DrawTransparent {
    pub fn new() -> Self {
        Self
    }
}

impl ViewRenderFeature for DrawTransparent {
    fn name(&self) -> &str {
        "Draw Transparent"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        let count = graph
            .get_resource::<CullingResultsData>()?
            .0
            .count_in_queue(RenderQueueRange::TRANSPARENT);
        if count == 0 {
            log::trace!("view {}: no transparent objects", view.camera_id);
            return Ok(());
        }

        let depth = graph.get_resource::<CameraDepth>()?.0;
        let color = graph.get_resource::<CameraTarget>()?.0;
        let stereo = view.stereo_mode;

        let mut pass = graph.add_pass("Draw Transparent");
        pass.write_color(color, LoadAction::Load, StoreAction::Store)
            .write_depth(
                depth,
                LoadAction::Load,
                StoreAction::Store,
                WriteFlags::READ_ONLY_DEPTH,
            )
            .read_data::<ViewData>()
            .set_render_fn(move |cmd| {
                if let Some(keyword) = stereo.keyword() {
                    cmd.enable_keyword(keyword);
                    cmd.set_instance_multiplier(stereo.instance_multiplier());
                }
                cmd.draw_objects(RenderQueueRange::TRANSPARENT, SortOrder::BackToFront, count);
                if let Some(keyword) = stereo.keyword() {
                    cmd.disable_keyword(keyword);
                    cmd.set_instance_multiplier(1);
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphicsError;
    use crate::graph::resource::{ClearPolicy, TextureDesc, TextureFormat};
    use crate::host::{
        Command, CommandBuffer, CullingParameters, CullingResults, MaterialId, RenderTargetDesc,
        RenderTargetId, VisibleObject,
    };
    use crate::view::{CameraClearFlags, CameraKind, EyeTransforms, StereoMode};
    use crate::xr::XrDisplay;
    use glam::UVec2;

    struct NullHost;

    impl HostContext for NullHost {
        fn time_seconds(&self) -> f64 {
            0.0
        }
        fn cull(&mut self, _params: &CullingParameters) -> CullingResults {
            CullingResults::default()
        }
        fn shader_material(&mut self, _shader: &str) -> Result<MaterialId, GraphicsError> {
            Ok(MaterialId::new(0))
        }
        fn display(&mut self) -> Option<&mut dyn XrDisplay> {
            None
        }
        fn submit(&mut self, _commands: CommandBuffer) {}
    }

    fn mono_view() -> ViewRenderData {
        ViewRenderData {
            camera_id: 1,
            camera_kind: CameraKind::Game,
            view_size: UVec2::new(640, 480),
            near: 0.1,
            far: 100.0,
            tan_half_fov: 0.8,
            eyes: [EyeTransforms::IDENTITY; 2],
            culling: CullingParameters::default(),
            target: RenderTargetDesc::new(RenderTargetId::new(1)),
            vr_usage: false,
            stereo_mode: StereoMode::None,
            clear_flags: CameraClearFlags::Skybox,
        }
    }

    fn seed(graph: &mut RenderGraph, transparent: usize) {
        let objects = (0..transparent)
            .map(|i| VisibleObject { id: i as u64, queue: 3000, layer: 1, distance: i as f32 })
            .collect();
        graph.set_resource(CullingResultsData(CullingResults {
            objects,
            lights: Vec::new(),
        }));
        let depth = graph.texture(
            TextureDesc::new(TextureFormat::D32FloatS8)
                .with_clear(ClearPolicy::DepthStencil { depth: 1.0, stencil: 0 }),
        );
        let color = graph.texture(TextureDesc::new(TextureFormat::B10G11R11UFloat));
        graph.set_resource(CameraDepth(depth));
        graph.set_resource(CameraTarget(color));
    }

    #[test]
    fn test_skips_when_queue_is_empty() {
        let mut graph = RenderGraph::new();
        seed(&mut graph, 0);
        DrawTransparent::new()
            .render(&mut graph, &mut NullHost, &mono_view())
            .unwrap();
        assert_eq!(graph.pass_count(), 0);
    }

    #[test]
    fn test_draws_back_to_front() {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(640, 480));
        seed(&mut graph, 4);
        DrawTransparent::new()
            .render(&mut graph, &mut NullHost, &mono_view())
            .unwrap();

        let compiled = graph.compile().unwrap();
        let cmd = graph.execute(&compiled).unwrap();
        let draw = cmd
            .commands()
            .iter()
            .find_map(|c| match c {
                Command::DrawObjects { queue, sort, count } => Some((*queue, *sort, *count)),
                _ => None,
            })
            .unwrap();
        assert_eq!(draw, (RenderQueueRange::TRANSPARENT, SortOrder::BackToFront, 4));
    }
}
