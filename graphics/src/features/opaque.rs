//! Opaque geometry pass.

use crate::error::GraphError;
use crate::features::ViewRenderFeature;
use crate::graph::pass::{LoadAction, StoreAction, WriteFlags};
use crate::graph::resource::{ClearPolicy, TextureDesc, TextureFormat};
use crate::graph::RenderGraph;
use crate::host::{HostContext, RenderQueueRange, SortOrder, TextureArg};
use crate::view::{
    CameraClearFlags, CameraDepth, CameraTarget, CullingResultsData, PrecomputedDfg, ViewData,
    ViewRenderData,
};

/// Allocates the view's depth and HDR color targets, publishes their
/// handles, and draws the opaque queue front-to-back.
#[derive(Debug, Default)]
pub struct DrawOpaque;

impl DrawOpaque {
    pub fn new() -> Self {
        Self
    }
}

impl ViewRenderFeature for DrawOpaque {
    fn name(&self) -> &str {
        "Draw Opaque"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        let layers = view.layer_count();
        let clear_color = match view.clear_flags {
            CameraClearFlags::SolidColor(color) => color,
            CameraClearFlags::Skybox | CameraClearFlags::Nothing => [0.0, 0.0, 0.0, 0.0],
        };

        let depth = graph.texture(
            TextureDesc::new(TextureFormat::D32FloatS8)
                .with_layers(layers)
                .with_clear(ClearPolicy::DepthStencil { depth: 1.0, stencil: 0 }),
        );
        let color = graph.texture(
            TextureDesc::new(TextureFormat::B10G11R11UFloat)
                .with_layers(layers)
                .with_clear(ClearPolicy::Color(clear_color)),
        );
        graph.set_resource(CameraDepth(depth));
        graph.set_resource(CameraTarget(color));

        let count = graph
            .get_resource::<CullingResultsData>()?
            .0
            .count_in_queue(RenderQueueRange::OPAQUE);
        let dfg = graph.try_get_resource::<PrecomputedDfg>().map(|d| d.0);
        let stereo = view.stereo_mode;

        let mut pass = graph.add_pass("Draw Opaque");
        pass.write_depth(depth, LoadAction::Clear, StoreAction::Store, WriteFlags::empty())
            .write_color(color, LoadAction::Clear, StoreAction::Store)
            .read_data::<ViewData>();
        if let Some(dfg) = dfg {
            pass.read("Dfg", dfg);
        }
        pass.set_render_fn(move |cmd| {
            if let Some(dfg) = dfg {
                cmd.set_texture("Dfg", TextureArg::Graph(dfg));
            }
            if let Some(keyword) = stereo.keyword() {
                cmd.enable_keyword(keyword);
                cmd.set_instance_multiplier(stereo.instance_multiplier());
            }
            cmd.draw_objects(RenderQueueRange::OPAQUE, SortOrder::FrontToBack, count);
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
    use crate::host::{
        Command, CommandBuffer, CullingParameters, CullingResults, MaterialId, RenderTargetDesc,
        RenderTargetId, VisibleObject,
    };
    use crate::view::{CameraKind, EyeTransforms, StereoMode};
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

    fn stereo_view() -> ViewRenderData {
        ViewRenderData {
            camera_id: 1,
            camera_kind: CameraKind::Game,
            view_size: UVec2::new(1440, 1600),
            near: 0.1,
            far: 100.0,
            tan_half_fov: 0.8,
            eyes: [EyeTransforms::IDENTITY; 2],
            culling: CullingParameters::default(),
            target: RenderTargetDesc::new(RenderTargetId::new(1)),
            vr_usage: true,
            stereo_mode: StereoMode::Instancing,
            clear_flags: CameraClearFlags::Skybox,
        }
    }

    fn seed_culling(graph: &mut RenderGraph, opaque: usize) {
        let objects = (0..opaque)
            .map(|i| VisibleObject { id: i as u64, queue: 2000, layer: 1, distance: i as f32 })
            .collect();
        graph.set_resource(CullingResultsData(CullingResults {
            objects,
            lights: Vec::new(),
        }));
    }

    #[test]
    fn test_allocates_stereo_targets() {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(1440, 1600));
        seed_culling(&mut graph, 3);

        DrawOpaque::new()
            .render(&mut graph, &mut NullHost, &stereo_view())
            .unwrap();

        let depth = graph.get_resource::<CameraDepth>().unwrap().0;
        let color = graph.get_resource::<CameraTarget>().unwrap().0;
        assert_eq!(graph.resolve_size(depth).unwrap(), UVec2::new(1440, 1600));
        assert_eq!(graph.resolve_size(color).unwrap(), UVec2::new(1440, 1600));
    }

    #[test]
    fn test_requires_culling_results() {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(640, 480));
        let error = DrawOpaque::new()
            .render(&mut graph, &mut NullHost, &stereo_view())
            .unwrap_err();
        assert!(matches!(error, GraphError::MissingResource { .. }));
    }

    #[test]
    fn test_stereo_keyword_brackets_the_draw() {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(1440, 1600));
        seed_culling(&mut graph, 5);
        DrawOpaque::new()
            .render(&mut graph, &mut NullHost, &stereo_view())
            .unwrap();

        let compiled = graph.compile().unwrap();
        let cmd = graph.execute(&compiled).unwrap();
        let relevant: Vec<&Command> = cmd
            .commands()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Command::EnableKeyword(_)
                        | Command::DisableKeyword(_)
                        | Command::DrawObjects { .. }
                        | Command::SetInstanceMultiplier(_)
                )
            })
            .collect();
        assert_eq!(relevant[0], &Command::EnableKeyword("STEREO_INSTANCING_ON"));
        assert_eq!(relevant[1], &Command::SetInstanceMultiplier(2));
        assert!(matches!(relevant[2], Command::DrawObjects { count: 5, .. }));
        assert_eq!(relevant[3], &Command::DisableKeyword("STEREO_INSTANCING_ON"));
        assert_eq!(relevant[4], &Command::SetInstanceMultiplier(1));
    }
}
