//! Desktop mirror of the XR headset view.

use crate::error::{GraphError, GraphicsError};
use crate::features::ViewRenderFeature;
use crate::graph::RenderGraph;
use crate::host::{HostContext, MaterialId, RenderTargetId, TextureArg};
use crate::view::{CameraKind, StereoMode, ViewRenderData};
use crate::xr::XrDisplayData;

/// Mirror blit shader.
pub const MIRROR_SHADER: &str = "Hidden/XRMirrorView";

/// Blits the left eye of the headset render target to the window
/// backbuffer so a desktop observer can follow the session.
pub struct MirrorBlit {
    material: MaterialId,
    enabled: bool,
}

impl MirrorBlit {
    /// `enabled` comes from the host configuration; standalone headsets
    /// have no desktop window to mirror to.
    pub fn new(host: &mut dyn HostContext, enabled: bool) -> Result<Self, GraphicsError> {
        Ok(Self {
            material: host.shader_material(MIRROR_SHADER)?,
            enabled,
        })
    }
}

impl ViewRenderFeature for MirrorBlit {
    fn name(&self) -> &str {
        "XR Mirror View"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        if !self.enabled
            || view.camera_kind != CameraKind::Game
            || view.stereo_mode == StereoMode::None
        {
            return Ok(());
        }
        let Some(xr) = graph.try_get_resource::<XrDisplayData>() else {
            return Ok(());
        };
        let source = xr.pass.render_target.id;
        let material = self.material;

        let mut pass = graph.add_pass("XR Mirror View");
        pass.read_data::<XrDisplayData>()
            .write_external(RenderTargetId::BACKBUFFER)
            .set_render_fn(move |cmd| {
                cmd.set_render_target(RenderTargetId::BACKBUFFER);
                cmd.set_texture("Input", TextureArg::External(source));
                // 0 = left eye only.
                cmd.set_float("RenderMode", 0.0);
                cmd.draw_procedural(material, 0, 3);
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        Command, CommandBuffer, CullingParameters, CullingResults, RenderTargetDesc,
    };
    use crate::view::{CameraClearFlags, EyeTransforms};
    use crate::xr::{XrDisplay, XrRenderPassDesc};
    use glam::UVec2;

    struct MirrorHost;

    impl HostContext for MirrorHost {
        fn time_seconds(&self) -> f64 {
            0.0
        }
        fn cull(&mut self, _params: &CullingParameters) -> CullingResults {
            CullingResults::default()
        }
        fn shader_material(&mut self, _shader: &str) -> Result<MaterialId, GraphicsError> {
            Ok(MaterialId::new(7))
        }
        fn display(&mut self) -> Option<&mut dyn XrDisplay> {
            None
        }
        fn submit(&mut self, _commands: CommandBuffer) {}
    }

    fn stereo_view(kind: CameraKind, stereo_mode: StereoMode) -> ViewRenderData {
        ViewRenderData {
            camera_id: 1,
            camera_kind: kind,
            view_size: UVec2::new(1440, 1600),
            near: 0.1,
            far: 100.0,
            tan_half_fov: 0.8,
            eyes: [EyeTransforms::IDENTITY; 2],
            culling: CullingParameters::default(),
            target: RenderTargetDesc::new(RenderTargetId::new(40)),
            vr_usage: true,
            stereo_mode,
            clear_flags: CameraClearFlags::Skybox,
        }
    }

    fn seed_display(graph: &mut RenderGraph) {
        graph.set_resource(XrDisplayData {
            pass: XrRenderPassDesc {
                render_target: RenderTargetDesc::new(RenderTargetId::new(40)),
                culling_pass_index: 0,
                scaled_size: UVec2::new(1440, 1600),
                vr_usage: true,
            },
        });
    }

    #[test]
    fn test_disabled_is_inert() {
        let mut graph = RenderGraph::new();
        seed_display(&mut graph);
        let mut host = MirrorHost;
        let mut mirror = MirrorBlit::new(&mut host, false).unwrap();
        mirror
            .render(&mut graph, &mut host, &stereo_view(CameraKind::Game, StereoMode::Multiview))
            .unwrap();
        assert_eq!(graph.pass_count(), 0);
    }

    #[test]
    fn test_skips_non_game_and_mono_views() {
        let mut graph = RenderGraph::new();
        seed_display(&mut graph);
        let mut host = MirrorHost;
        let mut mirror = MirrorBlit::new(&mut host, true).unwrap();

        mirror
            .render(
                &mut graph,
                &mut host,
                &stereo_view(CameraKind::SceneView, StereoMode::Multiview),
            )
            .unwrap();
        mirror
            .render(&mut graph, &mut host, &stereo_view(CameraKind::Game, StereoMode::None))
            .unwrap();
        assert_eq!(graph.pass_count(), 0);
    }

    #[test]
    fn test_skips_without_display_data() {
        let mut graph = RenderGraph::new();
        let mut host = MirrorHost;
        let mut mirror = MirrorBlit::new(&mut host, true).unwrap();
        mirror
            .render(&mut graph, &mut host, &stereo_view(CameraKind::Game, StereoMode::Multiview))
            .unwrap();
        assert_eq!(graph.pass_count(), 0);
    }

    #[test]
    fn test_blits_headset_target_to_backbuffer() {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(1440, 1600));
        seed_display(&mut graph);
        let mut host = MirrorHost;
        let mut mirror = MirrorBlit::new(&mut host, true).unwrap();
        mirror
            .render(&mut graph, &mut host, &stereo_view(CameraKind::Game, StereoMode::Multiview))
            .unwrap();

        assert_eq!(graph.pass_count(), 1);
        let compiled = graph.compile().unwrap();
        let cmd = graph.execute(&compiled).unwrap();
        assert!(cmd
            .commands()
            .iter()
            .any(|c| *c == Command::SetRenderTarget(RenderTargetId::BACKBUFFER)));
        assert!(cmd.commands().iter().any(|c| matches!(
            c,
            Command::SetTexture { name: "Input", texture: TextureArg::External(id) }
                if *id == RenderTargetId::new(40)
        )));
    }
}
