//! Per-view culling and lighting setup.

use glam::{Mat4, Vec4};

use crate::error::GraphError;
use crate::features::ViewRenderFeature;
use crate::graph::RenderGraph;
use crate::host::HostContext;
use crate::view::{CullingResultsData, TimeData, ViewData, ViewRenderData, ViewUniforms};

/// Culls the scene for the view, finds the sun, and publishes the view's
/// uniform block ([`ViewData`]) plus [`CullingResultsData`] for the draw
/// features. Also declares the pass that uploads the per-view globals.
#[derive(Debug, Default)]
pub struct SetupLighting;

impl SetupLighting {
    pub fn new() -> Self {
        Self
    }
}

impl ViewRenderFeature for SetupLighting {
    fn name(&self) -> &str {
        "Setup Lighting"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        let results = host.cull(&view.culling);
        log::trace!(
            "view {}: {} objects, {} lights visible",
            view.camera_id,
            results.objects.len(),
            results.lights.len()
        );

        let time = graph.get_resource::<TimeData>()?.time as f32;
        let sun = results.sun().map(|light| {
            (
                light.direction.extend(light.intensity),
                light.color.extend(0.0),
            )
        });
        let uniforms = ViewUniforms::build(view, sun, time, graph.frame_index() as f32);

        graph.set_resource(CullingResultsData(results));
        graph.set_resource(ViewData { uniforms });

        let world_to_clip: Vec<Mat4> = uniforms
            .world_to_clip
            .iter()
            .map(Mat4::from_cols_array)
            .collect();
        let corners: Vec<Vec4> = uniforms
            .frustum_corners
            .iter()
            .map(|c| Vec4::from_array(*c))
            .collect();

        let mut pass = graph.add_pass("Setup Lighting");
        pass.read_data::<CullingResultsData>()
            .read_data::<ViewData>()
            .set_render_fn(move |cmd| {
                cmd.set_matrix_array("WorldToClip", world_to_clip);
                cmd.set_vector_array("FrustumCorners", corners);
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphicsError;
    use crate::host::{
        Command, CommandBuffer, CullingParameters, CullingResults, LightKind, MaterialId,
        RenderTargetDesc, RenderTargetId, VisibleLight,
    };
    use crate::view::{CameraClearFlags, CameraKind, EyeTransforms, StereoMode};
    use crate::xr::XrDisplay;
    use glam::{UVec2, Vec3};

    struct SunHost {
        culls: u32,
    }

    impl HostContext for SunHost {
        fn time_seconds(&self) -> f64 {
            0.0
        }
        fn cull(&mut self, _params: &CullingParameters) -> CullingResults {
            self.culls += 1;
            CullingResults {
                objects: Vec::new(),
                lights: vec![VisibleLight {
                    kind: LightKind::Directional,
                    direction: Vec3::new(0.0, -1.0, 0.0),
                    color: Vec3::new(1.0, 0.95, 0.9),
                    intensity: 4.0,
                }],
            }
        }
        fn shader_material(&mut self, _shader: &str) -> Result<MaterialId, GraphicsError> {
            Ok(MaterialId::new(0))
        }
        fn display(&mut self) -> Option<&mut dyn XrDisplay> {
            None
        }
        fn submit(&mut self, _commands: CommandBuffer) {}
    }

    fn test_view() -> ViewRenderData {
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

    fn graph_with_time() -> RenderGraph {
        let mut graph = RenderGraph::new();
        graph.set_resource(TimeData { time: 2.0, delta: 0.016 });
        graph.begin_view(UVec2::new(640, 480));
        graph
    }

    #[test]
    fn test_publishes_uniforms_and_culling() {
        let mut graph = graph_with_time();
        let mut host = SunHost { culls: 0 };
        SetupLighting::new()
            .render(&mut graph, &mut host, &test_view())
            .unwrap();

        assert_eq!(host.culls, 1);
        let data = graph.get_resource::<ViewData>().unwrap();
        assert_eq!(data.uniforms.sun_direction, [0.0, -1.0, 0.0, 4.0]);
        assert_eq!(data.uniforms.resolution[3], 2.0);
        assert!(graph.try_get_resource::<CullingResultsData>().is_some());
        assert_eq!(graph.pass_count(), 1);
    }

    #[test]
    fn test_requires_time_data() {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(640, 480));
        let mut host = SunHost { culls: 0 };
        let error = SetupLighting::new()
            .render(&mut graph, &mut host, &test_view())
            .unwrap_err();
        assert!(matches!(error, GraphError::MissingResource { .. }));
    }

    #[test]
    fn test_pass_uploads_globals() {
        let mut graph = graph_with_time();
        let mut host = SunHost { culls: 0 };
        SetupLighting::new()
            .render(&mut graph, &mut host, &test_view())
            .unwrap();

        let compiled = graph.compile().unwrap();
        let cmd = graph.execute(&compiled).unwrap();
        let names: Vec<&str> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetMatrixArray { name, .. } | Command::SetVectorArray { name, .. } => {
                    Some(*name)
                }
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["WorldToClip", "FrustumCorners"]);
    }
}
