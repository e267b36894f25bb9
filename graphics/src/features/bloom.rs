//! Bloom: progressive downsample / upsample mip chain.

use glam::{UVec2, Vec4};

use crate::error::{GraphError, GraphicsError};
use crate::features::ViewRenderFeature;
use crate::graph::pass::{LoadAction, StoreAction};
use crate::graph::resource::{ResourceHandle, TextureDesc, TextureFormat};
use crate::graph::RenderGraph;
use crate::host::{HostContext, MaterialId, TextureArg};
use crate::view::{CameraBloom, CameraTarget, ViewRenderData};

/// Bloom shader; material pass 0 downsamples, pass 1 upsamples additively.
pub const BLOOM_SHADER: &str = "Hidden/Simple Bloom";
const DOWNSAMPLE_PASS: u32 = 0;
const UPSAMPLE_PASS: u32 = 1;

/// User-facing bloom parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    /// Blend weight of the bloom contribution, `0..=1`; 0 disables bloom.
    pub strength: f32,
    /// Upper bound on chain length; the screen size caps it further.
    pub max_mip: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 0.3,
            max_mip: 6,
        }
    }
}

impl BloomSettings {
    /// Clamp to the supported ranges.
    pub fn sanitized(self) -> Self {
        Self {
            strength: self.strength.clamp(0.0, 1.0),
            max_mip: self.max_mip.clamp(2, 12),
        }
    }
}

/// Builds the bloom mip chain off the camera target and publishes the
/// result as [`CameraBloom`].
pub struct Bloom {
    material: MaterialId,
    settings: BloomSettings,
}

impl Bloom {
    pub fn new(host: &mut dyn HostContext, settings: BloomSettings) -> Result<Self, GraphicsError> {
        Ok(Self {
            material: host.shader_material(BLOOM_SHADER)?,
            settings: settings.sanitized(),
        })
    }

    fn blit(
        &self,
        graph: &mut RenderGraph,
        name: String,
        source: ResourceHandle,
        dest: ResourceHandle,
        dest_size: UVec2,
        load: LoadAction,
        material_pass: u32,
        multiplier: u32,
    ) {
        let material = self.material;
        let strength = self.settings.strength;
        let resolution = Vec4::new(
            dest_size.x as f32,
            dest_size.y as f32,
            1.0 / dest_size.x as f32,
            1.0 / dest_size.y as f32,
        );
        let mut pass = graph.add_pass(name);
        pass.read("Input", source)
            .write_color(dest, load, StoreAction::Store)
            .set_render_fn(move |cmd| {
                cmd.set_texture("Input", TextureArg::Graph(source));
                cmd.set_vector("Resolution", resolution);
                cmd.set_vector("RcpResolution", Vec4::new(resolution.z, resolution.w, 0.0, 0.0));
                if material_pass == UPSAMPLE_PASS {
                    cmd.set_float("Strength", strength);
                }
                cmd.draw_procedural(material, material_pass, 3 * multiplier);
            });
    }
}

impl ViewRenderFeature for Bloom {
    fn name(&self) -> &str {
        "Bloom"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        _host: &mut dyn HostContext,
        view: &ViewRenderData,
    ) -> Result<(), GraphError> {
        if self.settings.strength <= 0.0 {
            return Ok(());
        }
        let source = graph.get_resource::<CameraTarget>()?.0;
        let layers = view.layer_count();
        let multiplier = view.instance_multiplier();

        let mip_count = self
            .settings
            .max_mip
            .min(view.view_size.max_element().max(2).ilog2())
            .max(1);

        // Allocate the chain up front; each level is half the previous.
        let mut size = view.view_size;
        let mut chain = Vec::with_capacity(mip_count as usize);
        for _ in 0..mip_count {
            size = (size / 2).max(UVec2::ONE);
            let handle = graph.texture(
                TextureDesc::new(TextureFormat::Rgba16Float)
                    .with_exact_size(size.x, size.y)
                    .with_layers(layers),
            );
            chain.push((handle, size));
        }

        for mip in 0..mip_count as usize {
            let input = if mip == 0 { source } else { chain[mip - 1].0 };
            let (dest, dest_size) = chain[mip];
            self.blit(
                graph,
                format!("Bloom Down {mip}"),
                input,
                dest,
                dest_size,
                LoadAction::DontCare,
                DOWNSAMPLE_PASS,
                multiplier,
            );
        }
        for mip in (0..mip_count as usize - 1).rev() {
            let (dest, dest_size) = chain[mip];
            self.blit(
                graph,
                format!("Bloom Up {mip}"),
                chain[mip + 1].0,
                dest,
                dest_size,
                LoadAction::Load,
                UPSAMPLE_PASS,
                multiplier,
            );
        }

        graph.set_resource(CameraBloom(chain[0].0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        Command, CommandBuffer, CullingParameters, CullingResults, RenderTargetDesc,
        RenderTargetId,
    };
    use crate::view::{CameraClearFlags, CameraKind, EyeTransforms, StereoMode};
    use crate::xr::XrDisplay;
    use rstest::rstest;

    struct BloomHost;

    impl HostContext for BloomHost {
        fn time_seconds(&self) -> f64 {
            0.0
        }
        fn cull(&mut self, _params: &CullingParameters) -> CullingResults {
            CullingResults::default()
        }
        fn shader_material(&mut self, _shader: &str) -> Result<MaterialId, GraphicsError> {
            Ok(MaterialId::new(3))
        }
        fn display(&mut self) -> Option<&mut dyn XrDisplay> {
            None
        }
        fn submit(&mut self, _commands: CommandBuffer) {}
    }

    fn view_sized(width: u32, height: u32) -> ViewRenderData {
        ViewRenderData {
            camera_id: 1,
            camera_kind: CameraKind::Game,
            view_size: UVec2::new(width, height),
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

    fn seeded_graph(width: u32, height: u32) -> RenderGraph {
        let mut graph = RenderGraph::new();
        graph.begin_view(UVec2::new(width, height));
        let color = graph.texture(TextureDesc::new(TextureFormat::B10G11R11UFloat));
        graph.set_resource(CameraTarget(color));
        graph
    }

    #[test]
    fn test_zero_strength_is_inert() {
        let mut graph = seeded_graph(640, 480);
        let mut host = BloomHost;
        let mut bloom =
            Bloom::new(&mut host, BloomSettings { strength: 0.0, max_mip: 6 }).unwrap();
        bloom.render(&mut graph, &mut host, &view_sized(640, 480)).unwrap();
        assert_eq!(graph.pass_count(), 0);
        assert!(graph.try_get_resource::<CameraBloom>().is_none());
    }

    #[rstest]
    #[case(1920, 1080, 6, 6)] // capped by max_mip
    #[case(64, 64, 6, 6)] // log2(64) = 6
    #[case(16, 8, 6, 4)] // capped by screen size
    fn test_mip_count_respects_caps(
        #[case] width: u32,
        #[case] height: u32,
        #[case] max_mip: u32,
        #[case] expected_mips: u32,
    ) {
        let mut graph = seeded_graph(width, height);
        let mut host = BloomHost;
        let mut bloom =
            Bloom::new(&mut host, BloomSettings { strength: 0.5, max_mip }).unwrap();
        bloom
            .render(&mut graph, &mut host, &view_sized(width, height))
            .unwrap();
        // N down passes + N-1 up passes.
        assert_eq!(graph.pass_count(), (2 * expected_mips - 1) as usize);
    }

    #[test]
    fn test_publishes_top_mip_and_sets_strength() {
        let mut graph = seeded_graph(256, 256);
        let mut host = BloomHost;
        let mut bloom =
            Bloom::new(&mut host, BloomSettings { strength: 0.4, max_mip: 3 }).unwrap();
        bloom.render(&mut graph, &mut host, &view_sized(256, 256)).unwrap();

        let top = graph.get_resource::<CameraBloom>().unwrap().0;
        assert_eq!(graph.resolve_size(top).unwrap(), UVec2::new(128, 128));

        let compiled = graph.compile().unwrap();
        let cmd = graph.execute(&compiled).unwrap();
        let strengths: Vec<f32> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetFloat { name: "Strength", value } => Some(*value),
                _ => None,
            })
            .collect();
        // One per upsample pass.
        assert_eq!(strengths, vec![0.4, 0.4]);
    }

    #[test]
    fn test_settings_sanitize() {
        let settings = BloomSettings { strength: 3.0, max_mip: 40 }.sanitized();
        assert_eq!(settings.strength, 1.0);
        assert_eq!(settings.max_mip, 12);
    }
}
