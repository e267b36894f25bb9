//! # Kaiju Graphics
//!
//! A stereo-first render pipeline built on a per-frame render graph.
//!
//! The host engine implements [`HostContext`] (culling, materials, the XR
//! display, command submission) and calls [`RenderPipeline::render`] once
//! per frame with its camera list. The pipeline collects views (one per
//! camera; a stereo camera covers both eyes in a single view), runs its
//! render features against the [`RenderGraph`], compiles the declared
//! passes into an execution plan and submits one command buffer.
//!
//! ```no_run
//! use kaiju_graphics::{
//!     DeviceCaps, PipelineSettings, RenderPipeline, VrRenderPipeline,
//! };
//! # fn demo(host: &mut dyn kaiju_graphics::HostContext, cameras: &[kaiju_graphics::CameraData]) {
//! let settings = PipelineSettings::default()
//!     .with_native_render_pass(true)
//!     .with_sky_shader("Sky/Procedural");
//! let mut pipeline = VrRenderPipeline::new(host, settings, DeviceCaps::default()).unwrap();
//! loop {
//!     pipeline.render(host, cameras);
//! }
//! # }
//! ```

pub mod error;
pub mod features;
pub mod graph;
pub mod host;
pub mod pipeline;
pub mod view;
pub mod xr;

pub use error::{GraphError, GraphicsError};
pub use graph::RenderGraph;
pub use host::{Command, CommandBuffer, HostContext};
pub use pipeline::{PipelineSettings, RenderPipeline, VrRenderPipeline};
pub use view::{CameraData, CameraKind, StereoMode, ViewRenderData};
pub use xr::{DeviceCaps, XrDisplay};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
