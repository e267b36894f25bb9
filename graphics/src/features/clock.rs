//! Frame clock: publishes [`TimeData`] for the rest of the frame.

use crate::error::GraphError;
use crate::features::FrameRenderFeature;
use crate::graph::RenderGraph;
use crate::host::HostContext;
use crate::view::TimeData;

/// Samples host time once per frame. Runs first so every later feature sees
/// a consistent timestamp.
#[derive(Debug, Default)]
pub struct FrameClock {
    previous: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameRenderFeature for FrameClock {
    fn name(&self) -> &str {
        "Frame Clock"
    }

    fn render(
        &mut self,
        graph: &mut RenderGraph,
        host: &mut dyn HostContext,
    ) -> Result<(), GraphError> {
        let time = host.time_seconds();
        let delta = time - self.previous.unwrap_or(time);
        self.previous = Some(time);
        graph.set_resource(TimeData { time, delta });
        Ok(())
    }
}
