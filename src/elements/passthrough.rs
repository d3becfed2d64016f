//! Passthrough processor - forwards packets unchanged.

use crate::error::Result;
use crate::packet::Packet;
use crate::processor::{Processor, ProcessorContext, SocketId};

/// A processor that forwards every data packet to all of its outputs.
///
/// Symbols take the pipeline's default proxy path. Useful for:
/// - Building and testing graph topologies
/// - Fan-out points where outputs are attached later
///
/// # Example
///
/// ```rust
/// use mediaflow::elements::Passthrough;
/// use mediaflow::pipeline::Pipeline;
///
/// let mut pipeline = Pipeline::new();
/// let a = pipeline.add_processor("a", Passthrough::new()).unwrap();
/// let b = pipeline.add_processor("b", Passthrough::new()).unwrap();
/// pipeline
///     .connect(pipeline.outputs(a)[0], pipeline.inputs(b)[0])
///     .unwrap();
/// assert_eq!(pipeline.children(a).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Passthrough {
    forwarded: u64,
}

impl Passthrough {
    /// Create a passthrough with one input and one output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of data packets forwarded so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}

impl Processor for Passthrough {
    fn name(&self) -> &str {
        "Passthrough"
    }

    fn setup(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        ctx.create_input(None)?;
        ctx.create_output(None)?;
        Ok(())
    }

    fn process(
        &mut self,
        ctx: &mut ProcessorContext<'_>,
        _input: SocketId,
        packet: Packet,
    ) -> Result<bool> {
        self.forwarded += 1;
        tracing::trace!(processor = ctx.name(), %packet, "forwarding");
        ctx.transfer_to_all(packet);
        Ok(true)
    }
}
