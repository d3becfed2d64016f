//! PacketCollector processor for extracting packets to application code.

use crate::error::Result;
use crate::packet::{Packet, PacketSymbol};
use crate::processor::{Processor, ProcessorContext, SocketId};
use std::cell::RefCell;
use std::rc::Rc;

/// A sink that records every packet it receives, symbols included.
///
/// The recorded packets live behind a shared handle, so they stay readable
/// once the collector is owned by a pipeline.
///
/// # Example
///
/// ```rust
/// use mediaflow::elements::PacketCollector;
/// use mediaflow::packet::Packet;
/// use mediaflow::pipeline::Pipeline;
///
/// let mut pipeline = Pipeline::new();
/// let sink = PacketCollector::new();
/// let received = sink.handle();
/// let sink = pipeline.add_processor("sink", sink).unwrap();
///
/// pipeline.push(pipeline.inputs(sink)[0], Packet::new_eos());
/// assert_eq!(received.borrow().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct PacketCollector {
    packets: Rc<RefCell<Vec<Packet>>>,
    inputs: usize,
}

impl PacketCollector {
    /// Create a collector with one input.
    pub fn new() -> Self {
        Self::with_inputs(1)
    }

    /// Create a collector with `inputs` input sockets.
    pub fn with_inputs(inputs: usize) -> Self {
        Self {
            packets: Rc::default(),
            inputs,
        }
    }

    /// Shared handle to the recorded packets.
    pub fn handle(&self) -> Rc<RefCell<Vec<Packet>>> {
        Rc::clone(&self.packets)
    }
}

impl Processor for PacketCollector {
    fn name(&self) -> &str {
        "PacketCollector"
    }

    fn setup(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        for _ in 0..self.inputs {
            ctx.create_input(None)?;
        }
        Ok(())
    }

    fn handle_symbol(&mut self, _symbol: PacketSymbol) -> bool {
        false
    }

    fn process(
        &mut self,
        _ctx: &mut ProcessorContext<'_>,
        input: SocketId,
        packet: Packet,
    ) -> Result<bool> {
        tracing::trace!(input = input.index(), %packet, "collected");
        self.packets.borrow_mut().push(packet);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_collector_records_symbols() {
        let mut pipeline = Pipeline::new();
        let sink = PacketCollector::with_inputs(2);
        let received = sink.handle();
        let sink = pipeline.add_processor("sink", sink).unwrap();
        let inputs = pipeline.inputs(sink).to_vec();
        assert_eq!(inputs.len(), 2);

        assert!(pipeline.push(inputs[0], Packet::new_gap()));
        assert!(pipeline.push(inputs[1], Packet::new_eos()));

        let received = received.borrow();
        assert_eq!(received[0].symbol(), PacketSymbol::Gap);
        assert_eq!(received[1].symbol(), PacketSymbol::Eos);
    }
}
