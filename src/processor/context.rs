//! Processor runtime context.
//!
//! The context is handed to a processor during [`setup`] and [`process`] and
//! is its only way to touch the graph: create sockets, push packets out of its
//! own output sockets, announce shadow sockets and cast signals.
//!
//! [`setup`]: super::Processor::setup
//! [`process`]: super::Processor::process

use super::{ProcessorEvent, ShadowOutputSocket, SocketDirection, SocketId};
use crate::error::{Error, Result};
use crate::format::SocketDescriptor;
use crate::packet::Packet;
use crate::pipeline::{Pipeline, ProcessorId};
use crate::signal::Signal;

/// Runtime context for one processor.
pub struct ProcessorContext<'a> {
    pipeline: &'a mut Pipeline,
    processor: ProcessorId,
}

impl<'a> ProcessorContext<'a> {
    pub(crate) fn new(pipeline: &'a mut Pipeline, processor: ProcessorId) -> Self {
        Self {
            pipeline,
            processor,
        }
    }

    /// The processor this context belongs to.
    pub fn id(&self) -> ProcessorId {
        self.processor
    }

    /// The processor's node name.
    pub fn name(&self) -> &str {
        self.pipeline.processor_name(self.processor).unwrap_or("?")
    }

    /// The processor's input sockets, in creation order.
    pub fn inputs(&self) -> &[SocketId] {
        self.pipeline.inputs(self.processor)
    }

    /// The processor's output sockets, in creation order.
    pub fn outputs(&self) -> &[SocketId] {
        self.pipeline.outputs(self.processor)
    }

    /// Create an input socket, using the processor's template when
    /// `descriptor` is `None`.
    pub fn create_input(&mut self, descriptor: Option<SocketDescriptor>) -> Result<SocketId> {
        self.pipeline
            .create_socket(self.processor, SocketDirection::Input, descriptor)
    }

    /// Create an output socket, using the processor's template when
    /// `descriptor` is `None`.
    pub fn create_output(&mut self, descriptor: Option<SocketDescriptor>) -> Result<SocketId> {
        self.pipeline
            .create_socket(self.processor, SocketDirection::Output, descriptor)
    }

    /// Push a packet out of one of this processor's output sockets.
    ///
    /// Downstream processors run synchronously before this returns.
    pub fn transfer(&mut self, output: SocketId, packet: Packet) -> Result<()> {
        if !self.outputs().contains(&output) {
            return Err(Error::InvalidSocket(format!(
                "{:?} is not an output of '{}'",
                output,
                self.name()
            )));
        }
        self.pipeline.transfer(output, packet);
        Ok(())
    }

    /// Push a packet out of every output socket, in creation order.
    pub fn transfer_to_all(&mut self, packet: Packet) {
        let outputs = self.outputs().to_vec();
        for output in outputs {
            self.pipeline.transfer(output, packet.clone());
        }
    }

    /// Announce an output socket before it exists.
    pub fn announce_shadow(&mut self, shadow: ShadowOutputSocket) {
        let event = ProcessorEvent::OutputSocketShadow {
            processor: self.processor,
            shadow,
        };
        self.pipeline.emit(self.processor, event);
    }

    /// Cast a signal rooted at this processor.
    ///
    /// The processor's own [`handle_signal`] is not consulted while it is
    /// processing; its external handler is.
    ///
    /// [`handle_signal`]: super::Processor::handle_signal
    pub fn cast(&mut self, signal: &Signal) -> bool {
        self.pipeline.cast(self.processor, signal)
    }
}

impl std::fmt::Debug for ProcessorContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorContext")
            .field("processor", &self.processor)
            .field("inputs", &self.inputs().len())
            .field("outputs", &self.outputs().len())
            .finish()
    }
}
