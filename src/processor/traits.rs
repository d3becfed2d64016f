//! The processor trait.

use super::{ProcessorContext, SocketDirection, SocketId};
use crate::error::Result;
use crate::format::SocketDescriptor;
use crate::packet::{Packet, PacketSymbol};
use crate::signal::Signal;

/// A node of the processing graph.
///
/// The pipeline drives a processor through three entry points: [`setup`]
/// when it is added, [`process`] for every packet reaching one of its input
/// sockets (unless the packet is a proxied symbol), and [`handle_signal`]
/// when a signal is cast at or through it.
///
/// # Example
///
/// ```rust
/// use mediaflow::error::Result;
/// use mediaflow::packet::Packet;
/// use mediaflow::processor::{Processor, ProcessorContext, SocketId};
///
/// struct Counter {
///     seen: usize,
/// }
///
/// impl Processor for Counter {
///     fn setup(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
///         ctx.create_input(None)?;
///         ctx.create_output(None)?;
///         Ok(())
///     }
///
///     fn process(
///         &mut self,
///         ctx: &mut ProcessorContext<'_>,
///         _input: SocketId,
///         packet: Packet,
///     ) -> Result<bool> {
///         self.seen += 1;
///         ctx.transfer_to_all(packet);
///         Ok(true)
///     }
/// }
/// ```
///
/// [`setup`]: Processor::setup
/// [`process`]: Processor::process
/// [`handle_signal`]: Processor::handle_signal
pub trait Processor {
    /// Get the name of this processor (for debugging/logging).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Payloads accepted by input sockets created without an explicit descriptor.
    fn input_descriptor(&self) -> SocketDescriptor {
        SocketDescriptor::any()
    }

    /// Payloads produced by output sockets created without an explicit descriptor.
    fn output_descriptor(&self) -> SocketDescriptor {
        SocketDescriptor::any()
    }

    /// Descriptor template for a socket direction.
    fn template_descriptor(&self, direction: SocketDirection) -> SocketDescriptor {
        match direction {
            SocketDirection::Input => self.input_descriptor(),
            SocketDirection::Output => self.output_descriptor(),
        }
    }

    /// Create initial sockets and state. Called once when added to a pipeline.
    fn setup(&mut self, _ctx: &mut ProcessorContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Decide whether a symbolic packet is proxied to every output.
    ///
    /// Returning `false` routes the packet to [`Processor::process`] instead.
    /// The default proxies every symbol except `Void`.
    fn handle_symbol(&mut self, symbol: PacketSymbol) -> bool {
        symbol != PacketSymbol::Void
    }

    /// Handle a signal. Returning `false` lets it travel on.
    fn handle_signal(&mut self, _signal: &Signal) -> bool {
        false
    }

    /// Process a packet that arrived on `input`.
    ///
    /// Returns whether the packet was handled. Errors are logged by the
    /// pipeline and count as "not handled".
    fn process(
        &mut self,
        ctx: &mut ProcessorContext<'_>,
        input: SocketId,
        packet: Packet,
    ) -> Result<bool>;
}
