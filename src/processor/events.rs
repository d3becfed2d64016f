//! Per-processor event bus.
//!
//! Every pipeline node owns an [`EventBus`] mapping event kinds to ordered
//! handler lists. Handlers run synchronously, in subscription order, and get
//! mutable access to the pipeline so they can react to topology changes (for
//! example by connecting an output socket the moment it is created).

use super::{ShadowOutputSocket, SocketDirection, SocketId};
use crate::packet::PacketSymbol;
use crate::pipeline::{Pipeline, ProcessorId};
use crate::signal::Signal;
use std::collections::HashMap;
use std::fmt;

/// Events emitted by a processor node.
#[derive(Debug, Clone)]
pub enum ProcessorEvent {
    /// A socket of either direction was created.
    SocketCreated {
        /// The owning processor.
        processor: ProcessorId,
        /// The new socket.
        socket: SocketId,
        /// Its direction.
        direction: SocketDirection,
    },

    /// An input socket was created.
    InputSocketCreated {
        /// The owning processor.
        processor: ProcessorId,
        /// The new socket.
        socket: SocketId,
    },

    /// An output socket was created.
    OutputSocketCreated {
        /// The owning processor.
        processor: ProcessorId,
        /// The new socket.
        socket: SocketId,
    },

    /// An output socket was announced ahead of its creation.
    OutputSocketShadow {
        /// The announcing processor.
        processor: ProcessorId,
        /// The announcement.
        shadow: ShadowOutputSocket,
    },

    /// A symbolic packet reached one of the processor's inputs.
    SymbolicPacket {
        /// The receiving processor.
        processor: ProcessorId,
        /// The input socket.
        socket: SocketId,
        /// The packet's symbol.
        symbol: PacketSymbol,
    },

    /// A signal was cast at the processor.
    Signal {
        /// The processor.
        processor: ProcessorId,
        /// The signal.
        signal: Signal,
    },
}

/// Discriminant of [`ProcessorEvent`], used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorEventKind {
    /// [`ProcessorEvent::SocketCreated`].
    AnySocketCreated,
    /// [`ProcessorEvent::InputSocketCreated`].
    InputSocketCreated,
    /// [`ProcessorEvent::OutputSocketCreated`].
    OutputSocketCreated,
    /// [`ProcessorEvent::OutputSocketShadow`].
    OutputSocketShadow,
    /// [`ProcessorEvent::SymbolicPacket`].
    SymbolicPacket,
    /// [`ProcessorEvent::Signal`].
    Signal,
}

impl ProcessorEvent {
    /// Get the event kind.
    pub fn kind(&self) -> ProcessorEventKind {
        match self {
            ProcessorEvent::SocketCreated { .. } => ProcessorEventKind::AnySocketCreated,
            ProcessorEvent::InputSocketCreated { .. } => ProcessorEventKind::InputSocketCreated,
            ProcessorEvent::OutputSocketCreated { .. } => ProcessorEventKind::OutputSocketCreated,
            ProcessorEvent::OutputSocketShadow { .. } => ProcessorEventKind::OutputSocketShadow,
            ProcessorEvent::SymbolicPacket { .. } => ProcessorEventKind::SymbolicPacket,
            ProcessorEvent::Signal { .. } => ProcessorEventKind::Signal,
        }
    }

    /// The processor that emitted the event.
    pub fn processor(&self) -> ProcessorId {
        match self {
            ProcessorEvent::SocketCreated { processor, .. }
            | ProcessorEvent::InputSocketCreated { processor, .. }
            | ProcessorEvent::OutputSocketCreated { processor, .. }
            | ProcessorEvent::OutputSocketShadow { processor, .. }
            | ProcessorEvent::SymbolicPacket { processor, .. }
            | ProcessorEvent::Signal { processor, .. } => *processor,
        }
    }
}

impl fmt::Display for ProcessorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorEvent::SocketCreated {
                socket, direction, ..
            } => write!(f, "SocketCreated: {:?} {:?}", direction, socket),
            ProcessorEvent::InputSocketCreated { socket, .. } => {
                write!(f, "InputSocketCreated: {:?}", socket)
            }
            ProcessorEvent::OutputSocketCreated { socket, .. } => {
                write!(f, "OutputSocketCreated: {:?}", socket)
            }
            ProcessorEvent::OutputSocketShadow { shadow, .. } => {
                write!(f, "OutputSocketShadow: [{}]", shadow.descriptor())
            }
            ProcessorEvent::SymbolicPacket { symbol, .. } => {
                write!(f, "SymbolicPacket: {}", symbol)
            }
            ProcessorEvent::Signal { signal, .. } => write!(f, "Signal: {}", signal),
        }
    }
}

/// Event handler callback.
pub type EventHandler = Box<dyn FnMut(&ProcessorEvent, &mut Pipeline)>;

/// Ordered handler lists keyed by event kind.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<ProcessorEventKind, Vec<EventHandler>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `kind`.
    pub fn subscribe(&mut self, kind: ProcessorEventKind, handler: EventHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Number of handlers subscribed to `kind`.
    pub fn handler_count(&self, kind: ProcessorEventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Run every handler subscribed to the event's kind, in order.
    pub fn dispatch(&mut self, event: &ProcessorEvent, pipeline: &mut Pipeline) {
        if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
            for handler in handlers.iter_mut() {
                handler(event, &mut *pipeline);
            }
        }
    }

    /// Append every handler of `other` after this bus's handlers.
    pub(crate) fn absorb(&mut self, other: EventBus) {
        for (kind, handlers) in other.handlers {
            self.handlers.entry(kind).or_default().extend(handlers);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions: usize = self.handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("subscriptions", &subscriptions)
            .finish()
    }
}
