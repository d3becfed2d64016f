//! Pipeline graph structure using daggy.
//!
//! Processors are daggy nodes; every socket connection adds an edge between
//! the owning processors, so daggy rejects connections that would close a
//! cycle. Sockets themselves live in a flat table indexed by [`SocketId`].

use crate::error::{Error, Result};
use crate::format::SocketDescriptor;
use crate::packet::Packet;
use crate::processor::{
    EventBus, Processor, ProcessorContext, ProcessorEvent, ProcessorEventKind, Socket,
    SocketDirection, SocketId,
};
use crate::signal::{Signal, SignalDirection};
use daggy::{Dag, NodeIndex, Walker};
use std::collections::HashMap;

/// Unique identifier for a processor in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorId(pub(crate) NodeIndex);

impl ProcessorId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// External signal handler attached to a node.
pub type SignalHandler = Box<dyn FnMut(&Signal) -> bool>;

/// A node in the pipeline graph.
pub struct Node {
    /// Unique name of this node.
    name: String,
    /// The processor wrapped by this node.
    /// `None` while the processor is running (taken out for the call).
    processor: Option<Box<dyn Processor>>,
    /// Cached descriptor templates, so sockets can be created while the
    /// processor is taken.
    input_template: SocketDescriptor,
    output_template: SocketDescriptor,
    /// Input sockets in creation order.
    inputs: Vec<SocketId>,
    /// Output sockets in creation order.
    outputs: Vec<SocketId>,
    bus: EventBus,
    signal_handler: Option<SignalHandler>,
    symbol_proxying: bool,
}

impl Node {
    fn new(name: String, processor: Box<dyn Processor>) -> Self {
        let input_template = processor.template_descriptor(SocketDirection::Input);
        let output_template = processor.template_descriptor(SocketDirection::Output);
        Self {
            name,
            processor: Some(processor),
            input_template,
            output_template,
            inputs: Vec::new(),
            outputs: Vec::new(),
            bus: EventBus::new(),
            signal_handler: None,
            symbol_proxying: true,
        }
    }

    /// Get the node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input sockets in creation order.
    pub fn inputs(&self) -> &[SocketId] {
        &self.inputs
    }

    /// Output sockets in creation order.
    pub fn outputs(&self) -> &[SocketId] {
        &self.outputs
    }

    /// Whether symbolic packets may be proxied past this processor.
    pub fn symbol_proxying(&self) -> bool {
        self.symbol_proxying
    }

    /// Check if the processor is currently running.
    pub fn is_busy(&self) -> bool {
        self.processor.is_none()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("symbol_proxying", &self.symbol_proxying)
            .field("bus", &self.bus)
            .finish()
    }
}

/// A connection between an output socket and an input socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// The upstream output socket.
    pub output: SocketId,
    /// The downstream input socket.
    pub input: SocketId,
}

/// A processing graph with synchronous, push-based packet delivery.
///
/// # Example
///
/// ```rust
/// use mediaflow::elements::{PacketCollector, Passthrough};
/// use mediaflow::packet::Packet;
/// use mediaflow::pipeline::Pipeline;
///
/// let mut pipeline = Pipeline::new();
/// let pass = pipeline.add_processor("pass", Passthrough::new()).unwrap();
/// let sink = PacketCollector::new();
/// let received = sink.handle();
/// let sink = pipeline.add_processor("sink", sink).unwrap();
///
/// let output = pipeline.outputs(pass)[0];
/// let input = pipeline.inputs(sink)[0];
/// pipeline.connect(output, input).unwrap();
///
/// let entry = pipeline.inputs(pass)[0];
/// assert!(pipeline.push(entry, Packet::new_eos()));
/// assert_eq!(received.borrow().len(), 1);
/// ```
pub struct Pipeline {
    /// The DAG structure.
    graph: Dag<Node, Link>,
    /// Socket table, indexed by `SocketId`.
    sockets: Vec<Socket>,
    /// Name-to-ProcessorId mapping for quick lookup.
    nodes_by_name: HashMap<String, ProcessorId>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            graph: Dag::new(),
            sockets: Vec::new(),
            nodes_by_name: HashMap::new(),
        }
    }

    /// Add a processor and run its [`Processor::setup`].
    pub fn add_processor(
        &mut self,
        name: impl Into<String>,
        processor: impl Processor + 'static,
    ) -> Result<ProcessorId> {
        self.add_boxed(name, Box::new(processor))
    }

    /// Add an already boxed processor and run its [`Processor::setup`].
    pub fn add_boxed(
        &mut self,
        name: impl Into<String>,
        processor: Box<dyn Processor>,
    ) -> Result<ProcessorId> {
        let name = name.into();
        if self.nodes_by_name.contains_key(&name) {
            return Err(Error::InvalidProcessor(format!(
                "a processor named '{}' already exists",
                name
            )));
        }
        let id = ProcessorId(self.graph.add_node(Node::new(name.clone(), processor)));
        self.nodes_by_name.insert(name, id);

        self.with_processor(id, |processor, ctx| processor.setup(ctx))
            .unwrap_or(Ok(()))?;
        Ok(id)
    }

    /// Get a node by ID.
    pub fn node(&self, id: ProcessorId) -> Option<&Node> {
        self.graph.node_weight(id.0)
    }

    /// Get a processor ID by name.
    pub fn processor_id(&self, name: &str) -> Option<ProcessorId> {
        self.nodes_by_name.get(name).copied()
    }

    /// Get a processor's node name.
    pub fn processor_name(&self, id: ProcessorId) -> Option<&str> {
        self.node(id).map(Node::name)
    }

    /// Input sockets of a processor; empty for unknown IDs.
    pub fn inputs(&self, id: ProcessorId) -> &[SocketId] {
        self.node(id).map(Node::inputs).unwrap_or_default()
    }

    /// Output sockets of a processor; empty for unknown IDs.
    pub fn outputs(&self, id: ProcessorId) -> &[SocketId] {
        self.node(id).map(Node::outputs).unwrap_or_default()
    }

    /// Get a socket.
    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(id.0)
    }

    /// Number of processors.
    pub fn processor_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of socket connections.
    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the pipeline has no processors.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Downstream processors of a node, one entry per connection.
    pub fn children(&self, id: ProcessorId) -> Vec<(ProcessorId, Link)> {
        self.graph
            .children(id.0)
            .iter(&self.graph)
            .filter_map(|(edge, node)| {
                self.graph
                    .edge_weight(edge)
                    .map(|link| (ProcessorId(node), *link))
            })
            .collect()
    }

    /// Upstream processors of a node, one entry per connection.
    pub fn parents(&self, id: ProcessorId) -> Vec<(ProcessorId, Link)> {
        self.graph
            .parents(id.0)
            .iter(&self.graph)
            .filter_map(|(edge, node)| {
                self.graph
                    .edge_weight(edge)
                    .map(|link| (ProcessorId(node), *link))
            })
            .collect()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Subscribe to a processor's events.
    pub fn on<F>(&mut self, id: ProcessorId, kind: ProcessorEventKind, handler: F) -> Result<()>
    where
        F: FnMut(&ProcessorEvent, &mut Pipeline) + 'static,
    {
        self.node_mut(id)?.bus.subscribe(kind, Box::new(handler));
        Ok(())
    }

    /// Attach an external signal handler, consulted before the processor's own.
    pub fn set_signal_handler<F>(&mut self, id: ProcessorId, handler: F) -> Result<()>
    where
        F: FnMut(&Signal) -> bool + 'static,
    {
        self.node_mut(id)?.signal_handler = Some(Box::new(handler));
        Ok(())
    }

    /// Enable or disable symbolic-packet proxying for a processor.
    pub fn set_symbol_proxying(&mut self, id: ProcessorId, enabled: bool) -> Result<()> {
        self.node_mut(id)?.symbol_proxying = enabled;
        Ok(())
    }

    // ========================================================================
    // Sockets
    // ========================================================================

    /// Create an input socket on a processor.
    ///
    /// `None` uses the processor's input descriptor template.
    pub fn create_input(
        &mut self,
        id: ProcessorId,
        descriptor: Option<SocketDescriptor>,
    ) -> Result<SocketId> {
        self.create_socket(id, SocketDirection::Input, descriptor)
    }

    /// Create an output socket on a processor.
    ///
    /// `None` uses the processor's output descriptor template.
    pub fn create_output(
        &mut self,
        id: ProcessorId,
        descriptor: Option<SocketDescriptor>,
    ) -> Result<SocketId> {
        self.create_socket(id, SocketDirection::Output, descriptor)
    }

    pub(crate) fn create_socket(
        &mut self,
        id: ProcessorId,
        direction: SocketDirection,
        descriptor: Option<SocketDescriptor>,
    ) -> Result<SocketId> {
        let socket = SocketId(self.sockets.len());
        let node = self
            .graph
            .node_weight_mut(id.0)
            .ok_or_else(|| Error::InvalidProcessor(format!("{:?}", id)))?;
        let descriptor = descriptor.unwrap_or_else(|| match direction {
            SocketDirection::Input => node.input_template.clone(),
            SocketDirection::Output => node.output_template.clone(),
        });
        match direction {
            SocketDirection::Input => node.inputs.push(socket),
            SocketDirection::Output => node.outputs.push(socket),
        }
        tracing::debug!(
            processor = %node.name,
            socket = socket.index(),
            ?direction,
            descriptor = %descriptor,
            "socket created"
        );
        self.sockets
            .push(Socket::new(socket, id, direction, descriptor));

        self.emit(
            id,
            ProcessorEvent::SocketCreated {
                processor: id,
                socket,
                direction,
            },
        );
        let specific = match direction {
            SocketDirection::Input => ProcessorEvent::InputSocketCreated {
                processor: id,
                socket,
            },
            SocketDirection::Output => ProcessorEvent::OutputSocketCreated {
                processor: id,
                socket,
            },
        };
        self.emit(id, specific);
        Ok(socket)
    }

    /// Connect an output socket to an input socket.
    ///
    /// Fails if the descriptors share no payload, if the sockets are already
    /// connected, or if the connection would create a cycle.
    pub fn connect(&mut self, output: SocketId, input: SocketId) -> Result<()> {
        let out = self
            .socket(output)
            .filter(|s| s.is_output())
            .ok_or_else(|| Error::InvalidSocket(format!("{:?} is not an output socket", output)))?;
        let inp = self
            .socket(input)
            .filter(|s| s.is_input())
            .ok_or_else(|| Error::InvalidSocket(format!("{:?} is not an input socket", input)))?;

        if !out.descriptor().intersects(inp.descriptor()) {
            return Err(Error::IncompatibleSockets(format!(
                "[{}] cannot feed [{}]",
                out.descriptor(),
                inp.descriptor()
            )));
        }
        if out.peers().contains(&input) {
            return Err(Error::InvalidSocket(format!(
                "{:?} is already connected to {:?}",
                output, input
            )));
        }

        let (from, to) = (out.owner(), inp.owner());
        self.graph
            .add_edge(from.0, to.0, Link { output, input })
            .map_err(|_| Error::WouldCycle {
                from: self.processor_name(from).unwrap_or("?").to_string(),
                to: self.processor_name(to).unwrap_or("?").to_string(),
            })?;

        self.sockets[output.0].add_peer(input);
        self.sockets[input.0].add_peer(output);
        Ok(())
    }

    // ========================================================================
    // Packet flow
    // ========================================================================

    /// Deliver a packet to an input socket through the receipt path.
    ///
    /// Returns whether the receiving processor handled it.
    pub fn push(&mut self, input: SocketId, packet: Packet) -> bool {
        self.receive(input, packet)
    }

    /// Push a packet out of an output socket to every connected input, in
    /// connection order.
    pub fn transfer(&mut self, output: SocketId, packet: Packet) {
        let peers = match self.socket(output) {
            Some(socket) if socket.is_output() => socket.peers().to_vec(),
            _ => {
                tracing::warn!(socket = output.index(), "transfer on a non-output socket");
                return;
            }
        };
        let Some((last, rest)) = peers.split_last() else {
            tracing::trace!(socket = output.index(), "output not connected, packet dropped");
            return;
        };
        for peer in rest {
            self.receive(*peer, packet.clone());
        }
        self.receive(*last, packet);
    }

    fn receive(&mut self, input: SocketId, packet: Packet) -> bool {
        let Some(owner) = self
            .socket(input)
            .filter(|s| s.is_input())
            .map(Socket::owner)
        else {
            tracing::warn!(socket = input.index(), "packet sent to a non-input socket");
            return false;
        };

        if packet.is_symbolic() {
            let symbol = packet.symbol();
            self.emit(
                owner,
                ProcessorEvent::SymbolicPacket {
                    processor: owner,
                    socket: input,
                    symbol,
                },
            );

            let Some(node) = self.graph.node_weight_mut(owner.0) else {
                return false;
            };
            let Some(processor) = node.processor.as_mut() else {
                tracing::warn!(processor = %node.name, %symbol, "processor busy, symbol dropped");
                return false;
            };
            if processor.handle_symbol(symbol) && node.symbol_proxying {
                let outputs = node.outputs.clone();
                for output in outputs {
                    self.transfer(output, packet.clone());
                }
                return true;
            }
        }

        match self.with_processor(owner, |processor, ctx| processor.process(ctx, input, packet)) {
            Some(Ok(handled)) => handled,
            Some(Err(err)) => {
                tracing::error!(
                    processor = self.processor_name(owner).unwrap_or("?"),
                    error = %err,
                    "packet processing failed"
                );
                false
            }
            None => {
                tracing::warn!(
                    processor = self.processor_name(owner).unwrap_or("?"),
                    "processor busy, packet dropped"
                );
                false
            }
        }
    }

    // ========================================================================
    // Signals
    // ========================================================================

    /// Cast a signal rooted at a processor.
    ///
    /// The processor's external handler, then the processor itself, get the
    /// first chance to handle it. Otherwise the cast continues depth-first
    /// through every socket on the signal's side. Returns whether any node
    /// handled it.
    pub fn cast(&mut self, id: ProcessorId, signal: &Signal) -> bool {
        self.emit(
            id,
            ProcessorEvent::Signal {
                processor: id,
                signal: signal.clone(),
            },
        );
        if self.offer_signal(id, signal) {
            return true;
        }

        let sockets = match signal.direction() {
            SignalDirection::Up => self.inputs(id).to_vec(),
            SignalDirection::Down => self.outputs(id).to_vec(),
        };
        let mut handled = false;
        for socket in sockets {
            let peers = self.socket(socket).map(|s| s.peers().to_vec()).unwrap_or_default();
            for peer in peers {
                if let Some(neighbour) = self.socket(peer).map(Socket::owner) {
                    handled |= self.cast(neighbour, signal);
                }
            }
        }
        handled
    }

    fn offer_signal(&mut self, id: ProcessorId, signal: &Signal) -> bool {
        let Some(node) = self.graph.node_weight_mut(id.0) else {
            return false;
        };
        if let Some(handler) = node.signal_handler.as_mut() {
            if handler(signal) {
                return true;
            }
        }
        node.processor
            .as_mut()
            .is_some_and(|processor| processor.handle_signal(signal))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn node_mut(&mut self, id: ProcessorId) -> Result<&mut Node> {
        self.graph
            .node_weight_mut(id.0)
            .ok_or_else(|| Error::InvalidProcessor(format!("{:?}", id)))
    }

    /// Run `f` with the processor taken out of its node.
    ///
    /// Returns `None` if the processor is already running.
    fn with_processor<R>(
        &mut self,
        id: ProcessorId,
        f: impl FnOnce(&mut Box<dyn Processor>, &mut ProcessorContext<'_>) -> R,
    ) -> Option<R> {
        let mut processor = self.graph.node_weight_mut(id.0)?.processor.take()?;
        let result = {
            let mut ctx = ProcessorContext::new(self, id);
            f(&mut processor, &mut ctx)
        };
        if let Some(node) = self.graph.node_weight_mut(id.0) {
            node.processor = Some(processor);
        }
        Some(result)
    }

    /// Dispatch an event on a processor's bus.
    ///
    /// The bus is detached while its handlers run; events the same node emits
    /// meanwhile are not dispatched, and handlers subscribed meanwhile are
    /// appended afterwards.
    pub(crate) fn emit(&mut self, id: ProcessorId, event: ProcessorEvent) {
        let Some(node) = self.graph.node_weight_mut(id.0) else {
            return;
        };
        if node.bus.handler_count(event.kind()) == 0 {
            return;
        }
        let mut bus = std::mem::take(&mut node.bus);
        bus.dispatch(&event, self);
        if let Some(node) = self.graph.node_weight_mut(id.0) {
            let added = std::mem::take(&mut node.bus);
            bus.absorb(added);
            node.bus = bus;
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("processors", &self.processor_count())
            .field("links", &self.link_count())
            .field("sockets", &self.sockets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::mime;
    use crate::packet::PacketSymbol;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// One input, one output, counts transform calls and forwards data.
    struct Relay {
        calls: Rc<RefCell<usize>>,
        accepts: SocketDescriptor,
    }

    impl Relay {
        fn new(calls: Rc<RefCell<usize>>) -> Self {
            Self {
                calls,
                accepts: SocketDescriptor::any(),
            }
        }
    }

    impl Processor for Relay {
        fn input_descriptor(&self) -> SocketDescriptor {
            self.accepts.clone()
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
            *self.calls.borrow_mut() += 1;
            ctx.transfer_to_all(packet);
            Ok(true)
        }
    }

    struct Failing;

    impl Processor for Failing {
        fn setup(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
            ctx.create_input(None)?;
            Ok(())
        }

        fn process(
            &mut self,
            _ctx: &mut ProcessorContext<'_>,
            _input: SocketId,
            _packet: Packet,
        ) -> Result<bool> {
            Err(Error::Element("broken buffer".into()))
        }
    }

    fn relay(pipeline: &mut Pipeline, name: &str) -> (ProcessorId, Rc<RefCell<usize>>) {
        let calls = Rc::new(RefCell::new(0));
        let id = pipeline
            .add_processor(name, Relay::new(Rc::clone(&calls)))
            .unwrap();
        (id, calls)
    }

    #[test]
    fn test_pipeline_creation() {
        let pipeline = Pipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.link_count(), 0);
    }

    #[test]
    fn test_add_processors() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");
        let (b, _) = relay(&mut pipeline, "b");

        assert_eq!(pipeline.processor_count(), 2);
        assert_eq!(pipeline.processor_id("a"), Some(a));
        assert_eq!(pipeline.processor_id("b"), Some(b));
        assert_eq!(pipeline.inputs(a).len(), 1);
        assert_eq!(pipeline.outputs(a).len(), 1);
        assert!(
            pipeline
                .add_processor("a", Relay::new(Rc::new(RefCell::new(0))))
                .is_err()
        );
    }

    #[test]
    fn test_connect_and_walk() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");
        let (b, _) = relay(&mut pipeline, "b");

        let (out, inp) = (pipeline.outputs(a)[0], pipeline.inputs(b)[0]);
        pipeline.connect(out, inp).unwrap();

        assert_eq!(pipeline.link_count(), 1);
        assert_eq!(pipeline.children(a)[0].0, b);
        assert_eq!(pipeline.parents(b)[0].0, a);
        assert_eq!(pipeline.socket(out).unwrap().peers(), &[inp]);
        assert!(pipeline.connect(out, inp).is_err());
    }

    #[test]
    fn test_cycle_detection() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");
        let (b, _) = relay(&mut pipeline, "b");

        let (a_out, b_in) = (pipeline.outputs(a)[0], pipeline.inputs(b)[0]);
        pipeline.connect(a_out, b_in).unwrap();

        let (b_out, a_in) = (pipeline.outputs(b)[0], pipeline.inputs(a)[0]);
        let err = pipeline.connect(b_out, a_in).unwrap_err();
        assert!(matches!(err, Error::WouldCycle { .. }));
    }

    #[test]
    fn test_connect_rejects_wrong_direction() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");
        let (b, _) = relay(&mut pipeline, "b");

        let (a_in, b_in) = (pipeline.inputs(a)[0], pipeline.inputs(b)[0]);
        assert!(matches!(
            pipeline.connect(a_in, b_in),
            Err(Error::InvalidSocket(_))
        ));
    }

    #[test]
    fn test_incompatible_descriptors() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");
        let b = pipeline
            .add_processor(
                "b",
                Relay {
                    calls: Rc::new(RefCell::new(0)),
                    accepts: SocketDescriptor::from_mime_types([mime::AUDIO]),
                },
            )
            .unwrap();
        let video_out = pipeline
            .create_output(a, Some(SocketDescriptor::from_mime_types([mime::VIDEO_H264])))
            .unwrap();

        let err = pipeline
            .connect(video_out, pipeline.inputs(b)[0])
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleSockets(_)));
    }

    #[test]
    fn test_transform_error_is_contained() {
        let mut pipeline = Pipeline::new();
        let failing = pipeline.add_processor("failing", Failing).unwrap();
        let input = pipeline.inputs(failing)[0];

        assert!(!pipeline.push(input, Packet::from_bytes(vec![1u8], Default::default())));
        // The processor is put back and keeps receiving.
        assert!(!pipeline.node(failing).unwrap().is_busy());
        assert!(!pipeline.push(input, Packet::from_bytes(vec![2u8], Default::default())));
    }

    #[test]
    fn test_symbol_proxied_without_transform() {
        let mut pipeline = Pipeline::new();
        let (a, a_calls) = relay(&mut pipeline, "a");
        let (b, b_calls) = relay(&mut pipeline, "b");
        let (out, inp) = (pipeline.outputs(a)[0], pipeline.inputs(b)[0]);
        pipeline.connect(out, inp).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        pipeline
            .on(b, ProcessorEventKind::SymbolicPacket, move |event, _| {
                if let ProcessorEvent::SymbolicPacket { symbol, .. } = event {
                    sink.borrow_mut().push(*symbol);
                }
            })
            .unwrap();

        assert!(pipeline.push(pipeline.inputs(a)[0], Packet::new_flush()));
        assert_eq!(*a_calls.borrow(), 0);
        assert_eq!(*b_calls.borrow(), 0);
        assert_eq!(*seen.borrow(), vec![PacketSymbol::Flush]);
    }

    #[test]
    fn test_symbol_reaches_transform_when_proxying_disabled() {
        let mut pipeline = Pipeline::new();
        let (a, a_calls) = relay(&mut pipeline, "a");
        pipeline.set_symbol_proxying(a, false).unwrap();

        assert!(pipeline.push(pipeline.inputs(a)[0], Packet::new_eos()));
        assert_eq!(*a_calls.borrow(), 1);
    }

    #[test]
    fn test_socket_events_in_order() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");

        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in [
            ProcessorEventKind::AnySocketCreated,
            ProcessorEventKind::OutputSocketCreated,
            ProcessorEventKind::InputSocketCreated,
        ] {
            let log = Rc::clone(&log);
            pipeline
                .on(a, kind, move |event, _| log.borrow_mut().push(event.kind()))
                .unwrap();
        }

        pipeline.create_output(a, None).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                ProcessorEventKind::AnySocketCreated,
                ProcessorEventKind::OutputSocketCreated
            ]
        );
    }

    #[test]
    fn test_handler_connects_new_output() {
        let mut pipeline = Pipeline::new();
        let (a, _) = relay(&mut pipeline, "a");
        let (b, b_calls) = relay(&mut pipeline, "b");
        let b_in = pipeline.inputs(b)[0];

        pipeline
            .on(a, ProcessorEventKind::OutputSocketCreated, move |event, pipeline| {
                if let ProcessorEvent::OutputSocketCreated { socket, .. } = event {
                    pipeline.connect(*socket, b_in).unwrap();
                }
            })
            .unwrap();

        let extra = pipeline.create_output(a, None).unwrap();
        assert_eq!(pipeline.socket(extra).unwrap().peers(), &[b_in]);

        pipeline.transfer(extra, Packet::from_bytes(vec![0u8; 4], Default::default()));
        assert_eq!(*b_calls.borrow(), 1);
    }
}
