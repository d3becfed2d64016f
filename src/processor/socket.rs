//! Sockets: the typed connection points of processors.
//!
//! Sockets live in the pipeline's socket table and are addressed by
//! [`SocketId`]. An output socket keeps the ordered list of input sockets it
//! feeds; an input socket keeps the output sockets feeding it.

use crate::format::SocketDescriptor;
use crate::pipeline::ProcessorId;

/// Direction of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketDirection {
    /// Receives packets from upstream.
    Input,
    /// Sends packets downstream.
    Output,
}

/// Handle to a socket in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub(crate) usize);

impl SocketId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A socket instance.
#[derive(Debug, Clone)]
pub struct Socket {
    id: SocketId,
    owner: ProcessorId,
    direction: SocketDirection,
    descriptor: SocketDescriptor,
    peers: Vec<SocketId>,
}

impl Socket {
    pub(crate) fn new(
        id: SocketId,
        owner: ProcessorId,
        direction: SocketDirection,
        descriptor: SocketDescriptor,
    ) -> Self {
        Self {
            id,
            owner,
            direction,
            descriptor,
            peers: Vec::new(),
        }
    }

    /// The socket's handle.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// The processor owning this socket.
    pub fn owner(&self) -> ProcessorId {
        self.owner
    }

    /// The socket's direction.
    pub fn direction(&self) -> SocketDirection {
        self.direction
    }

    /// Check if this is an input socket.
    pub fn is_input(&self) -> bool {
        self.direction == SocketDirection::Input
    }

    /// Check if this is an output socket.
    pub fn is_output(&self) -> bool {
        self.direction == SocketDirection::Output
    }

    /// The capability declaration.
    pub fn descriptor(&self) -> &SocketDescriptor {
        &self.descriptor
    }

    /// Connected sockets on the other side, in connection order.
    pub fn peers(&self) -> &[SocketId] {
        &self.peers
    }

    pub(crate) fn add_peer(&mut self, peer: SocketId) {
        self.peers.push(peer);
    }
}

/// Announcement of an output socket that content inspection says will exist.
///
/// Shadow sockets are never connected; they let listeners learn the eventual
/// output shape before the first packet flows.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowOutputSocket {
    descriptor: SocketDescriptor,
    stream_id: Option<u32>,
}

impl ShadowOutputSocket {
    /// Create an announcement.
    pub fn new(descriptor: SocketDescriptor, stream_id: Option<u32>) -> Self {
        Self {
            descriptor,
            stream_id,
        }
    }

    /// The announced capability set.
    pub fn descriptor(&self) -> &SocketDescriptor {
        &self.descriptor
    }

    /// Stream the socket will carry, when known.
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }
}
