//! Error types for mediaflow.

use thiserror::Error;

/// Result type alias using mediaflow's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mediaflow operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A buffer slice range does not fit inside its backing buffer.
    #[error(
        "buffer slice out of range: offset {offset} + length {length} exceeds {available} bytes"
    )]
    OutOfRange {
        /// Requested offset.
        offset: usize,
        /// Requested length.
        length: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A control symbol was assigned to a packet that carries data.
    #[error("cannot mark a packet holding {slices} buffer slice(s) as symbolic")]
    SymbolOnDataPacket {
        /// Number of slices the packet holds.
        slices: usize,
    },

    /// Data was added to a symbolic packet.
    #[error("symbolic packet ({0}) cannot carry buffer slices")]
    DataOnSymbolicPacket(String),

    /// A payload type reached a routing decision that cannot handle it.
    #[error("unsupported payload type: {0}")]
    UnsupportedPayload(String),

    /// Two sockets do not share any payload capability.
    #[error("incompatible sockets: {0}")]
    IncompatibleSockets(String),

    /// Connecting two processors would create a cycle in the graph.
    #[error("connecting '{from}' to '{to}' would create a cycle")]
    WouldCycle {
        /// Upstream processor name.
        from: String,
        /// Downstream processor name.
        to: String,
    },

    /// A socket handle is unknown or used on the wrong side.
    #[error("invalid socket: {0}")]
    InvalidSocket(String),

    /// A processor handle or name is unknown.
    #[error("invalid processor: {0}")]
    InvalidProcessor(String),

    /// Malformed elementary-stream data.
    #[error("malformed bitstream: {0}")]
    Bitstream(String),

    /// Container multiplexing failed.
    #[error("mux error: {0}")]
    Mux(String),

    /// Box-structured container data could not be parsed.
    #[error("container error: {0}")]
    Container(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Processor-specific failure.
    #[error("processor error: {0}")]
    Element(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
