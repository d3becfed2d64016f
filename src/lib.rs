//! # Mediaflow
//!
//! A push-based media dataflow engine.
//!
//! Processors are wired into a directed acyclic graph through typed sockets.
//! Packets carry zero-copy slices of shared buffers, or control symbols, and
//! travel synchronously from output sockets to connected inputs. Signals
//! travel the graph in either direction.
//!
//! ## Features
//!
//! - **Zero-copy packets**: [`BufferSlice`](buffer::BufferSlice) views over
//!   reference-counted [`bytes::Bytes`]
//! - **Dynamic sockets**: processors create outputs on demand and announce
//!   them in advance through shadow sockets
//! - **MPEG-TS demultiplexing**: ADTS audio, H.264 access units and timed
//!   metadata from a transport stream
//! - **MP4 multiplexing**: progressive MP4 files from AAC/H.264 access units
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediaflow::prelude::*;
//!
//! # fn main() -> mediaflow::Result<()> {
//! let mut pipeline = Pipeline::new();
//! let demux = pipeline.add_processor("demux", Mp2tsDemux::new())?;
//! let sink = PacketCollector::new();
//! let received = sink.handle();
//! let sink = pipeline.add_processor("sink", sink)?;
//! let sink_input = pipeline.inputs(sink)[0];
//!
//! pipeline.on(demux, ProcessorEventKind::OutputSocketCreated, move |event, pipeline| {
//!     if let ProcessorEvent::OutputSocketCreated { socket, .. } = event {
//!         let _ = pipeline.connect(*socket, sink_input);
//!     }
//! })?;
//!
//! let ts = std::fs::read("input.ts")?;
//! let input = pipeline.inputs(demux)[0];
//! pipeline.push(input, Packet::from_bytes(ts, BufferProperties::new(mime::VIDEO_MP2T)));
//! pipeline.push(input, Packet::new_eos());
//!
//! println!("{} packets", received.borrow().len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod codec;
pub mod elements;
pub mod error;
pub mod format;
pub mod isobmff;
pub mod metadata;
pub mod packet;
pub mod pipeline;
pub mod processor;
pub mod signal;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::BufferSlice;
    pub use crate::elements::{Mp2tsDemux, Mp4Mux, PacketCollector, Passthrough};
    pub use crate::error::{Error, Result};
    pub use crate::format::{SocketDescriptor, mime};
    pub use crate::metadata::BufferProperties;
    pub use crate::packet::{Packet, PacketSymbol};
    pub use crate::pipeline::{Pipeline, ProcessorId};
    pub use crate::processor::{
        Processor, ProcessorContext, ProcessorEvent, ProcessorEventKind, SocketId,
    };
    pub use crate::signal::{Signal, SignalDirection, SignalMessage};
}

pub use error::{Error, Result};
