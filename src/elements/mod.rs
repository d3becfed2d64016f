//! Built-in processors.
//!
//! ## Demultiplexing
//! - [`Mp2tsDemux`]: Splits an MPEG transport stream into AAC frames,
//!   H.264 access units and timed metadata
//!
//! ## Multiplexing
//! - [`Mp4Mux`]: Writes AAC and H.264 access units into an MP4 file
//!
//! ## Utility
//! - [`Passthrough`]: Forwards packets unchanged
//! - [`PacketCollector`]: Records received packets for inspection

pub mod demux;
pub mod mux;

mod collector;
mod passthrough;

pub use collector::PacketCollector;
pub use passthrough::Passthrough;

pub use demux::{AccessUnitAssembler, ElementaryStreamDemuxer, Mp2tsDemux, Mp2tsDemuxConfig};
pub use mux::{ContainerMuxer, Mp4Mux, MuxSample, TrackKind};

#[cfg(feature = "mpeg-ts")]
pub use demux::TsElementaryDemuxer;

#[cfg(feature = "mp4-mux")]
pub use mux::{Mp4FileMuxer, Mp4MuxConfig};
