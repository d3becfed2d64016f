//! Elementary-stream codec helpers.
//!
//! Bitstream-level utilities shared by the demultiplexer and the muxer:
//!
//! - [`h264`]: NAL unit classification, Annex-B splitting, SPS parsing and
//!   AVCC access-unit construction
//! - [`adts`]: ADTS header parsing and AAC frame splitting

pub mod adts;
pub mod h264;

pub use adts::{AdtsFrame, AdtsHeader, AdtsSplitter};
pub use h264::{NalUnitType, VideoConfig};
