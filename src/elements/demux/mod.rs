//! Demultiplexing elements.
//!
//! - [`Mp2tsDemux`]: MPEG transport stream processor
//! - [`AccessUnitAssembler`]: groups H.264 NAL units into access units
//! - [`TsElementaryDemuxer`]: transport-stream parser (requires `mpeg-ts` feature)
//!
//! [`ElementaryStreamDemuxer`] is the seam between the processor and the
//! container parser.

mod access_unit;
mod es;
mod mp2ts;

#[cfg(feature = "mpeg-ts")]
mod mpegts;

pub use access_unit::{AccessUnitAssembler, AccessUnitStats};
pub use es::{
    AdtsFrameEvent, ElementaryStreamDemuxer, EsEvent, H264NaluEvent, MAX_TS, MPEG_TS_TIMESCALE_HZ,
    MetadataEvent, ProgramTable, ROLLOVER_THRESHOLD, STREAM_TYPE_ADTS, STREAM_TYPE_H264,
    STREAM_TYPE_METADATA, TimestampRollover,
};
pub use mp2ts::{Mp2tsDemux, Mp2tsDemuxConfig, Mp2tsDemuxStats};

#[cfg(feature = "mpeg-ts")]
pub use mpegts::{TS_PACKET_SIZE, TsDemuxStats, TsElementaryDemuxer};
