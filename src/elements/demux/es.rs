//! Elementary-stream events and the demuxer collaborator seam.
//!
//! A container parser turns raw transport bytes into a sequence of
//! [`EsEvent`]s: program tables, ADTS audio frames, H.264 NAL units and timed
//! metadata. The [`Mp2tsDemux`](super::Mp2tsDemux) processor consumes them
//! without knowing which parser produced them.

use crate::codec::h264::{NalUnitType, VideoConfig};
use crate::error::Result;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Clock rate of MPEG-TS timestamps.
pub const MPEG_TS_TIMESCALE_HZ: u32 = 90_000;

/// Stream type of H.264 video in a PMT.
pub const STREAM_TYPE_H264: u8 = 0x1b;
/// Stream type of ADTS AAC audio in a PMT.
pub const STREAM_TYPE_ADTS: u8 = 0x0f;
/// Stream type of ID3 timed metadata carried in PES.
pub const STREAM_TYPE_METADATA: u8 = 0x15;

/// Elementary PIDs of the program, classified by media.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramTable {
    /// The AAC audio PID.
    pub audio: Option<u16>,
    /// The H.264 video PID.
    pub video: Option<u16>,
    /// Timed-metadata PIDs and their stream types.
    pub timed_metadata: BTreeMap<u16, u8>,
}

impl ProgramTable {
    /// Classify a PMT entry. Unknown stream types are ignored.
    pub fn insert(&mut self, pid: u16, stream_type: u8) {
        match stream_type {
            STREAM_TYPE_H264 if self.video.is_none() => self.video = Some(pid),
            STREAM_TYPE_ADTS if self.audio.is_none() => self.audio = Some(pid),
            STREAM_TYPE_METADATA => {
                self.timed_metadata.insert(pid, stream_type);
            }
            other => {
                tracing::debug!(pid, stream_type = other, "ignoring elementary stream");
            }
        }
    }

    /// Check if no stream was classified.
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none() && self.timed_metadata.is_empty()
    }
}

/// One AAC frame from an ADTS stream.
#[derive(Debug, Clone)]
pub struct AdtsFrameEvent {
    /// Elementary PID.
    pub track_id: u16,
    /// Presentation timestamp, 90 kHz.
    pub pts: i64,
    /// Decoding timestamp, 90 kHz.
    pub dts: i64,
    /// Raw AAC payload, header stripped.
    pub data: Bytes,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel configuration.
    pub channel_count: u8,
    /// MPEG-4 audio object type.
    pub audio_object_type: u8,
    /// Number of PCM samples in the frame.
    pub sample_count: u32,
}

/// One H.264 NAL unit.
#[derive(Debug, Clone)]
pub struct H264NaluEvent {
    /// Elementary PID.
    pub track_id: u16,
    /// Presentation timestamp, 90 kHz.
    pub pts: i64,
    /// Decoding timestamp, 90 kHz.
    pub dts: i64,
    /// NAL unit type.
    pub nal_unit_type: NalUnitType,
    /// NAL unit bytes, header included, no start code.
    pub data: Bytes,
    /// Picture parameters, present on SPS units.
    pub config: Option<VideoConfig>,
}

/// One timed-metadata PES payload.
#[derive(Debug, Clone)]
pub struct MetadataEvent {
    /// Elementary PID.
    pub track_id: u16,
    /// Presentation timestamp, 90 kHz.
    pub pts: Option<i64>,
    /// Decoding timestamp, 90 kHz.
    pub dts: Option<i64>,
    /// Payload bytes.
    pub data: Bytes,
}

/// Output of an elementary-stream demuxer.
#[derive(Debug, Clone)]
pub enum EsEvent {
    /// A program map table was parsed.
    ProgramTable(ProgramTable),
    /// An AAC frame.
    Audio(AdtsFrameEvent),
    /// An H.264 NAL unit.
    Video(H264NaluEvent),
    /// A timed-metadata payload.
    Metadata(MetadataEvent),
}

/// Turns container bytes into elementary-stream events.
pub trait ElementaryStreamDemuxer {
    /// Feed container bytes. Input may be split at any byte position.
    fn push(&mut self, data: &[u8]) -> Result<Vec<EsEvent>>;

    /// Emit everything still buffered.
    fn flush(&mut self) -> Result<Vec<EsEvent>> {
        Ok(Vec::new())
    }

    /// Drop all buffered state.
    fn reset(&mut self) {}
}

// ============================================================================
// Timestamp rollover
// ============================================================================

/// MPEG-TS timestamps are 33-bit counters.
pub const MAX_TS: i64 = 1 << 33;

/// Distance beyond which a jump is taken for a wrap.
pub const ROLLOVER_THRESHOLD: i64 = 1 << 32;

/// Unwraps 33-bit timestamps into a monotonic 64-bit timeline.
///
/// Each value is moved by multiples of 2^33 until it lies within 2^32 of the
/// reference, which is the last corrected DTS.
#[derive(Debug, Clone, Default)]
pub struct TimestampRollover {
    reference: Option<i64>,
}

impl TimestampRollover {
    /// Create a corrector with no reference yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Correct a PTS/DTS pair and advance the reference to the corrected DTS.
    pub fn correct(&mut self, pts: u64, dts: u64) -> (i64, i64) {
        let reference = *self.reference.get_or_insert(dts as i64);
        let dts = unwrap_timestamp(dts as i64, reference);
        let pts = unwrap_timestamp(pts as i64, reference);
        self.reference = Some(dts);
        (pts, dts)
    }

    /// Correct a lone timestamp without moving the reference.
    pub fn correct_one(&mut self, value: u64) -> i64 {
        match self.reference {
            Some(reference) => unwrap_timestamp(value as i64, reference),
            None => value as i64,
        }
    }

    /// Forget the reference.
    pub fn reset(&mut self) {
        self.reference = None;
    }
}

fn unwrap_timestamp(mut value: i64, reference: i64) -> i64 {
    let direction = if value > reference { -1 } else { 1 };
    while (reference - value).abs() > ROLLOVER_THRESHOLD {
        value += direction * MAX_TS;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_table_classification() {
        let mut table = ProgramTable::default();
        assert!(table.is_empty());
        table.insert(0x100, STREAM_TYPE_H264);
        table.insert(0x101, STREAM_TYPE_ADTS);
        table.insert(0x102, STREAM_TYPE_METADATA);
        table.insert(0x103, 0x06);

        assert_eq!(table.video, Some(0x100));
        assert_eq!(table.audio, Some(0x101));
        assert_eq!(table.timed_metadata.get(&0x102), Some(&STREAM_TYPE_METADATA));
        assert_eq!(table.timed_metadata.len(), 1);
    }

    #[test]
    fn test_rollover_passthrough() {
        let mut rollover = TimestampRollover::new();
        assert_eq!(rollover.correct(3000, 0), (3000, 0));
        assert_eq!(rollover.correct(6000, 3000), (6000, 3000));
    }

    #[test]
    fn test_rollover_wraps_forward() {
        let mut rollover = TimestampRollover::new();
        let near_end = (MAX_TS - 3000) as u64;
        assert_eq!(rollover.correct(near_end, near_end), (MAX_TS - 3000, MAX_TS - 3000));
        // The counter wrapped: 0 follows 2^33 - 3000.
        assert_eq!(rollover.correct(3000, 0), (MAX_TS + 3000, MAX_TS));
        assert_eq!(rollover.correct(6000, 3000), (MAX_TS + 6000, MAX_TS + 3000));
    }

    #[test]
    fn test_rollover_wraps_backward() {
        let mut rollover = TimestampRollover::new();
        rollover.correct(1000, 1000);
        // A late packet from before the wrap.
        assert_eq!(rollover.correct_one((MAX_TS - 1000) as u64), -1000);
    }

    #[test]
    fn test_rollover_reset() {
        let mut rollover = TimestampRollover::new();
        rollover.correct(0, 0);
        rollover.reset();
        let late = (MAX_TS - 10) as u64;
        assert_eq!(rollover.correct(late, late), (MAX_TS - 10, MAX_TS - 10));
    }
}
