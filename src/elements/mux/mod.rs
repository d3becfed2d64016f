//! Multiplexing elements.
//!
//! - [`Mp4Mux`]: processor writing AAC/H.264 access units into a container
//! - [`Mp4FileMuxer`]: progressive MP4 engine (requires `mp4-mux` feature)
//!
//! The processor talks to its engine through [`ContainerMuxer`].

#[cfg(feature = "mp4-mux")]
mod mp4;
mod mp4_mux;

#[cfg(feature = "mp4-mux")]
pub use mp4::{Mp4FileMuxer, Mp4MuxConfig};
pub use mp4_mux::{Mp4Mux, Mp4MuxStats};

use crate::buffer::BufferSlice;
use crate::error::{Error, Result};
use crate::metadata::BufferProperties;
use crate::packet::Packet;
use bytes::Bytes;
use std::sync::Arc;

/// Media class of a muxed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// H.264 video.
    Video,
    /// AAC audio.
    Audio,
}

/// One access unit queued for multiplexing.
#[derive(Debug, Clone)]
pub struct MuxSample {
    /// Track the sample belongs to.
    pub kind: TrackKind,
    /// Decoding timestamp in `timescale` units.
    pub dts: i64,
    /// Composition offset (PTS - DTS).
    pub cto: i64,
    /// Ticks per second of `dts` and `cto`.
    pub timescale: u32,
    /// Random access point.
    pub is_keyframe: bool,
    /// Payload: NAL units for video, raw AAC for audio.
    pub slices: Vec<BufferSlice>,
    /// Payload description of the first slice.
    pub props: Arc<BufferProperties>,
}

impl MuxSample {
    /// Convert a data packet into a sample.
    pub fn from_packet(packet: Packet) -> Result<Self> {
        let props = packet
            .default_payload_info()
            .cloned()
            .ok_or_else(|| Error::Mux(format!("packet {} has no payload description", packet)))?;
        let kind = if props.is_video() {
            TrackKind::Video
        } else if props.is_audio() {
            TrackKind::Audio
        } else {
            return Err(Error::UnsupportedPayload(props.mime_type.clone()));
        };

        Ok(Self {
            kind,
            dts: packet.timestamp(),
            cto: packet.presentation_time_offset(),
            timescale: packet.timescale(),
            is_keyframe: props.is_keyframe,
            slices: packet.into_slices(),
            props,
        })
    }

    /// Total payload size.
    pub fn len(&self) -> usize {
        BufferSlice::total_len(&self.slices)
    }

    /// Check if the sample carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A container engine driven by a muxer processor.
pub trait ContainerMuxer {
    /// Queue one access unit.
    fn push_sample(&mut self, sample: MuxSample) -> Result<()>;

    /// Finalize the queued samples into serialized chunks.
    ///
    /// Returns nothing when no sample is queued.
    fn flush(&mut self) -> Result<Vec<Bytes>>;

    /// RFC 6381 codec strings of the tracks seen so far.
    fn codec_info(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::mime;

    #[test]
    fn test_sample_from_video_packet() {
        let mut props = BufferProperties::new(mime::VIDEO_H264);
        props.is_keyframe = true;
        let slice = BufferSlice::from_bytes(vec![0x65, 0x88], Arc::new(props));
        let mut packet = Packet::from_slice(slice, 3000, 1500);
        packet.set_timescale(90_000).unwrap();

        let sample = MuxSample::from_packet(packet).unwrap();
        assert_eq!(sample.kind, TrackKind::Video);
        assert_eq!(sample.dts, 3000);
        assert_eq!(sample.cto, 1500);
        assert_eq!(sample.timescale, 90_000);
        assert!(sample.is_keyframe);
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn test_sample_rejects_other_payloads() {
        let packet = Packet::from_bytes(vec![1u8], BufferProperties::new(mime::APPLICATION_UNKNOWN));
        assert!(matches!(
            MuxSample::from_packet(packet),
            Err(Error::UnsupportedPayload(_))
        ));
        assert!(MuxSample::from_packet(Packet::new_eos()).is_err());
    }
}
