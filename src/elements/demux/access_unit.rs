//! H.264 access-unit reassembly.
//!
//! NAL units arrive as a flat sequence. Access-unit delimiters mark
//! boundaries when present; otherwise a boundary is inferred from timestamp
//! progress and header/slice transitions.

use super::es::{H264NaluEvent, MPEG_TS_TIMESCALE_HZ};
use crate::buffer::BufferSlice;
use crate::codec::h264::{NALU_TAG, NalUnitType, VideoConfig};
use crate::error::Result;
use crate::format::mime;
use crate::metadata::{BufferProperties, FourCc};
use crate::packet::Packet;
use std::sync::Arc;

/// Counters for access-unit assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessUnitStats {
    /// Access units emitted.
    pub access_units: u64,
    /// NAL units dropped because no SPS had been seen.
    pub dropped_before_config: u64,
    /// Filler-data units dropped.
    pub dropped_filler: u64,
    /// SEI units dropped.
    pub dropped_sei: u64,
    /// IDR slices seen before any PPS.
    pub idr_without_pps: u64,
}

#[derive(Debug)]
struct QueuedUnit {
    nalu: H264NaluEvent,
    is_header: bool,
    is_keyframe: bool,
    is_delimiter: bool,
}

/// Groups NAL units into access-unit packets.
#[derive(Debug, Default)]
pub struct AccessUnitAssembler {
    video_config: Option<VideoConfig>,
    got_pps: bool,
    first_keyframe_dts: Option<i64>,
    pending: Vec<QueuedUnit>,
    stats: AccessUnitStats,
}

impl AccessUnitAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a NAL unit. Returns the previous access unit if this unit
    /// completed it.
    pub fn push(&mut self, nalu: H264NaluEvent) -> Result<Option<Packet>> {
        if let Some(config) = nalu.config {
            if self.video_config != Some(config) {
                tracing::info!(
                    width = config.width,
                    height = config.height,
                    profile = config.profile_idc,
                    level = config.level_idc,
                    "video configuration"
                );
            }
            self.video_config = Some(config);
        }
        if self.video_config.is_none() {
            tracing::warn!(
                pid = nalu.track_id,
                nal_unit_type = nalu.nal_unit_type.id(),
                "dropping video data before codec configuration"
            );
            self.stats.dropped_before_config += 1;
            return Ok(None);
        }

        match nalu.nal_unit_type {
            NalUnitType::FillerData => {
                self.stats.dropped_filler += 1;
                return Ok(None);
            }
            NalUnitType::Sei => {
                self.stats.dropped_sei += 1;
                return Ok(None);
            }
            NalUnitType::Pps => self.got_pps = true,
            NalUnitType::IdrSlice => {
                self.first_keyframe_dts.get_or_insert(nalu.dts);
                if !self.got_pps {
                    tracing::warn!(pid = nalu.track_id, dts = nalu.dts, "IDR slice without a PPS");
                    self.stats.idr_without_pps += 1;
                }
            }
            _ => {}
        }

        let next = QueuedUnit {
            is_header: nalu.nal_unit_type.is_parameter_set(),
            is_keyframe: nalu.nal_unit_type == NalUnitType::IdrSlice,
            is_delimiter: nalu.nal_unit_type == NalUnitType::AccessUnitDelimiter,
            nalu,
        };

        let completed = if self.should_flush(&next) {
            self.flush()?
        } else {
            None
        };
        self.pending.push(next);
        Ok(completed)
    }

    fn should_flush(&self, next: &QueuedUnit) -> bool {
        let (Some(first), Some(last)) = (self.pending.first(), self.pending.last()) else {
            return false;
        };
        let any_delimiter = first.is_delimiter || last.is_delimiter || next.is_delimiter;
        let undelimited_progress =
            next.nalu.pts - first.nalu.pts > 0 && !next.is_keyframe && !any_delimiter;

        undelimited_progress
            || next.is_delimiter
            || (!last.is_delimiter && first.is_header != next.is_header)
    }

    /// Emit the pending units as one access unit.
    pub fn flush(&mut self) -> Result<Option<Packet>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let units = std::mem::take(&mut self.pending);
        self.build(units).map(Some)
    }

    fn build(&mut self, units: Vec<QueuedUnit>) -> Result<Packet> {
        let (track_id, dts, pts) = match units.first() {
            Some(first) => (first.nalu.track_id, first.nalu.dts, first.nalu.pts),
            None => (0, 0, 0),
        };

        let mut props = BufferProperties::new(mime::VIDEO_H264)
            .with_codec(FourCc::AVC1)
            .with_samples_count(1)
            .with_tag(NALU_TAG);
        props.elementary_stream_id = Some(track_id as u32);
        props.details.samples_per_frame = 1;
        if let Some(config) = &self.video_config {
            props.details.width = config.width;
            props.details.height = config.height;
            props.details.codec_profile = config.profile_idc as u32;
        }
        for unit in &units {
            props.is_keyframe |= unit.is_keyframe;
            props.is_bitstream_header |= unit.is_header;
            if let Some(tag) = unit.nalu.nal_unit_type.tag() {
                props.tags.insert(tag.to_string());
            }
        }
        let props = Arc::new(props);

        let count = units.len();
        let slices = units
            .into_iter()
            .map(|unit| BufferSlice::from_bytes(unit.nalu.data, Arc::clone(&props)));
        let mut packet = Packet::from_slices(dts, pts - dts, slices);
        packet.set_timescale(MPEG_TS_TIMESCALE_HZ)?;

        self.stats.access_units += 1;
        tracing::debug!(
            pid = track_id,
            dts,
            nal_units = count,
            keyframe = props.is_keyframe,
            header = props.is_bitstream_header,
            "access unit"
        );
        Ok(packet)
    }

    /// Number of queued NAL units.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The most recent codec configuration.
    pub fn video_config(&self) -> Option<&VideoConfig> {
        self.video_config.as_ref()
    }

    /// DTS of the first IDR slice seen.
    pub fn first_keyframe_dts(&self) -> Option<i64> {
        self.first_keyframe_dts
    }

    /// Counters.
    pub fn stats(&self) -> &AccessUnitStats {
        &self.stats
    }

    /// Drop queued units and forget the configuration.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
