//! ADTS (Audio Data Transport Stream) framing for AAC.

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};

/// Sample rates indexed by `sampling_frequency_index`.
pub const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// PCM samples decoded from one raw AAC data block.
pub const SAMPLES_PER_AAC_FRAME: u32 = 1024;

/// Length of an ADTS header without CRC.
pub const HEADER_LEN: usize = 7;

/// Length of an ADTS header with CRC.
pub const HEADER_LEN_WITH_CRC: usize = 9;

/// Parsed fixed and variable ADTS header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// No CRC follows the header.
    pub protection_absent: bool,
    /// MPEG-4 audio object type (profile + 1).
    pub audio_object_type: u8,
    /// Index into [`SAMPLING_FREQUENCIES`].
    pub sampling_frequency_index: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel configuration.
    pub channel_count: u8,
    /// Frame length including the header.
    pub frame_length: usize,
    /// Raw data blocks in the frame, minus one.
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    /// Parse a header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::Bitstream(format!(
                "ADTS header needs {} bytes, got {}",
                HEADER_LEN,
                data.len()
            )));
        }
        if data[0] != 0xff || data[1] & 0xf6 != 0xf0 {
            return Err(Error::Bitstream("missing ADTS sync word".into()));
        }

        let protection_absent = data[1] & 0x01 == 1;
        let audio_object_type = (data[2] >> 6) + 1;
        let sampling_frequency_index = (data[2] >> 2) & 0x0f;
        let channel_count = ((data[2] & 0x01) << 2) | (data[3] >> 6);
        let frame_length = (((data[3] & 0x03) as usize) << 11)
            | ((data[4] as usize) << 3)
            | ((data[5] as usize) >> 5);
        let raw_data_blocks = data[6] & 0x03;

        let sample_rate = SAMPLING_FREQUENCIES
            .get(sampling_frequency_index as usize)
            .copied()
            .ok_or_else(|| {
                Error::Bitstream(format!(
                    "invalid ADTS sampling frequency index {}",
                    sampling_frequency_index
                ))
            })?;

        let header = Self {
            protection_absent,
            audio_object_type,
            sampling_frequency_index,
            sample_rate,
            channel_count,
            frame_length,
            raw_data_blocks,
        };
        if frame_length < header.header_len() {
            return Err(Error::Bitstream(format!(
                "ADTS frame length {} shorter than its header",
                frame_length
            )));
        }
        Ok(header)
    }

    /// Header length, including the CRC when present.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            HEADER_LEN
        } else {
            HEADER_LEN_WITH_CRC
        }
    }

    /// Number of PCM samples the frame decodes to.
    pub fn sample_count(&self) -> u32 {
        (self.raw_data_blocks as u32 + 1) * SAMPLES_PER_AAC_FRAME
    }

    /// Duration of frame `index` of a run, as an offset in `timescale` ticks
    /// from the run's first frame.
    pub fn frame_offset(&self, index: u64, timescale: u32) -> i64 {
        (index * SAMPLES_PER_AAC_FRAME as u64 * timescale as u64 / self.sample_rate as u64) as i64
    }
}

/// One AAC frame with its header stripped.
#[derive(Debug, Clone)]
pub struct AdtsFrame {
    /// The frame's header.
    pub header: AdtsHeader,
    /// Raw AAC payload.
    pub data: Bytes,
}

/// Splits a byte stream into ADTS frames.
///
/// Bytes of an incomplete trailing frame are kept and completed by the next
/// push. Bytes before a sync word are skipped.
#[derive(Debug, Default)]
pub struct AdtsSplitter {
    pending: BytesMut,
}

impl AdtsSplitter {
    /// Create an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add data and return every complete frame.
    pub fn push(&mut self, data: Bytes) -> Vec<AdtsFrame> {
        let buf = if self.pending.is_empty() {
            data
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(&data);
            joined.freeze()
        };

        let mut frames = Vec::new();
        let mut pos = 0;
        let mut skipped = 0usize;
        while pos + HEADER_LEN <= buf.len() {
            let header = match AdtsHeader::parse(&buf[pos..]) {
                Ok(header) => header,
                Err(_) => {
                    pos += 1;
                    skipped += 1;
                    continue;
                }
            };
            let end = pos + header.frame_length;
            if end > buf.len() {
                break;
            }
            frames.push(AdtsFrame {
                header,
                data: buf.slice(pos + header.header_len()..end),
            });
            pos = end;
        }

        if skipped > 0 {
            tracing::debug!(skipped, "skipped bytes while searching for ADTS sync word");
        }
        self.pending = BytesMut::from(&buf[pos..]);
        frames
    }

    /// Bytes waiting for the rest of their frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop pending bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
