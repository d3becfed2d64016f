//! H.264 bitstream helpers.
//!
//! NAL unit classification, Annex-B splitting, SPS parsing (via
//! `h264_reader`) and construction of NAL units and AVCC access units.

use crate::buffer::BufferSlice;
use crate::error::{Error, Result};
use crate::metadata::BufferProperties;
use bytes::{BufMut, Bytes, BytesMut};
use h264_reader::nal::sps::SeqParameterSet;
use h264_reader::rbsp::BitReader;
use std::borrow::Cow;
use std::sync::Arc;

/// Tag carried by every NAL-unit payload.
pub const NALU_TAG: &str = "nalu";

/// NAL unit type (the low five bits of the NAL header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalUnitType {
    /// Coded slice of a non-IDR picture.
    NonIdrSlice,
    /// Slice data partition A.
    PartitionA,
    /// Slice data partition B.
    PartitionB,
    /// Slice data partition C.
    PartitionC,
    /// Coded slice of an IDR picture.
    IdrSlice,
    /// Supplemental enhancement information.
    Sei,
    /// Sequence parameter set.
    Sps,
    /// Picture parameter set.
    Pps,
    /// Access unit delimiter.
    AccessUnitDelimiter,
    /// End of sequence.
    EndOfSequence,
    /// End of stream.
    EndOfStream,
    /// Filler data.
    FillerData,
    /// Any other type.
    Other(u8),
}

impl NalUnitType {
    /// Classify a raw type value (only the low five bits are used).
    pub fn from_id(id: u8) -> Self {
        match id & 0x1f {
            1 => Self::NonIdrSlice,
            2 => Self::PartitionA,
            3 => Self::PartitionB,
            4 => Self::PartitionC,
            5 => Self::IdrSlice,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            other => Self::Other(other),
        }
    }

    /// Classify from the first byte of a NAL unit.
    pub fn from_header(header: u8) -> Self {
        Self::from_id(header)
    }

    /// The raw type value.
    pub fn id(&self) -> u8 {
        match self {
            Self::NonIdrSlice => 1,
            Self::PartitionA => 2,
            Self::PartitionB => 3,
            Self::PartitionC => 4,
            Self::IdrSlice => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::AccessUnitDelimiter => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::Other(id) => *id,
        }
    }

    /// Per-type tag attached to access units containing this type.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::AccessUnitDelimiter => Some("aud"),
            Self::Sps => Some("sps"),
            Self::Pps => Some("pps"),
            Self::IdrSlice => Some("idr"),
            Self::Sei => Some("sei"),
            Self::FillerData => Some("filler"),
            _ => None,
        }
    }

    /// SPS or PPS.
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

/// Picture parameters from a sequence parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoConfig {
    /// Width in pixels, after frame cropping.
    pub width: u32,
    /// Height in pixels, after frame cropping.
    pub height: u32,
    /// `profile_idc`.
    pub profile_idc: u8,
    /// `level_idc`.
    pub level_idc: u8,
}

/// Split an Annex-B byte stream into NAL units without copying.
///
/// Start codes (3 or 4 bytes) are not part of the returned units.
pub fn split_annex_b(data: &Bytes) -> Vec<Bytes> {
    let mut units = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let start = if data[i..].starts_with(&[0, 0, 0, 1]) {
            i + 4
        } else if data[i..].starts_with(&[0, 0, 1]) {
            i + 3
        } else {
            i += 1;
            continue;
        };

        let mut end = start;
        while end + 3 <= data.len() {
            if data[end..].starts_with(&[0, 0, 1]) || data[end..].starts_with(&[0, 0, 0, 1]) {
                break;
            }
            end += 1;
        }
        if end + 3 > data.len() {
            end = data.len();
        }

        if start < end {
            units.push(data.slice(start..end));
        }
        i = end;
    }

    units
}

/// Remove `emulation_prevention_three_byte`s, turning NAL payload into RBSP.
pub fn strip_emulation_prevention(data: &[u8]) -> Cow<'_, [u8]> {
    let escaped = data
        .windows(3)
        .any(|w| w == [0, 0, 3]);
    if !escaped {
        return Cow::Borrowed(data);
    }

    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 3 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }
    Cow::Owned(out)
}

/// Insert `emulation_prevention_three_byte`s so RBSP can be carried in a NAL unit.
pub fn add_emulation_prevention(rbsp: &[u8]) -> Cow<'_, [u8]> {
    let needs_escape = rbsp.windows(3).any(|w| w[0] == 0 && w[1] == 0 && w[2] <= 3);
    if !needs_escape {
        return Cow::Borrowed(rbsp);
    }

    let mut out = Vec::with_capacity(rbsp.len() + rbsp.len() / 64 + 1);
    let mut zeros = 0;
    for &byte in rbsp {
        if zeros >= 2 && byte <= 3 {
            out.push(3);
            zeros = 0;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }
    Cow::Owned(out)
}

/// Parse a sequence parameter set NAL unit (header byte included).
pub fn parse_sps(nal: &[u8]) -> Result<VideoConfig> {
    if nal.len() < 4 {
        return Err(Error::Bitstream("SPS too short".into()));
    }
    if NalUnitType::from_header(nal[0]) != NalUnitType::Sps {
        return Err(Error::Bitstream(format!(
            "expected SPS, got NAL unit type {}",
            nal[0] & 0x1f
        )));
    }

    let rbsp = strip_emulation_prevention(&nal[1..]);
    let sps = SeqParameterSet::from_bits(BitReader::new(&rbsp[..]))
        .map_err(|e| Error::Bitstream(format!("failed to parse SPS: {:?}", e)))?;

    let (width, height) = sps
        .pixel_dimensions()
        .map_err(|e| Error::Bitstream(format!("invalid SPS dimensions: {:?}", e)))?;

    Ok(VideoConfig {
        width,
        height,
        profile_idc: sps.profile_idc.into(),
        level_idc: sps.level_idc,
    })
}

/// Build a NAL unit from RBSP payload.
///
/// The header byte is `(nal_ref_idc << 5) | nal_unit_type`. Types 14 and 20
/// carry a three-byte header extension, which must then be supplied.
/// The result keeps `rbsp`'s properties handle.
pub fn make_nalu_from_rbsp(
    rbsp: &BufferSlice,
    nal_unit_type: u8,
    nal_ref_idc: u8,
    extension: Option<[u8; 3]>,
) -> Result<BufferSlice> {
    if nal_unit_type >= 32 {
        return Err(Error::Bitstream(format!(
            "NAL unit type {} out of range",
            nal_unit_type
        )));
    }
    if nal_ref_idc >= 4 {
        return Err(Error::Bitstream(format!(
            "nal_ref_idc {} out of range",
            nal_ref_idc
        )));
    }

    let mut header = BytesMut::with_capacity(4);
    header.put_u8((nal_ref_idc << 5) | nal_unit_type);
    match (nal_unit_type, extension) {
        (14 | 20, Some(ext)) => header.put_slice(&ext),
        (14 | 20, None) => {
            return Err(Error::Bitstream(format!(
                "NAL unit type {} requires a 3-byte header extension",
                nal_unit_type
            )));
        }
        _ => {}
    }

    let props = Arc::clone(rbsp.props());
    match add_emulation_prevention(rbsp.as_bytes()) {
        Cow::Borrowed(_) => {
            let header = BufferSlice::from_bytes(header.freeze(), Arc::clone(&props));
            Ok(rbsp.prepend(&header, props))
        }
        Cow::Owned(escaped) => {
            header.put_slice(&escaped);
            Ok(BufferSlice::from_bytes(header.freeze(), props))
        }
    }
}

/// Build an AVCC access unit: every NAL unit prefixed by its 4-byte
/// big-endian length. Copies into one new backing buffer.
pub fn make_avcc_access_unit<'a>(
    nalus: impl IntoIterator<Item = &'a BufferSlice>,
    props: Arc<BufferProperties>,
) -> BufferSlice {
    let mut out = BytesMut::new();
    for nalu in nalus {
        out.put_u32(nalu.len() as u32);
        out.put_slice(nalu.as_bytes());
    }
    BufferSlice::from_bytes(out.freeze(), props)
}

/// List the NAL unit types of a length-prefixed (AVCC) access unit.
///
/// Malformed data is logged and whatever was recognized before it returned.
pub fn inspect_access_unit(access_unit: &BufferSlice) -> Vec<NalUnitType> {
    let mut types = Vec::new();
    let mut offset = 0;
    let total = access_unit.len();

    while offset + 4 <= total {
        let Ok(length) = access_unit.read_u32_be(offset) else {
            break;
        };
        let start = offset + 4;
        let length = length as usize;
        if length == 0 || length > total - start {
            tracing::warn!(
                offset,
                length,
                total,
                "no NALUs found at offset, data is not a length-prefixed access unit"
            );
            break;
        }
        types.push(NalUnitType::from_header(access_unit.as_bytes()[start]));
        offset = start + length;
    }

    if types.is_empty() {
        tracing::warn!(total, "no NALUs found in access unit");
    }
    types
}
