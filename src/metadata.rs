//! Buffer properties: the decode/display metadata attached to buffer slices.
//!
//! A [`BufferProperties`] record is normally wrapped in an `Arc` and shared by
//! every slice of one logical payload (for example all NAL units of one access
//! unit). Shared properties are treated as immutable: code that needs different
//! properties builds a new record instead of mutating the shared one.

use std::collections::BTreeSet;
use std::fmt;

use crate::format::mime;

/// Four-character codec code (`avc1`, `mp4a`, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// H.264 / AVC video.
    pub const AVC1: Self = Self(*b"avc1");
    /// MPEG-4 audio (AAC).
    pub const MP4A: Self = Self(*b"mp4a");

    /// Create from raw bytes.
    pub const fn new(code: [u8; 4]) -> Self {
        Self(code)
    }

    /// Get the code as a string, `????` when not ASCII.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self.as_str())
    }
}

/// Media-specific details. Audio payloads use the sample fields, video
/// payloads the picture fields; unused fields stay zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadDetails {
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per audio sample.
    pub sample_depth: u32,
    /// Number of audio channels.
    pub num_channels: u32,
    /// Samples carried per coded audio frame.
    pub samples_per_frame: u32,
    /// Codec profile (AAC audio object type, H.264 `profile_idc`).
    pub codec_profile: u32,
    /// Picture width in pixels.
    pub width: u32,
    /// Picture height in pixels.
    pub height: u32,
}

/// Properties of the payload a buffer slice carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferProperties {
    /// MIME type, e.g. `video/avc` or `audio/aac`.
    pub mime_type: String,
    /// Codec four-character code.
    pub codec: Option<FourCc>,
    /// The payload can be decoded without earlier data.
    pub is_keyframe: bool,
    /// The payload holds codec configuration (parameter sets).
    pub is_bitstream_header: bool,
    /// Duration of one sample, in the owning packet's timescale.
    pub sample_duration: Option<u32>,
    /// Number of samples in the payload.
    pub samples_count: u32,
    /// Media-specific details.
    pub details: PayloadDetails,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
    /// Elementary stream the payload came from.
    pub elementary_stream_id: Option<u32>,
}

impl BufferProperties {
    /// Create properties for the given MIME type.
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Set the sample count.
    pub fn with_samples_count(mut self, count: u32) -> Self {
        self.samples_count = count;
        self
    }

    /// Set the codec code.
    pub fn with_codec(mut self, codec: FourCc) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Check for a tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Payload is audio.
    pub fn is_audio(&self) -> bool {
        mime::has_prefix(&self.mime_type, mime::AUDIO)
    }

    /// Payload is video.
    pub fn is_video(&self) -> bool {
        mime::has_prefix(&self.mime_type, mime::VIDEO)
    }
}
