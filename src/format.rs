//! Payload capabilities and socket descriptors.
//!
//! A [`SocketDescriptor`] lists the payloads a socket accepts (inputs) or
//! produces (outputs). Each entry is either a MIME pattern (`video/avc`, or a
//! bare type prefix like `audio`) or a fully specified payload description
//! carrying [`BufferProperties`].

use crate::metadata::BufferProperties;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Well-known MIME types and matching helpers.
pub mod mime {
    /// Audio type prefix.
    pub const AUDIO: &str = "audio";
    /// Video type prefix.
    pub const VIDEO: &str = "video";
    /// Application type prefix.
    pub const APPLICATION: &str = "application";
    /// Text type prefix.
    pub const TEXT: &str = "text";

    /// MPEG transport stream.
    pub const VIDEO_MP2T: &str = "video/mp2t";
    /// H.264 elementary stream, one access unit per packet.
    pub const VIDEO_H264: &str = "video/avc";
    /// MP4 container bytes.
    pub const VIDEO_MP4: &str = "video/mp4";
    /// AAC frames.
    pub const AUDIO_AAC: &str = "audio/aac";
    /// MPEG audio.
    pub const AUDIO_MPEG: &str = "audio/mpeg";
    /// CEA-608 captions.
    pub const APPLICATION_CEA608: &str = "application/cea-608";
    /// Opaque timed metadata.
    pub const APPLICATION_UNKNOWN: &str = "application/unknown";

    /// Strip parameters (`; codecs=...`) and surrounding whitespace.
    pub fn essence(mime: &str) -> &str {
        mime.split(';').next().unwrap_or(mime).trim()
    }

    /// Top-level type of a MIME string (`video` for `video/avc`).
    pub fn top_level(mime: &str) -> &str {
        let essence = essence(mime);
        essence.split('/').next().unwrap_or(essence)
    }

    /// Check whether `mime` belongs to the top-level type `prefix`.
    pub fn has_prefix(mime: &str, prefix: &str) -> bool {
        top_level(mime).eq_ignore_ascii_case(prefix)
    }

    /// Check whether two MIME patterns match.
    ///
    /// Patterns match on equal essence, or when one of them is a bare type
    /// prefix (no `/`) naming the other's top-level type.
    pub fn matches(a: &str, b: &str) -> bool {
        let (a, b) = (essence(a), essence(b));
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        match (a.contains('/'), b.contains('/')) {
            (false, true) => has_prefix(b, a),
            (true, false) => has_prefix(a, b),
            _ => false,
        }
    }
}

/// One acceptable payload of a socket.
#[derive(Clone, Debug, PartialEq)]
pub struct PayloadDescription {
    mime_type: String,
    properties: Option<Arc<BufferProperties>>,
}

impl PayloadDescription {
    /// A MIME pattern without further properties.
    pub fn mime(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            properties: None,
        }
    }

    /// A fully specified payload.
    pub fn from_properties(properties: Arc<BufferProperties>) -> Self {
        Self {
            mime_type: properties.mime_type.clone(),
            properties: Some(properties),
        }
    }

    /// The MIME pattern.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Full properties, when specified.
    pub fn properties(&self) -> Option<&Arc<BufferProperties>> {
        self.properties.as_ref()
    }

    /// Check whether two descriptions can describe the same payload.
    pub fn compatible(&self, other: &PayloadDescription) -> bool {
        mime::matches(&self.mime_type, &other.mime_type)
    }
}

/// Capability declaration of a socket.
///
/// An empty descriptor accepts anything.
///
/// # Example
///
/// ```rust
/// use mediaflow::format::{SocketDescriptor, mime};
///
/// let producer = SocketDescriptor::from_mime_types([mime::VIDEO_H264]);
/// let consumer = SocketDescriptor::from_mime_types([mime::VIDEO]);
/// assert!(producer.intersects(&consumer));
///
/// let audio_only = SocketDescriptor::from_mime_types([mime::AUDIO_AAC]);
/// assert!(!producer.intersects(&audio_only));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SocketDescriptor(SmallVec<[PayloadDescription; 2]>);

impl SocketDescriptor {
    /// A descriptor that accepts any payload.
    pub fn any() -> Self {
        Self(SmallVec::new())
    }

    /// Build from MIME patterns.
    pub fn from_mime_types<S: Into<String>>(mime_types: impl IntoIterator<Item = S>) -> Self {
        Self(mime_types.into_iter().map(PayloadDescription::mime).collect())
    }

    /// Build from fully specified payloads.
    pub fn from_payloads(payloads: impl IntoIterator<Item = Arc<BufferProperties>>) -> Self {
        Self(
            payloads
                .into_iter()
                .map(PayloadDescription::from_properties)
                .collect(),
        )
    }

    /// Is this "any payload"?
    #[inline]
    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    /// The declared payloads, in preference order.
    #[inline]
    pub fn payloads(&self) -> &[PayloadDescription] {
        &self.0
    }

    /// The declared MIME patterns.
    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(PayloadDescription::mime_type)
    }

    /// Check whether a producer with this descriptor can feed a consumer with
    /// `other`: at least one payload on each side must match.
    pub fn intersects(&self, other: &SocketDescriptor) -> bool {
        if self.is_any() || other.is_any() {
            return true;
        }
        self.0
            .iter()
            .any(|a| other.0.iter().any(|b| a.compatible(b)))
    }

    /// Check whether `mime_type` is acceptable.
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.is_any() || self.mime_types().any(|m| mime::matches(m, mime_type))
    }
}

impl fmt::Display for SocketDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("ANY");
        }
        let mut first = true;
        for mime_type in self.mime_types() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(mime_type)?;
            first = false;
        }
        Ok(())
    }
}
