//! MP4 muxing processor.

use super::{ContainerMuxer, MuxSample, TrackKind};
use crate::error::{Error, Result};
use crate::format::{SocketDescriptor, mime};
use crate::metadata::BufferProperties;
use crate::packet::{Packet, PacketSymbol};
use crate::processor::{Processor, ProcessorContext, SocketId};
use std::cell::RefCell;
use std::rc::Rc;

/// Counters for [`Mp4Mux`].
#[derive(Debug, Clone, Default)]
pub struct Mp4MuxStats {
    /// Video access units queued.
    pub video_samples: u64,
    /// Audio frames queued.
    pub audio_samples: u64,
    /// Keyframes queued.
    pub keyframes: u64,
    /// Payload bytes queued.
    pub bytes_in: u64,
    /// Container chunks emitted.
    pub chunks_out: u64,
    /// Container bytes emitted.
    pub bytes_out: u64,
}

/// Writes AAC and H.264 access units into a container.
///
/// Samples are queued until an EOS or FLUSH packet arrives. The container
/// is then finalized, every serialized chunk is sent as one `video/mp4`
/// packet and the symbol is forwarded.
///
/// Inputs are created in setup: index 0 takes video, index 1 takes audio.
pub struct Mp4Mux {
    muxer: Box<dyn ContainerMuxer>,
    output: Option<SocketId>,
    codecs_logged: bool,
    stats: Rc<RefCell<Mp4MuxStats>>,
}

impl Mp4Mux {
    /// Create a muxer writing progressive MP4.
    #[cfg(feature = "mp4-mux")]
    pub fn new() -> Self {
        Self::with_config(super::Mp4MuxConfig::default())
    }

    /// Create a progressive MP4 muxer with a configuration.
    #[cfg(feature = "mp4-mux")]
    pub fn with_config(config: super::Mp4MuxConfig) -> Self {
        Self::with_muxer(Box::new(super::Mp4FileMuxer::new(config)))
    }

    /// Create a muxer over any container engine.
    pub fn with_muxer(muxer: Box<dyn ContainerMuxer>) -> Self {
        Self {
            muxer,
            output: None,
            codecs_logged: false,
            stats: Rc::new(RefCell::new(Mp4MuxStats::default())),
        }
    }

    /// Shared handle to the counters.
    pub fn stats(&self) -> Rc<RefCell<Mp4MuxStats>> {
        Rc::clone(&self.stats)
    }

    fn finalize(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        let chunks = self.muxer.flush()?;
        if chunks.is_empty() {
            tracing::debug!("no samples queued, nothing to finalize");
            return Ok(());
        }
        let output = self
            .output
            .ok_or_else(|| Error::InvalidSocket("Mp4Mux has no output socket".into()))?;

        let codecs = self.muxer.codec_info().join(",");
        if !self.codecs_logged {
            tracing::info!(%codecs, "container codecs");
            self.codecs_logged = true;
        }
        let mime_type = if codecs.is_empty() {
            mime::VIDEO_MP4.to_string()
        } else {
            format!("{}; codecs=\"{}\"", mime::VIDEO_MP4, codecs)
        };

        for chunk in chunks {
            {
                let mut stats = self.stats.borrow_mut();
                stats.chunks_out += 1;
                stats.bytes_out += chunk.len() as u64;
            }
            tracing::debug!(bytes = chunk.len(), "emitting container chunk");
            ctx.transfer(output, Packet::from_bytes(chunk, BufferProperties::new(mime_type.clone())))?;
        }
        Ok(())
    }
}

#[cfg(feature = "mp4-mux")]
impl Default for Mp4Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Mp4Mux {
    fn name(&self) -> &str {
        "Mp4Mux"
    }

    fn input_descriptor(&self) -> SocketDescriptor {
        SocketDescriptor::from_mime_types([mime::AUDIO_AAC, mime::VIDEO_H264])
    }

    fn output_descriptor(&self) -> SocketDescriptor {
        SocketDescriptor::from_mime_types([mime::VIDEO_MP4])
    }

    fn setup(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        ctx.create_input(Some(SocketDescriptor::from_mime_types([mime::VIDEO_H264])))?;
        ctx.create_input(Some(SocketDescriptor::from_mime_types([mime::AUDIO_AAC])))?;
        self.output = Some(ctx.create_output(None)?);
        Ok(())
    }

    fn handle_symbol(&mut self, symbol: PacketSymbol) -> bool {
        !matches!(
            symbol,
            PacketSymbol::Eos | PacketSymbol::Flush | PacketSymbol::Void
        )
    }

    fn process(
        &mut self,
        ctx: &mut ProcessorContext<'_>,
        _input: SocketId,
        packet: Packet,
    ) -> Result<bool> {
        if packet.is_symbolic() {
            let symbol = packet.symbol();
            if matches!(symbol, PacketSymbol::Eos | PacketSymbol::Flush) {
                tracing::debug!(%symbol, "finalizing container");
                self.finalize(ctx)?;
            }
            ctx.transfer_to_all(packet);
            return Ok(true);
        }

        let sample = MuxSample::from_packet(packet)?;
        {
            let mut stats = self.stats.borrow_mut();
            match sample.kind {
                TrackKind::Video => stats.video_samples += 1,
                TrackKind::Audio => stats.audio_samples += 1,
            }
            if sample.is_keyframe {
                stats.keyframes += 1;
            }
            stats.bytes_in += sample.len() as u64;
        }
        self.muxer.push_sample(sample)?;
        Ok(true)
    }
}

impl std::fmt::Debug for Mp4Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4Mux")
            .field("output", &self.output)
            .field("stats", &self.stats.borrow())
            .finish()
    }
}
