//! MPEG-TS demultiplexing processor.
//!
//! [`Mp2tsDemux`] feeds its single `video/mp2t` input through an
//! [`ElementaryStreamDemuxer`] and routes the results:
//!
//! - the first program table announces shadow output sockets, one per media
//!   class and one per timed-metadata PID
//! - AAC frames become one packet each
//! - H.264 NAL units are grouped into access units
//! - timed metadata is sent straight to a per-PID output
//!
//! Audio and video outputs are created on the first packet of their type.

use super::access_unit::{AccessUnitAssembler, AccessUnitStats};
use super::es::{
    AdtsFrameEvent, ElementaryStreamDemuxer, EsEvent, MPEG_TS_TIMESCALE_HZ, MetadataEvent,
    ProgramTable,
};
use crate::buffer::BufferSlice;
use crate::codec::adts::SAMPLES_PER_AAC_FRAME;
use crate::error::{Error, Result};
use crate::format::{SocketDescriptor, mime};
use crate::metadata::{BufferProperties, FourCc};
use crate::packet::{Packet, PacketSymbol};
use crate::processor::{Processor, ProcessorContext, ShadowOutputSocket, SocketId};
use crate::signal::{Signal, SignalMessage};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// Bit depth reported for decoded AAC.
const AAC_SAMPLE_DEPTH: u32 = 16;

/// Configuration for [`Mp2tsDemux`].
#[derive(Debug, Clone)]
pub struct Mp2tsDemuxConfig {
    /// Subtracted from every audio DTS. Zero when unset.
    pub audio_dts_offset: Option<i64>,
    /// Flush the pending access unit and buffered PES data on EOS/FLUSH.
    pub flush_on_eos: bool,
    /// Create outputs for timed-metadata streams.
    pub metadata_outputs: bool,
}

impl Default for Mp2tsDemuxConfig {
    fn default() -> Self {
        Self {
            audio_dts_offset: None,
            flush_on_eos: true,
            metadata_outputs: true,
        }
    }
}

impl Mp2tsDemuxConfig {
    /// Seed the audio DTS offset.
    pub fn with_audio_dts_offset(mut self, offset: i64) -> Self {
        self.audio_dts_offset = Some(offset);
        self
    }

    /// Enable or disable flushing on EOS/FLUSH.
    pub fn with_flush_on_eos(mut self, enabled: bool) -> Self {
        self.flush_on_eos = enabled;
        self
    }

    /// Enable or disable timed-metadata outputs.
    pub fn with_metadata_outputs(mut self, enabled: bool) -> Self {
        self.metadata_outputs = enabled;
        self
    }
}

/// Counters for [`Mp2tsDemux`].
#[derive(Debug, Clone, Default)]
pub struct Mp2tsDemuxStats {
    /// Input chunks processed.
    pub chunks: u64,
    /// Input bytes processed.
    pub bytes: u64,
    /// Audio packets emitted.
    pub audio_packets: u64,
    /// Video access units emitted.
    pub video_packets: u64,
    /// Timed-metadata packets emitted.
    pub metadata_packets: u64,
    /// Shadow output sockets announced.
    pub shadow_announcements: u64,
    /// Access-unit assembly counters.
    pub access_units: AccessUnitStats,
}

/// Transport-stream demultiplexer.
pub struct Mp2tsDemux {
    demuxer: Box<dyn ElementaryStreamDemuxer>,
    config: Mp2tsDemuxConfig,
    program_table: Option<ProgramTable>,
    audio_dts_offset: Option<i64>,
    assembler: AccessUnitAssembler,
    out_packets: Vec<Packet>,
    audio_output: Option<SocketId>,
    video_output: Option<SocketId>,
    metadata_outputs: BTreeMap<u16, SocketId>,
    stats: Rc<RefCell<Mp2tsDemuxStats>>,
}

impl Mp2tsDemux {
    /// Create a demuxer over the built-in transport-stream parser.
    #[cfg(feature = "mpeg-ts")]
    pub fn new() -> Self {
        Self::with_config(Mp2tsDemuxConfig::default())
    }

    /// Create a demuxer over the built-in parser with a configuration.
    #[cfg(feature = "mpeg-ts")]
    pub fn with_config(config: Mp2tsDemuxConfig) -> Self {
        Self::with_demuxer(Box::new(super::TsElementaryDemuxer::new()), config)
    }

    /// Create a demuxer over any elementary-stream parser.
    pub fn with_demuxer(demuxer: Box<dyn ElementaryStreamDemuxer>, config: Mp2tsDemuxConfig) -> Self {
        Self {
            demuxer,
            config,
            program_table: None,
            audio_dts_offset: None,
            assembler: AccessUnitAssembler::new(),
            out_packets: Vec::new(),
            audio_output: None,
            video_output: None,
            metadata_outputs: BTreeMap::new(),
            stats: Rc::new(RefCell::new(Mp2tsDemuxStats::default())),
        }
    }

    /// Shared handle to the counters; stays valid once the processor is
    /// owned by a pipeline.
    pub fn stats(&self) -> Rc<RefCell<Mp2tsDemuxStats>> {
        Rc::clone(&self.stats)
    }

    /// The cached program table.
    pub fn program_table(&self) -> Option<&ProgramTable> {
        self.program_table.as_ref()
    }

    fn handle_events(&mut self, ctx: &mut ProcessorContext<'_>, events: Vec<EsEvent>) -> Result<()> {
        for event in events {
            match event {
                EsEvent::ProgramTable(table) => self.on_program_table(ctx, table),
                EsEvent::Audio(frame) => self.on_audio(frame)?,
                EsEvent::Video(nalu) => {
                    if let Some(packet) = self.assembler.push(nalu)? {
                        self.out_packets.push(packet);
                    }
                }
                EsEvent::Metadata(metadata) => self.on_metadata(ctx, metadata)?,
            }
        }
        self.stats.borrow_mut().access_units = self.assembler.stats().clone();
        Ok(())
    }

    fn on_program_table(&mut self, ctx: &mut ProcessorContext<'_>, table: ProgramTable) {
        if self.program_table.is_some() {
            tracing::debug!("ignoring subsequent program table");
            return;
        }
        tracing::info!(
            audio = ?table.audio,
            video = ?table.video,
            metadata = table.timed_metadata.len(),
            "first program table"
        );

        let mut shadows = Vec::new();
        if let Some(pid) = table.audio {
            shadows.push((mime::AUDIO, pid));
        }
        if let Some(pid) = table.video {
            shadows.push((mime::VIDEO, pid));
        }
        if self.config.metadata_outputs {
            shadows.extend(table.timed_metadata.keys().map(|pid| (mime::APPLICATION, *pid)));
        }
        self.program_table = Some(table);

        for (class, pid) in shadows {
            ctx.announce_shadow(ShadowOutputSocket::new(
                SocketDescriptor::from_mime_types([class]),
                Some(pid as u32),
            ));
            self.stats.borrow_mut().shadow_announcements += 1;
        }
    }

    fn on_audio(&mut self, frame: AdtsFrameEvent) -> Result<()> {
        let offset = *self
            .audio_dts_offset
            .get_or_insert(self.config.audio_dts_offset.unwrap_or(0));

        let mut props = BufferProperties::new(mime::AUDIO_AAC)
            .with_codec(FourCc::MP4A)
            .with_samples_count(frame.sample_count);
        props.is_keyframe = true;
        props.elementary_stream_id = Some(frame.track_id as u32);
        props.details.sample_rate = frame.sample_rate;
        props.details.sample_depth = AAC_SAMPLE_DEPTH;
        props.details.num_channels = frame.channel_count as u32;
        props.details.samples_per_frame = SAMPLES_PER_AAC_FRAME;
        props.details.codec_profile = frame.audio_object_type as u32;

        let slice = BufferSlice::from_bytes(frame.data, Arc::new(props));
        let mut packet = Packet::from_slice(slice, frame.dts - offset, frame.pts - frame.dts);
        packet.set_timescale(MPEG_TS_TIMESCALE_HZ)?;
        self.out_packets.push(packet);
        Ok(())
    }

    fn on_metadata(&mut self, ctx: &mut ProcessorContext<'_>, metadata: MetadataEvent) -> Result<()> {
        let listed = self
            .program_table
            .as_ref()
            .is_some_and(|table| table.timed_metadata.contains_key(&metadata.track_id));
        if !listed || !self.config.metadata_outputs {
            return Ok(());
        }

        let mut props = BufferProperties::new(mime::APPLICATION_UNKNOWN);
        props.elementary_stream_id = Some(metadata.track_id as u32);
        let props = Arc::new(props);

        let slice = BufferSlice::from_bytes(metadata.data, Arc::clone(&props));
        let mut packet = match metadata.dts.or(metadata.pts) {
            Some(timestamp) => {
                let offset = match (metadata.pts, metadata.dts) {
                    (Some(pts), Some(dts)) => pts - dts,
                    _ => 0,
                };
                let mut packet = Packet::from_slice(slice, timestamp, offset);
                packet.set_timescale(MPEG_TS_TIMESCALE_HZ)?;
                packet
            }
            None => Packet::from_slice(slice, 0, 0),
        };
        packet.set_synchronization_id(metadata.track_id as u32);

        let output = match self.metadata_outputs.get(&metadata.track_id) {
            Some(output) => *output,
            None => {
                tracing::info!(pid = metadata.track_id, "creating timed-metadata output");
                let output = ctx.create_output(Some(SocketDescriptor::from_payloads([props])))?;
                self.metadata_outputs.insert(metadata.track_id, output);
                output
            }
        };
        self.stats.borrow_mut().metadata_packets += 1;
        ctx.transfer(output, packet)
    }

    /// Route queued packets to the audio and video outputs.
    fn drain(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        for packet in std::mem::take(&mut self.out_packets) {
            if packet.is_symbolic() {
                tracing::debug!(symbol = %packet.symbol(), "ignoring queued symbolic packet");
                continue;
            }
            let Some(info) = packet.default_payload_info().cloned() else {
                tracing::warn!(%packet, "packet has no payload description, dropping");
                continue;
            };

            let output = if info.is_video() {
                if info.is_bitstream_header {
                    tracing::debug!(tags = ?info.tags, "bitstream header access unit");
                }
                self.stats.borrow_mut().video_packets += 1;
                match self.video_output {
                    Some(output) => output,
                    None => {
                        tracing::info!(mime_type = %info.mime_type, "creating video output");
                        let output = ctx.create_output(Some(SocketDescriptor::from_payloads([info])))?;
                        self.video_output = Some(output);
                        output
                    }
                }
            } else if info.is_audio() {
                self.stats.borrow_mut().audio_packets += 1;
                match self.audio_output {
                    Some(output) => output,
                    None => {
                        tracing::info!(mime_type = %info.mime_type, "creating audio output");
                        let output = ctx.create_output(Some(SocketDescriptor::from_payloads([info])))?;
                        self.audio_output = Some(output);
                        output
                    }
                }
            } else {
                return Err(Error::UnsupportedPayload(info.mime_type.clone()));
            };

            ctx.transfer(output, packet)?;
        }
        Ok(())
    }

    fn flush(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        let events = self.demuxer.flush()?;
        self.handle_events(ctx, events)?;
        if let Some(packet) = self.assembler.flush()? {
            self.out_packets.push(packet);
        }
        self.stats.borrow_mut().access_units = self.assembler.stats().clone();
        self.drain(ctx)
    }
}

#[cfg(feature = "mpeg-ts")]
impl Default for Mp2tsDemux {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Mp2tsDemux {
    fn name(&self) -> &str {
        "Mp2tsDemux"
    }

    fn input_descriptor(&self) -> SocketDescriptor {
        SocketDescriptor::from_mime_types([mime::VIDEO_MP2T])
    }

    fn output_descriptor(&self) -> SocketDescriptor {
        SocketDescriptor::from_mime_types([
            mime::AUDIO_MPEG,
            mime::AUDIO_AAC,
            mime::VIDEO_H264,
            mime::APPLICATION_CEA608,
        ])
    }

    fn setup(&mut self, ctx: &mut ProcessorContext<'_>) -> Result<()> {
        ctx.create_input(None)?;
        Ok(())
    }

    fn handle_symbol(&mut self, symbol: PacketSymbol) -> bool {
        match symbol {
            PacketSymbol::Eos | PacketSymbol::Flush if self.config.flush_on_eos => false,
            other => other != PacketSymbol::Void,
        }
    }

    fn handle_signal(&mut self, signal: &Signal) -> bool {
        if matches!(signal.message(), SignalMessage::Reset) {
            tracing::debug!("resetting demuxer state");
            self.demuxer.reset();
            self.assembler.reset();
            self.out_packets.clear();
        }
        false
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
                tracing::debug!(%symbol, "flushing before forwarding symbol");
                self.flush(ctx)?;
            }
            ctx.transfer_to_all(packet);
            return Ok(true);
        }

        {
            let mut stats = self.stats.borrow_mut();
            stats.chunks += 1;
            stats.bytes += packet.total_bytes() as u64;
        }
        tracing::trace!(bytes = packet.total_bytes(), "feeding demuxer");

        for slice in packet.slices() {
            let events = self.demuxer.push(slice.as_bytes())?;
            self.handle_events(ctx, events)?;
        }
        self.drain(ctx)?;
        Ok(true)
    }
}

impl std::fmt::Debug for Mp2tsDemux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp2tsDemux")
            .field("config", &self.config)
            .field("program_table", &self.program_table)
            .field("pending_nal_units", &self.assembler.pending())
            .field("audio_output", &self.audio_output)
            .field("video_output", &self.video_output)
            .finish()
    }
}
