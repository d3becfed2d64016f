//! MPEG transport stream parsing.
//!
//! [`TsElementaryDemuxer`] drives `mpeg2ts-reader` over arbitrarily split
//! input, reassembles PES packets per elementary PID and turns them into
//! [`EsEvent`]s: H.264 payloads are split into NAL units, ADTS payloads into
//! AAC frames, and timestamps are unwrapped across 33-bit rollover.
//!
//! # Example
//!
//! ```rust,no_run
//! use mediaflow::elements::demux::{ElementaryStreamDemuxer, EsEvent, TsElementaryDemuxer};
//!
//! # fn read_chunk() -> Option<Vec<u8>> { None }
//! let mut demux = TsElementaryDemuxer::new();
//! while let Some(chunk) = read_chunk() {
//!     for event in demux.push(&chunk).unwrap() {
//!         if let EsEvent::ProgramTable(table) = event {
//!             println!("video pid: {:?}", table.video);
//!         }
//!     }
//! }
//! ```

use super::es::{
    AdtsFrameEvent, ElementaryStreamDemuxer, EsEvent, H264NaluEvent, MPEG_TS_TIMESCALE_HZ,
    MetadataEvent, ProgramTable, STREAM_TYPE_ADTS, STREAM_TYPE_H264, STREAM_TYPE_METADATA,
    TimestampRollover,
};
use crate::codec::adts::AdtsSplitter;
use crate::codec::h264::{self, NalUnitType};
use crate::error::Result;

use bytes::{Bytes, BytesMut};
use mpeg2ts_reader::demultiplex::{
    self, DemuxContext, FilterChangeset, FilterRequest, NullPacketFilter, PacketFilter,
    PatPacketFilter, PmtPacketFilter,
};
use mpeg2ts_reader::pes::{self, ElementaryStreamConsumer, PesContents, PesHeader};
use mpeg2ts_reader::psi::pat::PAT_PID;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// Size of a single MPEG-TS packet.
pub const TS_PACKET_SIZE: usize = 188;

const SYNC_BYTE: u8 = 0x47;

// ============================================================================
// Statistics
// ============================================================================

/// Statistics for the TS demuxer.
#[derive(Debug, Clone, Default)]
pub struct TsDemuxStats {
    /// Total TS packets processed.
    pub packets_processed: u64,
    /// Total bytes processed.
    pub bytes_processed: u64,
    /// PES packets reassembled.
    pub pes_packets: u64,
    /// H.264 NAL units extracted.
    pub video_nal_units: u64,
    /// AAC frames extracted.
    pub audio_frames: u64,
    /// Timed-metadata payloads extracted.
    pub metadata_payloads: u64,
    /// Input chunks that did not start on a sync byte.
    pub sync_errors: u64,
    /// PES packets discarded after a continuity error.
    pub continuity_errors: u64,
}

// ============================================================================
// Output queue (shared between the parser callbacks and the demuxer)
// ============================================================================

/// Raw output of the transport layer.
#[derive(Debug)]
enum Collected {
    /// A PMT entry.
    Stream { pid: u16, stream_type: u8 },
    /// A complete PES payload.
    Pes(CollectedPes),
}

#[derive(Debug)]
struct CollectedPes {
    pid: u16,
    stream_type: u8,
    pts: Option<u64>,
    dts: Option<u64>,
    data: Bytes,
}

type OutputQueue = Rc<RefCell<VecDeque<Collected>>>;
type SharedStats = Rc<RefCell<TsDemuxStats>>;
type SharedAccumulator = Rc<RefCell<PesAccumulator>>;

// ============================================================================
// PES reassembly
// ============================================================================

/// Payload of the PES packet currently being received on one PID.
#[derive(Debug)]
struct PesAccumulator {
    pid: u16,
    stream_type: u8,
    data: BytesMut,
    pts: Option<u64>,
    dts: Option<u64>,
}

impl PesAccumulator {
    fn new(pid: u16, stream_type: u8) -> Self {
        Self {
            pid,
            stream_type,
            data: BytesMut::new(),
            pts: None,
            dts: None,
        }
    }

    fn finish(&mut self, output: &OutputQueue, stats: &SharedStats) {
        if self.data.is_empty() {
            self.clear();
            return;
        }
        output.borrow_mut().push_back(Collected::Pes(CollectedPes {
            pid: self.pid,
            stream_type: self.stream_type,
            pts: self.pts.take(),
            dts: self.dts.take(),
            data: self.data.split().freeze(),
        }));
        stats.borrow_mut().pes_packets += 1;
    }

    fn clear(&mut self) {
        self.data.clear();
        self.pts = None;
        self.dts = None;
    }
}

/// Consumer that collects PES data per elementary stream.
struct FrameCollector {
    state: SharedAccumulator,
    output: OutputQueue,
    stats: SharedStats,
}

impl<Ctx: DemuxContext> ElementaryStreamConsumer<Ctx> for FrameCollector {
    fn start_stream(&mut self, _ctx: &mut Ctx) {
        self.state.borrow_mut().clear();
    }

    fn begin_packet(&mut self, _ctx: &mut Ctx, header: PesHeader<'_>) {
        let mut state = self.state.borrow_mut();
        state.finish(&self.output, &self.stats);

        match header.contents() {
            PesContents::Parsed(Some(parsed)) => {
                if let Ok(pts_dts) = parsed.pts_dts() {
                    match pts_dts {
                        pes::PtsDts::PtsOnly(Ok(pts)) => {
                            state.pts = Some(pts.value());
                        }
                        pes::PtsDts::Both {
                            pts: Ok(pts),
                            dts: Ok(dts),
                        } => {
                            state.pts = Some(pts.value());
                            state.dts = Some(dts.value());
                        }
                        _ => {}
                    }
                }
                state.data.extend_from_slice(parsed.payload());
            }
            PesContents::Parsed(None) => {}
            PesContents::Payload(payload) => {
                state.data.extend_from_slice(payload);
            }
        }
    }

    fn continue_packet(&mut self, _ctx: &mut Ctx, data: &[u8]) {
        self.state.borrow_mut().data.extend_from_slice(data);
    }

    fn end_packet(&mut self, _ctx: &mut Ctx) {
        self.state.borrow_mut().finish(&self.output, &self.stats);
    }

    fn continuity_error(&mut self, _ctx: &mut Ctx) {
        let mut state = self.state.borrow_mut();
        tracing::warn!(pid = state.pid, "continuity error, discarding partial PES");
        state.clear();
        self.stats.borrow_mut().continuity_errors += 1;
    }
}

// ============================================================================
// Packet filter switch
// ============================================================================

enum TsPacketFilter {
    Pat(PatPacketFilter<TsDemuxContext>),
    Pmt(PmtPacketFilter<TsDemuxContext>),
    Pes(pes::PesPacketFilter<TsDemuxContext, FrameCollector>),
    Null(NullPacketFilter<TsDemuxContext>),
}

impl PacketFilter for TsPacketFilter {
    type Ctx = TsDemuxContext;

    fn consume(&mut self, ctx: &mut Self::Ctx, pk: &mpeg2ts_reader::packet::Packet<'_>) {
        match self {
            TsPacketFilter::Pat(f) => f.consume(ctx, pk),
            TsPacketFilter::Pmt(f) => f.consume(ctx, pk),
            TsPacketFilter::Pes(f) => f.consume(ctx, pk),
            TsPacketFilter::Null(f) => f.consume(ctx, pk),
        }
    }
}

// ============================================================================
// Demux context
// ============================================================================

struct TsDemuxContext {
    output: OutputQueue,
    stats: SharedStats,
    /// Accumulators of every PES filter built so far, for flushing.
    accumulators: Vec<SharedAccumulator>,
    changeset: FilterChangeset<TsPacketFilter>,
}

impl TsDemuxContext {
    fn new(output: OutputQueue, stats: SharedStats) -> Self {
        Self {
            output,
            stats,
            accumulators: Vec::new(),
            changeset: FilterChangeset::default(),
        }
    }

    fn finish_all(&mut self) {
        for accumulator in &self.accumulators {
            accumulator.borrow_mut().finish(&self.output, &self.stats);
        }
    }
}

impl DemuxContext for TsDemuxContext {
    type F = TsPacketFilter;

    fn filter_changeset(&mut self) -> &mut FilterChangeset<Self::F> {
        &mut self.changeset
    }

    fn construct(&mut self, req: FilterRequest<'_, '_>) -> Self::F {
        match req {
            FilterRequest::ByPid(PAT_PID) => TsPacketFilter::Pat(PatPacketFilter::default()),
            FilterRequest::ByPid(_) => TsPacketFilter::Null(NullPacketFilter::default()),
            FilterRequest::ByStream {
                stream_type,
                stream_info,
                ..
            } => {
                let pid: u16 = stream_info.elementary_pid().into();
                let code = stream_type.0;
                self.output
                    .borrow_mut()
                    .push_back(Collected::Stream {
                        pid,
                        stream_type: code,
                    });

                match code {
                    STREAM_TYPE_H264 | STREAM_TYPE_ADTS | STREAM_TYPE_METADATA => {
                        let state = Rc::new(RefCell::new(PesAccumulator::new(pid, code)));
                        self.accumulators.push(Rc::clone(&state));
                        let collector = FrameCollector {
                            state,
                            output: Rc::clone(&self.output),
                            stats: Rc::clone(&self.stats),
                        };
                        TsPacketFilter::Pes(pes::PesPacketFilter::new(collector))
                    }
                    _ => TsPacketFilter::Null(NullPacketFilter::default()),
                }
            }
            FilterRequest::Pmt {
                pid,
                program_number,
            } => TsPacketFilter::Pmt(PmtPacketFilter::new(pid, program_number)),
            FilterRequest::Nit { .. } => TsPacketFilter::Null(NullPacketFilter::default()),
        }
    }
}

// ============================================================================
// TsElementaryDemuxer
// ============================================================================

/// MPEG transport stream demultiplexer producing elementary-stream events.
pub struct TsElementaryDemuxer {
    demux: demultiplex::Demultiplex<TsDemuxContext>,
    ctx: TsDemuxContext,
    output: OutputQueue,
    stats: SharedStats,
    /// Partial packet buffer for handling non-aligned input.
    partial_packet: Vec<u8>,
    audio_splitters: HashMap<u16, AdtsSplitter>,
    /// Last (pts, dts) per PID, for PES packets without timestamps.
    last_timestamps: HashMap<u16, (u64, u64)>,
    video_clock: TimestampRollover,
    audio_clock: TimestampRollover,
    metadata_clock: TimestampRollover,
}

impl TsElementaryDemuxer {
    /// Create a new TS demuxer.
    pub fn new() -> Self {
        let output = Rc::new(RefCell::new(VecDeque::new()));
        let stats = Rc::new(RefCell::new(TsDemuxStats::default()));
        let mut ctx = TsDemuxContext::new(Rc::clone(&output), Rc::clone(&stats));
        let demux = demultiplex::Demultiplex::new(&mut ctx);

        Self {
            demux,
            ctx,
            output,
            stats,
            partial_packet: Vec::new(),
            audio_splitters: HashMap::new(),
            last_timestamps: HashMap::new(),
            video_clock: TimestampRollover::new(),
            audio_clock: TimestampRollover::new(),
            metadata_clock: TimestampRollover::new(),
        }
    }

    /// Get current statistics.
    pub fn stats(&self) -> TsDemuxStats {
        self.stats.borrow().clone()
    }

    fn drain(&mut self) -> Vec<EsEvent> {
        let collected: Vec<Collected> = self.output.borrow_mut().drain(..).collect();
        let mut events = Vec::new();
        let mut table: Option<ProgramTable> = None;

        for item in collected {
            match item {
                Collected::Stream { pid, stream_type } => {
                    table
                        .get_or_insert_with(ProgramTable::default)
                        .insert(pid, stream_type);
                }
                Collected::Pes(pes) => {
                    if let Some(table) = table.take() {
                        events.push(EsEvent::ProgramTable(table));
                    }
                    self.convert(pes, &mut events);
                }
            }
        }
        if let Some(table) = table {
            events.push(EsEvent::ProgramTable(table));
        }
        events
    }

    fn convert(&mut self, pes: CollectedPes, events: &mut Vec<EsEvent>) {
        if pes.stream_type == STREAM_TYPE_METADATA {
            let (pts, dts) = match pes.pts {
                Some(pts) => {
                    let (pts, dts) = self.metadata_clock.correct(pts, pes.dts.unwrap_or(pts));
                    (Some(pts), Some(dts))
                }
                None => (None, None),
            };
            self.stats.borrow_mut().metadata_payloads += 1;
            events.push(EsEvent::Metadata(MetadataEvent {
                track_id: pes.pid,
                pts,
                dts,
                data: pes.data,
            }));
            return;
        }

        let (pts, dts) = match (pes.pts, pes.dts) {
            (Some(pts), dts) => (pts, dts.unwrap_or(pts)),
            (None, _) => match self.last_timestamps.get(&pes.pid) {
                Some(&last) => last,
                None => {
                    tracing::warn!(pid = pes.pid, "PES without timestamps, assuming zero");
                    (0, 0)
                }
            },
        };
        self.last_timestamps.insert(pes.pid, (pts, dts));

        match pes.stream_type {
            STREAM_TYPE_H264 => {
                let (pts, dts) = self.video_clock.correct(pts, dts);
                for nal in h264::split_annex_b(&pes.data) {
                    let nal_unit_type = NalUnitType::from_header(nal[0]);
                    let config = if nal_unit_type == NalUnitType::Sps {
                        match h264::parse_sps(&nal) {
                            Ok(config) => Some(config),
                            Err(err) => {
                                tracing::warn!(pid = pes.pid, error = %err, "unparsable SPS");
                                None
                            }
                        }
                    } else {
                        None
                    };
                    self.stats.borrow_mut().video_nal_units += 1;
                    events.push(EsEvent::Video(H264NaluEvent {
                        track_id: pes.pid,
                        pts,
                        dts,
                        nal_unit_type,
                        data: nal,
                        config,
                    }));
                }
            }
            STREAM_TYPE_ADTS => {
                let (pts, dts) = self.audio_clock.correct(pts, dts);
                let splitter = self.audio_splitters.entry(pes.pid).or_default();
                for (index, frame) in splitter.push(pes.data).into_iter().enumerate() {
                    let offset = frame.header.frame_offset(index as u64, MPEG_TS_TIMESCALE_HZ);
                    self.stats.borrow_mut().audio_frames += 1;
                    events.push(EsEvent::Audio(AdtsFrameEvent {
                        track_id: pes.pid,
                        pts: pts + offset,
                        dts: dts + offset,
                        data: frame.data,
                        sample_rate: frame.header.sample_rate,
                        channel_count: frame.header.channel_count,
                        audio_object_type: frame.header.audio_object_type,
                        sample_count: frame.header.sample_count(),
                    }));
                }
            }
            other => {
                tracing::debug!(pid = pes.pid, stream_type = other, "dropping PES");
            }
        }
    }
}

impl ElementaryStreamDemuxer for TsElementaryDemuxer {
    /// Input data can be any size; packet alignment is handled internally.
    fn push(&mut self, data: &[u8]) -> Result<Vec<EsEvent>> {
        let combined: Vec<u8>;
        let to_process: &[u8] = if self.partial_packet.is_empty() {
            data
        } else {
            let mut joined = std::mem::take(&mut self.partial_packet);
            joined.extend_from_slice(data);
            combined = joined;
            &combined
        };

        let start = to_process
            .iter()
            .position(|&b| b == SYNC_BYTE)
            .unwrap_or(to_process.len());
        if start > 0 {
            tracing::warn!(skipped = start, "TS input not aligned on a sync byte");
            self.stats.borrow_mut().sync_errors += 1;
        }

        let aligned = &to_process[start..];
        let complete_packets = aligned.len() / TS_PACKET_SIZE;
        let complete_bytes = complete_packets * TS_PACKET_SIZE;

        if complete_bytes > 0 {
            self.demux.push(&mut self.ctx, &aligned[..complete_bytes]);
            let mut stats = self.stats.borrow_mut();
            stats.packets_processed += complete_packets as u64;
            stats.bytes_processed += complete_bytes as u64;
        }

        if complete_bytes < aligned.len() {
            self.partial_packet = aligned[complete_bytes..].to_vec();
        }

        Ok(self.drain())
    }

    /// Emits the PES packets still being received; a trailing partial TS
    /// packet and incomplete ADTS frames are dropped.
    fn flush(&mut self) -> Result<Vec<EsEvent>> {
        if !self.partial_packet.is_empty() {
            tracing::debug!(
                bytes = self.partial_packet.len(),
                "dropping partial TS packet on flush"
            );
            self.partial_packet.clear();
        }
        self.ctx.finish_all();
        let events = self.drain();
        for splitter in self.audio_splitters.values_mut() {
            splitter.clear();
        }
        Ok(events)
    }

    fn reset(&mut self) {
        self.partial_packet.clear();
        self.output.borrow_mut().clear();
        *self.stats.borrow_mut() = TsDemuxStats::default();
        self.audio_splitters.clear();
        self.last_timestamps.clear();
        self.video_clock.reset();
        self.audio_clock.reset();
        self.metadata_clock.reset();

        self.ctx = TsDemuxContext::new(Rc::clone(&self.output), Rc::clone(&self.stats));
        self.demux = demultiplex::Demultiplex::new(&mut self.ctx);
    }
}

impl Default for TsElementaryDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TsElementaryDemuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsElementaryDemuxer")
            .field("stats", &self.stats.borrow())
            .field("partial_packet", &self.partial_packet.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_demux_creation() {
        let demux = TsElementaryDemuxer::new();
        assert_eq!(demux.stats().packets_processed, 0);
    }

    #[test]
    fn test_ts_demux_sync_error_handling() {
        let mut demux = TsElementaryDemuxer::new();

        let events = demux.push(&[0x00; 188]).unwrap();

        assert!(events.is_empty());
        assert!(demux.stats().sync_errors > 0);
    }

    #[test]
    fn test_ts_demux_partial_packet() {
        let mut demux = TsElementaryDemuxer::new();

        let mut partial = vec![SYNC_BYTE];
        partial.extend_from_slice(&[0x00; 99]);
        let events = demux.push(&partial).unwrap();

        assert!(events.is_empty());
        assert_eq!(demux.stats().packets_processed, 0);
    }

    #[test]
    fn test_ts_demux_null_packets() {
        let mut demux = TsElementaryDemuxer::new();
        let mut null_packet = vec![SYNC_BYTE, 0x1f, 0xff, 0x10];
        null_packet.resize(TS_PACKET_SIZE, 0xff);

        let (head, tail) = null_packet.split_at(50);
        assert!(demux.push(head).unwrap().is_empty());
        assert!(demux.push(tail).unwrap().is_empty());
        assert_eq!(demux.stats().packets_processed, 1);
        assert_eq!(demux.stats().bytes_processed, 188);
    }

    #[test]
    fn test_ts_demux_aligned_then_split_input() {
        let mut demux = TsElementaryDemuxer::new();
        let mut null_packet = vec![SYNC_BYTE, 0x1f, 0xff, 0x10];
        null_packet.resize(TS_PACKET_SIZE, 0xff);

        let mut chunk = null_packet.repeat(2);
        chunk.extend_from_slice(&null_packet[..10]);
        demux.push(&chunk).unwrap();
        assert_eq!(demux.stats().packets_processed, 2);
        assert_eq!(demux.partial_packet.len(), 10);

        demux.push(&null_packet[10..]).unwrap();
        assert_eq!(demux.stats().packets_processed, 3);
        assert!(demux.partial_packet.is_empty());
        assert_eq!(demux.stats().sync_errors, 0);
    }

    #[test]
    fn test_ts_demux_reset() {
        let mut demux = TsElementaryDemuxer::new();

        let _ = demux.push(&[0x00; 200]);
        demux.reset();

        assert_eq!(demux.stats().packets_processed, 0);
        assert_eq!(demux.stats().sync_errors, 0);
    }

    #[test]
    fn test_flush_without_data() {
        let mut demux = TsElementaryDemuxer::new();
        assert!(demux.flush().unwrap().is_empty());
    }
}
