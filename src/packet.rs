//! Packets: timed, ordered collections of buffer slices or control symbols.

use crate::buffer::BufferSlice;
use crate::error::{Error, Result};
use crate::metadata::BufferProperties;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Control marker carried by symbolic packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PacketSymbol {
    /// No symbol: the packet carries data.
    #[default]
    Void,
    /// Stream (re)initialization.
    Init,
    /// Discontinuity in the media timeline.
    Gap,
    /// Release buffered state downstream.
    Flush,
    /// End of stream.
    Eos,
    /// Resume after a gap or flush.
    Resume,
}

impl PacketSymbol {
    /// Get the symbol name.
    pub fn name(&self) -> &'static str {
        match self {
            PacketSymbol::Void => "void",
            PacketSymbol::Init => "init",
            PacketSymbol::Gap => "gap",
            PacketSymbol::Flush => "flush",
            PacketSymbol::Eos => "eos",
            PacketSymbol::Resume => "resume",
        }
    }
}

impl fmt::Display for PacketSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a packet carries: media data or a control symbol, never both.
#[derive(Debug, Clone)]
pub enum PacketPayload {
    /// Buffer slices in byte order of the sample.
    Data(Vec<BufferSlice>),
    /// A control symbol other than [`PacketSymbol::Void`].
    Control(PacketSymbol),
}

/// A unit of media flowing between processors.
///
/// `timestamp` is the decoding timestamp and `presentation_time_offset` the
/// composition offset (PTS - DTS), both counted in `timescale` ticks per second.
///
/// # Example
///
/// ```rust
/// use mediaflow::metadata::BufferProperties;
/// use mediaflow::packet::{Packet, PacketSymbol};
///
/// let mut packet = Packet::from_bytes(vec![1u8, 2, 3], BufferProperties::new("audio/aac"));
/// packet.set_timestamp(900);
/// packet.set_presentation_time_offset(90);
/// packet.set_timescale(90_000).unwrap();
/// assert_eq!(packet.presentation_timestamp(), 990);
///
/// let eos = Packet::new_eos();
/// assert_eq!(eos.symbol(), PacketSymbol::Eos);
/// assert!(eos.slices().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Packet {
    payload: PacketPayload,
    timestamp: i64,
    presentation_time_offset: i64,
    timescale: u32,
    created_at: Instant,
    synchronization_id: Option<u32>,
}

impl Packet {
    /// Create an empty data packet with timestamp zero and timescale 1.
    pub fn new() -> Self {
        Self {
            payload: PacketPayload::Data(Vec::new()),
            timestamp: 0,
            presentation_time_offset: 0,
            timescale: 1,
            created_at: Instant::now(),
            synchronization_id: None,
        }
    }

    /// Wrap a whole backing buffer into a packet with one slice.
    pub fn from_bytes(data: impl Into<Bytes>, props: BufferProperties) -> Self {
        Self::from_slice(BufferSlice::from_bytes(data, Arc::new(props)), 0, 0)
    }

    /// Create a packet holding a single slice.
    pub fn from_slice(slice: BufferSlice, timestamp: i64, presentation_time_offset: i64) -> Self {
        Self::from_slices(timestamp, presentation_time_offset, [slice])
    }

    /// Create a packet holding `slices` in order.
    pub fn from_slices(
        timestamp: i64,
        presentation_time_offset: i64,
        slices: impl IntoIterator<Item = BufferSlice>,
    ) -> Self {
        Self {
            payload: PacketPayload::Data(slices.into_iter().collect()),
            timestamp,
            presentation_time_offset,
            ..Self::new()
        }
    }

    /// Create a symbolic packet. `Void` yields an empty data packet.
    pub fn from_symbol(symbol: PacketSymbol) -> Self {
        let payload = match symbol {
            PacketSymbol::Void => PacketPayload::Data(Vec::new()),
            other => PacketPayload::Control(other),
        };
        Self {
            payload,
            ..Self::new()
        }
    }

    /// Create an end-of-stream packet.
    pub fn new_eos() -> Self {
        Self::from_symbol(PacketSymbol::Eos)
    }

    /// Create a flush packet.
    pub fn new_flush() -> Self {
        Self::from_symbol(PacketSymbol::Flush)
    }

    /// Create a gap packet.
    pub fn new_gap() -> Self {
        Self::from_symbol(PacketSymbol::Gap)
    }

    /// Create an init packet.
    pub fn new_init() -> Self {
        Self::from_symbol(PacketSymbol::Init)
    }

    /// Create a resume packet.
    pub fn new_resume() -> Self {
        Self::from_symbol(PacketSymbol::Resume)
    }

    /// Prepare this packet for handing to another owner.
    ///
    /// Control fields are copied; the slices are moved via
    /// [`BufferSlice::transfer_all`], so this packet is consumed.
    pub fn into_transferable(self) -> Packet {
        let payload = match self.payload {
            PacketPayload::Data(slices) => PacketPayload::Data(BufferSlice::transfer_all(slices)),
            control => control,
        };
        Packet {
            payload,
            created_at: Instant::now(),
            ..self
        }
    }

    /// The payload variant.
    pub fn payload(&self) -> &PacketPayload {
        &self.payload
    }

    /// The control symbol, `Void` for data packets.
    pub fn symbol(&self) -> PacketSymbol {
        match self.payload {
            PacketPayload::Control(symbol) => symbol,
            PacketPayload::Data(_) => PacketSymbol::Void,
        }
    }

    /// Check whether this packet carries a control symbol.
    pub fn is_symbolic(&self) -> bool {
        matches!(self.payload, PacketPayload::Control(_))
    }

    /// Set the control symbol.
    ///
    /// Fails with [`Error::SymbolOnDataPacket`] if the packet holds any slice.
    pub fn set_symbol(&mut self, symbol: PacketSymbol) -> Result<()> {
        let held = self.slices().len();
        if held > 0 {
            if symbol == PacketSymbol::Void {
                return Ok(());
            }
            return Err(Error::SymbolOnDataPacket { slices: held });
        }
        self.payload = match symbol {
            PacketSymbol::Void => PacketPayload::Data(Vec::new()),
            symbol => PacketPayload::Control(symbol),
        };
        Ok(())
    }

    /// Append a slice to a data packet.
    pub fn push_slice(&mut self, slice: BufferSlice) -> Result<()> {
        match &mut self.payload {
            PacketPayload::Data(slices) => {
                slices.push(slice);
                Ok(())
            }
            PacketPayload::Control(symbol) => Err(Error::DataOnSymbolicPacket(symbol.to_string())),
        }
    }

    /// The slices in order; empty for symbolic packets.
    pub fn slices(&self) -> &[BufferSlice] {
        match &self.payload {
            PacketPayload::Data(slices) => slices,
            PacketPayload::Control(_) => &[],
        }
    }

    /// Consume the packet, returning its slices.
    pub fn into_slices(self) -> Vec<BufferSlice> {
        match self.payload {
            PacketPayload::Data(slices) => slices,
            PacketPayload::Control(_) => Vec::new(),
        }
    }

    /// Properties of the first slice.
    ///
    /// Meaningful when all slices describe one logical payload and share a
    /// single properties handle.
    pub fn default_payload_info(&self) -> Option<&Arc<BufferProperties>> {
        self.slices().first().map(BufferSlice::props)
    }

    /// Sum of slice lengths.
    pub fn total_bytes(&self) -> usize {
        BufferSlice::total_len(self.slices())
    }

    /// Visit every slice in order, re-raising the first visitor error.
    ///
    /// The visitor runs over a snapshot of the slice list.
    pub fn for_each_buffer_slice<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&BufferSlice) -> Result<()>,
    {
        let snapshot = self.slices().to_vec();
        snapshot.iter().try_for_each(|slice| visit(slice))
    }

    /// Visit every slice in order, letting `on_error` decide whether to go on
    /// after a visitor error.
    ///
    /// Returns `false` if iteration was aborted. The abort is logged, not
    /// returned as an error.
    pub fn try_for_each_buffer_slice<F, E>(&self, mut visit: F, mut on_error: E) -> bool
    where
        F: FnMut(&BufferSlice) -> Result<()>,
        E: FnMut(&BufferSlice, &Error) -> bool,
    {
        let snapshot = self.slices().to_vec();
        for (index, slice) in snapshot.iter().enumerate() {
            if let Err(err) = visit(slice) {
                if !on_error(slice, &err) {
                    tracing::warn!(
                        index,
                        remaining = snapshot.len() - index - 1,
                        error = %err,
                        "buffer slice iteration aborted"
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Decoding timestamp in timescale ticks.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Set the decoding timestamp.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    /// Composition time offset (PTS - DTS).
    pub fn presentation_time_offset(&self) -> i64 {
        self.presentation_time_offset
    }

    /// Set the composition time offset.
    pub fn set_presentation_time_offset(&mut self, offset: i64) {
        self.presentation_time_offset = offset;
    }

    /// Ticks per second.
    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    /// Set ticks per second; zero is rejected.
    pub fn set_timescale(&mut self, timescale: u32) -> Result<()> {
        if timescale == 0 {
            return Err(Error::Config("packet timescale must be at least 1".into()));
        }
        self.timescale = timescale;
        Ok(())
    }

    /// Decoding timestamp.
    pub fn decoding_timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Presentation timestamp: decoding timestamp plus composition offset.
    pub fn presentation_timestamp(&self) -> i64 {
        self.timestamp + self.presentation_time_offset
    }

    /// Decoding timestamp in seconds.
    pub fn normalized_dts(&self) -> f64 {
        self.decoding_timestamp() as f64 / f64::from(self.timescale)
    }

    /// Presentation timestamp in seconds.
    pub fn normalized_pts(&self) -> f64 {
        self.presentation_timestamp() as f64 / f64::from(self.timescale)
    }

    /// When the packet was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Identifier correlating this packet with a stream, if any.
    pub fn synchronization_id(&self) -> Option<u32> {
        self.synchronization_id
    }

    /// Set the synchronization identifier.
    pub fn set_synchronization_id(&mut self, id: u32) {
        self.synchronization_id = Some(id);
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            PacketPayload::Control(symbol) => write!(f, "<Packet symbol={symbol}>"),
            PacketPayload::Data(slices) => write!(
                f,
                "<Packet dts={} cto={} timescale={} slices={} bytes={}>",
                self.timestamp,
                self.presentation_time_offset,
                self.timescale,
                slices.len(),
                self.total_bytes()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_packet() -> Packet {
        let props = Arc::new(BufferProperties::new("video/avc"));
        Packet::from_slices(
            3000,
            -1500,
            [
                BufferSlice::from_bytes(vec![0u8; 10], Arc::clone(&props)),
                BufferSlice::from_bytes(vec![1u8; 6], props),
            ],
        )
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let data = vec![9u8, 8, 7, 6, 5];
        let packet = Packet::from_bytes(data.clone(), BufferProperties::new("audio/aac"));
        assert_eq!(packet.slices().len(), 1);
        assert_eq!(packet.slices()[0].as_bytes(), data.as_slice());
        assert_eq!(packet.timescale(), 1);
        assert_eq!(packet.symbol(), PacketSymbol::Void);
    }

    #[test]
    fn test_symbol_constructors() {
        let cases = [
            (Packet::new_eos(), PacketSymbol::Eos),
            (Packet::new_flush(), PacketSymbol::Flush),
            (Packet::new_gap(), PacketSymbol::Gap),
            (Packet::new_init(), PacketSymbol::Init),
            (Packet::new_resume(), PacketSymbol::Resume),
        ];
        for (packet, symbol) in cases {
            assert!(packet.is_symbolic());
            assert_eq!(packet.symbol(), symbol);
            assert!(packet.slices().is_empty());
            assert_eq!(packet.total_bytes(), 0);
        }
        assert!(!Packet::from_symbol(PacketSymbol::Void).is_symbolic());
    }

    #[test]
    fn test_set_symbol_on_data_packet_fails() {
        let mut packet = data_packet();
        let err = packet.set_symbol(PacketSymbol::Eos).unwrap_err();
        assert!(matches!(err, Error::SymbolOnDataPacket { slices: 2 }));
        assert_eq!(packet.symbol(), PacketSymbol::Void);
        assert_eq!(packet.slices().len(), 2);
    }

    #[test]
    fn test_set_symbol_on_empty_packet() {
        let mut packet = Packet::new();
        packet.set_symbol(PacketSymbol::Gap).unwrap();
        assert_eq!(packet.symbol(), PacketSymbol::Gap);
        assert!(packet.push_slice(data_packet().slices()[0].clone()).is_err());

        packet.set_symbol(PacketSymbol::Void).unwrap();
        assert!(!packet.is_symbolic());
    }

    #[test]
    fn test_timestamps() {
        let mut packet = data_packet();
        assert_eq!(packet.presentation_timestamp(), 1500);
        assert_eq!(packet.decoding_timestamp(), 3000);

        packet.set_timescale(1000).unwrap();
        assert_eq!(packet.normalized_pts(), 1.5);
        assert_eq!(packet.normalized_dts(), 3.0);
        assert!(packet.set_timescale(0).is_err());
        assert_eq!(packet.timescale(), 1000);
    }

    #[test]
    fn test_total_bytes_and_default_payload_info() {
        let packet = data_packet();
        assert_eq!(packet.total_bytes(), 16);
        let info = packet.default_payload_info().unwrap();
        assert_eq!(info.mime_type, "video/avc");
        assert!(Packet::new_eos().default_payload_info().is_none());
    }

    #[test]
    fn test_for_each_buffer_slice_reraises() {
        let packet = data_packet();
        let mut seen = 0;
        let result = packet.for_each_buffer_slice(|_| {
            seen += 1;
            Err(Error::Element("visitor failed".into()))
        });
        assert!(result.is_err());
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_try_for_each_buffer_slice_veto() {
        let packet = data_packet();
        let mut seen = 0;
        let completed = packet.try_for_each_buffer_slice(
            |_| {
                seen += 1;
                Err(Error::Element("bad slice".into()))
            },
            |_, _| false,
        );
        assert!(!completed);
        assert_eq!(seen, 1);

        let mut seen = 0;
        let completed = packet.try_for_each_buffer_slice(
            |_| {
                seen += 1;
                Err(Error::Element("bad slice".into()))
            },
            |_, _| true,
        );
        assert!(completed);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_into_transferable() {
        let mut packet = data_packet();
        packet.set_synchronization_id(7);
        let ptr = packet.slices()[0].as_bytes().as_ptr();

        let moved = packet.into_transferable();
        assert_eq!(moved.timestamp(), 3000);
        assert_eq!(moved.presentation_time_offset(), -1500);
        assert_eq!(moved.synchronization_id(), Some(7));
        assert_eq!(moved.slices()[0].as_bytes().as_ptr(), ptr);
        assert!(Arc::ptr_eq(
            moved.slices()[0].props(),
            moved.slices()[1].props()
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Packet::new_eos().to_string(), "<Packet symbol=eos>");
        assert!(data_packet().to_string().contains("bytes=16"));
    }
}
