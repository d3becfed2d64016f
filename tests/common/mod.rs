//! Shared helpers for integration tests: a minimal MPEG-TS writer and
//! elementary-stream payload builders.

#![allow(dead_code)]

use std::collections::HashMap;

pub const PMT_PID: u16 = 0x1000;
pub const VIDEO_PID: u16 = 0x100;
pub const AUDIO_PID: u16 = 0x101;
pub const METADATA_PID: u16 = 0x102;

/// Baseline profile, level 3.0, 320x240.
pub const SPS: [u8; 8] = [0x67, 0x42, 0xc0, 0x1e, 0xf4, 0x0a, 0x0f, 0xc8];
pub const PPS: [u8; 4] = [0x68, 0xce, 0x3c, 0x80];
pub const IDR: [u8; 4] = [0x65, 0x88, 0x84, 0x00];

// ============================================================================
// CRC
// ============================================================================

/// CRC-32/MPEG-2 as used by PSI sections.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for byte in data {
        crc ^= (*byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04c1_1db7
            } else {
                crc << 1
            };
        }
    }
    crc
}

// ============================================================================
// Transport stream writer
// ============================================================================

/// Builds a transport stream packet by packet.
#[derive(Default)]
pub struct TsBuilder {
    counters: HashMap<u16, u8>,
    out: Vec<u8>,
}

impl TsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program association table with one program.
    pub fn pat(&mut self, pmt_pid: u16) -> &mut Self {
        let mut section = vec![0x00, 0xb0, 13, 0x00, 0x01, 0xc1, 0x00, 0x00];
        section.extend_from_slice(&[0x00, 0x01, 0xe0 | (pmt_pid >> 8) as u8, pmt_pid as u8]);
        self.psi(0, section)
    }

    /// Program map table listing `(stream_type, pid)` entries.
    pub fn pmt(&mut self, pmt_pid: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> &mut Self {
        let section_length = 9 + 5 * streams.len() + 4;
        let mut section = vec![
            0x02,
            0xb0 | (section_length >> 8) as u8,
            section_length as u8,
            0x00,
            0x01,
            0xc1,
            0x00,
            0x00,
            0xe0 | (pcr_pid >> 8) as u8,
            pcr_pid as u8,
            0xf0,
            0x00,
        ];
        for (stream_type, pid) in streams {
            section.extend_from_slice(&[*stream_type, 0xe0 | (pid >> 8) as u8, *pid as u8, 0xf0, 0x00]);
        }
        self.psi(pmt_pid, section)
    }

    /// One PES packet.
    pub fn pes(
        &mut self,
        pid: u16,
        stream_id: u8,
        pts: u64,
        dts: Option<u64>,
        payload: &[u8],
    ) -> &mut Self {
        let mut header = Vec::new();
        match dts {
            Some(dts) => {
                header.extend(encode_timestamp(0b0011, pts));
                header.extend(encode_timestamp(0b0001, dts));
            }
            None => header.extend(encode_timestamp(0b0010, pts)),
        }

        let packet_length = 3 + header.len() + payload.len();
        let packet_length = if packet_length > 0xffff { 0 } else { packet_length };
        let flags = if dts.is_some() { 0xc0 } else { 0x80 };

        let mut pes = vec![
            0x00,
            0x00,
            0x01,
            stream_id,
            (packet_length >> 8) as u8,
            packet_length as u8,
            0x80,
            flags,
            header.len() as u8,
        ];
        pes.extend(header);
        pes.extend_from_slice(payload);
        self.packetize(pid, &pes);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    fn psi(&mut self, pid: u16, mut section: Vec<u8>) -> &mut Self {
        let crc = crc32_mpeg2(&section);
        section.extend_from_slice(&crc.to_be_bytes());
        let mut payload = vec![0x00];
        payload.extend(section);
        payload.resize(184, 0xff);
        self.packetize(pid, &payload);
        self
    }

    fn packetize(&mut self, pid: u16, data: &[u8]) {
        for (index, chunk) in data.chunks(184).enumerate() {
            let counter = self.counters.entry(pid).or_insert(0);
            let cc = *counter;
            *counter = (*counter + 1) & 0x0f;

            let pusi = if index == 0 { 0x40 } else { 0x00 };
            self.out.push(0x47);
            self.out.push(pusi | (pid >> 8) as u8 & 0x1f);
            self.out.push(pid as u8);

            if chunk.len() == 184 {
                self.out.push(0x10 | cc);
            } else {
                self.out.push(0x30 | cc);
                let af_length = 183 - chunk.len();
                self.out.push(af_length as u8);
                if af_length > 0 {
                    self.out.push(0x00);
                    self.out.extend(std::iter::repeat_n(0xff, af_length - 1));
                }
            }
            self.out.extend_from_slice(chunk);
        }
    }
}

fn encode_timestamp(prefix: u8, ts: u64) -> [u8; 5] {
    [
        (prefix << 4) | (((ts >> 30) & 0x07) as u8) << 1 | 1,
        (ts >> 22) as u8,
        ((((ts >> 15) & 0x7f) as u8) << 1) | 1,
        (ts >> 7) as u8,
        (((ts & 0x7f) as u8) << 1) | 1,
    ]
}

// ============================================================================
// Elementary stream payloads
// ============================================================================

/// Annex-B byte stream of the given NAL units.
pub fn annex_b(nal_units: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nal_units {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    out
}

/// One ADTS frame without CRC: AAC-LC, 48 kHz, stereo.
pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
    let (aot, sf_index, channels) = (2u8, 3u8, 2u8);
    let len = payload.len() + 7;
    let mut frame = vec![
        0xff,
        0xf1,
        ((aot - 1) << 6) | (sf_index << 2) | (channels >> 2),
        ((channels & 3) << 6) | ((len >> 11) & 3) as u8,
        ((len >> 3) & 0xff) as u8,
        (((len & 7) << 5) as u8) | 0x1f,
        0xfc,
    ];
    frame.extend_from_slice(payload);
    frame
}

/// A program with H.264 video, ADTS audio and one timed-metadata stream.
///
/// Video: SPS+PPS+IDR at 0, slices at 3000 and 6000.
/// Audio: three frames at 0, two frames at 5760.
/// Metadata: one payload at 0.
pub fn sample_program() -> Vec<u8> {
    let mut ts = TsBuilder::new();
    ts.pat(PMT_PID).pmt(
        PMT_PID,
        VIDEO_PID,
        &[(0x1b, VIDEO_PID), (0x0f, AUDIO_PID), (0x15, METADATA_PID)],
    );

    ts.pes(VIDEO_PID, 0xe0, 0, None, &annex_b(&[&SPS, &PPS, &IDR]));
    let audio: Vec<u8> = (0..3u8).flat_map(|i| adts_frame(&[0x21, i])).collect();
    ts.pes(AUDIO_PID, 0xc0, 0, None, &audio);
    ts.pes(METADATA_PID, 0xbd, 0, None, b"ID3\x04\x00\x00\x00\x00\x00\x00");
    ts.pes(VIDEO_PID, 0xe0, 3000, None, &annex_b(&[&[0x41, 0x9a, 0x02]]));
    let audio: Vec<u8> = (3..5u8).flat_map(|i| adts_frame(&[0x21, i])).collect();
    ts.pes(AUDIO_PID, 0xc0, 5760, None, &audio);
    ts.pes(VIDEO_PID, 0xe0, 6000, None, &annex_b(&[&[0x41, 0x9a, 0x04]]));
    ts.finish()
}
