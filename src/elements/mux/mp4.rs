//! Progressive MP4 engine.
//!
//! [`Mp4FileMuxer`] buffers every queued sample and writes a complete
//! `ftyp`/`mdat`/`moov` file with the `mp4` crate on flush.
//!
//! | Track | Codec | Sample format |
//! |-------|-------|---------------|
//! | Video | H.264/AVC | AVCC, SPS/PPS moved to `avcC` |
//! | Audio | AAC | raw frames |

use super::{ContainerMuxer, MuxSample, TrackKind};
use crate::codec::adts::SAMPLES_PER_AAC_FRAME;
use crate::codec::h264::{
    NalUnitType, VideoConfig, inspect_access_unit, make_avcc_access_unit, parse_sps,
};
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use mp4::{
    AacConfig, AudioObjectType, AvcConfig, ChannelConfig, MediaConfig, Mp4Config, Mp4Sample,
    Mp4Writer, SampleFreqIndex, TrackConfig,
};
use std::io::Cursor;
use std::sync::Arc;

// ============================================================================
// Muxer Configuration
// ============================================================================

/// MP4 muxer configuration.
#[derive(Debug, Clone)]
pub struct Mp4MuxConfig {
    /// Major brand (default: "isom").
    pub major_brand: String,
    /// Minor version (default: 512).
    pub minor_version: u32,
    /// Compatible brands (default: ["isom", "iso2", "avc1", "mp41"]).
    pub compatible_brands: Vec<String>,
    /// Movie timescale (ticks per second, default: 1000).
    pub timescale: u32,
}

impl Default for Mp4MuxConfig {
    fn default() -> Self {
        Self {
            major_brand: "isom".to_string(),
            minor_version: 512,
            compatible_brands: vec![
                "isom".to_string(),
                "iso2".to_string(),
                "avc1".to_string(),
                "mp41".to_string(),
            ],
            timescale: 1000,
        }
    }
}

impl Mp4MuxConfig {
    fn to_mp4_config(&self) -> Result<Mp4Config> {
        Ok(Mp4Config {
            major_brand: self
                .major_brand
                .parse()
                .map_err(|_| Error::Config(format!("invalid major brand '{}'", self.major_brand)))?,
            minor_version: self.minor_version,
            compatible_brands: self
                .compatible_brands
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
            timescale: self.timescale,
        })
    }
}

// ============================================================================
// Track state
// ============================================================================

#[derive(Debug, Clone)]
struct QueuedSample {
    dts: i64,
    cto: i64,
    is_sync: bool,
    data: Bytes,
}

#[derive(Debug, Default)]
struct TrackQueue {
    timescale: u32,
    samples: Vec<QueuedSample>,
}

impl TrackQueue {
    fn push(&mut self, sample: &MuxSample, data: Bytes) {
        if self.samples.is_empty() {
            self.timescale = sample.timescale;
        }
        self.samples.push(QueuedSample {
            dts: rescale(sample.dts, sample.timescale, self.timescale),
            cto: rescale(sample.cto, sample.timescale, self.timescale),
            is_sync: sample.is_keyframe,
            data,
        });
    }

    fn take(&mut self) -> Vec<QueuedSample> {
        std::mem::take(&mut self.samples)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AudioFormat {
    sample_rate: u32,
    channels: u8,
    object_type: u8,
}

fn rescale(value: i64, from: u32, to: u32) -> i64 {
    if from == to || from == 0 {
        return value;
    }
    (value as i128 * to as i128 / from as i128) as i64
}

// ============================================================================
// MP4 Muxer
// ============================================================================

/// Progressive MP4 writer over the `mp4` crate.
///
/// Video samples are NAL units as produced by the access-unit assembler.
/// SPS and PPS units are kept for the `avcC` box and, with access unit
/// delimiters, left out of the sample data.
#[derive(Debug, Default)]
pub struct Mp4FileMuxer {
    config: Mp4MuxConfig,
    video: TrackQueue,
    audio: TrackQueue,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    video_config: Option<VideoConfig>,
    audio_format: Option<AudioFormat>,
}

impl Mp4FileMuxer {
    /// Create a muxer.
    pub fn new(config: Mp4MuxConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Number of queued samples per track.
    pub fn queued(&self, kind: TrackKind) -> usize {
        match kind {
            TrackKind::Video => self.video.samples.len(),
            TrackKind::Audio => self.audio.samples.len(),
        }
    }

    fn push_video(&mut self, sample: MuxSample) -> Result<()> {
        let mut frame = Vec::with_capacity(sample.slices.len());
        for slice in &sample.slices {
            let Some(&header) = slice.as_bytes().first() else {
                continue;
            };
            match NalUnitType::from_header(header) {
                NalUnitType::Sps => {
                    let sps = slice.to_bytes();
                    if self.sps.as_ref() != Some(&sps) {
                        match parse_sps(&sps) {
                            Ok(config) => {
                                tracing::debug!(
                                    width = config.width,
                                    height = config.height,
                                    "video track configuration"
                                );
                                self.video_config = Some(config);
                            }
                            Err(e) => tracing::warn!("unparseable SPS: {}", e),
                        }
                        self.sps = Some(sps);
                    }
                }
                NalUnitType::Pps => self.pps = Some(slice.to_bytes()),
                NalUnitType::AccessUnitDelimiter => {}
                _ => frame.push(slice),
            }
        }

        if frame.is_empty() {
            tracing::trace!(dts = sample.dts, "header-only access unit");
            return Ok(());
        }

        let access_unit = make_avcc_access_unit(frame, Arc::clone(&sample.props));
        let nal_units = inspect_access_unit(&access_unit);
        tracing::debug!(dts = sample.dts, ?nal_units, "video sample");
        self.video.push(&sample, access_unit.to_bytes());
        Ok(())
    }

    fn push_audio(&mut self, sample: MuxSample) -> Result<()> {
        let details = &sample.props.details;
        let format = AudioFormat {
            sample_rate: details.sample_rate,
            channels: details.num_channels as u8,
            object_type: match details.codec_profile {
                0 => 2,
                profile => profile as u8,
            },
        };
        if self.audio_format.is_some_and(|current| current != format) {
            tracing::warn!(?format, "audio format changed mid-stream, keeping the first");
        }
        self.audio_format.get_or_insert(format);

        let data = match sample.slices.as_slice() {
            [single] => single.to_bytes(),
            slices => {
                let mut out = BytesMut::with_capacity(sample.len());
                for slice in slices {
                    out.put_slice(slice.as_bytes());
                }
                out.freeze()
            }
        };
        self.audio.push(&sample, data);
        Ok(())
    }

    fn video_track(&self) -> Result<TrackConfig> {
        let (Some(sps), Some(pps)) = (&self.sps, &self.pps) else {
            return Err(Error::Mux("video samples queued before SPS/PPS".into()));
        };
        let config = self.video_config.unwrap_or_default();
        let mut track = TrackConfig::from(MediaConfig::AvcConfig(AvcConfig {
            width: config.width as u16,
            height: config.height as u16,
            seq_param_set: sps.to_vec(),
            pic_param_set: pps.to_vec(),
        }));
        track.timescale = self.video.timescale;
        Ok(track)
    }

    fn audio_track(&self) -> Result<TrackConfig> {
        let format = self
            .audio_format
            .ok_or_else(|| Error::Mux("audio samples queued without a format".into()))?;
        let mut track = TrackConfig::from(MediaConfig::AacConfig(AacConfig {
            bitrate: 0,
            profile: profile_to_audio_object_type(format.object_type),
            freq_index: sample_rate_to_index(format.sample_rate),
            chan_conf: channels_to_config(format.channels),
        }));
        track.timescale = self.audio.timescale;
        Ok(track)
    }

    /// Duration of a lone sample, where no DTS delta exists.
    fn fallback_duration(&self, kind: TrackKind) -> u32 {
        match (kind, self.audio_format) {
            (TrackKind::Audio, Some(format)) if format.sample_rate > 0 => {
                rescale(
                    SAMPLES_PER_AAC_FRAME as i64,
                    format.sample_rate,
                    self.audio.timescale,
                ) as u32
            }
            _ => 0,
        }
    }
}

/// Write one track's samples. Durations are DTS deltas; the last sample
/// repeats the previous duration.
fn write_track(
    writer: &mut Mp4Writer<Cursor<Vec<u8>>>,
    track_id: u32,
    samples: Vec<QueuedSample>,
    fallback_duration: u32,
) -> Result<()> {
    let Some(first_dts) = samples.first().map(|s| s.dts) else {
        return Ok(());
    };

    let mut durations: Vec<u32> = samples
        .windows(2)
        .map(|pair| (pair[1].dts - pair[0].dts).clamp(0, u32::MAX as i64) as u32)
        .collect();
    durations.push(durations.last().copied().unwrap_or(fallback_duration));

    for (sample, duration) in samples.into_iter().zip(durations) {
        let mp4_sample = Mp4Sample {
            start_time: (sample.dts - first_dts).max(0) as u64,
            duration,
            rendering_offset: sample.cto.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            is_sync: sample.is_sync,
            bytes: sample.data,
        };
        writer
            .write_sample(track_id, &mp4_sample)
            .map_err(|e| Error::Mux(format!("failed to write sample: {}", e)))?;
    }
    Ok(())
}

impl ContainerMuxer for Mp4FileMuxer {
    fn push_sample(&mut self, sample: MuxSample) -> Result<()> {
        match sample.kind {
            TrackKind::Video => self.push_video(sample),
            TrackKind::Audio => self.push_audio(sample),
        }
    }

    fn flush(&mut self) -> Result<Vec<Bytes>> {
        if self.video.samples.is_empty() && self.audio.samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = Mp4Writer::write_start(Cursor::new(Vec::new()), &self.config.to_mp4_config()?)
            .map_err(|e| Error::Mux(format!("failed to write MP4 header: {}", e)))?;

        let mut tracks = Vec::new();
        if !self.video.samples.is_empty() {
            tracks.push((TrackKind::Video, self.video_track()?));
        }
        if !self.audio.samples.is_empty() {
            tracks.push((TrackKind::Audio, self.audio_track()?));
        }
        for (kind, track) in &tracks {
            writer
                .add_track(track)
                .map_err(|e| Error::Mux(format!("failed to add {:?} track: {}", kind, e)))?;
        }

        for (index, (kind, _)) in tracks.iter().enumerate() {
            let track_id = index as u32 + 1;
            let fallback = self.fallback_duration(*kind);
            let samples = match kind {
                TrackKind::Video => self.video.take(),
                TrackKind::Audio => self.audio.take(),
            };
            tracing::debug!(track_id, ?kind, samples = samples.len(), "writing track");
            write_track(&mut writer, track_id, samples, fallback)?;
        }

        writer
            .write_end()
            .map_err(|e| Error::Mux(format!("failed to finalize MP4: {}", e)))?;
        let file = writer.into_writer().into_inner();
        tracing::debug!(bytes = file.len(), tracks = tracks.len(), "MP4 file written");
        Ok(vec![Bytes::from(file)])
    }

    fn codec_info(&self) -> Vec<String> {
        let mut codecs = Vec::new();
        if let Some(sps) = self.sps.as_ref().filter(|sps| sps.len() >= 4) {
            codecs.push(format!("avc1.{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]));
        }
        if let Some(format) = &self.audio_format {
            codecs.push(format!("mp4a.40.{}", format.object_type));
        }
        codecs
    }
}

/// Convert sample rate to AAC frequency index.
fn sample_rate_to_index(sample_rate: u32) -> SampleFreqIndex {
    match sample_rate {
        96000 => SampleFreqIndex::Freq96000,
        88200 => SampleFreqIndex::Freq88200,
        64000 => SampleFreqIndex::Freq64000,
        48000 => SampleFreqIndex::Freq48000,
        44100 => SampleFreqIndex::Freq44100,
        32000 => SampleFreqIndex::Freq32000,
        24000 => SampleFreqIndex::Freq24000,
        22050 => SampleFreqIndex::Freq22050,
        16000 => SampleFreqIndex::Freq16000,
        12000 => SampleFreqIndex::Freq12000,
        11025 => SampleFreqIndex::Freq11025,
        8000 => SampleFreqIndex::Freq8000,
        7350 => SampleFreqIndex::Freq7350,
        other => {
            tracing::warn!(sample_rate = other, "unsupported sample rate, writing 44100 Hz");
            SampleFreqIndex::Freq44100
        }
    }
}

/// Convert channel count to ChannelConfig.
fn channels_to_config(channels: u8) -> ChannelConfig {
    match channels {
        1 => ChannelConfig::Mono,
        2 => ChannelConfig::Stereo,
        3 => ChannelConfig::Three,
        4 => ChannelConfig::Four,
        5 => ChannelConfig::Five,
        6 => ChannelConfig::FiveOne,
        8 => ChannelConfig::SevenOne,
        _ => ChannelConfig::Stereo,
    }
}

/// Convert an MPEG-4 audio object type to the `mp4` crate's enum.
fn profile_to_audio_object_type(profile: u8) -> AudioObjectType {
    match profile {
        1 => AudioObjectType::AacMain,
        2 => AudioObjectType::AacLowComplexity,
        3 => AudioObjectType::AacScalableSampleRate,
        4 => AudioObjectType::AacLongTermPrediction,
        5 => AudioObjectType::SpectralBandReplication,
        _ => AudioObjectType::AacLowComplexity,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferSlice;
    use crate::codec::h264::tests::SPS_320X240;
    use crate::format::mime;
    use crate::isobmff::{find_boxes, parse_boxes};
    use crate::metadata::{BufferProperties, FourCc};

    const PPS: [u8; 4] = [0x68, 0xce, 0x3c, 0x80];

    fn video(dts: i64, nal_units: &[&[u8]], keyframe: bool) -> MuxSample {
        let mut props = BufferProperties::new(mime::VIDEO_H264);
        props.is_keyframe = keyframe;
        let props = Arc::new(props);
        MuxSample {
            kind: TrackKind::Video,
            dts,
            cto: 0,
            timescale: 90_000,
            is_keyframe: keyframe,
            slices: nal_units
                .iter()
                .map(|nal| BufferSlice::from_bytes(nal.to_vec(), Arc::clone(&props)))
                .collect(),
            props,
        }
    }

    fn audio(dts: i64) -> MuxSample {
        let mut props = BufferProperties::new(mime::AUDIO_AAC);
        props.details.sample_rate = 48000;
        props.details.num_channels = 2;
        props.details.codec_profile = 2;
        let props = Arc::new(props);
        MuxSample {
            kind: TrackKind::Audio,
            dts,
            cto: 0,
            timescale: 90_000,
            is_keyframe: true,
            slices: vec![BufferSlice::from_bytes(vec![0x21, 0x10, 0x04], Arc::clone(&props))],
            props,
        }
    }

    fn queue_stream(muxer: &mut Mp4FileMuxer) {
        muxer
            .push_sample(video(0, &[&[0x09, 0xf0], &SPS_320X240, &PPS], false))
            .unwrap();
        muxer
            .push_sample(video(0, &[&[0x65, 0x88, 0x84, 0x00]], true))
            .unwrap();
        muxer
            .push_sample(video(3000, &[&[0x41, 0x9a, 0x02]], false))
            .unwrap();
        muxer
            .push_sample(video(6000, &[&[0x41, 0x9a, 0x04]], false))
            .unwrap();
        for i in 0..4 {
            muxer.push_sample(audio(i * 1920)).unwrap();
        }
    }

    #[test]
    fn test_mp4_mux_config_default() {
        let config = Mp4MuxConfig::default();
        assert_eq!(config.major_brand, "isom");
        assert_eq!(config.timescale, 1000);
        assert!(config.to_mp4_config().is_ok());
    }

    #[test]
    fn test_parameter_sets_not_queued() {
        let mut muxer = Mp4FileMuxer::default();
        queue_stream(&mut muxer);
        assert_eq!(muxer.queued(TrackKind::Video), 3);
        assert_eq!(muxer.queued(TrackKind::Audio), 4);
        assert_eq!(muxer.video_config.map(|c| c.width), Some(320));
        assert_eq!(muxer.video.samples[0].data[..4], [0, 0, 0, 4]);
    }

    #[test]
    fn test_video_samples_hold_only_slices() {
        let mut muxer = Mp4FileMuxer::default();
        queue_stream(&mut muxer);

        let types: Vec<Vec<NalUnitType>> = muxer
            .video
            .samples
            .iter()
            .map(|sample| {
                let props = Arc::new(BufferProperties::new(mime::VIDEO_H264));
                inspect_access_unit(&BufferSlice::from_bytes(sample.data.clone(), props))
            })
            .collect();
        assert_eq!(
            types,
            vec![
                vec![NalUnitType::IdrSlice],
                vec![NalUnitType::NonIdrSlice],
                vec![NalUnitType::NonIdrSlice],
            ]
        );
    }

    #[test]
    fn test_flush_writes_box_tree() {
        let mut muxer = Mp4FileMuxer::default();
        queue_stream(&mut muxer);

        let chunks = muxer.flush().unwrap();
        assert_eq!(chunks.len(), 1);
        let boxes = parse_boxes(&chunks[0]).unwrap();

        assert_eq!(boxes[0].box_type, FourCc(*b"ftyp"));
        assert_eq!(find_boxes(&boxes, FourCc(*b"mdat")).len(), 1);
        let moov = find_boxes(&boxes, FourCc(*b"moov"));
        assert_eq!(moov.len(), 1);
        assert_eq!(moov[0].find_sub_boxes(FourCc(*b"trak")).len(), 2);

        assert_eq!(muxer.queued(TrackKind::Video), 0);
        assert!(muxer.flush().unwrap().is_empty());
    }

    #[test]
    fn test_video_without_parameter_sets_fails() {
        let mut muxer = Mp4FileMuxer::default();
        muxer
            .push_sample(video(0, &[&[0x65, 0x88, 0x84, 0x00]], true))
            .unwrap();
        assert!(matches!(muxer.flush(), Err(Error::Mux(_))));
    }

    #[test]
    fn test_codec_info() {
        let mut muxer = Mp4FileMuxer::default();
        assert!(muxer.codec_info().is_empty());
        queue_stream(&mut muxer);
        assert_eq!(muxer.codec_info(), vec!["avc1.42c01e", "mp4a.40.2"]);
    }

    #[test]
    fn test_sample_rate_to_index() {
        assert_eq!(sample_rate_to_index(44100), SampleFreqIndex::Freq44100);
        assert_eq!(sample_rate_to_index(48000), SampleFreqIndex::Freq48000);
        assert_eq!(sample_rate_to_index(96000), SampleFreqIndex::Freq96000);
    }

    #[test]
    fn test_rescale() {
        assert_eq!(rescale(90_000, 90_000, 1000), 1000);
        assert_eq!(rescale(1024, 48_000, 90_000), 1920);
        assert_eq!(rescale(7, 0, 1000), 7);
    }
}
