//! Integration tests for container elements: MPEG-TS in, MP4 out.

#![cfg(all(feature = "mpeg-ts", feature = "mp4-mux"))]

mod common;

use common::*;
use mediaflow::isobmff::{find_boxes, parse_boxes};
use mediaflow::metadata::FourCc;
use mediaflow::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// demux -> mux -> collector, with demux outputs routed by media type.
fn transmux_pipeline() -> (Pipeline, SocketId, Rc<RefCell<Vec<Packet>>>) {
    let mut pipeline = Pipeline::new();
    let demux = pipeline.add_processor("demux", Mp2tsDemux::new()).unwrap();
    let mux = pipeline.add_processor("mux", Mp4Mux::new()).unwrap();
    let sink = PacketCollector::new();
    let received = sink.handle();
    let sink = pipeline.add_processor("sink", sink).unwrap();

    let (mux_out, sink_in) = (pipeline.outputs(mux)[0], pipeline.inputs(sink)[0]);
    pipeline.connect(mux_out, sink_in).unwrap();

    let (video_in, audio_in) = (pipeline.inputs(mux)[0], pipeline.inputs(mux)[1]);
    pipeline
        .on(demux, ProcessorEventKind::OutputSocketCreated, move |event, pipeline| {
            let ProcessorEvent::OutputSocketCreated { socket, .. } = event else {
                return;
            };
            let Some(descriptor) = pipeline.socket(*socket).map(|s| s.descriptor().clone()) else {
                return;
            };
            if descriptor.accepts(mime::VIDEO_H264) {
                pipeline.connect(*socket, video_in).unwrap();
            } else if descriptor.accepts(mime::AUDIO_AAC) {
                pipeline.connect(*socket, audio_in).unwrap();
            }
        })
        .unwrap();

    let input = pipeline.inputs(demux)[0];
    (pipeline, input, received)
}

/// A transport stream becomes one progressive MP4 file on EOS.
#[test]
fn test_transmux_to_mp4() {
    let (mut pipeline, input, received) = transmux_pipeline();
    pipeline.push(
        input,
        Packet::from_bytes(sample_program(), BufferProperties::new(mime::VIDEO_MP2T)),
    );
    assert!(received.borrow().is_empty());

    pipeline.push(input, Packet::new_eos());
    let received = received.borrow();

    let files: Vec<&Packet> = received.iter().filter(|p| !p.is_symbolic()).collect();
    assert_eq!(files.len(), 1);
    let info = files[0].default_payload_info().unwrap();
    assert_eq!(info.mime_type, "video/mp4; codecs=\"avc1.42c01e,mp4a.40.2\"");

    let file = files[0].slices()[0].to_bytes();
    let boxes = parse_boxes(&file).unwrap();
    assert_eq!(boxes[0].box_type, FourCc(*b"ftyp"));
    assert_eq!(find_boxes(&boxes, FourCc(*b"mdat")).len(), 1);
    let moov = find_boxes(&boxes, FourCc(*b"moov"));
    assert_eq!(moov.len(), 1);
    assert_eq!(moov[0].find_sub_boxes(FourCc(*b"trak")).len(), 2);
    assert_eq!(moov[0].find_sub_boxes(FourCc(*b"stbl")).len(), 2);

    assert!(received.iter().any(|p| p.symbol() == PacketSymbol::Eos));
}

/// A second EOS with nothing queued only forwards the symbol.
#[test]
fn test_second_eos_forwards_only() {
    let (mut pipeline, input, received) = transmux_pipeline();
    pipeline.push(
        input,
        Packet::from_bytes(sample_program(), BufferProperties::new(mime::VIDEO_MP2T)),
    );
    pipeline.push(input, Packet::new_eos());
    let files_before = received.borrow().iter().filter(|p| !p.is_symbolic()).count();

    pipeline.push(input, Packet::new_eos());
    let files_after = received.borrow().iter().filter(|p| !p.is_symbolic()).count();
    assert_eq!(files_before, 1);
    assert_eq!(files_after, 1);
}
