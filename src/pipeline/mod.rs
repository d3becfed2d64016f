//! Pipeline construction and execution.
//!
//! - [`Pipeline`]: owns the processor graph and the socket table
//! - [`Node`]: a processor with its sockets and event bus
//! - [`Link`]: one output-to-input socket connection
//!
//! Packets travel synchronously: a transfer returns once every downstream
//! processor has run.
//!
//! # Example
//!
//! ```rust
//! use mediaflow::elements::{PacketCollector, Passthrough};
//! use mediaflow::packet::Packet;
//! use mediaflow::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::new();
//! let pass = pipeline.add_processor("pass", Passthrough::new()).unwrap();
//! let sink = PacketCollector::new();
//! let received = sink.handle();
//! let sink = pipeline.add_processor("sink", sink).unwrap();
//!
//! pipeline
//!     .connect(pipeline.outputs(pass)[0], pipeline.inputs(sink)[0])
//!     .unwrap();
//! pipeline.push(pipeline.inputs(pass)[0], Packet::new_eos());
//!
//! assert_eq!(received.borrow().len(), 1);
//! ```

mod graph;

pub use graph::{Link, Node, Pipeline, ProcessorId, SignalHandler};
