//! Processor abstractions.
//!
//! Processors are the nodes of a mediaflow graph. Each owns ordered lists of
//! input and output [`Socket`]s, receives packets through the pipeline's
//! receipt path and may emit packets, shadow socket announcements and
//! signals through its [`ProcessorContext`].

mod context;
mod events;
mod socket;
mod traits;

pub use context::ProcessorContext;
pub use events::{EventBus, EventHandler, ProcessorEvent, ProcessorEventKind};
pub use socket::{ShadowOutputSocket, Socket, SocketDirection, SocketId};
pub use traits::Processor;
