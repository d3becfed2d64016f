//! Out-of-band signals cast through the processor graph.
//!
//! A signal travels independently of packet flow: it is first offered to the
//! processor it is cast at, and if nobody there handles it, forwarded
//! depth-first to every neighbour in its direction (upstream: the producers
//! feeding the processor's inputs; downstream: the consumers of its outputs).
//!
//! # Example
//!
//! ```rust
//! use mediaflow::signal::{Signal, SignalDirection, SignalMessage};
//!
//! let signal = Signal::upstream(SignalMessage::RequestKeyframe);
//! assert!(signal.is_upstream());
//! assert_eq!(signal.message().name(), "request-keyframe");
//! ```

use std::fmt;

/// Direction a signal travels, relative to packet flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalDirection {
    /// Against packet flow, towards producers.
    Up,
    /// With packet flow, towards consumers.
    Down,
}

/// What a signal asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    /// Drop internal state and start over.
    Reset,
    /// Produce a keyframe as soon as possible.
    RequestKeyframe,
    /// Application-defined message.
    Custom {
        /// Message name.
        name: String,
        /// Optional text payload.
        payload: Option<String>,
    },
}

impl SignalMessage {
    /// Get the message name.
    pub fn name(&self) -> &str {
        match self {
            SignalMessage::Reset => "reset",
            SignalMessage::RequestKeyframe => "request-keyframe",
            SignalMessage::Custom { name, .. } => name,
        }
    }
}

/// An immutable message plus its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    message: SignalMessage,
    direction: SignalDirection,
}

impl Signal {
    /// Create a signal.
    pub fn new(message: SignalMessage, direction: SignalDirection) -> Self {
        Self { message, direction }
    }

    /// Create a signal travelling towards producers.
    pub fn upstream(message: SignalMessage) -> Self {
        Self::new(message, SignalDirection::Up)
    }

    /// Create a signal travelling towards consumers.
    pub fn downstream(message: SignalMessage) -> Self {
        Self::new(message, SignalDirection::Down)
    }

    /// Create a custom signal.
    pub fn custom(name: impl Into<String>, direction: SignalDirection) -> Self {
        Self::new(
            SignalMessage::Custom {
                name: name.into(),
                payload: None,
            },
            direction,
        )
    }

    /// The message.
    pub fn message(&self) -> &SignalMessage {
        &self.message
    }

    /// The direction.
    pub fn direction(&self) -> SignalDirection {
        self.direction
    }

    /// Check if this signal travels upstream.
    pub fn is_upstream(&self) -> bool {
        self.direction == SignalDirection::Up
    }

    /// Check if this signal travels downstream.
    pub fn is_downstream(&self) -> bool {
        self.direction == SignalDirection::Down
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            SignalDirection::Up => "up",
            SignalDirection::Down => "down",
        };
        write!(f, "{} ({})", self.message.name(), arrow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_direction() {
        let down = Signal::downstream(SignalMessage::Reset);
        assert!(down.is_downstream());
        assert!(!down.is_upstream());
        assert_eq!(down.to_string(), "reset (down)");
    }

    #[test]
    fn test_custom_signal() {
        let signal = Signal::custom("seek-hint", SignalDirection::Up);
        assert_eq!(signal.message().name(), "seek-hint");
        assert_eq!(signal.direction(), SignalDirection::Up);
    }
}
