//! Change notifications
//!
//! Events are sent from the engine to whoever presents the graph (a UI, a
//! script host, a test) after every edit and when a computation fails.
//! They are delivered after the graph lock has been released.

use serde::{Deserialize, Serialize};

/// Trait for receiving graph events
///
/// This abstracts over the transport mechanism (channel, callback queue,
/// etc.) so the engine can be embedded in different hosts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: GraphEvent) -> Result<(), EventError>;
}

/// Error when delivering an event fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

/// Events emitted by the engine. Plugs are named by full path (`node.plug`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A node was added
    #[serde(rename_all = "camelCase")]
    NodeAdded { node: String, node_type: String },

    /// A node was removed
    NodeRemoved { node: String },

    /// A plug was connected or disconnected
    InputChanged { plug: String, input: Option<String> },

    /// A static value was set
    PlugSet { plug: String },

    /// A child plug was added under a compound
    ChildAdded { parent: String, child: String },

    /// A child plug was removed from a compound
    ChildRemoved { parent: String, child: String },

    /// The transitive set of plugs affected by an edit
    PlugsDirtied { plugs: Vec<String> },

    /// A node's hash or compute failed
    ComputeFailed { plug: String, error: String },
}

impl GraphEvent {
    /// Create a compute failure event
    pub fn compute_failed(plug: &str, error: impl ToString) -> Self {
        Self::ComputeFailed {
            plug: plug.to_string(),
            error: error.to_string(),
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: GraphEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<GraphEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: GraphEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(GraphEvent::compute_failed("grade.out", "bad input")).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            GraphEvent::ComputeFailed { plug, error } => {
                assert_eq!(plug, "grade.out");
                assert_eq!(error, "bad input");
            }
            _ => panic!("Expected ComputeFailed event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(GraphEvent::PlugSet {
            plug: "a.in".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let event = GraphEvent::NodeAdded {
            node: "grade".to_string(),
            node_type: "Grade".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "nodeAdded");
        assert_eq!(json["nodeType"], "Grade");
    }
}
