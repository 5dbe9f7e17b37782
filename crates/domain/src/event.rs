//! Domain management events — objects added to and removed from a domain.

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::time::{Timestamp, now};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ObjectAdded,
    ObjectRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    DeviceManager,
    Device,
    ApplicationFactory,
    Application,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    /// Identifier of the domain manager emitting the event.
    pub producer_id: String,
    pub source_id: String,
    pub source_name: String,
    pub source_category: SourceCategory,
    pub timestamp: Timestamp,
}

impl Event {
    pub fn new(
        event_type: EventType,
        producer_id: impl Into<String>,
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        source_category: SourceCategory,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            producer_id: producer_id.into(),
            source_id: source_id.into(),
            source_name: source_name.into(),
            source_category,
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_event_type_in_snake_case() {
        let event = Event::new(
            EventType::ObjectAdded,
            "DCE:domain",
            "DCE:gpp",
            "GPP1",
            SourceCategory::Device,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "object_added");
        assert_eq!(json["source_category"], "device");
    }
}
