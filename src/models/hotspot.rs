//! Hotspot identifiers and the lifecycle events emitted for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Identifier of a physical hotspot.
///
/// Any value is accepted, including negative and previously unseen ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotspotId(pub i64);

impl fmt::Display for HotspotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HotspotId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for HotspotId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Lifecycle events published by the activation scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "id")]
pub enum HotspotEvent {
    /// The hotspot's dwell timer started (or resumed)
    Activating(HotspotId),
    /// The hotspot was pressed for the full dwell duration
    Activated(HotspotId),
    /// The hotspot was released before its dwell timer elapsed
    Deactivating(HotspotId),
    /// The hotspot was evicted because another hotspot became activated
    ForcefullyDeactivated(HotspotId),
}

impl HotspotEvent {
    pub fn id(&self) -> HotspotId {
        match self {
            Self::Activating(id)
            | Self::Activated(id)
            | Self::Deactivating(id)
            | Self::ForcefullyDeactivated(id) => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Activating(_) => "Activating",
            Self::Activated(_) => "Activated",
            Self::Deactivating(_) => "Deactivating",
            Self::ForcefullyDeactivated(_) => "ForcefullyDeactivated",
        }
    }
}

impl fmt::Display for HotspotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}

/// Visual state of a hotspot as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HotspotState {
    #[default]
    None,
    Activating,
    Active,
    Deactivating,
}

impl HotspotState {
    /// Get a display string
    pub fn display(&self) -> &'static str {
        match self {
            Self::None => "idle",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hotspot_id() {
        assert_eq!("42".parse::<HotspotId>().unwrap(), HotspotId(42));
        assert_eq!(" -100 ".parse::<HotspotId>().unwrap(), HotspotId(-100));
        assert!("abc".parse::<HotspotId>().is_err());
    }

    #[test]
    fn test_event_display() {
        let event = HotspotEvent::ForcefullyDeactivated(HotspotId(7));
        assert_eq!(event.to_string(), "ForcefullyDeactivated(7)");
        assert_eq!(event.id(), HotspotId(7));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&HotspotEvent::Activated(HotspotId(-3))).unwrap();
        assert_eq!(json, r#"{"event":"Activated","id":-3}"#);
    }
}
