mod hotspot;

pub use hotspot::{HotspotEvent, HotspotId, HotspotState};
