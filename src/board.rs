//! Presentation-side view of the hotspots.
//!
//! Folds the scheduler's lifecycle events into one [`HotspotState`] per hotspot, the way a
//! projection screen decides which marker to animate.

use std::collections::BTreeMap;
use tracing::{trace, warn};

use crate::models::{HotspotEvent, HotspotId, HotspotState};

#[derive(Debug, Clone, Default)]
pub struct HotspotBoard {
    states: BTreeMap<HotspotId, HotspotState>,
    /// Track any id instead of only the configured ones
    open: bool,
}

impl HotspotBoard {
    /// Create a board for the given hotspots. An empty list tracks every id it sees.
    pub fn new(known: impl IntoIterator<Item = HotspotId>) -> Self {
        let states: BTreeMap<_, _> = known
            .into_iter()
            .map(|id| (id, HotspotState::None))
            .collect();
        let open = states.is_empty();
        Self { states, open }
    }

    /// Update the board from an event. Returns `false` if the hotspot is unknown.
    pub fn apply(&mut self, event: HotspotEvent) -> bool {
        let id = event.id();
        let state = match event {
            HotspotEvent::Activating(_) => HotspotState::Activating,
            HotspotEvent::Activated(_) => HotspotState::Active,
            HotspotEvent::Deactivating(_) => HotspotState::Deactivating,
            HotspotEvent::ForcefullyDeactivated(_) => HotspotState::None,
        };

        match self.states.get_mut(&id) {
            Some(current) => *current = state,
            None if self.open => {
                self.states.insert(id, state);
            }
            None => {
                warn!(hotspot = %id, "hotspot not found on board");
                return false;
            }
        }
        trace!(hotspot = %id, state = state.display(), "board updated");
        true
    }

    pub fn state(&self, id: HotspotId) -> Option<HotspotState> {
        self.states.get(&id).copied()
    }

    /// The hotspot currently shown as active
    pub fn active(&self) -> Option<HotspotId> {
        self.states
            .iter()
            .find(|(_, state)| **state == HotspotState::Active)
            .map(|(id, _)| *id)
    }

    /// Reset every hotspot to idle
    pub fn deactivate_all(&mut self) {
        for state in self.states.values_mut() {
            *state = HotspotState::None;
        }
    }

    /// Hotspots in id order
    pub fn iter(&self) -> impl Iterator<Item = (HotspotId, HotspotState)> + '_ {
        self.states.iter().map(|(id, state)| (*id, *state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
