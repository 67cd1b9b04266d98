use leptos::prelude::*;
use wayfarer_engine::{PlayerLink, WorldPoint};

use crate::net::PlayerSnapshot;

/// The game's player record as seen by the map: a position and a purse,
/// refreshed from the server and debited locally after a committed trip.
#[derive(Debug, Clone, Copy)]
pub struct SignalPlayerLink {
    pub position: RwSignal<WorldPoint>,
    pub gold: RwSignal<u64>,
}

impl SignalPlayerLink {
    pub fn new(position: WorldPoint, gold: u64) -> Self {
        Self {
            position: RwSignal::new(position),
            gold: RwSignal::new(gold),
        }
    }

    pub fn apply(&self, snapshot: &PlayerSnapshot) {
        let position = snapshot.position();
        if position != self.position.get_untracked() {
            self.position.set(position);
        }
        if snapshot.gold != self.gold.get_untracked() {
            self.gold.set(snapshot.gold);
        }
    }
}

impl PlayerLink for SignalPlayerLink {
    fn player_position(&self) -> WorldPoint {
        self.position.get_untracked()
    }

    fn player_currency(&self) -> u64 {
        self.gold.get_untracked()
    }

    fn debit_currency(&self, amount: u64) -> bool {
        let available = self.gold.get_untracked();
        let Some(rest) = available.checked_sub(amount) else {
            return false;
        };
        self.gold.set(rest);
        true
    }
}
