//! Checkpoint snapshots
//!
//! A snapshot is a deep copy of the world, tagged with an id and the
//! simulation time it was taken at. The store keeps the most recent few
//! in a ring, oldest dropped first.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::SimFault;
use crate::sim::generator::recompute_bookkeeping;
use crate::sim::state::{GracePeriod, World};

/// A saved copy of the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    /// Simulation time (ms) when taken
    pub timestamp: f64,
    pub world: World,
}

impl Snapshot {
    /// Copy the world; refuses a world that couldn't be resumed
    pub fn capture(id: u64, world: &World) -> Result<Self, SimFault> {
        if !world.ball.is_finite() {
            return Err(SimFault::Checkpoint(format!(
                "ball state not finite at {}",
                world.ball.pos
            )));
        }
        let mut world = world.clone();
        world.events.clear();
        Ok(Self {
            id,
            timestamp: world.time_ms,
            world,
        })
    }

    pub fn score(&self) -> u64 {
        self.world.score
    }

    /// Build a live world from this snapshot
    ///
    /// Entities come back verbatim. Generator bookkeeping missing from the
    /// snapshot is rebuilt from the entities, and per-run timers restart as
    /// if the run had just resumed.
    pub fn restore(&self) -> World {
        let mut world = self.world.clone();
        recompute_bookkeeping(&mut world);
        world.reseat_entity_ids();
        world.normalize_order();
        world.grace = GracePeriod::begin(world.time_ms);
        world.survival_clock_ms = world.time_ms;
        world.events.clear();
        world
    }
}

/// Bounded ring of recent snapshots
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
    next_id: u64,
}

impl CheckpointStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: VecDeque::with_capacity(capacity.max(1)),
            next_id: 1,
        }
    }

    /// Snapshot the world and keep it, evicting the oldest when full
    pub fn save(&mut self, world: &World) -> Result<&Snapshot, SimFault> {
        let snapshot = Snapshot::capture(self.next_id, world)?;
        self.next_id += 1;
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
        self.snapshots
            .back()
            .ok_or_else(|| SimFault::Checkpoint("ring empty after push".into()))
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
