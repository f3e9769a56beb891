//! Bounded ring of tick-stamped edit batches awaiting server confirmation.
//!
//! Entries are ordered oldest (front) to newest (back). The ring never grows
//! past its capacity: pushing into a full ring is an explicit error, which
//! surfaces a server that has fallen far behind an actively-terraforming
//! client instead of silently overwriting unconfirmed history.

use std::collections::VecDeque;

use terracast_voxel::TickEdits;

/// Default ring capacity (~2 s of command intervals at 60 Hz / 2-tick flush).
pub const DEFAULT_RING_CAPACITY: usize = 64;

/// Errors raised by ring operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// The ring is full; the server has not confirmed edits fast enough.
    #[error("edit ring full ({capacity} unconfirmed batches)")]
    CapacityExceeded {
        /// Ring capacity.
        capacity: usize,
    },

    /// A rollback target older than the confirmed-history floor was
    /// requested; the ring no longer covers that state.
    #[error("cannot revert to tick {target}: edit history begins at tick {floor}")]
    TickUnreachable {
        /// Requested rollback tick.
        target: u64,
        /// Newest tick already confirmed and pruned.
        floor: u64,
    },

    /// A pushed batch was not newer than the current head.
    #[error("batch tick {tick} is not newer than head tick {head}")]
    NonMonotonicTick {
        /// Tick of the rejected batch.
        tick: u64,
        /// Tick of the newest retained batch.
        head: u64,
    },
}

/// Fixed-capacity ring of [`TickEdits`] batches.
#[derive(Debug, Clone)]
pub struct EditRing {
    entries: VecDeque<TickEdits>,
    capacity: usize,
}

impl EditRing {
    /// Creates an empty ring with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a new batch as the newest entry.
    ///
    /// # Errors
    ///
    /// [`RingError::CapacityExceeded`] if the ring is full, or
    /// [`RingError::NonMonotonicTick`] if `batch.tick` does not advance.
    pub fn push(&mut self, batch: TickEdits) -> Result<(), RingError> {
        if self.entries.len() >= self.capacity {
            return Err(RingError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if let Some(head) = self.newest_tick()
            && batch.tick <= head
        {
            return Err(RingError::NonMonotonicTick {
                tick: batch.tick,
                head,
            });
        }
        self.entries.push_back(batch);
        Ok(())
    }

    /// Removes and returns the newest batch.
    pub fn pop_newest(&mut self) -> Option<TickEdits> {
        self.entries.pop_back()
    }

    /// Drops every batch with `tick <= confirmed` (the server has asserted
    /// truth at least that new).
    pub fn prune_confirmed(&mut self, confirmed: u64) {
        while self.entries.front().is_some_and(|e| e.tick <= confirmed) {
            self.entries.pop_front();
        }
    }

    /// Iterates batches with `tick > after`, oldest first.
    pub fn iter_newer_than(&self, after: u64) -> impl Iterator<Item = &TickEdits> {
        self.entries.iter().filter(move |e| e.tick > after)
    }

    /// Tick of the newest retained batch.
    pub fn newest_tick(&self) -> Option<u64> {
        self.entries.back().map(|e| e.tick)
    }

    /// Tick of the oldest retained batch.
    pub fn oldest_tick(&self) -> Option<u64> {
        self.entries.front().map(|e| e.tick)
    }

    /// Number of retained batches.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no batch is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
