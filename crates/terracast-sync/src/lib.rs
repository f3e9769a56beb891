//! Edit accumulation, rollback, and merge: the history machinery that lets a
//! client predict terraform edits locally and realign with the authoritative
//! server when they disagree.

pub mod accumulator;
pub mod events;
pub mod merge;
pub mod ring;

pub use accumulator::{Accumulator, SyncError};
pub use events::EventBuffer;
pub use merge::merge_edits;
pub use ring::{DEFAULT_RING_CAPACITY, EditRing, RingError};
