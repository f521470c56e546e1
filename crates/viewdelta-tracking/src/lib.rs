//! Dirty-tracked object graph for viewdelta.
//!
//! This crate is the tracking layer the change engine reads from. A loaded
//! view keeps an initial snapshot and a current state per tracked slot,
//! plus a dirty bit vector. Collections and maps either record in-place
//! mutations (recording containers) or are plain snapshots.
//!
//! # Key Types
//!
//! - [`Value`] -- Null, basic leaf, view, collection, or map (reference identity)
//! - [`BasicValue`] -- Shared leaf cell that can be mutated in place
//! - [`TrackedView`] -- Initial/current state arrays and dirty bits
//! - [`TrackedCollection`] / [`TrackedMap`] -- Recording containers
//! - [`DirtyBits`] -- Per-slot dirty bit vector
//! - [`ElementMatcher`] -- Element equality used inside containers
//!
//! # Design Rules
//!
//! 1. Views and recording containers have at most one live owner. Claiming an
//!    object owned by a different live parent is an illegal state.
//! 2. Marking a child dirty marks its owner, up to the root.
//! 3. The object graph is acyclic.
//! 4. Nothing here is thread-safe; a graph belongs to one thread.

pub mod bits;
pub mod collection;
pub mod error;
mod ledger;
pub mod map;
pub mod matcher;
mod owner;
pub mod value;
pub mod view;

pub use bits::DirtyBits;
pub use collection::{CollectionRef, TrackedCollection};
pub use error::{TrackingError, TrackingResult};
pub use map::{MapRef, TrackedMap};
pub use matcher::ElementMatcher;
pub use value::{BasicValue, Value};
pub use view::{TrackedView, ViewRef};
