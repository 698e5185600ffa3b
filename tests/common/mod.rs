//! Integration test common infrastructure.
//!
//! Provides an in-process [`Harness`] driving a `Matrix` through the
//! command registry, with a manual clock and recording outbox/observer.

pub mod harness;
pub mod recorder;

#[allow(unused_imports)]
pub use harness::Harness;
#[allow(unused_imports)]
pub use recorder::{Observed, RecordingObserver, RecordingOutbox};
