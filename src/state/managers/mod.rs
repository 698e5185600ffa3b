//! Domain managers for server state.
//!
//! Each manager owns one store of the admission core. None of them
//! reaches into another; cross-store sequences live in
//! [`crate::state::Matrix`].

pub mod clone;
pub mod invite;
pub mod stats;
pub mod user;
pub mod xline;

pub use clone::{CloneCounts, CloneTracker};
pub use invite::{CreateOutcome, Invite, InviteManager, announce_audience};
pub use stats::ServerStats;
pub use user::{RegistryError, UserManager};
pub use xline::{AddOutcome, XLineManager};
