//! Security module: server-level ban rules.
//!
//! - **X-Lines**: K/G/Z/Q/E/R rule types and their matching
//! - **Insane check**: refuses masks that would cover most of the network
//!
//! Rule storage and expiry live in [`crate::state::managers::XLineManager`].

pub mod insane;
pub mod xlines;

pub use insane::Coverage;
pub use xlines::{XLine, XLineError, XLineKind};
