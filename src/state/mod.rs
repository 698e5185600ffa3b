//! Server state: identities, channels, ban rules, invites and the
//! [`Matrix`] that ties them together.

pub mod actor;
pub mod arena;
pub mod channel;
pub mod hooks;
pub mod managers;
mod matrix;
pub mod observer;
pub mod outbox;
mod uid;
mod user;

pub use arena::UserRef;
pub use channel::{Channel, ChannelManager, MemberModes};
pub use managers::RegistryError;
pub use matrix::{Admission, MaintenanceReport, Matrix, XLineApplied};
pub use uid::UidGenerator;
pub use user::{ConnectionInfo, LocalState, OperInfo, PeerServer, RegState, User, UserModes};
