//! slircd-gate - the admission core of the Straylight IRC daemon.
//!
//! Tracks identities, enforces per-address clone limits and server ban
//! rules (K/G/Z/Q/E/R-lines), and manages channel invitations. The core
//! is driven by a single actor; sockets, the wire tokenizer and peer links
//! sit outside it and talk to it through [`state::actor::MatrixHandle`].

pub mod casemap;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod handlers;
pub mod http;
pub mod matching;
pub mod message;
pub mod metrics;
pub mod security;
pub mod state;
pub mod telemetry;
