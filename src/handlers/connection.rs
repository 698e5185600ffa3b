//! Connection registration and keepalive handlers.
//!
//! - NICK / USER: Registration handshake
//! - PING / PONG: Keepalive
//! - QUIT: Disconnect

mod nick;
mod ping;
mod quit;
mod user;
mod welcome;

pub use nick::NickHandler;
pub use ping::{PingHandler, PongHandler};
pub use quit::QuitHandler;
pub use user::UserHandler;
