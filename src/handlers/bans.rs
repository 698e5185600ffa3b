//! Ban command handlers.
//!
//! Operator commands adding and removing X-lines, one pair per kind:
//! - KLINE / UNKLINE: Local ident@host ban
//! - GLINE / UNGLINE: Global ident@host ban
//! - ZLINE / UNZLINE: Global IP ban
//! - QLINE / UNQLINE: Reserved nickname
//! - ELINE / UNELINE: Exemption from K/G/Z-lines
//! - RLINE / UNRLINE: Regex on `nick!ident@host realname`

mod xlines;

pub use xlines::{BanAddHandler, BanRemoveHandler};
