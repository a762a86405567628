//! Shared types for the rep traffic store and capture host.

mod chain;
mod control;
mod headers;
mod live;
mod mute;
mod query;
mod request;
mod session;

pub use chain::*;
pub use control::*;
pub use headers::*;
pub use live::*;
pub use mute::*;
pub use query::*;
pub use request::*;
pub use session::*;
