//! livenodes cluster - Node discovery, round-robin dispatch and background refresh

pub mod client;
pub mod discovery;
pub mod dispatch;
pub mod membership;
pub mod refresher;

#[cfg(test)]
mod testing;

pub use client::*;
pub use discovery::*;
pub use dispatch::*;
pub use membership::*;
pub use refresher::*;
