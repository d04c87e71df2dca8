//! Wire types shared between the queue engine's HTTP surface and its clients.

pub mod domain;
pub mod error;
pub mod protocol;
