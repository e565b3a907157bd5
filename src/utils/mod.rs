//! Shared helpers.

pub mod bootstrap;
pub mod clock;
pub mod retry;
