pub mod classify;
pub mod client;

pub use classify::classify;
pub use client::{HttpDispatchClient, DEFAULT_ENDPOINT};
