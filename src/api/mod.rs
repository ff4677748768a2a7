//! Client for the admin HTTP API and the records it returns.

pub mod api_types;
pub mod cache;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use api_types::decode;
pub use cache::Endpoint;
pub use client::{HttpApi, RemoteApi};
