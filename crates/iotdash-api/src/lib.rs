// iotdash-api: Async client for the iotdash REST backend and push channel

pub mod client;
pub mod error;
pub mod listing;
pub mod models;
pub mod push;
pub mod transport;

mod devices;
mod motion;
mod relays;
mod system;

pub use client::ApiClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
