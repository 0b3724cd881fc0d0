pub mod client;
pub mod server;

pub use client::{Channel, ClientRegistry};
pub use server::{start, ServerConfig, ServerHandle};
