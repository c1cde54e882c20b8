//! Service layer: the server, its bootstrap handler and a client.

mod bootstrap;
mod client;
mod connection;
mod server;

pub use client::TransportClient;
pub use server::TransportServer;
