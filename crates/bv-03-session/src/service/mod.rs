//! Service layer: session actors, request execution and the session table.

mod handler;
mod manager;
mod session;

pub use manager::SessionManager;

#[cfg(test)]
mod tests;
