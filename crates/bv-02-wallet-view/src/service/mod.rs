//! Wallet view service: the shared address filter and per-session views.

mod address_filter;
mod view;

pub use address_filter::AddressFilter;
pub use view::{ViewContext, WalletView};

#[cfg(test)]
mod tests;
