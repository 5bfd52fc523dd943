// Serial module - Serial transport implementation
pub mod client;

pub use client::{list_ports, open_session};
