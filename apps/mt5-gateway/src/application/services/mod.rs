//! Application services.

pub mod connection;

pub use connection::{ConnectionManager, ConnectionStatus, ReconnectSettings};
