//! Terminal session adapters.

pub mod bridge;
pub mod mock;
pub mod protocol;

pub use bridge::{BridgeConfig, BridgeError, BridgeTerminal};
pub use mock::MockTerminal;
