//! Application use cases - one per gateway operation family.

pub mod calculations;
pub mod close_positions;
pub mod pending_orders;
pub mod send_order;

pub use calculations::OrderCalcUseCase;
pub use close_positions::{CloseAllOutcome, ClosePositionsUseCase, DEFAULT_CLOSE_DEVIATION};
pub use pending_orders::{PendingModify, PendingOrdersUseCase};
pub use send_order::{OrderCheck, OrderIntent, OrderPlacement, SendOrderUseCase};

use crate::application::errors::OperationError;
use crate::application::ports::TerminalPort;
use crate::application::services::ConnectionManager;

/// Gate an operation on a live session.
///
/// Self-heals via [`ConnectionManager::ensure_connection`]; when that fails
/// the operation returns immediately with a connection error carrying the
/// manager's last diagnostic.
pub async fn require_connection<T: TerminalPort>(
    manager: &ConnectionManager<T>,
) -> Result<(), OperationError> {
    if manager.ensure_connection().await {
        Ok(())
    } else {
        tracing::error!(
            last_error = manager.last_error().as_deref(),
            "Terminal connection unavailable for request"
        );
        Err(OperationError::unavailable(manager.last_error()))
    }
}
