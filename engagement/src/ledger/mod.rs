#[cfg(test)]
pub mod memory;
pub mod scylla_ledger;

use crate::errors::EngagementError;
use crate::models::interaction::InteractionKey;
use crate::models::ledger_row::LedgerRow;
use async_trait::async_trait;

/// Durable side of the interaction protocol. Only reconciliation writes to it.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Every row ever recorded for the key, ACTIVE and CANCELLED.
    async fn rows(&self, key: &InteractionKey) -> Result<Vec<LedgerRow>, EngagementError>;

    /// Upserts rows by (kind, target kind, target id, user id).
    async fn save(&self, rows: Vec<LedgerRow>) -> Result<(), EngagementError>;
}
