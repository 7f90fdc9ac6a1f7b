use crate::constants::BATCH_CHUNK_SIZE;
use crate::errors::EngagementError;
use crate::ledger::Ledger;
use crate::models::interaction::InteractionKey;
use crate::models::ledger_row::LedgerRow;
use async_trait::async_trait;
use charybdis::batch::ModelBatch;
use charybdis::operations::Find;
use log::error;
use scylla::client::caching_session::CachingSession;
use std::sync::Arc;

pub struct ScyllaLedger {
    db_session: Arc<CachingSession>,
}

impl ScyllaLedger {
    pub fn new(db_session: Arc<CachingSession>) -> Self {
        Self { db_session }
    }
}

#[async_trait]
impl Ledger for ScyllaLedger {
    async fn rows(&self, key: &InteractionKey) -> Result<Vec<LedgerRow>, EngagementError> {
        let rows = LedgerRow::find_by_partition_key_value((
            key.kind.to_string(),
            key.target_kind.to_string(),
            key.target_id,
        ))
        .execute(&self.db_session)
        .await?
        .try_collect()
        .await?;

        Ok(rows)
    }

    async fn save(&self, rows: Vec<LedgerRow>) -> Result<(), EngagementError> {
        if rows.is_empty() {
            return Ok(());
        }

        LedgerRow::unlogged_batch()
            .chunked_insert(&self.db_session, &rows, BATCH_CHUNK_SIZE)
            .await
            .map_err(|e| {
                error!("[ledger::save::chunked_insert] {}", e);
                e
            })?;

        Ok(())
    }
}
