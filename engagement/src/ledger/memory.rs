use crate::errors::EngagementError;
use crate::ledger::Ledger;
use crate::models::interaction::InteractionKey;
use crate::models::ledger_row::LedgerRow;
use async_trait::async_trait;
use charybdis::types::Uuid;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

type RowKey = (String, String, Uuid, Uuid);
type SaveHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct MemoryLedger {
    rows: Mutex<BTreeMap<RowKey, LedgerRow>>,
    failing_targets: Mutex<HashSet<Uuid>>,
    on_save: Mutex<Option<SaveHook>>,
    save_delay: Mutex<Option<Duration>>,
}

impl MemoryLedger {
    /// Saves touching `target_id` fail until [`MemoryLedger::recover`] is called.
    pub fn fail_for(&self, target_id: Uuid) {
        self.failing_targets.lock().unwrap().insert(target_id);
    }

    pub fn recover(&self) {
        self.failing_targets.lock().unwrap().clear();
    }

    /// Every save sleeps for `delay` before writing.
    pub fn slow_down(&self, delay: Duration) {
        *self.save_delay.lock().unwrap() = Some(delay);
    }

    /// Runs `hook` once, right after the next successful save.
    pub fn on_next_save(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_save.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn active_users(&self, key: &InteractionKey) -> HashSet<Uuid> {
        self.rows_for(key)
            .into_iter()
            .filter(|row| row.is_active())
            .map(|row| row.user_id)
            .collect()
    }

    pub fn cancelled_users(&self, key: &InteractionKey) -> HashSet<Uuid> {
        self.rows_for(key)
            .into_iter()
            .filter(|row| !row.is_active())
            .map(|row| row.user_id)
            .collect()
    }

    pub fn rows_total(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn rows_for(&self, key: &InteractionKey) -> Vec<LedgerRow> {
        let (kind, target_kind) = (key.kind.to_string(), key.target_kind.to_string());

        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.interaction_kind == kind && row.target_kind == target_kind && row.target_id == key.target_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn rows(&self, key: &InteractionKey) -> Result<Vec<LedgerRow>, EngagementError> {
        Ok(self.rows_for(key))
    }

    async fn save(&self, rows: Vec<LedgerRow>) -> Result<(), EngagementError> {
        let delay = *self.save_delay.lock().unwrap();

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let failing = self.failing_targets.lock().unwrap();

            if let Some(row) = rows.iter().find(|row| failing.contains(&row.target_id)) {
                return Err(EngagementError::Timeout(format!("ledger write for {}", row.target_id)));
            }
        }

        {
            let mut stored = self.rows.lock().unwrap();

            for row in rows {
                let key = (
                    row.interaction_kind.clone(),
                    row.target_kind.clone(),
                    row.target_id,
                    row.user_id,
                );
                stored.insert(key, row);
            }
        }

        let hook = self.on_save.lock().unwrap().take();

        if let Some(hook) = hook {
            hook();
        }

        Ok(())
    }
}
