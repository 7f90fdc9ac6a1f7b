use crate::models::interaction::InteractionKey;
use charybdis::macros::charybdis_model;
use charybdis::types::{Text, Timestamp, Uuid};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionStatus {
    Active,
    Cancelled,
}

/// Durable record of one user's interaction with one target. Rows are only ever written
/// by reconciliation; toggling flips `status` instead of inserting duplicates.
#[charybdis_model(
    table_name = interactions,
    partition_keys = [interaction_kind, target_kind, target_id],
    clustering_keys = [user_id],
    global_secondary_indexes = []
)]
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub interaction_kind: Text,
    pub target_kind: Text,
    pub target_id: Uuid,
    pub user_id: Uuid,
    pub status: Text,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LedgerRow {
    pub fn new(key: &InteractionKey, user_id: Uuid, now: Timestamp) -> Self {
        Self {
            interaction_kind: key.kind.to_string(),
            target_kind: key.target_kind.to_string(),
            target_id: key.target_id,
            user_id,
            status: InteractionStatus::Active.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InteractionStatus::Active.as_ref()
    }

    fn set_status(&mut self, status: InteractionStatus, now: Timestamp) {
        self.status = status.to_string();
        self.updated_at = now;
    }

    /// Rows that must be written so the ledger for `key` matches `members`.
    ///
    /// Members without a row get a fresh ACTIVE row, members with a CANCELLED row are
    /// re-activated keeping their `created_at`, and ACTIVE rows of users who left the set
    /// are cancelled. `departed` users that never reached the ledger get a CANCELLED row.
    /// Rows already in the right state are not rewritten.
    pub fn reconcile(
        key: &InteractionKey,
        members: &HashSet<Uuid>,
        departed: &HashSet<Uuid>,
        previous: Vec<LedgerRow>,
        now: Timestamp,
    ) -> Vec<LedgerRow> {
        let mut previous_by_user: HashMap<Uuid, LedgerRow> =
            previous.into_iter().map(|row| (row.user_id, row)).collect();
        let mut changes = Vec::new();

        for user_id in members {
            match previous_by_user.remove(user_id) {
                Some(row) if row.is_active() => {}
                Some(mut row) => {
                    row.set_status(InteractionStatus::Active, now);
                    changes.push(row);
                }
                None => changes.push(LedgerRow::new(key, *user_id, now)),
            }
        }

        for user_id in departed.difference(members) {
            if !previous_by_user.contains_key(user_id) {
                let mut row = LedgerRow::new(key, *user_id, now);
                row.set_status(InteractionStatus::Cancelled, now);
                changes.push(row);
            }
        }

        for (_, mut row) in previous_by_user {
            if row.is_active() {
                row.set_status(InteractionStatus::Cancelled, now);
                changes.push(row);
            }
        }

        changes
    }
}
