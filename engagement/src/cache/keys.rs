use crate::models::interaction::{parse_target_kind, InteractionKey, InteractionKind};
use charybdis::types::Uuid;

/// Redis key layout.
///
/// Every key of a domain carries the `{kind}` hash tag, so the membership sets, the dirty
/// hash and the generation sequence of one domain share a cluster slot and can be touched
/// by a single script.
///
/// ```text
/// {prefix}:{like}:m:video:<target_id>   SET   active user ids
/// {prefix}:{like}:x:video:<target_id>   SET   users removed since the last persisted run
/// {prefix}:{like}:dirty                 HASH  "video:<target_id>" -> generation
/// {prefix}:{like}:seq                   INCR  generation source
/// {prefix}:{like}:cursor                STR   HSCAN cursor of the dirty hash
/// {prefix}:LOCK:<resource>              STR   lock owner token
/// ```
#[derive(Clone, Debug)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn membership(&self, key: &InteractionKey) -> String {
        format!(
            "{}:{{{}}}:m:{}:{}",
            self.prefix, key.kind, key.target_kind, key.target_id
        )
    }

    pub fn departed(&self, key: &InteractionKey) -> String {
        format!(
            "{}:{{{}}}:x:{}:{}",
            self.prefix, key.kind, key.target_kind, key.target_id
        )
    }

    pub fn dirty(&self, kind: InteractionKind) -> String {
        format!("{}:{{{}}}:dirty", self.prefix, kind)
    }

    pub fn generation(&self, kind: InteractionKind) -> String {
        format!("{}:{{{}}}:seq", self.prefix, kind)
    }

    pub fn scan_cursor(&self, kind: InteractionKind) -> String {
        format!("{}:{{{}}}:cursor", self.prefix, kind)
    }

    pub fn lock(&self, resource: &str) -> String {
        format!("{}:LOCK:{}", self.prefix, resource)
    }

    pub fn dirty_field(key: &InteractionKey) -> String {
        format!("{}:{}", key.target_kind, key.target_id)
    }

    pub fn parse_dirty_field(kind: InteractionKind, field: &str) -> Option<InteractionKey> {
        let (target_kind, target_id) = field.split_once(':')?;
        let target_kind = parse_target_kind(target_kind).ok()?;
        let target_id = Uuid::parse_str(target_id).ok()?;

        InteractionKey::new(kind, target_kind, target_id).ok()
    }
}
