use crate::errors::EngagementError;
use charybdis::types::Uuid;
use serde::Serialize;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Interaction domain. Each domain has its own dirty set, generation sequence and
/// reconciliation lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InteractionKind {
    Like,
    #[strum(to_string = "favorite", serialize = "collect")]
    Favorite,
    Follow,
}

impl InteractionKind {
    /// Name of the scheduler handler that reconciles this domain.
    pub fn handler_name(&self) -> String {
        format!("{}_reconcile", self)
    }

    pub fn from_handler_name(name: &str) -> Option<Self> {
        name.strip_suffix("_reconcile")
            .and_then(|kind| kind.parse().ok())
    }

    pub fn accepts(&self, target_kind: TargetKind) -> bool {
        match self {
            InteractionKind::Follow => target_kind == TargetKind::User,
            InteractionKind::Like | InteractionKind::Favorite => target_kind != TargetKind::User,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TargetKind {
    Note,
    Video,
    Comment,
    User,
}

/// Identifies one membership set: who currently holds `kind` on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionKey {
    pub kind: InteractionKind,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
}

impl InteractionKey {
    pub fn new(kind: InteractionKind, target_kind: TargetKind, target_id: Uuid) -> Result<Self, EngagementError> {
        if !kind.accepts(target_kind) {
            return Err(EngagementError::ValidationError((
                "targetKind".to_string(),
                format!("{} is not a valid {} target", target_kind, kind),
            )));
        }

        Ok(Self {
            kind,
            target_kind,
            target_id,
        })
    }

    /// Builds a key from raw request segments.
    pub fn parse(kind: &str, target_kind: &str, target_id: Uuid) -> Result<Self, EngagementError> {
        Self::new(parse_kind(kind)?, parse_target_kind(target_kind)?, target_id)
    }
}

pub fn parse_kind(kind: &str) -> Result<InteractionKind, EngagementError> {
    InteractionKind::from_str(kind)
        .map_err(|_| EngagementError::ValidationError(("kind".to_string(), format!("unknown interaction: {}", kind))))
}

pub fn parse_target_kind(target_kind: &str) -> Result<TargetKind, EngagementError> {
    TargetKind::from_str(target_kind).map_err(|_| {
        EngagementError::ValidationError((
            "targetKind".to_string(),
            format!("unknown target: {}", target_kind),
        ))
    })
}
