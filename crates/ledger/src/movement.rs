use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_catalog::{ItemId, WarehouseId};
use stockforge_core::{ActorId, EntityId};

/// Ledger entry (movement) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub EntityId);

impl MovementId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Why a quantity changed. Closed set: every consumer handles all variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    Receive,
    Issue,
    Adjust,
    TransferOut,
    TransferIn,
    CountCorrection,
}

impl MovementReason {
    /// The reason used when compensating a movement of this reason with an
    /// equal-and-opposite one.
    pub fn inverse(self) -> Self {
        match self {
            Self::Receive => Self::Issue,
            Self::Issue => Self::Receive,
            Self::Adjust => Self::Adjust,
            Self::TransferOut => Self::TransferIn,
            Self::TransferIn => Self::TransferOut,
            Self::CountCorrection => Self::CountCorrection,
        }
    }
}

impl core::fmt::Display for MovementReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Receive => "receive",
            Self::Issue => "issue",
            Self::Adjust => "adjust",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
            Self::CountCorrection => "count_correction",
        };
        f.write_str(s)
    }
}

/// Opaque link to the external event that caused a movement (a repair
/// ticket, a transfer, a stock count, ...). The engine never dereferences
/// it; collaborators supply and interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    pub kind: String,
    pub id: String,
}

impl MovementReference {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// One immutable quantity-affecting event. Never updated or deleted once
/// appended; "undo" is always a new compensating movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: MovementId,
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub delta: i64,
    pub reason: MovementReason,
    pub reference: MovementReference,
    pub occurred_at: DateTime<Utc>,
    pub actor: ActorId,
}

/// Input for a ledger append. The book assigns the movement id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub delta: i64,
    pub reason: MovementReason,
    pub reference: MovementReference,
    pub occurred_at: DateTime<Utc>,
    pub actor: ActorId,
}

/// Ledger history filter; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub item_id: Option<ItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub reason: Option<MovementReason>,
    pub reference_kind: Option<String>,
}

impl MovementFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.item_id.is_none_or(|id| entry.item_id == id)
            && self.warehouse_id.is_none_or(|id| entry.warehouse_id == id)
            && self.reason.is_none_or(|r| entry.reason == r)
            && self
                .reference_kind
                .as_deref()
                .is_none_or(|k| entry.reference.kind == k)
    }
}
