use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_catalog::{ItemId, WarehouseId};
use stockforge_core::EntityId;

/// Stock count identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountId(pub EntityId);

impl CountId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Count status lifecycle: Open → Reconciled → Closed, or Open → Cancelled.
/// Closed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Open,
    Reconciled,
    Closed,
    Cancelled,
}

impl core::fmt::Display for CountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Reconciled => "reconciled",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One item under count. `system_at_open` is frozen when the count opens;
/// variance is always computed against it, not the live (possibly still
/// moving) level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountLine {
    pub item_id: ItemId,
    pub system_at_open: i64,
    pub counted: Option<i64>,
    pub variance: i64,
}

impl CountLine {
    pub fn new(item_id: ItemId, system_at_open: i64) -> Self {
        Self {
            item_id,
            system_at_open,
            counted: None,
            variance: 0,
        }
    }

    /// Record (or overwrite) the physical count and recompute variance
    /// against the frozen snapshot.
    pub fn record(&mut self, counted: i64) {
        self.counted = Some(counted);
        self.variance = counted - self.system_at_open;
    }
}

/// A physical count of one warehouse.
///
/// Invariant: once Reconciled, every non-zero-variance line has produced
/// exactly one `CountCorrection` ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCount {
    pub id: CountId,
    pub warehouse_id: WarehouseId,
    pub status: CountStatus,
    pub lines: Vec<CountLine>,
    pub opened_at: DateTime<Utc>,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl StockCount {
    pub fn line(&self, item_id: ItemId) -> Option<&CountLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }
}

/// Aggregate view of a count's recorded variances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceSummary {
    pub total_lines: usize,
    pub counted_lines: usize,
    /// Lines whose recorded count differs from the snapshot.
    pub discrepancies: usize,
    /// Signed sum of variances.
    pub net_variance: i64,
    /// Sum of absolute variances.
    pub absolute_variance: i64,
}
