use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use stockforge_catalog::{ItemId, WarehouseId};
use stockforge_core::{ActorId, EntityId, StockError, StockResult};
use stockforge_ledger::{LedgerEntry, MovementReason, MovementReference, NewMovement, StockBook};

use crate::count::{CountId, CountLine, CountStatus, StockCount, VarianceSummary};

const COUNT_REFERENCE_KIND: &str = "stock_count";

/// Captures physical counts, computes variance against the open-time
/// snapshot, and posts corrections on reconciliation.
#[derive(Debug)]
pub struct CountEngine {
    book: Arc<StockBook>,
    counts: RwLock<HashMap<CountId, StockCount>>,
}

impl CountEngine {
    pub fn new(book: Arc<StockBook>) -> Self {
        Self {
            book,
            counts: RwLock::new(HashMap::new()),
        }
    }

    /// Open a count, snapshotting `system_at_open` from the live projection
    /// for every item. The snapshot never changes afterwards.
    pub fn open_count(
        &self,
        warehouse_id: WarehouseId,
        item_ids: Vec<ItemId>,
        at: DateTime<Utc>,
    ) -> StockResult<StockCount> {
        if item_ids.is_empty() {
            return Err(StockError::validation("count needs at least one item"));
        }
        let mut seen = HashSet::new();
        if !item_ids.iter().all(|id| seen.insert(*id)) {
            return Err(StockError::validation("count items must be distinct"));
        }

        let lines = item_ids
            .into_iter()
            .map(|item_id| CountLine::new(item_id, self.book.quantity(item_id, warehouse_id)))
            .collect();

        let count = StockCount {
            id: CountId::new(EntityId::new()),
            warehouse_id,
            status: CountStatus::Open,
            lines,
            opened_at: at,
            reconciled_at: None,
        };

        let mut counts = self.write_counts()?;
        counts.insert(count.id, count.clone());
        Ok(count)
    }

    pub fn count(&self, id: CountId) -> Option<StockCount> {
        let Ok(counts) = self.counts.read() else {
            return None;
        };
        counts.get(&id).cloned()
    }

    /// Record a counted quantity while the count is Open. Repeated calls for
    /// the same item overwrite the prior value; variance is recomputed
    /// against the frozen snapshot.
    pub fn record_count(&self, id: CountId, item_id: ItemId, counted: i64) -> StockResult<StockCount> {
        if counted < 0 {
            return Err(StockError::validation("counted quantity cannot be negative"));
        }

        let mut counts = self.write_counts()?;
        let count = counts.get_mut(&id).ok_or_else(|| StockError::not_found("stock count"))?;
        if count.status != CountStatus::Open {
            return Err(StockError::invalid_transition(count.status, "record_count"));
        }

        let line = count
            .lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or_else(|| StockError::not_found("count line"))?;
        line.record(counted);
        Ok(count.clone())
    }

    /// Reconcile an Open count: every recorded, non-zero-variance line posts
    /// exactly one `CountCorrection` equal to its variance. A second call on
    /// a Reconciled or Closed count is rejected — corrections are never
    /// double-posted.
    pub fn reconcile(&self, id: CountId, actor: ActorId, at: DateTime<Utc>) -> StockResult<StockCount> {
        // The count stays write-locked through posting so two reconcile calls
        // can never both observe Open and double-post corrections. The status
        // flips only after every correction lands; a failed attempt is
        // compensated and leaves the count Open.
        let mut counts = self.write_counts()?;
        let count = counts.get_mut(&id).ok_or_else(|| StockError::not_found("stock count"))?;
        if count.status != CountStatus::Open {
            return Err(StockError::invalid_transition(count.status, CountStatus::Reconciled));
        }

        let reference = MovementReference::new(COUNT_REFERENCE_KIND, count.id.to_string());
        let corrections: Vec<(ItemId, i64)> = count
            .lines
            .iter()
            .filter(|l| l.counted.is_some() && l.variance != 0)
            .map(|l| (l.item_id, l.variance))
            .collect();

        let mut posted: Vec<LedgerEntry> = Vec::with_capacity(corrections.len());
        for (item_id, variance) in corrections {
            let result = self.book.post_movement(NewMovement {
                item_id,
                warehouse_id: count.warehouse_id,
                delta: variance,
                reason: MovementReason::CountCorrection,
                reference: reference.clone(),
                occurred_at: at,
                actor,
            });

            match result {
                Ok(entry) => posted.push(entry),
                Err(err) => {
                    warn!(
                        count = %count.id,
                        item = %item_id,
                        variance,
                        %err,
                        "count correction failed; compensating posted corrections"
                    );
                    self.compensate(&posted, actor, at)?;
                    return Err(err);
                }
            }
        }

        count.status = CountStatus::Reconciled;
        count.reconciled_at = Some(at);
        info!(
            count = %count.id,
            warehouse = %count.warehouse_id,
            corrections = posted.len(),
            "stock count reconciled"
        );
        Ok(count.clone())
    }

    /// Terminal administrative step; no quantity effect.
    pub fn close_count(&self, id: CountId) -> StockResult<StockCount> {
        self.transition(id, CountStatus::Reconciled, CountStatus::Closed)
    }

    /// Abandon an Open count without posting anything.
    pub fn cancel_count(&self, id: CountId) -> StockResult<StockCount> {
        self.transition(id, CountStatus::Open, CountStatus::Cancelled)
    }

    pub fn variance_summary(&self, id: CountId) -> StockResult<VarianceSummary> {
        let count = self
            .count(id)
            .ok_or_else(|| StockError::not_found("stock count"))?;
        let counted: Vec<&CountLine> = count.lines.iter().filter(|l| l.counted.is_some()).collect();
        Ok(VarianceSummary {
            total_lines: count.lines.len(),
            counted_lines: counted.len(),
            discrepancies: counted.iter().filter(|l| l.variance != 0).count(),
            net_variance: counted.iter().map(|l| l.variance).sum(),
            absolute_variance: counted.iter().map(|l| l.variance.abs()).sum(),
        })
    }

    fn transition(&self, id: CountId, expected: CountStatus, to: CountStatus) -> StockResult<StockCount> {
        let mut counts = self.write_counts()?;
        let count = counts.get_mut(&id).ok_or_else(|| StockError::not_found("stock count"))?;
        if count.status != expected {
            return Err(StockError::invalid_transition(count.status, to));
        }
        count.status = to;
        Ok(count.clone())
    }

    fn compensate(&self, posted: &[LedgerEntry], actor: ActorId, at: DateTime<Utc>) -> StockResult<()> {
        for entry in posted.iter().rev() {
            self.book
                .post_movement(NewMovement {
                    item_id: entry.item_id,
                    warehouse_id: entry.warehouse_id,
                    delta: -entry.delta,
                    reason: entry.reason.inverse(),
                    reference: entry.reference.clone(),
                    occurred_at: at,
                    actor,
                })
                .map_err(|err| {
                    error!(
                        movement = %entry.id,
                        item = %entry.item_id,
                        %err,
                        "count correction compensation failed"
                    );
                    StockError::invariant(format!(
                        "count correction compensation failed for movement {}: {err}",
                        entry.id
                    ))
                })?;
        }
        Ok(())
    }

    fn write_counts(
        &self,
    ) -> StockResult<std::sync::RwLockWriteGuard<'_, HashMap<CountId, StockCount>>> {
        self.counts
            .write()
            .map_err(|_| StockError::invariant("count store lock poisoned"))
    }
}
