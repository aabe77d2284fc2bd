use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use stockforge_catalog::{ItemId, WarehouseId};
use stockforge_core::{ActorId, StockError, StockResult};
use stockforge_ledger::{LedgerEntry, MovementReason, MovementReference, NewMovement, StockBook};

use crate::transfer::{Transfer, TransferId, TransferLine, TransferStatus};

const TRANSFER_REFERENCE_KIND: &str = "stock_transfer";

/// One ledger leg of a transfer attempt.
#[derive(Debug, Clone, Copy)]
struct Leg {
    item_id: ItemId,
    warehouse_id: WarehouseId,
    delta: i64,
    reason: MovementReason,
}

/// Orchestrates paired ledger writes across two warehouses as one atomic
/// unit: all lines take effect, or every posted leg is compensated with an
/// equal-and-opposite movement before the failure surfaces.
#[derive(Debug)]
pub struct TransferCoordinator {
    book: Arc<StockBook>,
    transfers: RwLock<HashMap<TransferId, Transfer>>,
}

impl TransferCoordinator {
    pub fn new(book: Arc<StockBook>) -> Self {
        Self {
            book,
            transfers: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_transfer(
        &self,
        from: WarehouseId,
        to: WarehouseId,
        lines: Vec<TransferLine>,
        at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        let transfer = Transfer::new(from, to, lines, at)?;
        let mut transfers = self.write_transfers()?;
        transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    pub fn transfer(&self, id: TransferId) -> Option<Transfer> {
        let Ok(transfers) = self.transfers.read() else {
            return None;
        };
        transfers.get(&id).cloned()
    }

    /// Execute a Draft transfer: post every leg, compensating on failure.
    ///
    /// Legs are posted in a fixed global order (warehouse id, then item id),
    /// so concurrent opposite-direction transfers between the same two
    /// warehouses touch the contended pairs in the same order. No two level
    /// rows are ever held at once; each post is atomic on its own pair.
    pub fn execute_transfer(
        &self,
        id: TransferId,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        let transfer = self.claim_for_execution(id)?;
        let legs = Self::ordered_legs(&transfer);
        let reference = MovementReference::new(TRANSFER_REFERENCE_KIND, transfer.id.to_string());

        let mut posted: Vec<LedgerEntry> = Vec::with_capacity(legs.len());
        for leg in &legs {
            let result = self.book.post_movement(NewMovement {
                item_id: leg.item_id,
                warehouse_id: leg.warehouse_id,
                delta: leg.delta,
                reason: leg.reason,
                reference: reference.clone(),
                occurred_at: at,
                actor,
            });

            match result {
                Ok(entry) => posted.push(entry),
                Err(err) => {
                    warn!(
                        transfer = %transfer.id,
                        item = %leg.item_id,
                        warehouse = %leg.warehouse_id,
                        %err,
                        "transfer leg failed; compensating posted legs"
                    );
                    self.compensate(&posted, actor, at)?;
                    self.set_status(id, TransferStatus::Failed, None)?;
                    return Err(err);
                }
            }
        }

        let completed = self.set_status(id, TransferStatus::Completed, Some(at))?;
        info!(
            transfer = %completed.id,
            from = %completed.from,
            to = %completed.to,
            lines = completed.lines.len(),
            "transfer completed"
        );
        Ok(completed)
    }

    /// Cancel a Draft or Failed transfer. Failed is only reachable after
    /// full compensation, so cancellation never leaves partial effects.
    pub fn cancel_transfer(&self, id: TransferId) -> StockResult<Transfer> {
        let mut transfers = self.write_transfers()?;
        let transfer = transfers
            .get_mut(&id)
            .ok_or_else(|| StockError::not_found("transfer"))?;

        match transfer.status {
            TransferStatus::Draft | TransferStatus::Failed => {
                transfer.status = TransferStatus::Cancelled;
                Ok(transfer.clone())
            }
            other => Err(StockError::invalid_transition(other, TransferStatus::Cancelled)),
        }
    }

    fn claim_for_execution(&self, id: TransferId) -> StockResult<Transfer> {
        let mut transfers = self.write_transfers()?;
        let transfer = transfers
            .get_mut(&id)
            .ok_or_else(|| StockError::not_found("transfer"))?;
        if transfer.status != TransferStatus::Draft {
            return Err(StockError::invalid_transition(
                transfer.status,
                TransferStatus::InTransit,
            ));
        }
        transfer.status = TransferStatus::InTransit;
        Ok(transfer.clone())
    }

    /// Two legs per line, sorted by (warehouse id, item id): lower warehouse
    /// id first, matching the global pair-ordering rule.
    fn ordered_legs(transfer: &Transfer) -> Vec<Leg> {
        let mut legs: Vec<Leg> = transfer
            .lines
            .iter()
            .flat_map(|line| {
                [
                    Leg {
                        item_id: line.item_id,
                        warehouse_id: transfer.from,
                        delta: -line.quantity,
                        reason: MovementReason::TransferOut,
                    },
                    Leg {
                        item_id: line.item_id,
                        warehouse_id: transfer.to,
                        delta: line.quantity,
                        reason: MovementReason::TransferIn,
                    },
                ]
            })
            .collect();
        legs.sort_by_key(|leg| (leg.warehouse_id, leg.item_id));
        legs
    }

    /// Post equal-and-opposite movements for every leg already posted in
    /// this attempt, newest first.
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
                        warehouse = %entry.warehouse_id,
                        %err,
                        "transfer compensation failed; ledger holds an uncompensated leg"
                    );
                    StockError::invariant(format!(
                        "transfer compensation failed for movement {}: {err}",
                        entry.id
                    ))
                })?;
        }
        Ok(())
    }

    fn set_status(
        &self,
        id: TransferId,
        status: TransferStatus,
        executed_at: Option<DateTime<Utc>>,
    ) -> StockResult<Transfer> {
        let mut transfers = self.write_transfers()?;
        let transfer = transfers
            .get_mut(&id)
            .ok_or_else(|| StockError::not_found("transfer"))?;
        transfer.status = status;
        if executed_at.is_some() {
            transfer.executed_at = executed_at;
        }
        Ok(transfer.clone())
    }

    fn write_transfers(
        &self,
    ) -> StockResult<std::sync::RwLockWriteGuard<'_, HashMap<TransferId, Transfer>>> {
        self.transfers
            .write()
            .map_err(|_| StockError::invariant("transfer store lock poisoned"))
    }
}
