// engine/src/inventory.rs
//
// Append-only consumption ledger. Every write goes through the versioned
// compare-and-swap with a bounded retry, so concurrent amendments on one
// item never lose updates.

use std::sync::Arc;

use tracing::{info, warn};

use models::errors::{OpsError, OpsResult};
use models::{InventoryItem, LedgerEntry};

use crate::store::InventoryRepository;

/// Retry budget for a lost CAS race before giving up with `Conflict`.
const CAS_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct InventoryService {
    repo: Arc<dyn InventoryRepository>,
    /// When true, amending an entry recomputes the running balance of
    /// every later entry in the same write. When false the amendment
    /// touches only the one entry, matching the system this replaces
    /// (see DESIGN.md).
    cascade_amend: bool,
}

impl InventoryService {
    pub fn new(repo: Arc<dyn InventoryRepository>, cascade_amend: bool) -> Self {
        InventoryService { repo, cascade_amend }
    }

    /// Restock event: appends a base entry carrying the restocked quantity
    /// and adds it to `total_usage`. Consumption never touches
    /// `total_usage`; only restocks do.
    pub async fn restock(
        &self,
        name: &str,
        quantity: i64,
        date: &str,
        time: &str,
    ) -> OpsResult<InventoryItem> {
        if quantity <= 0 {
            return Err(OpsError::validation("quantity", "must be positive"));
        }
        let (date, time) = (date.to_string(), time.to_string());
        let item = self
            .write(name, move |item| {
                item.history.push(LedgerEntry {
                    date: date.clone(),
                    time: time.clone(),
                    quantity,
                    spent: 0,
                    is_base: true,
                });
                item.total_usage += quantity;
                Ok(())
            })
            .await?;
        info!(item = name, quantity, "inventory restocked");
        Ok(item)
    }

    /// Consumption event: appends `{quantity, spent}` where `quantity` is
    /// the running balance after spending against the previous entry. The
    /// balance is computed here from the stored ledger, never taken from
    /// the caller.
    pub async fn consume(
        &self,
        name: &str,
        spent: i64,
        date: &str,
        time: &str,
    ) -> OpsResult<InventoryItem> {
        if spent < 0 {
            return Err(OpsError::validation("spent", "must not be negative"));
        }
        let (date, time) = (date.to_string(), time.to_string());
        self.write(name, move |item| {
            let previous = item.history.last().map(|e| e.quantity).unwrap_or(0);
            item.history.push(LedgerEntry {
                date: date.clone(),
                time: time.clone(),
                quantity: previous - spent,
                spent,
                is_base: false,
            });
            Ok(())
        })
        .await
    }

    /// Rewrites one history entry's `spent`, recomputing its running
    /// balance from its predecessor (or from zero for the first entry).
    /// Later entries are recomputed only when `cascade_amend` is on.
    pub async fn amend_entry(
        &self,
        name: &str,
        index: usize,
        new_spent: i64,
    ) -> OpsResult<InventoryItem> {
        // Amendment targets an existing ledger; a missing item is NotFound,
        // a bad index inside an existing ledger is a validation failure.
        self.get(name).await?;
        let cascade = self.cascade_amend;
        self.write(name, move |item| {
            if index >= item.history.len() {
                return Err(OpsError::validation(
                    "historyIndex",
                    format!(
                        "index {} out of bounds for {} entries",
                        index,
                        item.history.len()
                    ),
                ));
            }
            let previous = if index == 0 {
                0
            } else {
                item.history[index - 1].quantity
            };
            item.history[index].spent = new_spent;
            item.history[index].quantity = previous - new_spent;
            if cascade {
                for i in (index + 1)..item.history.len() {
                    item.history[i].quantity =
                        item.history[i - 1].quantity - item.history[i].spent;
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn get(&self, name: &str) -> OpsResult<InventoryItem> {
        self.repo
            .find(name)
            .await?
            .ok_or_else(|| OpsError::not_found(format!("inventory item {:?}", name)))
    }

    pub async fn list(&self) -> OpsResult<Vec<InventoryItem>> {
        self.repo.list().await
    }

    /// Read-modify-write under optimistic versioning. The mutation runs
    /// against a fresh snapshot on every attempt.
    async fn write<F>(&self, name: &str, mutate: F) -> OpsResult<InventoryItem>
    where
        F: Fn(&mut InventoryItem) -> OpsResult<()>,
    {
        let mut last_conflict = None;
        for attempt in 0..CAS_ATTEMPTS {
            let mut item = self
                .repo
                .find(name)
                .await?
                .unwrap_or_else(|| InventoryItem::new(name));
            let expected = item.version;
            mutate(&mut item)?;
            match self.repo.upsert_versioned(item, expected).await {
                Ok(stored) => return Ok(stored),
                Err(OpsError::Conflict(msg)) => {
                    warn!(item = name, attempt, "inventory write lost a version race");
                    last_conflict = Some(msg);
                }
                Err(other) => return Err(other),
            }
        }
        Err(OpsError::Conflict(last_conflict.unwrap_or_else(|| {
            format!("item {:?}: retries exhausted", name)
        })))
    }
}
