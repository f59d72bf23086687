// models/src/inventory.rs
use serde::{Deserialize, Serialize};

/// One row of an item's consumption ledger. `quantity` is the running
/// balance after this event; `spent` is what the event consumed. A restock
/// carries `is_base = true` and `spent = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: String,
    pub time: String,
    pub quantity: i64,
    pub spent: i64,
    pub is_base: bool,
}

/// Per-item append-only consumption ledger. Identity is the item name.
///
/// Invariant: for every entry i > 0,
/// `history[i].quantity == history[i-1].quantity - history[i].spent`.
/// `total_usage` accumulates restocked quantity only, never consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub total_usage: i64,
    pub history: Vec<LedgerEntry>,
    /// Optimistic-concurrency counter, incremented on every write. Guards
    /// against lost updates when two amendments race on the same item.
    #[serde(default)]
    pub version: u64,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>) -> Self {
        InventoryItem {
            name: name.into(),
            total_usage: 0,
            history: Vec::new(),
            version: 0,
        }
    }

    /// Running balance after the last recorded event, or zero for an empty
    /// ledger.
    pub fn current_balance(&self) -> i64 {
        self.history.last().map(|e| e.quantity).unwrap_or(0)
    }
}
