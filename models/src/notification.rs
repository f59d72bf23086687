// models/src/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two parallel notification stores an operation targets.
/// Patient-facing and staff-facing streams never cross-contaminate; they
/// share shape and contracts only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Patient,
    Staff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationItem {
    /// Open category string ("general", "report", "payment", ...).
    pub kind: String,
    pub title: String,
    pub message: String,
    pub url: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// One patient's notification stream within a single audience store.
/// Entries are appended, never removed individually; the only bulk
/// mutations are mark-all-read and delete-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationGroup {
    pub patient_id: Uuid,
    pub items: Vec<NotificationItem>,
    /// Most-recently-touched marker, refreshed on every append.
    pub created_at: DateTime<Utc>,
}

impl NotificationGroup {
    pub fn new(patient_id: Uuid) -> Self {
        NotificationGroup {
            patient_id,
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|i| !i.read).count()
    }
}
