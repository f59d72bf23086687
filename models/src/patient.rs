// models/src/patient.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered patient. Identity is the unique phone number; the record is
/// created on the first self-registration (phone lookup miss) and never
/// deleted. Re-registration with a known phone returns the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Patient {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            created_at: Utc::now(),
        }
    }
}
