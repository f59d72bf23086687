// engine/src/store/mod.rs
//
// Repository seams between the services and the backing document store.
// The store handle is constructed once at process start and injected;
// there is no ambient global connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use models::errors::OpsResult;
use models::{Appointment, Audience, InventoryItem, NotificationGroup, Patient};

pub mod memory;
pub mod sled_store;

pub use memory::MemStore;
pub use sled_store::SledStore;

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> OpsResult<Option<Patient>>;
    async fn find_by_id(&self, id: Uuid) -> OpsResult<Option<Patient>>;
    async fn create(&self, patient: Patient) -> OpsResult<Patient>;
    async fn count(&self) -> OpsResult<u64>;
    async fn count_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<u64>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Persists a new appointment, assigning `booking_count` from a
    /// per-patient sequence inside the store. The sequence assignment is
    /// atomic with respect to concurrent creates for the same patient.
    async fn create(&self, appointment: Appointment) -> OpsResult<Appointment>;
    async fn find_by_id(&self, id: Uuid) -> OpsResult<Option<Appointment>>;
    async fn find_by_id_and_phone(&self, id: Uuid, phone: &str)
        -> OpsResult<Option<Appointment>>;
    /// Full-document overwrite keyed by id. Returns `NotFound` when the
    /// target row does not exist (zero records affected).
    async fn update(&self, appointment: &Appointment) -> OpsResult<()>;
    async fn list_all(&self) -> OpsResult<Vec<Appointment>>;
    async fn list_for_patient(&self, patient_id: Uuid) -> OpsResult<Vec<Appointment>>;
    /// Range pushdown for the aggregation engine: appointments whose
    /// creation instant falls in the half-open `[start, end)` window.
    async fn list_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<Vec<Appointment>>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find(&self, name: &str) -> OpsResult<Option<InventoryItem>>;
    async fn list(&self) -> OpsResult<Vec<InventoryItem>>;
    /// Compare-and-swap write: succeeds only if the stored document still
    /// carries `expected_version` (0 for a fresh item), then persists with
    /// `version = expected_version + 1`. Fails `Conflict` on a lost race.
    async fn upsert_versioned(
        &self,
        item: InventoryItem,
        expected_version: u64,
    ) -> OpsResult<InventoryItem>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn find(&self, audience: Audience, patient_id: Uuid)
        -> OpsResult<Option<NotificationGroup>>;
    async fn list_all(&self, audience: Audience) -> OpsResult<Vec<NotificationGroup>>;
    async fn upsert(&self, audience: Audience, group: NotificationGroup) -> OpsResult<()>;
    /// With a patient id, flips that patient's group; without one, flips
    /// every group in the store.
    async fn mark_all_read(&self, audience: Audience, patient_id: Option<Uuid>) -> OpsResult<()>;
    async fn delete_for_patient(&self, audience: Audience, patient_id: Uuid) -> OpsResult<()>;
    async fn delete_all(&self, audience: Audience) -> OpsResult<()>;
}
