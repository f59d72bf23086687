// engine/src/store/memory.rs
//
// In-memory store: the test substrate and an option for ephemeral
// deployments. One RwLock'd map per collection; the booking sequence and
// the inventory version check both run under the collection write lock,
// which closes the two race windows the persistent store closes with
// sled primitives.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use models::errors::{OpsError, OpsResult};
use models::{Appointment, Audience, InventoryItem, NotificationGroup, Patient};

use super::{
    AppointmentRepository, InventoryRepository, NotificationRepository, PatientRepository,
};

#[derive(Default)]
struct Collections {
    patients: RwLock<HashMap<Uuid, Patient>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    booking_seq: RwLock<HashMap<Uuid, u64>>,
    inventory: RwLock<HashMap<String, InventoryItem>>,
    notices_patient: RwLock<HashMap<Uuid, NotificationGroup>>,
    notices_staff: RwLock<HashMap<Uuid, NotificationGroup>>,
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<Collections>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn notices(&self, audience: Audience) -> &RwLock<HashMap<Uuid, NotificationGroup>> {
        match audience {
            Audience::Patient => &self.inner.notices_patient,
            Audience::Staff => &self.inner.notices_staff,
        }
    }
}

#[async_trait]
impl PatientRepository for MemStore {
    async fn find_by_phone(&self, phone: &str) -> OpsResult<Option<Patient>> {
        let patients = self.inner.patients.read().await;
        Ok(patients.values().find(|p| p.phone == phone).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> OpsResult<Option<Patient>> {
        Ok(self.inner.patients.read().await.get(&id).cloned())
    }

    async fn create(&self, patient: Patient) -> OpsResult<Patient> {
        let mut patients = self.inner.patients.write().await;
        patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn count(&self) -> OpsResult<u64> {
        Ok(self.inner.patients.read().await.len() as u64)
    }

    async fn count_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<u64> {
        let patients = self.inner.patients.read().await;
        Ok(patients
            .values()
            .filter(|p| p.created_at >= start && p.created_at < end)
            .count() as u64)
    }
}

#[async_trait]
impl AppointmentRepository for MemStore {
    async fn create(&self, mut appointment: Appointment) -> OpsResult<Appointment> {
        // Sequence assignment and insert happen under the same write lock,
        // so concurrent bookings for one patient cannot observe the same
        // count.
        let mut seq = self.inner.booking_seq.write().await;
        let mut appointments = self.inner.appointments.write().await;
        let next = seq.entry(appointment.patient_id).or_insert(0);
        *next += 1;
        appointment.booking_count = *next;
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> OpsResult<Option<Appointment>> {
        Ok(self.inner.appointments.read().await.get(&id).cloned())
    }

    async fn find_by_id_and_phone(
        &self,
        id: Uuid,
        phone: &str,
    ) -> OpsResult<Option<Appointment>> {
        let appointments = self.inner.appointments.read().await;
        Ok(appointments
            .get(&id)
            .filter(|a| a.phone == phone)
            .cloned())
    }

    async fn update(&self, appointment: &Appointment) -> OpsResult<()> {
        let mut appointments = self.inner.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(slot) => {
                *slot = appointment.clone();
                Ok(())
            }
            None => Err(OpsError::not_found(format!(
                "appointment {}",
                appointment.id
            ))),
        }
    }

    async fn list_all(&self) -> OpsResult<Vec<Appointment>> {
        Ok(self.inner.appointments.read().await.values().cloned().collect())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> OpsResult<Vec<Appointment>> {
        let appointments = self.inner.appointments.read().await;
        Ok(appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn list_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<Vec<Appointment>> {
        let appointments = self.inner.appointments.read().await;
        Ok(appointments
            .values()
            .filter(|a| a.created_at >= start && a.created_at < end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InventoryRepository for MemStore {
    async fn find(&self, name: &str) -> OpsResult<Option<InventoryItem>> {
        Ok(self.inner.inventory.read().await.get(name).cloned())
    }

    async fn list(&self) -> OpsResult<Vec<InventoryItem>> {
        Ok(self.inner.inventory.read().await.values().cloned().collect())
    }

    async fn upsert_versioned(
        &self,
        mut item: InventoryItem,
        expected_version: u64,
    ) -> OpsResult<InventoryItem> {
        let mut inventory = self.inner.inventory.write().await;
        let stored_version = inventory.get(&item.name).map(|i| i.version).unwrap_or(0);
        if stored_version != expected_version {
            return Err(OpsError::Conflict(format!(
                "item {:?} moved from version {} to {}",
                item.name, expected_version, stored_version
            )));
        }
        item.version = expected_version + 1;
        inventory.insert(item.name.clone(), item.clone());
        Ok(item)
    }
}

#[async_trait]
impl NotificationRepository for MemStore {
    async fn find(
        &self,
        audience: Audience,
        patient_id: Uuid,
    ) -> OpsResult<Option<NotificationGroup>> {
        Ok(self.notices(audience).read().await.get(&patient_id).cloned())
    }

    async fn list_all(&self, audience: Audience) -> OpsResult<Vec<NotificationGroup>> {
        Ok(self.notices(audience).read().await.values().cloned().collect())
    }

    async fn upsert(&self, audience: Audience, group: NotificationGroup) -> OpsResult<()> {
        self.notices(audience)
            .write()
            .await
            .insert(group.patient_id, group);
        Ok(())
    }

    async fn mark_all_read(
        &self,
        audience: Audience,
        patient_id: Option<Uuid>,
    ) -> OpsResult<()> {
        let mut groups = self.notices(audience).write().await;
        match patient_id {
            Some(id) => {
                let group = groups
                    .get_mut(&id)
                    .ok_or_else(|| OpsError::not_found(format!("notifications for {}", id)))?;
                for item in &mut group.items {
                    item.read = true;
                }
            }
            None => {
                for group in groups.values_mut() {
                    for item in &mut group.items {
                        item.read = true;
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete_for_patient(&self, audience: Audience, patient_id: Uuid) -> OpsResult<()> {
        self.notices(audience).write().await.remove(&patient_id);
        Ok(())
    }

    async fn delete_all(&self, audience: Audience) -> OpsResult<()> {
        self.notices(audience).write().await.clear();
        Ok(())
    }
}
