// engine/src/store/sled_store.rs
//
// Persistent store: one sled tree per collection, JSON-encoded documents.
// Opened once at process start; the handle is cloned into the services and
// the database closes when the last clone drops.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use models::errors::{OpsError, OpsResult};
use models::{Appointment, Audience, InventoryItem, NotificationGroup, Patient};

use super::{
    AppointmentRepository, InventoryRepository, NotificationRepository, PatientRepository,
};

const TREE_PATIENTS: &str = "patients";
const TREE_APPOINTMENTS: &str = "appointments";
const TREE_INVENTORY: &str = "inventory";
const TREE_NOTICES_PATIENT: &str = "notices_patient";
const TREE_NOTICES_STAFF: &str = "notices_staff";
const TREE_COUNTERS: &str = "counters";

fn storage_err(e: impl std::fmt::Display) -> OpsError {
    OpsError::Internal(format!("storage error: {}", e))
}

#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> OpsResult<Self> {
        let db = sled::open(path).map_err(|e| {
            error!("failed to open sled database at {:?}: {}", path, e);
            storage_err(e)
        })?;
        info!("opened sled database at {:?}", path);
        Ok(SledStore { db })
    }

    fn tree(&self, name: &str) -> OpsResult<sled::Tree> {
        self.db.open_tree(name).map_err(storage_err)
    }

    fn notices_tree(&self, audience: Audience) -> OpsResult<sled::Tree> {
        match audience {
            Audience::Patient => self.tree(TREE_NOTICES_PATIENT),
            Audience::Staff => self.tree(TREE_NOTICES_STAFF),
        }
    }

    fn scan<T: serde::de::DeserializeOwned>(tree: &sled::Tree) -> OpsResult<Vec<T>> {
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, value) = entry.map_err(storage_err)?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    /// Atomically bumps and returns the per-patient booking sequence.
    fn next_booking_count(&self, patient_id: Uuid) -> OpsResult<u64> {
        let counters = self.tree(TREE_COUNTERS)?;
        let bumped = counters
            .update_and_fetch(patient_id.as_bytes(), |old| {
                let current = old
                    .and_then(|b| b.try_into().ok())
                    .map(u64::from_be_bytes)
                    .unwrap_or(0);
                Some((current + 1).to_be_bytes().to_vec())
            })
            .map_err(storage_err)?
            .ok_or_else(|| OpsError::internal("booking counter vanished during update"))?;
        let bytes: [u8; 8] = bumped
            .as_ref()
            .try_into()
            .map_err(|_| OpsError::internal("booking counter is not 8 bytes"))?;
        Ok(u64::from_be_bytes(bytes))
    }
}

#[async_trait]
impl PatientRepository for SledStore {
    async fn find_by_phone(&self, phone: &str) -> OpsResult<Option<Patient>> {
        let patients: Vec<Patient> = Self::scan(&self.tree(TREE_PATIENTS)?)?;
        Ok(patients.into_iter().find(|p| p.phone == phone))
    }

    async fn find_by_id(&self, id: Uuid) -> OpsResult<Option<Patient>> {
        let tree = self.tree(TREE_PATIENTS)?;
        match tree.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, patient: Patient) -> OpsResult<Patient> {
        let tree = self.tree(TREE_PATIENTS)?;
        tree.insert(patient.id.as_bytes(), serde_json::to_vec(&patient)?)
            .map_err(storage_err)?;
        Ok(patient)
    }

    async fn count(&self) -> OpsResult<u64> {
        Ok(self.tree(TREE_PATIENTS)?.len() as u64)
    }

    async fn count_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<u64> {
        let patients: Vec<Patient> = Self::scan(&self.tree(TREE_PATIENTS)?)?;
        Ok(patients
            .iter()
            .filter(|p| p.created_at >= start && p.created_at < end)
            .count() as u64)
    }
}

#[async_trait]
impl AppointmentRepository for SledStore {
    async fn create(&self, mut appointment: Appointment) -> OpsResult<Appointment> {
        appointment.booking_count = self.next_booking_count(appointment.patient_id)?;
        let tree = self.tree(TREE_APPOINTMENTS)?;
        tree.insert(
            appointment.id.as_bytes(),
            serde_json::to_vec(&appointment)?,
        )
        .map_err(storage_err)?;
        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> OpsResult<Option<Appointment>> {
        let tree = self.tree(TREE_APPOINTMENTS)?;
        match tree.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id_and_phone(
        &self,
        id: Uuid,
        phone: &str,
    ) -> OpsResult<Option<Appointment>> {
        Ok(AppointmentRepository::find_by_id(self, id)
            .await?
            .filter(|a| a.phone == phone))
    }

    async fn update(&self, appointment: &Appointment) -> OpsResult<()> {
        let tree = self.tree(TREE_APPOINTMENTS)?;
        if tree
            .get(appointment.id.as_bytes())
            .map_err(storage_err)?
            .is_none()
        {
            return Err(OpsError::not_found(format!(
                "appointment {}",
                appointment.id
            )));
        }
        tree.insert(
            appointment.id.as_bytes(),
            serde_json::to_vec(appointment)?,
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn list_all(&self) -> OpsResult<Vec<Appointment>> {
        Self::scan(&self.tree(TREE_APPOINTMENTS)?)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> OpsResult<Vec<Appointment>> {
        let all: Vec<Appointment> = Self::scan(&self.tree(TREE_APPOINTMENTS)?)?;
        Ok(all.into_iter().filter(|a| a.patient_id == patient_id).collect())
    }

    async fn list_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> OpsResult<Vec<Appointment>> {
        let all: Vec<Appointment> = Self::scan(&self.tree(TREE_APPOINTMENTS)?)?;
        Ok(all
            .into_iter()
            .filter(|a| a.created_at >= start && a.created_at < end)
            .collect())
    }
}

#[async_trait]
impl InventoryRepository for SledStore {
    async fn find(&self, name: &str) -> OpsResult<Option<InventoryItem>> {
        let tree = self.tree(TREE_INVENTORY)?;
        match tree.get(name.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> OpsResult<Vec<InventoryItem>> {
        Self::scan(&self.tree(TREE_INVENTORY)?)
    }

    async fn upsert_versioned(
        &self,
        mut item: InventoryItem,
        expected_version: u64,
    ) -> OpsResult<InventoryItem> {
        let tree = self.tree(TREE_INVENTORY)?;
        let current = tree.get(item.name.as_bytes()).map_err(storage_err)?;
        let stored_version = match &current {
            Some(bytes) => serde_json::from_slice::<InventoryItem>(bytes)?.version,
            None => 0,
        };
        if stored_version != expected_version {
            return Err(OpsError::Conflict(format!(
                "item {:?} moved from version {} to {}",
                item.name, expected_version, stored_version
            )));
        }
        item.version = expected_version + 1;
        let new_bytes = serde_json::to_vec(&item)?;
        // CAS against the exact bytes we read; a concurrent writer that
        // slipped in between surfaces as Conflict, never as a lost update.
        tree.compare_and_swap(item.name.as_bytes(), current, Some(new_bytes))
            .map_err(storage_err)?
            .map_err(|e| OpsError::Conflict(format!("item {:?}: {}", item.name, e)))?;
        Ok(item)
    }
}

#[async_trait]
impl NotificationRepository for SledStore {
    async fn find(
        &self,
        audience: Audience,
        patient_id: Uuid,
    ) -> OpsResult<Option<NotificationGroup>> {
        let tree = self.notices_tree(audience)?;
        match tree.get(patient_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self, audience: Audience) -> OpsResult<Vec<NotificationGroup>> {
        Self::scan(&self.notices_tree(audience)?)
    }

    async fn upsert(&self, audience: Audience, group: NotificationGroup) -> OpsResult<()> {
        let tree = self.notices_tree(audience)?;
        tree.insert(group.patient_id.as_bytes(), serde_json::to_vec(&group)?)
            .map_err(storage_err)?;
        Ok(())
    }

    async fn mark_all_read(
        &self,
        audience: Audience,
        patient_id: Option<Uuid>,
    ) -> OpsResult<()> {
        let tree = self.notices_tree(audience)?;
        let targets: Vec<NotificationGroup> = match patient_id {
            Some(id) => match tree.get(id.as_bytes()).map_err(storage_err)? {
                Some(bytes) => vec![serde_json::from_slice(&bytes)?],
                None => {
                    return Err(OpsError::not_found(format!("notifications for {}", id)));
                }
            },
            None => Self::scan(&tree)?,
        };
        for mut group in targets {
            for item in &mut group.items {
                item.read = true;
            }
            tree.insert(group.patient_id.as_bytes(), serde_json::to_vec(&group)?)
                .map_err(storage_err)?;
        }
        Ok(())
    }

    async fn delete_for_patient(&self, audience: Audience, patient_id: Uuid) -> OpsResult<()> {
        let tree = self.notices_tree(audience)?;
        tree.remove(patient_id.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    async fn delete_all(&self, audience: Audience) -> OpsResult<()> {
        let tree = self.notices_tree(audience)?;
        tree.clear().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::NewAppointment;

    fn store() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn booking(patient_id: Uuid) -> Appointment {
        Appointment::from_new(
            NewAppointment {
                patient_id,
                patient_name: "Asha".to_string(),
                phone: "9999900000".to_string(),
                age: "29".to_string(),
                gender: "Female".to_string(),
                service: "TVS Scan".to_string(),
                date: "2025-06-01".to_string(),
                time: "10:00".to_string(),
            },
            0,
        )
    }

    #[tokio::test]
    async fn booking_counts_are_sequential_per_patient() {
        let (_dir, store) = store();
        let patient = Uuid::new_v4();
        let other = Uuid::new_v4();
        let first = AppointmentRepository::create(&store, booking(patient)).await.unwrap();
        let second = AppointmentRepository::create(&store, booking(patient)).await.unwrap();
        let elsewhere = AppointmentRepository::create(&store, booking(other)).await.unwrap();
        assert_eq!(first.booking_count, 1);
        assert_eq!(second.booking_count, 2);
        assert_eq!(elsewhere.booking_count, 1);
    }

    #[tokio::test]
    async fn concurrent_creates_yield_dense_booking_counts() {
        let (_dir, store) = store();
        let patient = Uuid::new_v4();
        let (a, b, c) = tokio::join!(
            AppointmentRepository::create(&store, booking(patient)),
            AppointmentRepository::create(&store, booking(patient)),
            AppointmentRepository::create(&store, booking(patient)),
        );
        let mut counts = vec![
            a.unwrap().booking_count,
            b.unwrap().booking_count,
            c.unwrap().booking_count,
        ];
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn versioned_upsert_rejects_stale_writer() {
        let (_dir, store) = store();
        let item = InventoryItem::new("Gel");
        let stored = store.upsert_versioned(item.clone(), 0).await.unwrap();
        assert_eq!(stored.version, 1);
        // A second writer still holding version 0 loses.
        let err = store.upsert_versioned(item, 0).await.unwrap_err();
        assert!(matches!(err, OpsError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_of_missing_appointment_is_not_found() {
        let (_dir, store) = store();
        let ghost = booking(Uuid::new_v4());
        let err = AppointmentRepository::update(&store, &ghost).await.unwrap_err();
        assert!(matches!(err, OpsError::NotFound(_)));
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let patient = Patient::new("Asha", "9999900000");
        let id = patient.id;
        {
            let store = SledStore::open(dir.path()).unwrap();
            PatientRepository::create(&store, patient).await.unwrap();
            store.db.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        let found = PatientRepository::find_by_id(&store, id).await.unwrap().unwrap();
        assert_eq!(found.phone, "9999900000");
    }
}
