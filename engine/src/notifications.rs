// engine/src/notifications.rs
//
// Per-patient notification fan-out. Two parallel stores (patient-facing
// and staff-facing) share shape and contracts; an operation always names
// its audience. Reads enrich each group with that patient's appointments;
// the join is read-only against the appointment store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use models::errors::{OpsError, OpsResult};
use models::{Appointment, Audience, NotificationGroup, NotificationItem};

use crate::store::{AppointmentRepository, NotificationRepository};

/// A notification group joined with the same patient's appointments,
/// newest appointment first.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedGroup {
    #[serde(flatten)]
    pub group: NotificationGroup,
    pub appointments: Vec<Appointment>,
}

#[derive(Clone)]
pub struct NotificationService {
    notices: Arc<dyn NotificationRepository>,
    appointments: Arc<dyn AppointmentRepository>,
}

impl NotificationService {
    pub fn new(
        notices: Arc<dyn NotificationRepository>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        NotificationService {
            notices,
            appointments,
        }
    }

    /// Appends one unread entry to the patient's group, creating the group
    /// on first use, and refreshes the group's touched marker.
    pub async fn notify(
        &self,
        audience: Audience,
        patient_id: Uuid,
        kind: &str,
        title: &str,
        message: &str,
        url: Option<String>,
    ) -> OpsResult<NotificationGroup> {
        for (field, value) in [("type", kind), ("title", title), ("message", message)] {
            if value.trim().is_empty() {
                return Err(OpsError::missing(field));
            }
        }
        let mut group = self
            .notices
            .find(audience, patient_id)
            .await?
            .unwrap_or_else(|| NotificationGroup::new(patient_id));
        group.items.push(NotificationItem {
            kind: kind.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            url,
            read: false,
            created_at: Utc::now(),
        });
        group.created_at = Utc::now();
        self.notices.upsert(audience, group.clone()).await?;
        info!(patient = %patient_id, ?audience, kind, "notification appended");
        Ok(group)
    }

    pub async fn list_for_patient(
        &self,
        audience: Audience,
        patient_id: Uuid,
    ) -> OpsResult<Vec<EnrichedGroup>> {
        match self.notices.find(audience, patient_id).await? {
            Some(group) => Ok(vec![self.enrich(group).await?]),
            None => Ok(Vec::new()),
        }
    }

    /// Staff/admin view: every group across patients, newest-touched
    /// group first.
    pub async fn list_all(&self, audience: Audience) -> OpsResult<Vec<EnrichedGroup>> {
        let mut groups = self.notices.list_all(audience).await?;
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            out.push(self.enrich(group).await?);
        }
        Ok(out)
    }

    /// With a patient id: flips that patient's group in the patient store.
    /// Without one: flips every group in the staff store.
    pub async fn mark_all_read(&self, patient_id: Option<Uuid>) -> OpsResult<()> {
        match patient_id {
            Some(id) => self.notices.mark_all_read(Audience::Patient, Some(id)).await,
            None => self.notices.mark_all_read(Audience::Staff, None).await,
        }
    }

    /// Hard delete of one patient's stream. No soft delete, no audit trail.
    pub async fn delete_for_patient(
        &self,
        audience: Audience,
        patient_id: Uuid,
    ) -> OpsResult<()> {
        info!(patient = %patient_id, ?audience, "deleting notification group");
        self.notices.delete_for_patient(audience, patient_id).await
    }

    /// Hard delete of an entire audience store.
    pub async fn delete_everything(&self, audience: Audience) -> OpsResult<()> {
        info!(?audience, "deleting all notification groups");
        self.notices.delete_all(audience).await
    }

    async fn enrich(&self, group: NotificationGroup) -> OpsResult<EnrichedGroup> {
        let mut appointments = self.appointments.list_for_patient(group.patient_id).await?;
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(EnrichedGroup {
            group,
            appointments,
        })
    }
}
