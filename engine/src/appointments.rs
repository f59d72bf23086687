// engine/src/appointments.rs
//
// Appointment lifecycle: creation with per-patient booking sequence,
// status transitions gated on report readiness, report attachment and the
// single-field workflow updates.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::{debug, info};
use uuid::Uuid;

use models::errors::{OpsError, OpsResult};
use models::{
    Appointment, AppointmentStatus, NewAppointment, PaymentStatus, Report, ReportStatus,
};

use crate::store::AppointmentRepository;

/// Filter for the staff-side appointment listing. All fields combine with
/// AND; omitted fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    /// Case-insensitive substring over patient name, phone and service.
    pub search: Option<String>,
    pub service: Option<String>,
    pub status: Option<AppointmentStatus>,
    /// Month (1-12) of the scheduled date.
    pub month: Option<u32>,
    /// Half-open hour range over the scheduled time, e.g. (8, 10) for the
    /// "8 AM - 10 AM" slot.
    pub time_slot: Option<(u32, u32)>,
}

#[derive(Clone)]
pub struct AppointmentService {
    repo: Arc<dyn AppointmentRepository>,
}

impl AppointmentService {
    pub fn new(repo: Arc<dyn AppointmentRepository>) -> Self {
        AppointmentService { repo }
    }

    /// Books an appointment. Workflow fields always start at
    /// Pending/pending/unpaid; the booking count is assigned atomically by
    /// the store.
    pub async fn create(&self, new: NewAppointment) -> OpsResult<Appointment> {
        for (field, value) in [
            ("age", &new.age),
            ("gender", &new.gender),
            ("service", &new.service),
            ("date", &new.date),
            ("time", &new.time),
        ] {
            if value.trim().is_empty() {
                return Err(OpsError::missing(field));
            }
        }
        let appointment = self
            .repo
            .create(Appointment::from_new(new, 0))
            .await?;
        info!(
            appointment = %appointment.id,
            patient = %appointment.patient_id,
            booking_count = appointment.booking_count,
            "appointment created"
        );
        Ok(appointment)
    }

    /// Overwrites `status` only. Leaving `Pending` requires a report to
    /// exist (`last_date` set), otherwise the transition is refused.
    pub async fn update_status(&self, id: Uuid, status: &str) -> OpsResult<Appointment> {
        let status = AppointmentStatus::from_str(status)?;
        let mut appointment = self.require(id).await?;
        if status != AppointmentStatus::Pending && appointment.last_date.is_none() {
            return Err(OpsError::PreconditionFailed(
                "report must exist first".to_string(),
            ));
        }
        appointment.status = status;
        self.repo.update(&appointment).await?;
        info!(appointment = %id, status = %status, "status updated");
        Ok(appointment)
    }

    /// Attaches the scan report. The `(id, phone)` pair must resolve as a
    /// unit, which guards against cross-patient overwrites. Free-text
    /// fields are trimmed; `report_status` flips to ready and `last_date`
    /// is stamped with the report date.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_report(
        &self,
        id: Uuid,
        phone: &str,
        scan_type: &str,
        history: &str,
        findings: &str,
        impressions: &str,
        image_refs: Vec<String>,
        report_date: &str,
    ) -> OpsResult<Appointment> {
        let mut appointment = self
            .repo
            .find_by_id_and_phone(id, phone)
            .await?
            .ok_or_else(|| OpsError::not_found(format!("appointment {} for {}", id, phone)))?;
        appointment.report = Some(Report {
            scan_type: scan_type.trim().to_string(),
            history: history.trim().to_string(),
            findings: findings.trim().to_string(),
            impressions: impressions.trim().to_string(),
            image_refs,
        });
        appointment.report_status = ReportStatus::Ready;
        appointment.last_date = Some(report_date.to_string());
        self.repo.update(&appointment).await?;
        info!(appointment = %id, "report attached");
        Ok(appointment)
    }

    /// Sets the externally stored image reference list. Independent of
    /// `set_report`; used by the later print/QR step.
    pub async fn attach_report_images(
        &self,
        id: Uuid,
        phone: &str,
        image_refs: Vec<String>,
    ) -> OpsResult<Appointment> {
        let mut appointment = self
            .repo
            .find_by_id_and_phone(id, phone)
            .await?
            .ok_or_else(|| OpsError::not_found(format!("appointment {} for {}", id, phone)))?;
        match appointment.report.as_mut() {
            Some(report) => report.image_refs = image_refs,
            None => {
                appointment.report = Some(Report {
                    image_refs,
                    ..Report::default()
                })
            }
        }
        self.repo.update(&appointment).await?;
        Ok(appointment)
    }

    pub async fn set_payment_status(&self, id: Uuid, status: &str) -> OpsResult<Appointment> {
        let status = PaymentStatus::from_str(status)?;
        let mut appointment = self.require(id).await?;
        appointment.payment_status = status;
        self.repo.update(&appointment).await?;
        Ok(appointment)
    }

    pub async fn set_doctor(&self, id: Uuid, name: &str) -> OpsResult<Appointment> {
        let name = name.trim();
        if name.chars().count() < 2 {
            return Err(OpsError::validation(
                "doctorName",
                "must be at least 2 characters",
            ));
        }
        let mut appointment = self.require(id).await?;
        appointment.doctor_name = Some(name.to_string());
        self.repo.update(&appointment).await?;
        Ok(appointment)
    }

    pub async fn set_referral(&self, id: Uuid, source: &str) -> OpsResult<Appointment> {
        let source = source.trim();
        if source.is_empty() {
            return Err(OpsError::missing("referralSource"));
        }
        let mut appointment = self.require(id).await?;
        appointment.referral_source = Some(source.to_string());
        self.repo.update(&appointment).await?;
        Ok(appointment)
    }

    /// Staff-side listing: free-text search and category filters, newest
    /// first.
    pub async fn list_by_filter(
        &self,
        filter: &AppointmentFilter,
    ) -> OpsResult<Vec<Appointment>> {
        let mut matches: Vec<Appointment> = self
            .repo
            .list_all()
            .await?
            .into_iter()
            .filter(|a| Self::matches(a, filter))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(count = matches.len(), "appointment listing filtered");
        Ok(matches)
    }

    fn matches(appointment: &Appointment, filter: &AppointmentFilter) -> bool {
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            let hit = appointment.patient_name.to_lowercase().contains(&needle)
                || appointment.phone.contains(&needle)
                || appointment.service.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let Some(service) = &filter.service {
            if &appointment.service != service {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if appointment.status != status {
                return false;
            }
        }
        if let Some(month) = filter.month {
            let scheduled = NaiveDate::parse_from_str(&appointment.date, "%Y-%m-%d");
            match scheduled {
                Ok(d) if chrono::Datelike::month(&d) == month => {}
                _ => return false,
            }
        }
        if let Some((from, to)) = filter.time_slot {
            let scheduled = NaiveTime::parse_from_str(&appointment.time, "%H:%M");
            match scheduled {
                Ok(t) if t.hour() >= from && t.hour() < to => {}
                _ => return false,
            }
        }
        true
    }

    async fn require(&self, id: Uuid) -> OpsResult<Appointment> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| OpsError::not_found(format!("appointment {}", id)))
    }
}
