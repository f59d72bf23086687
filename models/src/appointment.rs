// models/src/appointment.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::OpsError;

/// Visit workflow state. Leaves `Pending` only after a report exists
/// (`last_date` set on the appointment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Completed,
    Cancelled,
}

impl FromStr for AppointmentStatus {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(AppointmentStatus::Pending),
            "Completed" => Ok(AppointmentStatus::Completed),
            "Cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(OpsError::validation(
                "status",
                format!("must be Pending, Completed or Cancelled, got {:?}", other),
            )),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl FromStr for PaymentStatus {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(OpsError::validation(
                "paymentStatus",
                format!("must be paid or unpaid, got {:?}", other),
            )),
        }
    }
}

/// Scan report payload, attached once the visit has been performed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub scan_type: String,
    pub history: String,
    pub findings: String,
    pub impressions: String,
    /// References to externally stored report images (the engine never
    /// touches image bytes).
    pub image_refs: Vec<String>,
}

/// One booking. References its patient weakly by identifier; the
/// demographic snapshot is denormalized at booking time and never resynced
/// to the Patient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub service: String,
    pub date: String,
    pub time: String,
    /// Per-patient sequence number assigned at creation.
    pub booking_count: u64,
    pub status: AppointmentStatus,
    pub report_status: ReportStatus,
    pub payment_status: PaymentStatus,
    pub report: Option<Report>,
    /// Stamped when a report is produced; gates leaving `Pending`.
    pub last_date: Option<String>,
    pub doctor_name: Option<String>,
    pub referral_source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Creation input for a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub phone: String,
    pub age: String,
    pub gender: String,
    pub service: String,
    pub date: String,
    pub time: String,
}

impl Appointment {
    /// Builds the persisted record from validated input. Workflow fields
    /// always start at Pending/pending/unpaid regardless of input.
    pub fn from_new(new: NewAppointment, booking_count: u64) -> Self {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            phone: new.phone,
            age: new.age,
            gender: new.gender,
            service: new.service,
            date: new.date,
            time: new.time,
            booking_count,
            status: AppointmentStatus::Pending,
            report_status: ReportStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            report: None,
            last_date: None,
            doctor_name: None,
            referral_source: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_input() -> NewAppointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            patient_name: "Asha".to_string(),
            phone: "9999900000".to_string(),
            age: "29".to_string(),
            gender: "Female".to_string(),
            service: "Pregnancy Ultrasound".to_string(),
            date: "2025-06-01".to_string(),
            time: "10:30".to_string(),
        }
    }

    #[test]
    fn should_parse_status_from_wire_casing() {
        assert_eq!(
            "Completed".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::Completed
        );
        assert!("completed".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn new_appointment_always_starts_pending_and_unpaid() {
        let appt = Appointment::from_new(new_input(), 3);
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.report_status, ReportStatus::Pending);
        assert_eq!(appt.payment_status, PaymentStatus::Unpaid);
        assert_eq!(appt.booking_count, 3);
        assert!(appt.report.is_none());
        assert!(appt.last_date.is_none());
    }

    #[test]
    fn report_status_serializes_lowercase() {
        let json = serde_json::to_string(&ReportStatus::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
    }
}
