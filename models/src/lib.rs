// models/src/lib.rs

pub mod appointment;
pub mod errors;
pub mod inventory;
pub mod notification;
pub mod patient;
pub mod pricing;

pub use appointment::{
    Appointment, AppointmentStatus, NewAppointment, PaymentStatus, Report, ReportStatus,
};
pub use errors::{OpsError, OpsResult};
pub use inventory::{InventoryItem, LedgerEntry};
pub use notification::{Audience, NotificationGroup, NotificationItem};
pub use patient::Patient;
pub use pricing::price_for;
