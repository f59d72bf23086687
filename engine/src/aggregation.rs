// engine/src/aggregation.rs
//
// Read-only aggregation over the appointment and patient stores. All
// calendar bucketing happens in the clinic's fixed civil timezone
// (UTC+5:30); windows resolve once to a half-open [start, end) pair of
// UTC instants and are pushed down to the store as a range filter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;

use models::errors::{OpsError, OpsResult};
use models::{price_for, AppointmentStatus, PaymentStatus};

use crate::store::{AppointmentRepository, PatientRepository};

/// The clinic's civil timezone, UTC+5:30. Calendar boundaries are computed
/// here regardless of the storage timezone.
pub fn clinic_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("static offset is in range")
}

/// Window selector for revenue queries. Exactly one shape applies, in
/// precedence order: date, then week range, then month+year, then year;
/// an empty query means the civil "today".
#[derive(Debug, Clone, Default)]
pub struct WindowQuery {
    pub date: Option<NaiveDate>,
    /// Inclusive civil date range.
    pub week: Option<(NaiveDate, NaiveDate)>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Optional time-of-day bucket, a half-open hour range in the civil
/// timezone (e.g. (8, 10) for "8 AM - 10 AM").
pub type HourSlot = (u32, u32);

#[derive(Debug, Clone, Serialize, Default)]
pub struct GroupCounts {
    pub by_status: HashMap<String, u64>,
    pub by_report_status: HashMap<String, u64>,
    pub by_payment_status: HashMap<String, u64>,
    pub by_service: HashMap<String, u64>,
    pub distinct_patients: u64,
    pub total_appointments: u64,
    pub total_patients: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceRevenue {
    pub count: u64,
    pub revenue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueBreakdown {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub per_service: HashMap<String, ServiceRevenue>,
    pub total_count: u64,
    pub total_revenue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodaySnapshot {
    pub paid: u64,
    pub unpaid: u64,
    pub completed: u64,
    pub pending: u64,
    pub new_patients: u64,
}

fn day_start(offset: &FixedOffset, date: NaiveDate) -> OpsResult<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| OpsError::internal("invalid civil midnight"))?;
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| OpsError::internal("ambiguous civil midnight"))
}

/// Resolves a window query to half-open `[start, end)` UTC instants,
/// honoring the precedence order. `now` supplies "today" for the default
/// shape.
pub fn resolve_window(
    query: &WindowQuery,
    now: DateTime<Utc>,
) -> OpsResult<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = clinic_offset();
    if let Some(date) = query.date {
        let start = day_start(&offset, date)?;
        let next = date
            .succ_opt()
            .ok_or_else(|| OpsError::validation("date", "out of calendar range"))?;
        return Ok((start, day_start(&offset, next)?));
    }
    if let Some((from, to)) = query.week {
        if to < from {
            return Err(OpsError::validation("week", "range end precedes start"));
        }
        let next = to
            .succ_opt()
            .ok_or_else(|| OpsError::validation("week", "out of calendar range"))?;
        return Ok((day_start(&offset, from)?, day_start(&offset, next)?));
    }
    if let Some(month) = query.month {
        if !(1..=12).contains(&month) {
            return Err(OpsError::validation("month", "must be 1-12"));
        }
        let year = query
            .year
            .ok_or_else(|| OpsError::validation("year", "required with month"))?;
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| OpsError::validation("month", "invalid month"))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| OpsError::validation("month", "invalid month"))?;
        return Ok((day_start(&offset, first)?, day_start(&offset, next)?));
    }
    if let Some(year) = query.year {
        let first = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| OpsError::validation("year", "invalid year"))?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .ok_or_else(|| OpsError::validation("year", "invalid year"))?;
        return Ok((day_start(&offset, first)?, day_start(&offset, next)?));
    }
    // Default: the civil "today".
    let today = now.with_timezone(&offset).date_naive();
    let start = day_start(&offset, today)?;
    let next = today
        .succ_opt()
        .ok_or_else(|| OpsError::internal("calendar overflow"))?;
    Ok((start, day_start(&offset, next)?))
}

fn in_hour_slot(created_at: DateTime<Utc>, slot: HourSlot) -> bool {
    let hour = created_at.with_timezone(&clinic_offset()).hour();
    hour >= slot.0 && hour < slot.1
}

#[derive(Clone)]
pub struct AggregationService {
    appointments: Arc<dyn AppointmentRepository>,
    patients: Arc<dyn PatientRepository>,
}

impl AggregationService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        patients: Arc<dyn PatientRepository>,
    ) -> Self {
        AggregationService {
            appointments,
            patients,
        }
    }

    /// Four independent group-by-count breakdowns plus the patient totals.
    pub async fn group_counts(&self) -> OpsResult<GroupCounts> {
        let all = self.appointments.list_all().await?;
        let mut counts = GroupCounts {
            total_appointments: all.len() as u64,
            total_patients: self.patients.count().await?,
            ..Default::default()
        };
        let mut patients = HashSet::new();
        for appointment in &all {
            *counts
                .by_status
                .entry(appointment.status.to_string())
                .or_insert(0) += 1;
            let report = match appointment.report_status {
                models::ReportStatus::Pending => "pending",
                models::ReportStatus::Ready => "ready",
            };
            *counts.by_report_status.entry(report.to_string()).or_insert(0) += 1;
            let payment = match appointment.payment_status {
                PaymentStatus::Unpaid => "unpaid",
                PaymentStatus::Paid => "paid",
            };
            *counts.by_payment_status.entry(payment.to_string()).or_insert(0) += 1;
            *counts
                .by_service
                .entry(appointment.service.clone())
                .or_insert(0) += 1;
            patients.insert(appointment.patient_id);
        }
        counts.distinct_patients = patients.len() as u64;
        Ok(counts)
    }

    /// Revenue for paid appointments created in the resolved window,
    /// priced per service from the static table. An optional hour slot
    /// narrows to a time-of-day bucket in the civil timezone.
    pub async fn revenue_by_window(
        &self,
        query: &WindowQuery,
        slot: Option<HourSlot>,
    ) -> OpsResult<RevenueBreakdown> {
        let (start, end) = resolve_window(query, Utc::now())?;
        let in_window = self.appointments.list_created_between(start, end).await?;
        let mut per_service: HashMap<String, ServiceRevenue> = HashMap::new();
        let mut total_count = 0;
        let mut total_revenue = 0;
        for appointment in in_window {
            if appointment.payment_status != PaymentStatus::Paid {
                continue;
            }
            if let Some(slot) = slot {
                if !in_hour_slot(appointment.created_at, slot) {
                    continue;
                }
            }
            let price = price_for(&appointment.service);
            let entry = per_service
                .entry(appointment.service.clone())
                .or_insert(ServiceRevenue { count: 0, revenue: 0 });
            entry.count += 1;
            entry.revenue += price;
            total_count += 1;
            total_revenue += price;
        }
        Ok(RevenueBreakdown {
            start,
            end,
            per_service,
            total_count,
            total_revenue,
        })
    }

    /// Today's workflow counters and new registrations, computed against
    /// the civil day window pushed down as a range filter.
    pub async fn today_snapshot(&self) -> OpsResult<TodaySnapshot> {
        let (start, end) = resolve_window(&WindowQuery::default(), Utc::now())?;
        let today = self.appointments.list_created_between(start, end).await?;
        let mut snapshot = TodaySnapshot {
            paid: 0,
            unpaid: 0,
            completed: 0,
            pending: 0,
            new_patients: self.patients.count_created_between(start, end).await?,
        };
        for appointment in &today {
            match appointment.payment_status {
                PaymentStatus::Paid => snapshot.paid += 1,
                PaymentStatus::Unpaid => snapshot.unpaid += 1,
            }
            match appointment.status {
                AppointmentStatus::Completed => snapshot.completed += 1,
                AppointmentStatus::Pending => snapshot.pending += 1,
                AppointmentStatus::Cancelled => {}
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use models::{Appointment, NewAppointment, Patient};
    use uuid::Uuid;

    fn booking(patient_id: Uuid, service: &str) -> Appointment {
        Appointment::from_new(
            NewAppointment {
                patient_id,
                patient_name: "Asha".to_string(),
                phone: "9999900000".to_string(),
                age: "29".to_string(),
                gender: "Female".to_string(),
                service: service.to_string(),
                date: "2025-06-15".to_string(),
                time: "10:00".to_string(),
            },
            0,
        )
    }

    async fn seed(
        store: &MemStore,
        service: &str,
        created_at: DateTime<Utc>,
        paid: bool,
    ) -> Appointment {
        let mut appt = booking(Uuid::new_v4(), service);
        appt.created_at = created_at;
        if paid {
            appt.payment_status = PaymentStatus::Paid;
        }
        AppointmentRepository::create(store, appt).await.unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn single_date_window_is_the_civil_day() {
        let query = WindowQuery {
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()),
            ..Default::default()
        };
        let (start, end) = resolve_window(&query, Utc::now()).unwrap();
        // Civil midnight at UTC+5:30 is 18:30 UTC the previous evening.
        assert_eq!(start, utc("2025-06-14T18:30:00Z"));
        assert_eq!(end, utc("2025-06-15T18:30:00Z"));
    }

    #[test]
    fn date_takes_precedence_over_other_shapes() {
        let query = WindowQuery {
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()),
            week: Some((
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            )),
            month: Some(3),
            year: Some(2024),
        };
        let (start, _) = resolve_window(&query, Utc::now()).unwrap();
        assert_eq!(start, utc("2025-06-14T18:30:00Z"));
    }

    #[test]
    fn month_window_spans_to_next_month_and_year_rolls_over() {
        let query = WindowQuery {
            month: Some(12),
            year: Some(2024),
            ..Default::default()
        };
        let (start, end) = resolve_window(&query, Utc::now()).unwrap();
        assert_eq!(start, utc("2024-11-30T18:30:00Z"));
        assert_eq!(end, utc("2024-12-31T18:30:00Z"));
    }

    #[test]
    fn empty_query_defaults_to_civil_today() {
        // 2025-06-15 20:00 UTC is already 2025-06-16 in the clinic's
        // timezone, so "today" is the 16th.
        let now = utc("2025-06-15T20:00:00Z");
        let (start, end) = resolve_window(&WindowQuery::default(), now).unwrap();
        assert_eq!(start, utc("2025-06-15T18:30:00Z"));
        assert_eq!(end, utc("2025-06-16T18:30:00Z"));
    }

    #[test]
    fn week_range_rejects_inverted_bounds() {
        let query = WindowQuery {
            week: Some((
                NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            )),
            ..Default::default()
        };
        assert!(resolve_window(&query, Utc::now()).is_err());
    }

    #[tokio::test]
    async fn revenue_counts_paid_appointments_in_window_only() {
        let store = MemStore::new();
        // Two paid inside the civil day, one unpaid inside, one paid just
        // before civil midnight.
        seed(&store, "Pregnancy Ultrasound", utc("2025-06-14T18:30:00Z"), true).await;
        seed(&store, "TVS Scan", utc("2025-06-15T10:00:00Z"), true).await;
        seed(&store, "TVS Scan", utc("2025-06-15T10:00:00Z"), false).await;
        seed(&store, "Color Doppler", utc("2025-06-14T18:29:59Z"), true).await;

        let svc = AggregationService::new(Arc::new(store.clone()), Arc::new(store));
        let query = WindowQuery {
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()),
            ..Default::default()
        };
        let breakdown = svc.revenue_by_window(&query, None).await.unwrap();
        assert_eq!(breakdown.total_count, 2);
        assert_eq!(breakdown.total_revenue, 1200 + 1400);
        assert_eq!(breakdown.per_service["Pregnancy Ultrasound"].count, 1);
        assert_eq!(breakdown.per_service["TVS Scan"].revenue, 1400);
        assert!(!breakdown.per_service.contains_key("Color Doppler"));
        // Revenue always equals the sum of per-service count x price.
        let recomputed: i64 = breakdown
            .per_service
            .iter()
            .map(|(s, r)| r.count as i64 * models::price_for(s))
            .sum();
        assert_eq!(breakdown.total_revenue, recomputed);
    }

    #[tokio::test]
    async fn unknown_services_price_at_zero_but_still_count() {
        let store = MemStore::new();
        seed(&store, "House Call", utc("2025-06-15T10:00:00Z"), true).await;
        let svc = AggregationService::new(Arc::new(store.clone()), Arc::new(store));
        let query = WindowQuery {
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()),
            ..Default::default()
        };
        let breakdown = svc.revenue_by_window(&query, None).await.unwrap();
        assert_eq!(breakdown.total_count, 1);
        assert_eq!(breakdown.total_revenue, 0);
    }

    #[tokio::test]
    async fn hour_slot_filters_by_civil_hour() {
        let store = MemStore::new();
        // 03:00 UTC is 08:30 civil; 05:00 UTC is 10:30 civil.
        seed(&store, "TVS Scan", utc("2025-06-15T03:00:00Z"), true).await;
        seed(&store, "TVS Scan", utc("2025-06-15T05:00:00Z"), true).await;
        let svc = AggregationService::new(Arc::new(store.clone()), Arc::new(store));
        let query = WindowQuery {
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()),
            ..Default::default()
        };
        let morning = svc.revenue_by_window(&query, Some((8, 10))).await.unwrap();
        assert_eq!(morning.total_count, 1);
    }

    #[tokio::test]
    async fn group_counts_cover_all_four_breakdowns() {
        let store = MemStore::new();
        let patient = Uuid::new_v4();
        let mut a = booking(patient, "TVS Scan");
        a.payment_status = PaymentStatus::Paid;
        AppointmentRepository::create(&store, a).await.unwrap();
        AppointmentRepository::create(&store, booking(patient, "Color Doppler"))
            .await
            .unwrap();
        PatientRepository::create(&store, Patient::new("Asha", "9999900000"))
            .await
            .unwrap();

        let svc = AggregationService::new(Arc::new(store.clone()), Arc::new(store));
        let counts = svc.group_counts().await.unwrap();
        assert_eq!(counts.total_appointments, 2);
        assert_eq!(counts.distinct_patients, 1);
        assert_eq!(counts.total_patients, 1);
        assert_eq!(counts.by_status["Pending"], 2);
        assert_eq!(counts.by_payment_status["paid"], 1);
        assert_eq!(counts.by_payment_status["unpaid"], 1);
        assert_eq!(counts.by_service["TVS Scan"], 1);
        assert_eq!(counts.by_report_status["pending"], 2);
    }

    #[tokio::test]
    async fn today_snapshot_counts_current_civil_day() {
        let store = MemStore::new();
        let now = Utc::now();
        seed(&store, "TVS Scan", now, true).await;
        seed(&store, "TVS Scan", now, false).await;
        seed(&store, "TVS Scan", now - chrono::Duration::days(3), true).await;
        PatientRepository::create(&store, Patient::new("Asha", "9999900000"))
            .await
            .unwrap();

        let svc = AggregationService::new(Arc::new(store.clone()), Arc::new(store));
        let snapshot = svc.today_snapshot().await.unwrap();
        assert_eq!(snapshot.paid, 1);
        assert_eq!(snapshot.unpaid, 1);
        assert_eq!(snapshot.pending, 2);
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.new_patients, 1);
    }
}
