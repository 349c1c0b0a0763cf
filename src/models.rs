//! Data models for the appointment scheduling core.
//!
//! This module defines the core data structures used throughout the system:
//! - Typed identifiers for appointments, doctors and patients
//! - AppointmentStatus: lifecycle states of an appointment
//! - Appointment: the booked visit, mutated only through the lifecycle
//! - AppointmentView / AppointmentStats: read-only projections for callers

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::window::TimeWindow;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                $name(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(
    /// Opaque appointment identity, assigned on creation.
    AppointmentId
);
entity_id!(DoctorId);
entity_id!(PatientId);

/// Lifecycle states of an appointment.
///
/// `Scheduled` and `Confirmed` are active; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Convert a string to a status value.
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "no_show" | "no-show" | "noshow" => Ok(AppointmentStatus::NoShow),
            _ => Err(format!(
                "Invalid status: '{}'. Must be one of: scheduled, confirmed, completed, cancelled, no_show",
                value
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }

    /// Human-readable label for listings and reports.
    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "No show",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which calendar a conflict was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Doctor,
    Patient,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Doctor => f.write_str("doctor"),
            Participant::Patient => f.write_str("patient"),
        }
    }
}

/// A booked visit between a patient and a doctor.
///
/// Fields are crate-private: the start time changes only through a
/// validated reschedule and the status only through the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub(crate) id: AppointmentId,
    pub(crate) patient: PatientId,
    pub(crate) doctor: DoctorId,
    pub(crate) start: NaiveDateTime,
    pub(crate) duration_minutes: u32,
    pub(crate) reason: String,
    pub(crate) status: AppointmentStatus,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) updated_at: NaiveDateTime,
    pub(crate) cancellation_note: Option<String>,
}

impl Appointment {
    /// Create a new appointment in its initial state.
    pub(crate) fn scheduled(
        patient: PatientId,
        doctor: DoctorId,
        window: TimeWindow,
        reason: String,
        now: NaiveDateTime,
    ) -> Self {
        Appointment {
            id: AppointmentId::new(),
            patient,
            doctor,
            start: window.start,
            duration_minutes: window.duration_minutes(),
            reason,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
            cancellation_note: None,
        }
    }

    pub fn id(&self) -> AppointmentId {
        self.id
    }

    pub fn patient(&self) -> PatientId {
        self.patient
    }

    pub fn doctor(&self) -> DoctorId {
        self.doctor
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// End of the appointment, `start + duration`.
    pub fn end(&self) -> NaiveDateTime {
        self.window().end
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::of(self.start, self.duration_minutes)
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    pub fn cancellation_note(&self) -> Option<&str> {
        self.cancellation_note.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn can_be_modified(&self) -> bool {
        self.status.is_active()
    }

    /// Whether the given user takes part in this appointment.
    pub fn involves(&self, actor: Uuid) -> bool {
        self.patient.0 == actor || self.doctor.0 == actor
    }

    pub fn view(&self, now: NaiveDateTime) -> AppointmentView {
        AppointmentView {
            id: self.id,
            patient: self.patient,
            doctor: self.doctor,
            start: self.start,
            end: self.end(),
            duration_minutes: self.duration_minutes,
            reason: self.reason.clone(),
            status: self.status,
            status_label: self.status.label().to_string(),
            cancellation_note: self.cancellation_note.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_active: self.is_active(),
            can_be_modified: self.can_be_modified(),
            has_passed: self.start < now,
        }
    }
}

impl fmt::Display for Appointment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Appointment({}, {} - {}, {})",
            self.id,
            self.start.format("%Y-%m-%d %H:%M"),
            self.end().format("%H:%M"),
            self.status
        )
    }
}

/// Flattened projection handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentView {
    pub id: AppointmentId,
    pub patient: PatientId,
    pub doctor: DoctorId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: u32,
    pub reason: String,
    pub status: AppointmentStatus,
    pub status_label: String,
    pub cancellation_note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_active: bool,
    pub can_be_modified: bool,
    pub has_passed: bool,
}

/// Appointment counts per status for one doctor or patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub scheduled: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub no_show: u64,
}

impl AppointmentStats {
    pub fn tally<'a>(appointments: impl IntoIterator<Item = &'a Appointment>) -> Self {
        let mut stats = AppointmentStats::default();
        for appointment in appointments {
            match appointment.status {
                AppointmentStatus::Scheduled => stats.scheduled += 1,
                AppointmentStatus::Confirmed => stats.confirmed += 1,
                AppointmentStatus::Completed => stats.completed += 1,
                AppointmentStatus::Cancelled => stats.cancelled += 1,
                AppointmentStatus::NoShow => stats.no_show += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> u64 {
        self.scheduled + self.confirmed + self.completed + self.cancelled + self.no_show
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample() -> Appointment {
        Appointment::scheduled(
            PatientId::new(),
            DoctorId::new(),
            TimeWindow::of(at(10, 0), 45),
            "Annual checkup".to_string(),
            at(8, 0),
        )
    }

    #[test]
    fn new_appointment_starts_scheduled() {
        let appointment = sample();
        assert_eq!(appointment.status(), AppointmentStatus::Scheduled);
        assert_eq!(appointment.created_at(), appointment.updated_at());
        assert!(appointment.cancellation_note().is_none());
    }

    #[test]
    fn end_is_start_plus_duration() {
        let appointment = sample();
        assert_eq!(appointment.end(), at(10, 45));
        assert_eq!(appointment.window().end, appointment.end());
    }

    #[test]
    fn status_parsing_accepts_aliases() {
        assert_eq!(
            AppointmentStatus::from_string(" No-Show "),
            Ok(AppointmentStatus::NoShow)
        );
        assert_eq!(
            AppointmentStatus::from_string("canceled"),
            Ok(AppointmentStatus::Cancelled)
        );
        assert!(AppointmentStatus::from_string("pending").is_err());
    }

    #[test]
    fn only_scheduled_and_confirmed_are_active() {
        let active: Vec<_> = AppointmentStatus::ALL
            .iter()
            .filter(|s| s.is_active())
            .collect();
        assert_eq!(
            active,
            vec![&AppointmentStatus::Scheduled, &AppointmentStatus::Confirmed]
        );
    }

    #[test]
    fn involves_matches_either_participant() {
        let appointment = sample();
        assert!(appointment.involves(appointment.patient().as_uuid()));
        assert!(appointment.involves(appointment.doctor().as_uuid()));
        assert!(!appointment.involves(Uuid::new_v4()));
    }

    #[test]
    fn view_flags_reflect_state_and_clock() {
        let appointment = sample();
        let before = appointment.view(at(9, 0));
        assert!(before.is_active);
        assert!(!before.has_passed);
        assert_eq!(before.status_label, "Scheduled");

        let after = appointment.view(at(11, 0));
        assert!(after.has_passed);
    }

    #[test]
    fn status_serializes_in_screaming_case() {
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"NO_SHOW\"");
    }

    #[test]
    fn stats_tally_counts_each_status() {
        let mut done = sample();
        done.status = AppointmentStatus::Completed;
        let open = sample();
        let stats = AppointmentStats::tally([&done, &open]);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.total(), 2);
    }
}
