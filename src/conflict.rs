//! Double-booking detection for doctor and patient calendars.

use tracing::debug;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentId, DoctorId, Participant, PatientId};
use crate::window::TimeWindow;

/// Whose calendar is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarOwner {
    Doctor(DoctorId),
    Patient(PatientId),
}

impl CalendarOwner {
    pub fn participant(&self) -> Participant {
        match self {
            CalendarOwner::Doctor(_) => Participant::Doctor,
            CalendarOwner::Patient(_) => Participant::Patient,
        }
    }

    fn owns(&self, appointment: &Appointment) -> bool {
        match self {
            CalendarOwner::Doctor(id) => appointment.doctor() == *id,
            CalendarOwner::Patient(id) => appointment.patient() == *id,
        }
    }
}

/// Stateless overlap check over a caller-supplied active set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        ConflictDetector
    }

    /// First active appointment of `owner` overlapping `candidate`, skipping `exclude`.
    pub fn find_conflict<'a>(
        &self,
        owner: CalendarOwner,
        candidate: TimeWindow,
        active: &'a [Appointment],
        exclude: Option<AppointmentId>,
    ) -> Option<&'a Appointment> {
        active
            .iter()
            .filter(|existing| existing.is_active() && owner.owns(existing))
            .filter(|existing| Some(existing.id()) != exclude)
            .find(|existing| existing.window().overlaps_with(&candidate))
    }

    pub fn has_conflict(
        &self,
        owner: CalendarOwner,
        candidate: TimeWindow,
        active: &[Appointment],
        exclude: Option<AppointmentId>,
    ) -> bool {
        self.find_conflict(owner, candidate, active, exclude).is_some()
    }

    /// Like [`has_conflict`](Self::has_conflict), as a typed error.
    pub fn ensure_free(
        &self,
        owner: CalendarOwner,
        candidate: TimeWindow,
        active: &[Appointment],
        exclude: Option<AppointmentId>,
    ) -> Result<(), SchedulingError> {
        match self.find_conflict(owner, candidate, active, exclude) {
            Some(existing) => {
                debug!(
                    participant = %owner.participant(),
                    conflicting = %existing.id(),
                    start = %candidate.start,
                    end = %candidate.end,
                    "Candidate window overlaps an active appointment"
                );
                Err(SchedulingError::SchedulingConflict {
                    participant: owner.participant(),
                    conflicting: existing.id(),
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 2, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn booked(doctor: DoctorId, patient: PatientId, h: u32, m: u32, minutes: u32) -> Appointment {
        Appointment::scheduled(
            patient,
            doctor,
            TimeWindow::of(at(h, m), minutes),
            "Consultation".to_string(),
            at(7, 0),
        )
    }

    #[test]
    fn overlapping_window_conflicts() {
        let doctor = DoctorId::new();
        let existing = vec![booked(doctor, PatientId::new(), 10, 0, 30)];
        let detector = ConflictDetector::new();
        assert!(detector.has_conflict(
            CalendarOwner::Doctor(doctor),
            TimeWindow::of(at(10, 15), 30),
            &existing,
            None
        ));
    }

    #[test]
    fn touching_window_is_free() {
        let doctor = DoctorId::new();
        let existing = vec![booked(doctor, PatientId::new(), 10, 0, 30)];
        let detector = ConflictDetector::new();
        assert!(!detector.has_conflict(
            CalendarOwner::Doctor(doctor),
            TimeWindow::of(at(10, 30), 30),
            &existing,
            None
        ));
        assert!(!detector.has_conflict(
            CalendarOwner::Doctor(doctor),
            TimeWindow::of(at(9, 30), 30),
            &existing,
            None
        ));
    }

    #[test]
    fn excluded_appointment_is_ignored() {
        let doctor = DoctorId::new();
        let existing = vec![booked(doctor, PatientId::new(), 10, 0, 30)];
        let own_id = existing[0].id();
        let detector = ConflictDetector::new();
        assert!(!detector.has_conflict(
            CalendarOwner::Doctor(doctor),
            TimeWindow::of(at(10, 10), 30),
            &existing,
            Some(own_id)
        ));
    }

    #[test]
    fn inactive_and_foreign_appointments_are_ignored() {
        let doctor = DoctorId::new();
        let mut cancelled = booked(doctor, PatientId::new(), 10, 0, 30);
        cancelled.status = AppointmentStatus::Cancelled;
        let other_doctor = booked(DoctorId::new(), PatientId::new(), 10, 0, 30);
        let existing = vec![cancelled, other_doctor];
        let detector = ConflictDetector::new();
        assert!(!detector.has_conflict(
            CalendarOwner::Doctor(doctor),
            TimeWindow::of(at(10, 0), 30),
            &existing,
            None
        ));
    }

    #[test]
    fn patient_calendar_reports_patient_participant() {
        let patient = PatientId::new();
        let existing = vec![booked(DoctorId::new(), patient, 14, 0, 60)];
        let detector = ConflictDetector::new();
        let err = detector
            .ensure_free(
                CalendarOwner::Patient(patient),
                TimeWindow::of(at(14, 30), 15),
                &existing,
                None,
            )
            .unwrap_err();
        match err {
            SchedulingError::SchedulingConflict {
                participant,
                conflicting,
            } => {
                assert_eq!(participant, Participant::Patient);
                assert_eq!(conflicting, existing[0].id());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
