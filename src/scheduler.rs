//! Appointment scheduling service.
//!
//! This module provides the SchedulingService, the façade callers use to
//! book, reschedule and move appointments through their lifecycle. Every
//! mutating use case validates the booking policy, checks both the doctor's
//! and the patient's calendars for overlaps, applies the lifecycle
//! transition and persists the result as one serialized unit.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::open_slots;
use crate::clock::Clock;
use crate::conflict::{CalendarOwner, ConflictDetector};
use crate::error::{Entity, Result, SchedulingError};
use crate::lifecycle::{self, LifecycleEvent, Transition};
use crate::models::{
    Appointment, AppointmentId, AppointmentStats, AppointmentStatus, AppointmentView, DoctorId,
    PatientId,
};
use crate::policy::SchedulingPolicy;
use crate::store::{AppointmentStore, DoctorLookup, PatientLookup};
use crate::window::TimeWindow;

/// A patient's request for an appointment.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient: PatientId,
    pub doctor: DoctorId,
    pub start: NaiveDateTime,
    /// Falls back to the policy's default duration.
    pub duration_minutes: Option<u32>,
    pub reason: String,
}

/// Changes to an existing appointment. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdate {
    pub start: Option<NaiveDateTime>,
    pub duration_minutes: Option<u32>,
    pub reason: Option<String>,
    pub status: Option<AppointmentStatus>,
    /// Recorded only when `status` is `Cancelled`.
    pub cancellation_note: Option<String>,
}

/// Booking façade over the injected stores.
///
/// Share one instance (e.g. behind an `Arc`) per store: conflict checks are
/// serialized in-process, not in the store.
pub struct SchedulingService {
    appointments: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorLookup>,
    patients: Arc<dyn PatientLookup>,
    clock: Arc<dyn Clock>,
    policy: SchedulingPolicy,
    detector: ConflictDetector,
    // Serializes read-validate-write so two overlapping writes cannot both pass the conflict check.
    write_lock: Mutex<()>,
}

impl SchedulingService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorLookup>,
        patients: Arc<dyn PatientLookup>,
        clock: Arc<dyn Clock>,
        policy: SchedulingPolicy,
    ) -> Self {
        SchedulingService {
            appointments,
            doctors,
            patients,
            clock,
            policy,
            detector: ConflictDetector::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_doctor(&self, doctor: DoctorId) -> Result<()> {
        if self.doctors.exists(doctor)? {
            Ok(())
        } else {
            Err(SchedulingError::not_found(Entity::Doctor, doctor))
        }
    }

    fn ensure_patient(&self, patient: PatientId) -> Result<()> {
        if self.patients.exists(patient)? {
            Ok(())
        } else {
            Err(SchedulingError::not_found(Entity::Patient, patient))
        }
    }

    fn load(&self, id: AppointmentId) -> Result<Appointment> {
        self.appointments
            .find_by_id(id)?
            .ok_or_else(|| SchedulingError::not_found(Entity::Appointment, id))
    }

    /// Both calendars must be free of active overlaps, `exclude` aside.
    fn ensure_calendars_free(
        &self,
        doctor: DoctorId,
        patient: PatientId,
        window: TimeWindow,
        exclude: Option<AppointmentId>,
    ) -> Result<()> {
        let doctor_active =
            self.appointments
                .find_active_by_doctor_in_range(doctor, window.start, window.end)?;
        self.detector
            .ensure_free(CalendarOwner::Doctor(doctor), window, &doctor_active, exclude)?;

        let patient_active =
            self.appointments
                .find_active_by_patient_in_range(patient, window.start, window.end)?;
        self.detector.ensure_free(
            CalendarOwner::Patient(patient),
            window,
            &patient_active,
            exclude,
        )?;
        Ok(())
    }

    // ============= COMMANDS =============

    /// Book a new appointment in the SCHEDULED state.
    pub fn book(&self, request: BookingRequest) -> Result<Appointment> {
        let _guard = self.exclusive();
        let now = self.clock.now();

        let result = self.try_book(&request, now);
        if let Err(err) = &result {
            warn!(
                patient = %request.patient,
                doctor = %request.doctor,
                start = %request.start,
                error = %err,
                "Booking rejected"
            );
        }
        result
    }

    fn try_book(&self, request: &BookingRequest, now: NaiveDateTime) -> Result<Appointment> {
        self.ensure_patient(request.patient)?;
        self.ensure_doctor(request.doctor)?;

        self.policy.validate(request.start, now)?;
        let duration = self.policy.resolve_duration(request.duration_minutes);
        self.policy.validate_duration(duration)?;

        let window = TimeWindow::of(request.start, duration);
        self.ensure_calendars_free(request.doctor, request.patient, window, None)?;

        let appointment = Appointment::scheduled(
            request.patient,
            request.doctor,
            window,
            request.reason.trim().to_string(),
            now,
        );
        self.appointments.save(&appointment)?;

        info!(
            appointment = %appointment.id(),
            doctor = %appointment.doctor(),
            start = %appointment.start(),
            duration = appointment.duration_minutes(),
            "Appointment booked"
        );
        Ok(appointment)
    }

    /// Apply an update: new time and/or duration, reason, or a direct status change.
    ///
    /// Nothing is written unless every requested change is valid.
    pub fn reschedule(&self, id: AppointmentId, update: AppointmentUpdate) -> Result<Appointment> {
        let _guard = self.exclusive();
        let now = self.clock.now();

        let mut appointment = self.load(id)?;
        if !appointment.can_be_modified() {
            return Err(SchedulingError::ImmutableState(appointment.status()));
        }

        let mut changed = false;

        let new_start = update.start.filter(|start| *start != appointment.start());
        let new_duration = update
            .duration_minutes
            .filter(|minutes| *minutes != appointment.duration_minutes());

        if new_start.is_some() || new_duration.is_some() {
            if let Some(start) = new_start {
                self.policy.validate(start, now)?;
            }
            if let Some(minutes) = new_duration {
                self.policy.validate_duration(minutes)?;
            }

            let window = TimeWindow::of(
                new_start.unwrap_or(appointment.start()),
                new_duration.unwrap_or(appointment.duration_minutes()),
            );
            self.ensure_calendars_free(
                appointment.doctor(),
                appointment.patient(),
                window,
                Some(id),
            )?;
            lifecycle::apply(&mut appointment, Transition::Reschedule { window }, now)?;
            changed = true;
        }

        let new_reason = update
            .reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty() && reason != appointment.reason());
        if let Some(reason) = new_reason {
            appointment.reason = reason;
            appointment.updated_at = now;
            changed = true;
        }

        if let Some(target) = update.status.filter(|s| *s != appointment.status()) {
            let transition = Transition::toward(target, update.cancellation_note).ok_or(
                SchedulingError::InvalidTransition {
                    from: appointment.status(),
                    event: LifecycleEvent::Schedule,
                },
            )?;
            lifecycle::apply(&mut appointment, transition, now)?;
            changed = true;
        }

        if !changed {
            return Err(SchedulingError::NoOp);
        }

        self.appointments.save(&appointment)?;
        info!(appointment = %id, status = %appointment.status(), "Appointment updated");
        Ok(appointment)
    }

    /// Cancel on behalf of the appointment's patient or doctor.
    pub fn cancel(
        &self,
        id: AppointmentId,
        actor: Uuid,
        note: Option<String>,
    ) -> Result<Appointment> {
        let _guard = self.exclusive();
        let now = self.clock.now();

        let mut appointment = self.load(id)?;
        if !appointment.involves(actor) {
            warn!(appointment = %id, actor = %actor, "Cancellation by non-participant");
            return Err(SchedulingError::Unauthorized {
                actor,
                appointment: id,
            });
        }

        match appointment.status() {
            status @ (AppointmentStatus::Cancelled | AppointmentStatus::Completed) => {
                return Err(SchedulingError::AlreadyTerminal(status));
            }
            _ => {}
        }

        lifecycle::apply(&mut appointment, Transition::Cancel { note }, now)?;
        self.appointments.save(&appointment)?;
        Ok(appointment)
    }

    pub fn confirm(&self, id: AppointmentId, doctor: DoctorId) -> Result<Appointment> {
        self.doctor_transition(id, doctor, Transition::Confirm)
    }

    pub fn complete(&self, id: AppointmentId, doctor: DoctorId) -> Result<Appointment> {
        self.doctor_transition(id, doctor, Transition::Complete)
    }

    /// Only once the appointment's end time has passed.
    pub fn mark_no_show(&self, id: AppointmentId, doctor: DoctorId) -> Result<Appointment> {
        self.doctor_transition(id, doctor, Transition::MarkNoShow)
    }

    fn doctor_transition(
        &self,
        id: AppointmentId,
        doctor: DoctorId,
        transition: Transition,
    ) -> Result<Appointment> {
        let _guard = self.exclusive();
        let now = self.clock.now();

        let mut appointment = self.load(id)?;
        if appointment.doctor() != doctor {
            warn!(appointment = %id, doctor = %doctor, event = %transition.event(), "Transition by non-owner");
            return Err(SchedulingError::Unauthorized {
                actor: doctor.as_uuid(),
                appointment: id,
            });
        }

        lifecycle::apply(&mut appointment, transition, now)?;
        self.appointments.save(&appointment)?;
        Ok(appointment)
    }

    // ============= QUERIES =============

    pub fn get(&self, id: AppointmentId) -> Result<AppointmentView> {
        Ok(self.load(id)?.view(self.clock.now()))
    }

    fn project(&self, mut appointments: Vec<Appointment>, newest_first: bool) -> Vec<AppointmentView> {
        appointments.sort_by_key(|a| a.start());
        if newest_first {
            appointments.reverse();
        }
        let now = self.clock.now();
        appointments.iter().map(|a| a.view(now)).collect()
    }

    /// Active appointments starting from now, soonest first.
    pub fn upcoming_for_patient(&self, patient: PatientId) -> Result<Vec<AppointmentView>> {
        self.ensure_patient(patient)?;
        let now = self.clock.now();
        let upcoming = self
            .appointments
            .find_by_patient(patient)?
            .into_iter()
            .filter(|a| a.is_active() && a.start() >= now)
            .collect();
        Ok(self.project(upcoming, false))
    }

    pub fn upcoming_for_doctor(&self, doctor: DoctorId) -> Result<Vec<AppointmentView>> {
        self.ensure_doctor(doctor)?;
        let now = self.clock.now();
        let upcoming = self
            .appointments
            .find_by_doctor(doctor)?
            .into_iter()
            .filter(|a| a.is_active() && a.start() >= now)
            .collect();
        Ok(self.project(upcoming, false))
    }

    /// Every appointment of the patient, most recent first.
    pub fn history_for_patient(&self, patient: PatientId) -> Result<Vec<AppointmentView>> {
        self.ensure_patient(patient)?;
        let all = self.appointments.find_by_patient(patient)?;
        Ok(self.project(all, true))
    }

    pub fn today_for_doctor(&self, doctor: DoctorId) -> Result<Vec<AppointmentView>> {
        self.ensure_doctor(doctor)?;
        let today = self.clock.now().date();
        let todays = self
            .appointments
            .find_by_doctor(doctor)?
            .into_iter()
            .filter(|a| a.start().date() == today)
            .collect();
        Ok(self.project(todays, false))
    }

    pub fn all_for_doctor(&self, doctor: DoctorId) -> Result<Vec<AppointmentView>> {
        self.ensure_doctor(doctor)?;
        let all = self.appointments.find_by_doctor(doctor)?;
        Ok(self.project(all, false))
    }

    /// Appointments starting in `[from, to)`, any status.
    pub fn by_date_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<AppointmentView>> {
        if from >= to {
            return Ok(Vec::new());
        }
        let found = self.appointments.find_by_date_range(from, to)?;
        Ok(self.project(found, false))
    }

    pub fn for_day(&self, date: NaiveDate) -> Result<Vec<AppointmentView>> {
        let (from, to) = day_bounds(date);
        self.by_date_range(from, to)
    }

    pub fn stats_for_doctor(&self, doctor: DoctorId) -> Result<AppointmentStats> {
        self.ensure_doctor(doctor)?;
        let all = self.appointments.find_by_doctor(doctor)?;
        Ok(AppointmentStats::tally(&all))
    }

    pub fn stats_for_patient(&self, patient: PatientId) -> Result<AppointmentStats> {
        self.ensure_patient(patient)?;
        let all = self.appointments.find_by_patient(patient)?;
        Ok(AppointmentStats::tally(&all))
    }

    /// Bookable slots for a doctor on `date`.
    ///
    /// Slots follow the policy's daily window, avoid the doctor's active
    /// appointments, and exclude starts the policy would reject right now.
    pub fn available_slots(
        &self,
        doctor: DoctorId,
        date: NaiveDate,
        duration_minutes: Option<u32>,
    ) -> Result<Vec<TimeWindow>> {
        self.ensure_doctor(doctor)?;
        let duration = self.policy.resolve_duration(duration_minutes);
        self.policy.validate_duration(duration)?;

        let (day_start, day_end) = day_bounds(date);
        let booked: Vec<TimeWindow> = self
            .appointments
            .find_active_by_doctor_in_range(doctor, day_start, day_end)?
            .iter()
            .map(Appointment::window)
            .collect();

        let config = self.policy.config();
        let now = self.clock.now();
        let slots: Vec<TimeWindow> =
            open_slots(date, config.day_start, config.day_end, duration, &booked)
                .into_iter()
                .filter(|slot| self.policy.accepts(slot.start, now))
                .collect();

        debug!(doctor = %doctor, date = %date, count = slots.len(), "Computed open slots");
        Ok(slots)
    }
}

/// `[midnight, next midnight)` of `date`, capped at the end of the calendar.
fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let from = date.and_time(NaiveTime::MIN);
    let to = from
        .checked_add_signed(Duration::days(1))
        .unwrap_or(NaiveDateTime::MAX);
    (from, to)
}
