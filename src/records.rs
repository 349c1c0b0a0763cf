//! Clinical records attached to completed appointments.
//!
//! A record may only be attached once the appointment is COMPLETED, and an
//! appointment carries at most one record.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::{Entity, Result, SchedulingError};
use crate::models::{AppointmentId, AppointmentStatus, DoctorId, PatientId};
use crate::store::{AppointmentStore, ClinicalRecordStore, DoctorLookup, PatientLookup};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub appointment: AppointmentId,
    pub patient: PatientId,
    pub doctor: DoctorId,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ClinicalRecord {
    pub fn has_diagnosis(&self) -> bool {
        self.diagnosis.is_some()
    }

    pub fn has_prescription(&self) -> bool {
        self.prescription.is_some()
    }

    pub fn has_notes(&self) -> bool {
        self.notes.is_some()
    }
}

/// Free-text content of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContent {
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

fn clean(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl RecordContent {
    fn normalized(self) -> Self {
        RecordContent {
            diagnosis: clean(self.diagnosis),
            prescription: clean(self.prescription),
            notes: clean(self.notes),
        }
    }
}

pub struct ClinicalRecordService {
    appointments: Arc<dyn AppointmentStore>,
    records: Arc<dyn ClinicalRecordStore>,
    doctors: Arc<dyn DoctorLookup>,
    patients: Arc<dyn PatientLookup>,
    clock: Arc<dyn Clock>,
    // Held across check-then-save so an appointment never gets two records.
    write_lock: Mutex<()>,
}

impl ClinicalRecordService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        records: Arc<dyn ClinicalRecordStore>,
        doctors: Arc<dyn DoctorLookup>,
        patients: Arc<dyn PatientLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ClinicalRecordService {
            appointments,
            records,
            doctors,
            patients,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a record to a completed appointment owned by `doctor`.
    pub fn attach(
        &self,
        appointment_id: AppointmentId,
        doctor: DoctorId,
        content: RecordContent,
    ) -> Result<ClinicalRecord> {
        let _guard = self.exclusive();
        let appointment = self
            .appointments
            .find_by_id(appointment_id)?
            .ok_or_else(|| SchedulingError::not_found(Entity::Appointment, appointment_id))?;

        if appointment.doctor() != doctor {
            warn!(appointment = %appointment_id, doctor = %doctor, "Record attach by non-owner");
            return Err(SchedulingError::Unauthorized {
                actor: doctor.as_uuid(),
                appointment: appointment_id,
            });
        }

        if appointment.status() != AppointmentStatus::Completed {
            return Err(SchedulingError::RecordRequiresCompleted(appointment.status()));
        }

        if self.records.find_by_appointment(appointment_id)?.is_some() {
            return Err(SchedulingError::RecordExists(appointment_id));
        }

        let content = content.normalized();
        let now = self.clock.now();
        let record = ClinicalRecord {
            appointment: appointment_id,
            patient: appointment.patient(),
            doctor,
            diagnosis: content.diagnosis,
            prescription: content.prescription,
            notes: content.notes,
            created_at: now,
            updated_at: now,
        };
        self.records.save(&record)?;

        info!(appointment = %appointment_id, "Clinical record attached");
        Ok(record)
    }

    /// Replace the content of an existing record.
    pub fn amend(
        &self,
        appointment_id: AppointmentId,
        doctor: DoctorId,
        content: RecordContent,
    ) -> Result<ClinicalRecord> {
        let _guard = self.exclusive();
        let mut record = self
            .records
            .find_by_appointment(appointment_id)?
            .ok_or_else(|| SchedulingError::not_found(Entity::ClinicalRecord, appointment_id))?;

        if record.doctor != doctor {
            return Err(SchedulingError::Unauthorized {
                actor: doctor.as_uuid(),
                appointment: appointment_id,
            });
        }

        let content = content.normalized();
        if content.diagnosis == record.diagnosis
            && content.prescription == record.prescription
            && content.notes == record.notes
        {
            return Err(SchedulingError::NoOp);
        }

        record.diagnosis = content.diagnosis;
        record.prescription = content.prescription;
        record.notes = content.notes;
        record.updated_at = self.clock.now();
        self.records.save(&record)?;

        info!(appointment = %appointment_id, "Clinical record amended");
        Ok(record)
    }

    pub fn for_appointment(&self, appointment_id: AppointmentId) -> Result<Option<ClinicalRecord>> {
        Ok(self.records.find_by_appointment(appointment_id)?)
    }

    /// A patient's records, newest first.
    pub fn history_for_patient(&self, patient: PatientId) -> Result<Vec<ClinicalRecord>> {
        if !self.patients.exists(patient)? {
            return Err(SchedulingError::not_found(Entity::Patient, patient));
        }
        let mut records = self.records.find_by_patient(patient)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub fn latest_for_patient(&self, patient: PatientId) -> Result<Option<ClinicalRecord>> {
        Ok(self.history_for_patient(patient)?.into_iter().next())
    }

    /// Records written by a doctor, newest first.
    pub fn for_doctor(&self, doctor: DoctorId) -> Result<Vec<ClinicalRecord>> {
        if !self.doctors.exists(doctor)? {
            return Err(SchedulingError::not_found(Entity::Doctor, doctor));
        }
        let mut records = self.records.find_by_doctor(doctor)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::lifecycle::{self, Transition};
    use crate::memory::{InMemoryAppointmentStore, InMemoryDirectory, InMemoryRecordStore};
    use crate::models::Appointment;
    use crate::window::TimeWindow;
    use chrono::{Duration, NaiveDate};
    use std::thread;

    struct Fixture {
        service: ClinicalRecordService,
        appointments: Arc<InMemoryAppointmentStore>,
        clock: Arc<ManualClock>,
        doctor: DoctorId,
        patient: PatientId,
    }

    fn fixture() -> Fixture {
        let start = NaiveDate::from_ymd_opt(2030, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(ManualClock::new(start));
        let doctor = DoctorId::new();
        let patient = PatientId::new();
        directory.add_doctor(doctor).unwrap();
        directory.add_patient(patient).unwrap();
        let service = ClinicalRecordService::new(
            appointments.clone(),
            Arc::new(InMemoryRecordStore::new()),
            directory.clone(),
            directory,
            clock.clone(),
        );
        Fixture {
            service,
            appointments,
            clock,
            doctor,
            patient,
        }
    }

    fn stored(fx: &Fixture, completed: bool) -> AppointmentId {
        let now = fx.clock.now();
        let mut appointment = Appointment::scheduled(
            fx.patient,
            fx.doctor,
            TimeWindow::of(now - Duration::hours(2), 30),
            "Review".to_string(),
            now - Duration::days(1),
        );
        if completed {
            lifecycle::apply(&mut appointment, Transition::Complete, now).unwrap();
        }
        fx.appointments.save(&appointment).unwrap();
        appointment.id()
    }

    fn content(diagnosis: &str) -> RecordContent {
        RecordContent {
            diagnosis: Some(diagnosis.to_string()),
            prescription: None,
            notes: Some("  ".to_string()),
        }
    }

    #[test]
    fn attaches_to_completed_appointment() {
        let fx = fixture();
        let id = stored(&fx, true);
        let record = fx.service.attach(id, fx.doctor, content("Flu")).unwrap();
        assert_eq!(record.patient, fx.patient);
        assert_eq!(record.diagnosis.as_deref(), Some("Flu"));
        assert!(!record.has_notes());
    }

    #[test]
    fn rejects_open_appointment() {
        let fx = fixture();
        let id = stored(&fx, false);
        let err = fx.service.attach(id, fx.doctor, content("Flu")).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::RecordRequiresCompleted(AppointmentStatus::Scheduled)
        ));
    }

    #[test]
    fn at_most_one_record_per_appointment() {
        let fx = fixture();
        let id = stored(&fx, true);
        fx.service.attach(id, fx.doctor, content("Flu")).unwrap();
        let err = fx.service.attach(id, fx.doctor, content("Cold")).unwrap_err();
        assert!(matches!(err, SchedulingError::RecordExists(existing) if existing == id));
    }

    #[test]
    fn concurrent_attach_keeps_a_single_record() {
        let fx = Arc::new(fixture());
        let id = stored(&fx, true);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fx = Arc::clone(&fx);
                thread::spawn(move || {
                    fx.service
                        .attach(id, fx.doctor, content(&format!("Diagnosis {i}")))
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("attach thread panicked"))
            .collect();
        let saved: Vec<&ClinicalRecord> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(saved.len(), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Ok(_) | Err(SchedulingError::RecordExists(_)))));

        let kept = fx.service.for_appointment(id).unwrap().unwrap();
        assert_eq!(&kept, saved[0]);
    }

    #[test]
    fn only_the_owning_doctor_may_write() {
        let fx = fixture();
        let id = stored(&fx, true);
        let err = fx.service.attach(id, DoctorId::new(), content("Flu")).unwrap_err();
        assert!(matches!(err, SchedulingError::Unauthorized { .. }));
    }

    #[test]
    fn amend_updates_and_detects_no_change() {
        let fx = fixture();
        let id = stored(&fx, true);
        fx.service.attach(id, fx.doctor, content("Flu")).unwrap();
        fx.clock.advance(Duration::minutes(5));

        let amended = fx.service.amend(id, fx.doctor, content("Influenza A")).unwrap();
        assert_eq!(amended.diagnosis.as_deref(), Some("Influenza A"));
        assert!(amended.updated_at > amended.created_at);

        let err = fx.service.amend(id, fx.doctor, content("Influenza A")).unwrap_err();
        assert!(matches!(err, SchedulingError::NoOp));
    }

    #[test]
    fn patient_history_is_newest_first() {
        let fx = fixture();
        let first = stored(&fx, true);
        fx.service.attach(first, fx.doctor, content("First")).unwrap();
        fx.clock.advance(Duration::days(1));
        let second = stored(&fx, true);
        fx.service.attach(second, fx.doctor, content("Second")).unwrap();

        let history = fx.service.history_for_patient(fx.patient).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].appointment, second);
        assert_eq!(
            fx.service.latest_for_patient(fx.patient).unwrap().unwrap().appointment,
            second
        );
        assert_eq!(fx.service.for_doctor(fx.doctor).unwrap().len(), 2);
    }

    #[test]
    fn unknown_patient_is_not_found() {
        let fx = fixture();
        let err = fx.service.history_for_patient(PatientId::new()).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::NotFound {
                entity: Entity::Patient,
                ..
            }
        ));
    }
}
